// keglet-core/src/install/extract.rs
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use keglet_common::error::{KegletError, Result};
use tar::{Archive, EntryType};
use tracing::{debug, error, warn};
use xz2::read::XzDecoder;
use zip::read::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    TarGz,
    TarBz2,
    TarXz,
    Tar,
    Zip,
}

fn malformed(archive_path: &Path, msg: impl Into<String>) -> KegletError {
    KegletError::MalformedArchive(archive_path.to_path_buf(), msg.into())
}

/// Detects the archive type from content, falling back to the file name.
pub fn detect_archive_type(archive_path: &Path) -> Result<ArchiveType> {
    let detected = infer::get_from_path(archive_path)?.map(|kind| kind.extension());
    debug!(
        "Detected content type {:?} for {}",
        detected,
        archive_path.display()
    );
    let by_content = match detected {
        Some("gz") => Some(ArchiveType::TarGz),
        Some("bz2") => Some(ArchiveType::TarBz2),
        Some("xz") => Some(ArchiveType::TarXz),
        Some("zip") => Some(ArchiveType::Zip),
        Some("tar") => Some(ArchiveType::Tar),
        _ => None,
    };
    if let Some(kind) = by_content {
        return Ok(kind);
    }

    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let by_name = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(ArchiveType::TarGz)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz") || name.ends_with(".tbz2") {
        Some(ArchiveType::TarBz2)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Some(ArchiveType::TarXz)
    } else if name.ends_with(".tar") {
        Some(ArchiveType::Tar)
    } else if name.ends_with(".zip") {
        Some(ArchiveType::Zip)
    } else {
        None
    };
    by_name.ok_or_else(|| malformed(archive_path, "unrecognised archive format"))
}

/// Returns the single top-level directory shared by every entry, if any.
/// Tag archives from source forges wrap everything in `<repo>-<version>/`.
pub fn infer_archive_root_dir(
    archive_path: &Path,
    archive_type: ArchiveType,
) -> Result<Option<PathBuf>> {
    debug!(
        "Inferring root directory for archive: {}",
        archive_path.display()
    );
    let file = File::open(archive_path)?;
    let paths = match archive_type {
        ArchiveType::Zip => zip_entry_paths(file, archive_path)?,
        ArchiveType::TarGz => tar_entry_paths(GzDecoder::new(file), archive_path)?,
        ArchiveType::TarBz2 => tar_entry_paths(BzDecoder::new(file), archive_path)?,
        ArchiveType::TarXz => tar_entry_paths(XzDecoder::new(file), archive_path)?,
        ArchiveType::Tar => tar_entry_paths(file, archive_path)?,
    };
    Ok(common_root(&paths, archive_path))
}

fn common_root(paths: &[PathBuf], archive_path_for_log: &Path) -> Option<PathBuf> {
    let mut unique_roots = HashSet::new();
    let mut has_nested_entry = false;

    for path in paths {
        let mut components = path.components().filter(|c| *c != Component::CurDir);
        match components.next() {
            Some(Component::Normal(name)) => {
                unique_roots.insert(PathBuf::from(name));
                if components.next().is_some() {
                    has_nested_entry = true;
                }
            }
            Some(other) => {
                debug!(
                    "Non-standard top-level component ({:?}) in {}, cannot infer single root.",
                    other,
                    archive_path_for_log.display()
                );
                return None;
            }
            None => continue,
        }
        if unique_roots.len() > 1 {
            debug!(
                "Multiple top-level items found in {}, cannot infer single root.",
                archive_path_for_log.display()
            );
            return None;
        }
    }

    // A lone top-level file is content, not a wrapper directory.
    if !has_nested_entry {
        if unique_roots.is_empty() {
            warn!(
                "Archive {} appears to be empty.",
                archive_path_for_log.display()
            );
        }
        return None;
    }
    let root = unique_roots.into_iter().next();
    if let Some(root) = &root {
        debug!(
            "Inferred single root directory in {}: {}",
            archive_path_for_log.display(),
            root.display()
        );
    }
    root
}

fn tar_entry_paths<R: Read>(reader: R, archive_path: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| malformed(archive_path, format!("cannot read TAR entries: {e}")))?;
    let mut paths = Vec::new();
    for entry_result in entries {
        let entry = entry_result
            .map_err(|e| malformed(archive_path, format!("error reading TAR entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| malformed(archive_path, format!("invalid path in TAR entry: {e}")))?
            .into_owned();
        if entry.header().entry_type() == EntryType::XGlobalHeader {
            continue;
        }
        paths.push(path);
    }
    Ok(paths)
}

fn zip_entry_paths<R: Read + Seek>(reader: R, archive_path: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| malformed(archive_path, format!("failed to open ZIP: {e}")))?;
    let mut paths = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive
            .by_index_raw(i)
            .map_err(|e| malformed(archive_path, format!("error reading ZIP index {i}: {e}")))?;
        paths.push(PathBuf::from(file.name()));
    }
    Ok(paths)
}

pub fn extract_archive(
    archive_path: &Path,
    target_dir: &Path,
    strip_components: usize,
    archive_type: ArchiveType,
) -> Result<()> {
    debug!(
        "Extracting archive '{}' (type: {:?}) to '{}' (strip_components={})",
        archive_path.display(),
        archive_type,
        target_dir.display(),
        strip_components
    );
    fs::create_dir_all(target_dir)?;
    let file = File::open(archive_path)?;

    match archive_type {
        ArchiveType::Zip => extract_zip_archive(file, target_dir, strip_components, archive_path),
        ArchiveType::TarGz => {
            extract_tar_archive(GzDecoder::new(file), target_dir, strip_components, archive_path)
        }
        ArchiveType::TarBz2 => {
            extract_tar_archive(BzDecoder::new(file), target_dir, strip_components, archive_path)
        }
        ArchiveType::TarXz => {
            extract_tar_archive(XzDecoder::new(file), target_dir, strip_components, archive_path)
        }
        ArchiveType::Tar => extract_tar_archive(file, target_dir, strip_components, archive_path),
    }
}

/// Maps an archive path to its location under `target_dir`, rejecting
/// anything that would escape it. `Ok(None)` means the entry was stripped away.
fn resolve_entry_path(
    path_in_archive: &Path,
    target_dir: &Path,
    strip_components: usize,
) -> std::result::Result<Option<PathBuf>, String> {
    let stripped: Vec<Component<'_>> = path_in_archive
        .components()
        .filter(|c| *c != Component::CurDir)
        .skip(strip_components)
        .collect();
    if stripped.is_empty() {
        return Ok(None);
    }

    let mut on_disk = target_dir.to_path_buf();
    for comp in stripped {
        match comp {
            Component::Normal(p) => on_disk.push(p),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(format!(
                    "unsafe '..' in path {}",
                    path_in_archive.display()
                ))
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(format!(
                    "disallowed component {:?} in path {}",
                    comp,
                    path_in_archive.display()
                ))
            }
        }
    }
    if !on_disk.starts_with(target_dir) {
        return Err(format!(
            "path traversal {} -> {}",
            path_in_archive.display(),
            on_disk.display()
        ));
    }
    Ok(Some(on_disk))
}

fn extract_tar_archive<R: Read>(
    reader: R,
    target_dir: &Path,
    strip_components: usize,
    archive_path_for_log: &Path,
) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    debug!(
        "Starting TAR extraction for {}",
        archive_path_for_log.display()
    );
    let mut errors: Vec<String> = Vec::new();

    let entries = archive.entries().map_err(|e| {
        malformed(archive_path_for_log, format!("cannot read TAR entries: {e}"))
    })?;
    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| {
            malformed(archive_path_for_log, format!("error reading TAR entry: {e}"))
        })?;
        let entry_type = entry.header().entry_type();
        if entry_type == EntryType::XGlobalHeader {
            continue;
        }
        let path_in_archive = entry
            .path()
            .map_err(|e| {
                malformed(
                    archive_path_for_log,
                    format!("invalid path in TAR entry: {e}"),
                )
            })?
            .into_owned();

        let on_disk = match resolve_entry_path(&path_in_archive, target_dir, strip_components) {
            Ok(Some(p)) => p,
            Ok(None) => {
                debug!("Skipping entry due to strip_components: {:?}", path_in_archive);
                continue;
            }
            Err(msg) => {
                error!("{} in {}", msg, archive_path_for_log.display());
                errors.push(msg);
                continue;
            }
        };

        // Links can point anywhere; the installer only needs regular files.
        if matches!(entry_type, EntryType::Link | EntryType::Symlink) {
            warn!(
                "Skipping link entry {} in {}",
                path_in_archive.display(),
                archive_path_for_log.display()
            );
            continue;
        }

        if let Some(parent) = on_disk.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Err(e) = entry.unpack(&on_disk) {
            if e.kind() != io::ErrorKind::AlreadyExists {
                let msg = format!(
                    "failed to unpack entry {:?} to {}: {}",
                    path_in_archive,
                    on_disk.display(),
                    e
                );
                error!("{}", msg);
                errors.push(msg);
            }
        } else {
            debug!("Unpacked TAR entry to: {}", on_disk.display());
        }
    }

    if !errors.is_empty() {
        return Err(malformed(
            archive_path_for_log,
            format!(
                "{} error(s) during TAR extraction: {}",
                errors.len(),
                errors.join("; ")
            ),
        ));
    }
    debug!(
        "Finished TAR extraction for {}",
        archive_path_for_log.display()
    );
    Ok(())
}

fn extract_zip_archive<R: Read + Seek>(
    reader: R,
    target_dir: &Path,
    strip_components: usize,
    archive_path_for_log: &Path,
) -> Result<()> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| malformed(archive_path_for_log, format!("failed to open ZIP: {e}")))?;
    debug!(
        "Starting ZIP extraction for {}",
        archive_path_for_log.display()
    );

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| {
            malformed(
                archive_path_for_log,
                format!("error reading ZIP index {i}: {e}"),
            )
        })?;
        let Some(path_in_archive) = file.enclosed_name() else {
            return Err(malformed(
                archive_path_for_log,
                format!("unsafe ZIP entry name {}", file.name()),
            ));
        };
        let on_disk = match resolve_entry_path(&path_in_archive, target_dir, strip_components)
        {
            Ok(Some(p)) => p,
            Ok(None) => continue,
            Err(msg) => return Err(malformed(archive_path_for_log, msg)),
        };

        if file.is_dir() {
            fs::create_dir_all(&on_disk)?;
            continue;
        }
        if file.is_symlink() {
            warn!(
                "Skipping symlink entry {} in {}",
                path_in_archive.display(),
                archive_path_for_log.display()
            );
            continue;
        }
        if let Some(parent) = on_disk.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&on_disk)?;
        io::copy(&mut file, &mut out_file)
            .map_err(|e| malformed(archive_path_for_log, format!("corrupt ZIP entry: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&on_disk, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
    }
    debug!(
        "Finished ZIP extraction for {}",
        archive_path_for_log.display()
    );
    Ok(())
}
