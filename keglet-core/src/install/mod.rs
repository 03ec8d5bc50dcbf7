// keglet-core/src/install/mod.rs
//! The install lifecycle step: fetch, verify, extract, place.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;

use keglet_common::config::Config;
use keglet_common::error::{KegletError, Result};
use keglet_common::model::artifact::{script_path, SCRIPT_NAME};
use keglet_common::model::{FormulaRecord, InstalledArtifact};
use keglet_net::{fetch_formula_source, verify_checksum};
use tracing::debug;

pub mod extract;

use extract::{detect_archive_type, extract_archive, infer_archive_root_dir};

/// Installs the script described by `record` into `prefix`.
///
/// Nothing is written under `prefix` until the archive has passed its
/// checksum and been unpacked; the script itself is renamed into place, so
/// a failed install leaves the prefix as it was.
pub async fn install(
    record: &FormulaRecord,
    prefix: &Path,
    config: &Config,
) -> Result<InstalledArtifact> {
    record.ensure_released()?;
    ensure_prefix(prefix)?;
    debug!(
        "Installing {} {} into {}",
        record.name(),
        record.version(),
        prefix.display()
    );
    let archive = fetch_formula_source(record, config).await?;
    install_from_archive(record, &archive, prefix)
}

/// Installs from an archive that is already on disk. The archive is
/// checked against `record` again before it is opened.
pub fn install_from_archive(
    record: &FormulaRecord,
    archive_path: &Path,
    prefix: &Path,
) -> Result<InstalledArtifact> {
    record.ensure_released()?;
    ensure_prefix(prefix)?;
    verify_checksum(archive_path, record.sha256())?;

    let stage = tempfile::Builder::new()
        .prefix(&format!("keglet-{}-", record.name()))
        .tempdir()?;
    debug!("Staging {} in {}", archive_path.display(), stage.path().display());

    let archive_type = detect_archive_type(archive_path)?;
    let strip_components = match infer_archive_root_dir(archive_path, archive_type)? {
        Some(_) => 1,
        None => 0,
    };
    extract_archive(archive_path, stage.path(), strip_components, archive_type)?;

    let staged_script = stage.path().join(SCRIPT_NAME);
    if !staged_script.is_file() {
        return Err(KegletError::MalformedArchive(
            archive_path.to_path_buf(),
            format!("archive does not contain {SCRIPT_NAME}"),
        ));
    }

    place_script(&staged_script, prefix)?;
    let artifact = InstalledArtifact::installed(record.name(), record.version(), prefix);
    debug!("Installed {}", artifact.path.display());
    Ok(artifact)
}

fn ensure_prefix(prefix: &Path) -> Result<()> {
    if prefix.is_dir() {
        Ok(())
    } else {
        Err(KegletError::InstallError(format!(
            "Install prefix {} does not exist or is not a directory",
            prefix.display()
        )))
    }
}

/// Copies `staged` to `<prefix>/phpswitch.sh` through a temporary file in
/// the prefix that is only renamed once complete.
fn place_script(staged: &Path, prefix: &Path) -> Result<()> {
    let destination = script_path(prefix);
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{SCRIPT_NAME}."))
        .tempfile_in(prefix)?;
    let mut source = File::open(staged)?;
    let bytes = io::copy(&mut source, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    debug!("Copied {} bytes from {}", bytes, staged.display());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let staged_mode = fs::metadata(staged)?.permissions().mode();
        let mode = 0o644 | (staged_mode & 0o111);
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(mode))?;
    }

    temp.persist(&destination)
        .map_err(|e| KegletError::Io(Arc::new(e.error)))?;
    debug!("Placed script at {}", destination.display());
    Ok(())
}
