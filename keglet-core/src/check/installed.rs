// keglet-core/src/check/installed.rs
use std::fs::File;
use std::io::Read;
use std::path::Path;

use keglet_common::error::{KegletError, Predicate, Result};
use keglet_common::model::artifact::script_path;
use keglet_common::model::{InstallState, InstalledArtifact};
use tracing::debug;

/// Post-install self-check: the script under `prefix` must exist and be
/// readable. Touches nothing, so it can be repeated freely.
pub fn verify_installation(prefix: &Path) -> Result<()> {
    let path = script_path(prefix);
    debug!("Verifying installed script at {}", path.display());

    let mut failures = Vec::new();
    if !path.exists() {
        failures.push(Predicate::DoesNotExist);
    } else if !is_readable(&path) {
        failures.push(Predicate::NotReadable);
    }

    if failures.is_empty() {
        debug!("{} exists and is readable", path.display());
        Ok(())
    } else {
        Err(KegletError::Verification { path, failures })
    }
}

/// Runs the self-check for `artifact` and moves it to `Verified` on success.
/// A failed check leaves the artifact installed.
pub fn verify_artifact(artifact: &mut InstalledArtifact) -> Result<()> {
    verify_installation(&artifact.prefix)?;
    artifact.mark_verified();
    Ok(())
}

/// What the filesystem says about `prefix`, without running the self-check.
pub fn installed_state(prefix: &Path) -> InstallState {
    if script_path(prefix).exists() {
        InstallState::Installed
    } else {
        InstallState::NotInstalled
    }
}

// Opening alone succeeds for directories on Linux; reading does not.
fn is_readable(path: &Path) -> bool {
    let mut buf = [0u8; 1];
    File::open(path)
        .and_then(|mut f| f.read(&mut buf))
        .is_ok()
}
