// keglet-common/src/model/artifact.rs
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the single file a formula places into its prefix.
pub const SCRIPT_NAME: &str = "phpswitch.sh";

/// Lifecycle of an install. Transitions are linear and never go backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    NotInstalled,
    Installed,
    Verified,
}

/// The script placed under a prefix by a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledArtifact {
    pub formula_name: String,
    pub version: String,
    pub prefix: PathBuf,
    pub path: PathBuf,
    state: InstallState,
}

impl InstalledArtifact {
    /// Records a freshly installed script; only the installer creates these.
    pub fn installed(formula_name: &str, version: &str, prefix: &Path) -> Self {
        Self {
            formula_name: formula_name.to_string(),
            version: version.to_string(),
            prefix: prefix.to_path_buf(),
            path: script_path(prefix),
            state: InstallState::Installed,
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Moves `Installed` to `Verified`. Marking an already verified
    /// artifact again is a no-op.
    pub fn mark_verified(&mut self) {
        if self.state == InstallState::Installed {
            self.state = InstallState::Verified;
        }
    }
}

pub fn script_path(prefix: &Path) -> PathBuf {
    prefix.join(SCRIPT_NAME)
}
