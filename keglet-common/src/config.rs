// keglet-common/src/config.rs
use std::env;
use std::path::PathBuf;

use tracing::debug;

use super::error::{KegletError, Result};

// Used when neither KEGLET_ROOT nor HOMEBREW_PREFIX is set or both are empty.
const DEFAULT_FALLBACK_KEGLET_ROOT: &str = "/opt/homebrew";

#[derive(Debug, Clone)]
pub struct Config {
    pub keglet_root: PathBuf,
    pub cache_override: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading keglet configuration");

        let root_str = non_empty_var("KEGLET_ROOT")
            .or_else(|| non_empty_var("HOMEBREW_PREFIX"))
            .unwrap_or_else(|| {
                debug!(
                    "KEGLET_ROOT and HOMEBREW_PREFIX not set or empty, falling back to default: {}",
                    DEFAULT_FALLBACK_KEGLET_ROOT
                );
                DEFAULT_FALLBACK_KEGLET_ROOT.to_string()
            });

        let keglet_root = PathBuf::from(&root_str);
        if !keglet_root.is_absolute() {
            return Err(KegletError::Config(format!(
                "keglet root must be an absolute path, got '{root_str}'"
            )));
        }
        debug!("Effective KEGLET_ROOT set to: {}", keglet_root.display());

        let cache_override = non_empty_var("KEGLET_CACHE").map(PathBuf::from);
        if let Some(cache) = &cache_override {
            debug!("Download cache overridden to: {}", cache.display());
        }

        debug!("Configuration loaded successfully.");
        Ok(Self {
            keglet_root,
            cache_override,
        })
    }

    /// Builds a configuration rooted at `root` without consulting the environment.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            keglet_root: root.into(),
            cache_override: None,
        }
    }

    pub fn cellar_dir(&self) -> PathBuf {
        self.keglet_root.join("Cellar")
    }

    pub fn formula_dir(&self) -> PathBuf {
        self.keglet_root.join("Library").join("Formula")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_override
            .clone()
            .unwrap_or_else(|| self.keglet_root.join("keglet_cache"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.keglet_root.join("keglet_logs")
    }

    pub fn formula_cellar_dir(&self, formula_name: &str) -> PathBuf {
        self.cellar_dir().join(formula_name)
    }

    pub fn formula_prefix(&self, formula_name: &str, version_str: &str) -> PathBuf {
        self.formula_cellar_dir(formula_name).join(version_str)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}
