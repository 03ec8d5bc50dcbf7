// keglet-common/src/formulary.rs
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::config::Config;
use super::error::{KegletError, Result};
use super::model::record::FormulaRecord;

/// Resolves formula records from files, the local formula directory, or the
/// record compiled into keglet.
#[derive(Debug, Clone)]
pub struct Formulary {
    formula_dir: PathBuf,
}

impl Formulary {
    pub fn new(config: &Config) -> Self {
        Self {
            formula_dir: config.formula_dir(),
        }
    }

    /// Loads a record for use. Drafts are rejected here, at load time.
    pub fn load_formula(&self, spec: &str) -> Result<FormulaRecord> {
        let record = self.resolve(spec)?;
        record.ensure_released()?;
        debug!(
            "Successfully loaded formula '{}' version {}",
            record.name(),
            record.version()
        );
        Ok(record)
    }

    /// Loads a record without rejecting drafts, for auditing.
    pub fn inspect(&self, spec: &str) -> Result<FormulaRecord> {
        self.resolve(spec)
    }

    fn resolve(&self, spec: &str) -> Result<FormulaRecord> {
        let as_path = Path::new(spec);
        if as_path.is_file() || has_record_extension(as_path) {
            return load_record_file(as_path);
        }

        for ext in ["toml", "json"] {
            let candidate = self.formula_dir.join(format!("{spec}.{ext}"));
            if candidate.is_file() {
                debug!("Found formula '{}' at {}", spec, candidate.display());
                return load_record_file(&candidate);
            }
        }

        let builtin = FormulaRecord::phpswitch();
        if spec == builtin.name() {
            debug!("Using built-in record for formula '{}'", spec);
            return Ok(builtin);
        }

        Err(KegletError::NotFound(format!(
            "Formula '{spec}' not found in {}",
            self.formula_dir.display()
        )))
    }
}

fn has_record_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "toml" || ext == "json")
}

/// Parses a `.toml` or `.json` record file; anything else is read as TOML.
pub fn load_record_file(path: &Path) -> Result<FormulaRecord> {
    debug!("Loading formula record from {}", path.display());
    let raw = fs::read_to_string(path).map_err(|e| {
        KegletError::NotFound(format!(
            "Failed to read formula file {}: {}",
            path.display(),
            e
        ))
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => FormulaRecord::from_json_str(&raw),
        _ => FormulaRecord::from_toml_str(&raw),
    }
}
