// keglet-common/src/lib.rs
pub mod caveats;
pub mod config;
pub mod error;
pub mod formulary;
pub mod model;

// Re-export key types
pub use caveats::caveats;
pub use config::Config;
pub use error::{ErrorCategory, KegletError, Predicate, Result};
pub use formulary::Formulary;
pub use model::{FormulaRecord, InstallState, InstalledArtifact, RecordStatus};
