// keglet-common/src/model/mod.rs
pub mod artifact;
pub mod record;

// Re-export
pub use artifact::{InstallState, InstalledArtifact};
pub use record::{DraftReason, FormulaRecord, RawRecord, RecordStatus};
