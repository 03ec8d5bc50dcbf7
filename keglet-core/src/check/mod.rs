// keglet-core/src/check/mod.rs
pub mod installed;

pub use installed::{installed_state, verify_artifact, verify_installation};
