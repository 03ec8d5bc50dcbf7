// keglet-core/src/lib.rs
pub mod check;
pub mod install;

pub use check::{installed_state, verify_installation, verify_artifact};
pub use install::{install, install_from_archive};
pub use keglet_common::caveats::caveats;
