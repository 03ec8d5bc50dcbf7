// keglet-net/src/lib.rs
pub mod http;
pub mod validation;

pub use http::fetch_formula_source;
pub use keglet_common::{
    error::{KegletError, Result},
    Config, FormulaRecord,
};
pub use validation::{sha256_file, validate_url, verify_checksum};
