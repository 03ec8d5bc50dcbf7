use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::model::record::DraftReason;

/// A single predicate checked by the post-install self-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    DoesNotExist,
    NotReadable,
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::DoesNotExist => write!(f, "file does not exist"),
            Predicate::NotReadable => write!(f, "file is not readable"),
        }
    }
}

/// Broad failure classes reported to whoever drives an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Fetch,
    Integrity,
    Verification,
    Other,
}

#[derive(Error, Debug, Clone)]
pub enum KegletError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("Malformed archive {}: {}", .0.display(), .1)]
    MalformedArchive(PathBuf, String),

    #[error("Checksum mismatch for {target}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        target: String,
        expected: String,
        actual: String,
    },

    #[error("Verification failed for {}: {}", .path.display(), join_predicates(.failures))]
    Verification {
        path: PathBuf,
        failures: Vec<Predicate>,
    },

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Formula '{name}' is a draft and cannot be used: {}", join_reasons(.reasons))]
    DraftRecord {
        name: String,
        reasons: Vec<DraftReason>,
    },

    #[error("Installation Error: {0}")]
    InstallError(String),
}

fn join_predicates(failures: &[Predicate]) -> String {
    failures
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_reasons(reasons: &[DraftReason]) -> String {
    reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl KegletError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            KegletError::DownloadError(..)
            | KegletError::HttpError(_)
            | KegletError::Http(_)
            | KegletError::MalformedArchive(..) => ErrorCategory::Fetch,
            KegletError::ChecksumMismatch { .. } => ErrorCategory::Integrity,
            KegletError::Verification { .. } => ErrorCategory::Verification,
            _ => ErrorCategory::Other,
        }
    }
}

impl From<std::io::Error> for KegletError {
    fn from(err: std::io::Error) -> Self {
        KegletError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for KegletError {
    fn from(err: reqwest::Error) -> Self {
        KegletError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for KegletError {
    fn from(err: serde_json::Error) -> Self {
        KegletError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for KegletError {
    fn from(err: toml::de::Error) -> Self {
        KegletError::Toml(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, KegletError>;
