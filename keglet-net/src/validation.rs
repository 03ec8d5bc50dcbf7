// keglet-net/src/validation.rs
use std::fs::File;
use std::io;
use std::path::Path;

use keglet_common::error::{KegletError, Result};
use sha2::{Digest, Sha256};
use url::Url;

/// Hex-encoded SHA-256 digest of the file at `path`.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let bytes_copied = io::copy(&mut file, &mut hasher)?;
    let actual = hex::encode(hasher.finalize());
    tracing::debug!(
        "Calculated SHA256 of {}: {} ({} bytes read)",
        path.display(),
        actual,
        bytes_copied
    );
    Ok(actual)
}

/// Compares the digest of `path` with `expected`, ignoring hex case.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    tracing::debug!("Verifying checksum for: {}", path.display());
    let actual = sha256_file(path)?;
    tracing::debug!("Expected SHA256:   {}", expected);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(KegletError::ChecksumMismatch {
            target: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Validates a source URL, allowing only https and local file sources.
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).map_err(|e| {
        KegletError::ValidationError(format!("Failed to parse URL '{url_str}': {e}"))
    })?;
    match url.scheme() {
        "https" | "file" => Ok(url),
        other => Err(KegletError::ValidationError(format!(
            "Invalid URL scheme for '{url_str}': Must be https or file, but got '{other}'"
        ))),
    }
}
