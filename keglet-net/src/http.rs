// keglet-net/src/http.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use keglet_common::config::Config;
use keglet_common::error::{KegletError, Result};
use futures::StreamExt;
use keglet_common::model::FormulaRecord;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use url::Url;

use crate::validation::{validate_url, verify_checksum};

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;
const USER_AGENT_STRING: &str = "keglet formula installer (Rust)";

/// Fetches the source archive of `record` into the download cache and
/// returns its path. The returned file always matches `record.sha256()`;
/// a download that does not is deleted and reported as
/// [`KegletError::ChecksumMismatch`].
pub async fn fetch_formula_source(record: &FormulaRecord, config: &Config) -> Result<PathBuf> {
    let cache_dir = config.cache_dir();
    let cache_path = cache_dir.join(record.cache_filename());

    debug!(
        "Preparing to fetch source for '{}' from URL: {}",
        record.name(),
        record.url()
    );
    debug!("Target cache path: {}", cache_path.display());
    debug!("Expected SHA256: {}", record.sha256());

    if cache_path.is_file() {
        match verify_checksum(&cache_path, record.sha256()) {
            Ok(()) => {
                debug!("Using valid cached file: {}", cache_path.display());
                return Ok(cache_path);
            }
            Err(e) => {
                debug!(
                    "Cached file checksum mismatch ({}): {}. Redownloading.",
                    cache_path.display(),
                    e
                );
                if let Err(remove_err) = fs::remove_file(&cache_path) {
                    warn!(
                        "Failed to remove corrupted cached file {}: {}",
                        cache_path.display(),
                        remove_err
                    );
                }
            }
        }
    } else {
        debug!("File not found in cache.");
    }

    fs::create_dir_all(&cache_dir).map_err(|e| {
        KegletError::InstallError(format!(
            "Failed to create cache directory {}: {}",
            cache_dir.display(),
            e
        ))
    })?;

    let url = validate_url(record.url())?;
    let temp_path = temp_download_path(&cache_path);
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!(
                "Could not remove existing temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }

    let fetched = if url.scheme() == "file" {
        copy_local_source(record, &url, &temp_path)
    } else {
        let client = build_http_client()?;
        download(&client, record, &url, &temp_path).await
    };
    if let Err(e) = fetched {
        error!("Fetching {} failed: {}", record.url(), e);
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = verify_checksum(&temp_path, record.sha256()) {
        error!("Rejecting download of {}: {}", record.url(), e);
        let _ = fs::remove_file(&temp_path);
        return Err(match e {
            KegletError::ChecksumMismatch {
                expected, actual, ..
            } => KegletError::ChecksumMismatch {
                target: record.url().to_string(),
                expected,
                actual,
            },
            other => other,
        });
    }
    debug!(
        "Checksum verified for temporary file: {}",
        temp_path.display()
    );

    fs::rename(&temp_path, &cache_path).map_err(|e| {
        KegletError::InstallError(format!(
            "Failed to move temp file {} to {}: {}",
            temp_path.display(),
            cache_path.display(),
            e
        ))
    })?;
    debug!(
        "Moved verified file to final location: {}",
        cache_path.display()
    );
    Ok(cache_path)
}

fn temp_download_path(final_path: &Path) -> PathBuf {
    let temp_filename = format!(
        ".{}.download",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    final_path.with_file_name(temp_filename)
}

fn copy_local_source(record: &FormulaRecord, url: &Url, temp_path: &Path) -> Result<()> {
    let source = url.to_file_path().map_err(|_| {
        KegletError::DownloadError(
            record.name().to_string(),
            record.url().to_string(),
            "URL does not name a local file".to_string(),
        )
    })?;
    debug!("Copying local source {}", source.display());
    fs::copy(&source, temp_path).map_err(|e| {
        KegletError::DownloadError(
            record.name().to_string(),
            record.url().to_string(),
            format!("Failed to read {}: {e}", source.display()),
        )
    })?;
    Ok(())
}

fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| KegletError::HttpError(format!("Failed to build HTTP client: {e}")))
}

async fn download(
    client: &Client,
    record: &FormulaRecord,
    url: &Url,
    temp_path: &Path,
) -> Result<()> {
    debug!("Downloading to temporary path: {}", temp_path.display());
    let response = client.get(url.clone()).send().await.map_err(|e| {
        KegletError::DownloadError(
            record.name().to_string(),
            url.to_string(),
            format!("HTTP request failed: {e}"),
        )
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if !status.is_success() {
        let reason = match status {
            StatusCode::NOT_FOUND => "Resource not found (404)".to_string(),
            StatusCode::FORBIDDEN => "Access forbidden (403)".to_string(),
            _ => format!("HTTP error {status}"),
        };
        return Err(KegletError::DownloadError(
            record.name().to_string(),
            url.to_string(),
            reason,
        ));
    }

    let mut temp_file = TokioFile::create(temp_path).await.map_err(|e| {
        KegletError::InstallError(format!(
            "Failed to create temp file {}: {}",
            temp_path.display(),
            e
        ))
    })?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            KegletError::DownloadError(
                record.name().to_string(),
                url.to_string(),
                format!("Failed to read response body: {e}"),
            )
        })?;
        temp_file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    temp_file.flush().await?;
    debug!("Finished writing {} bytes to temp file.", written);
    Ok(())
}

#[cfg(test)]
mod tests {
    use keglet_common::model::RawRecord;

    use super::*;
    use crate::validation::sha256_file;

    fn local_record(source: &Path, sha256: &str) -> FormulaRecord {
        let url = Url::from_file_path(source).unwrap();
        FormulaRecord::try_from(RawRecord {
            name: "phpswitch".to_string(),
            desc: "Simple PHP version switcher for macOS".to_string(),
            homepage: "https://github.com/madusha98/phpswitch".to_string(),
            url: url.to_string(),
            sha256: sha256.to_string(),
            license: "MIT".to_string(),
            version: "1.0.0".to_string(),
        })
        .unwrap()
    }

    fn source_file(dir: &Path) -> PathBuf {
        let source = dir.join("v1.0.0.tar.gz");
        fs::write(&source, b"not really an archive").unwrap();
        source
    }

    #[tokio::test]
    async fn fetches_local_source_into_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let record = local_record(&source, &sha256_file(&source).unwrap());
        let config = Config::with_root(dir.path().join("root"));

        let cached = fetch_formula_source(&record, &config).await.unwrap();
        assert_eq!(cached, config.cache_dir().join("phpswitch--v1.0.0.tar.gz"));
        assert_eq!(fs::read(&cached).unwrap(), fs::read(&source).unwrap());

        // A second fetch is served from the cache even without the source.
        fs::remove_file(&source).unwrap();
        assert_eq!(fetch_formula_source(&record, &config).await.unwrap(), cached);
    }

    #[tokio::test]
    async fn checksum_mismatch_leaves_no_download_behind() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let record = local_record(&source, &"ab".repeat(32));
        let config = Config::with_root(dir.path().join("root"));

        let err = fetch_formula_source(&record, &config).await.unwrap_err();
        match &err {
            KegletError::ChecksumMismatch {
                target,
                expected,
                actual,
            } => {
                assert_eq!(target, record.url());
                assert_eq!(expected, &"ab".repeat(32));
                assert_eq!(actual, &sha256_file(&source).unwrap());
            }
            other => panic!("unexpected error: {other}"),
        }
        let leftovers: Vec<_> = fs::read_dir(config.cache_dir()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn corrupted_cache_entry_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let record = local_record(&source, &sha256_file(&source).unwrap());
        let config = Config::with_root(dir.path().join("root"));
        fs::create_dir_all(config.cache_dir()).unwrap();
        let cached = config.cache_dir().join(record.cache_filename());
        fs::write(&cached, b"stale").unwrap();

        fetch_formula_source(&record, &config).await.unwrap();
        assert_eq!(fs::read(&cached).unwrap(), b"not really an archive");
    }

    /// Serves one canned HTTP response on a loopback port.
    async fn serve_once(status_line: &'static str, body: Vec<u8>) -> Url {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        Url::parse(&format!("http://{addr}/archive/v1.0.0.tar.gz")).unwrap()
    }

    fn loopback_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn download_streams_body_to_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let body: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
        let url = serve_once("200 OK", body.clone()).await;
        let record = local_record(&source_file(dir.path()), &"ab".repeat(32));
        let temp_path = dir.path().join(".phpswitch--v1.0.0.tar.gz.download");

        download(&loopback_client(), &record, &url, &temp_path)
            .await
            .unwrap();
        assert_eq!(fs::read(&temp_path).unwrap(), body);
    }

    #[tokio::test]
    async fn http_not_found_is_a_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = serve_once("404 Not Found", Vec::new()).await;
        let record = local_record(&source_file(dir.path()), &"ab".repeat(32));
        let temp_path = dir.path().join(".download");

        let err = download(&loopback_client(), &record, &url, &temp_path)
            .await
            .unwrap_err();
        match err {
            KegletError::DownloadError(_, _, reason) => {
                assert_eq!(reason, "Resource not found (404)")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn missing_local_source_is_a_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let record = local_record(&dir.path().join("v1.0.0.tar.gz"), &"ab".repeat(32));
        let config = Config::with_root(dir.path().join("root"));

        let err = fetch_formula_source(&record, &config).await.unwrap_err();
        assert!(matches!(err, KegletError::DownloadError(..)));
    }
}
