//! HTTP client wrapper for streaming artifacts to disk.
//!
//! Bodies are streamed into `<name>.part` next to the target and renamed into
//! place once complete, so a target path only ever holds a finished file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::error::DownloadError;
use crate::user_agent;

/// Connect timeout for artifact requests.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Suffix of in-progress files.
const PART_SUFFIX: &str = ".part";

/// Fetches one artifact to a local path.
///
/// [`HttpClient`] is the production implementation; the download engine is
/// generic over this trait so batches can be driven without a network.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Downloads `url` into `target`, returning the number of bytes written.
    ///
    /// On error no file exists at `target`.
    async fn fetch_to_file(&self, url: &str, target: &Path) -> Result<u64, DownloadError>;
}

/// HTTP client for downloading artifacts with streaming support.
///
/// Created once per batch and shared by every task, reusing pooled
/// connections.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be
    /// initialised.
    pub fn new(timeout_secs: u64) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(user_agent::default_user_agent())
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(DownloadError::ClientBuild)?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl ArtifactFetcher for HttpClient {
    #[instrument(skip(self), fields(target = %target.display()))]
    async fn fetch_to_file(&self, url: &str, target: &Path) -> Result<u64, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.send(url).await?;

        let part_path = part_path(target);
        let mut file = File::create(&part_path)
            .await
            .map_err(|e| DownloadError::io(part_path.clone(), e))?;

        let stream_result = stream_to_file(&mut file, response, url, &part_path).await;
        drop(file);

        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %part_path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part_path, target).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(DownloadError::io(target.to_path_buf(), e));
        }

        info!(path = %target.display(), bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }
}

/// `<target>.part`, in the same directory as `target`.
fn part_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map_or_else(OsString::new, std::ffi::OsStr::to_os_string);
    name.push(PART_SUFFIX);
    target.with_file_name(name)
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::transport(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::TcpListener;

    use tempfile::TempDir;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn start_mock_server_or_skip() -> Option<MockServer> {
        if TcpListener::bind("127.0.0.1:0").is_err() {
            eprintln!("[socket-bound-test] cannot bind localhost socket; skipping");
            return None;
        }
        Some(MockServer::start().await)
    }

    fn leftover_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/tmp/dl/sodium.jar")),
            PathBuf::from("/tmp/dl/sodium.jar.part")
        );
    }

    #[tokio::test]
    async fn test_fetch_writes_body_to_target() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/data/mod.jar"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar bytes"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(30).unwrap();
        let target = temp_dir.path().join("mod.jar");
        let bytes = client
            .fetch_to_file(&format!("{}/data/mod.jar", server.uri()), &target)
            .await
            .unwrap();

        assert_eq!(bytes, 9);
        assert_eq!(std::fs::read(&target).unwrap(), b"jar bytes");
        assert_eq!(leftover_files(temp_dir.path()), vec![target]);
    }

    #[tokio::test]
    async fn test_fetch_404_leaves_no_file() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/missing.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(30).unwrap();
        let target = temp_dir.path().join("missing.zip");
        let result = client
            .fetch_to_file(&format!("{}/missing.zip", server.uri()), &target)
            .await;

        match result {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
        assert!(leftover_files(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_timeout_removes_partial_file() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/slow.zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 1024])
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(1).unwrap();
        let target = temp_dir.path().join("slow.zip");
        let result = client
            .fetch_to_file(&format!("{}/slow.zip", server.uri()), &target)
            .await;

        assert!(matches!(result, Err(DownloadError::Timeout { .. })), "got {result:?}");
        assert!(leftover_files(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let client = HttpClient::new(30).unwrap();
        let result = client
            .fetch_to_file("not a url", &temp_dir.path().join("x"))
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }
}
