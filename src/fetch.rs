//! Streamed retrieval of rendered artifacts.
//!
//! The index builder pulls each document's content from its published URL
//! into a scratch file. HTTP bodies are streamed chunk-by-chunk rather than
//! buffered; `file://` URLs resolve against the local filesystem so a
//! published catalog can be served straight off disk.

use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_stream::StreamExt;

/// Failure while retrieving a document's content. Fatal for that document;
/// the batch aborts without rolling back documents indexed earlier.
#[derive(Debug)]
pub enum FetchError {
    Network { url: String, message: String },
    Status { url: String, status: u16 },
    Io(String),
    UnsupportedScheme(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Network { url, message } => {
                write!(f, "fetch of {} failed: {}", url, message)
            }
            FetchError::Status { url, status } => {
                write!(f, "fetch of {} returned HTTP {}", url, status)
            }
            FetchError::Io(e) => write!(f, "could not write fetched content: {}", e),
            FetchError::UnsupportedScheme(url) => {
                write!(f, "unsupported content URL scheme: {}", url)
            }
        }
    }
}

impl std::error::Error for FetchError {}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Io(e.to_string())
    }
}

/// Content-retrieval seam. The pipeline only ever talks to this trait, so
/// tests can count or fail fetches without a network.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Stream the content at `url` into `dest`, returning the byte count.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Default fetcher: `https?://` via reqwest, `file://` via a local copy.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            let written = tokio::fs::copy(path, dest).await.map_err(|e| {
                FetchError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            })?;
            return Ok(written);
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FetchError::UnsupportedScheme(url.to_string()));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_scheme_copies_local_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("artifact.pdf");
        std::fs::write(&src, b"rendered bytes").unwrap();
        let dest = tmp.path().join("scratch.pdf");

        let url = format!("file://{}", src.display());
        let written = HttpFetcher::new().fetch(&url, &dest).await.unwrap();
        assert_eq!(written, 14);
        assert_eq!(std::fs::read(&dest).unwrap(), b"rendered bytes");
    }

    #[tokio::test]
    async fn missing_local_content_is_a_fetch_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("scratch.pdf");
        let url = format!("file://{}/nope.pdf", tmp.path().display());
        let err = HttpFetcher::new().fetch(&url, &dest).await.unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("scratch.pdf");
        let err = HttpFetcher::new()
            .fetch("ftp://example.com/a.pdf", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(_)));
    }
}
