//! Source fetching.
//!
//! The engine only needs bytes for a URL; how they are transported is up to
//! the [`Fetcher`]. Checksum verification happens in the sandbox, not here.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use url::Url;

/// Default timeout for network downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Failure to obtain source bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("failed to fetch {url}: {message}")]
    Network { url: String, message: String },

    #[error("source not found: {url}")]
    NotFound { url: String },
}

impl FetchError {
    pub fn network(url: &Url, message: impl Into<String>) -> Self {
        FetchError::Network {
            url: url.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(url: &Url) -> Self {
        FetchError::NotFound {
            url: url.to_string(),
        }
    }
}

/// Retrieves the raw bytes behind a source locator.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Downloads `http` and `https` URLs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("formulary/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create HTTP client")?;
        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        tracing::debug!("downloading {}", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| FetchError::network(url, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::not_found(url));
        }
        if !status.is_success() {
            return Err(FetchError::network(url, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| FetchError::network(url, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Reads `file://` URLs from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|_| FetchError::network(url, "not a local file path"))?;

        std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::not_found(url),
            _ => FetchError::network(url, e.to_string()),
        })
    }
}

/// Dispatches on the URL scheme.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    http: HttpFetcher,
    file: FileFetcher,
    offline: bool,
}

impl DefaultFetcher {
    pub fn new(timeout: Option<Duration>, offline: bool) -> Result<Self> {
        Ok(DefaultFetcher {
            http: HttpFetcher::new(timeout.unwrap_or(DEFAULT_TIMEOUT))?,
            file: FileFetcher,
            offline,
        })
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        match url.scheme() {
            "file" => self.file.fetch(url),
            "http" | "https" if self.offline => {
                Err(FetchError::network(url, "network access disabled (net.offline)"))
            }
            "http" | "https" => self.http.fetch(url),
            other => Err(FetchError::network(
                url,
                format!("unsupported URL scheme `{}`", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_fetcher_reads_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("src.txt");
        std::fs::write(&path, b"hello").unwrap();

        let url = Url::from_file_path(&path).unwrap();
        assert_eq!(FileFetcher.fetch(&url).unwrap(), b"hello");
    }

    #[test]
    fn test_file_fetcher_not_found() {
        let tmp = TempDir::new().unwrap();
        let url = Url::from_file_path(tmp.path().join("missing.tar.gz")).unwrap();
        assert_eq!(FileFetcher.fetch(&url).unwrap_err(), FetchError::not_found(&url));
    }

    #[test]
    fn test_default_fetcher_offline() {
        let fetcher = DefaultFetcher::new(None, true).unwrap();
        let url = Url::parse("https://example.com/pcl-1.0.tar.gz").unwrap();
        assert!(matches!(
            fetcher.fetch(&url).unwrap_err(),
            FetchError::Network { .. }
        ));
    }

    #[test]
    fn test_default_fetcher_rejects_unknown_scheme() {
        let fetcher = DefaultFetcher::new(None, false).unwrap();
        let url = Url::parse("ftp://example.com/a.tar.gz").unwrap();
        let err = fetcher.fetch(&url).unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }
}
