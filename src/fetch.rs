//! Retrieval of raw source bytes.

use std::io;
use std::path::PathBuf;

/// Errors raised while downloading a source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to download {url}: {message}")]
    Http { url: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Unsupported source {0:?}")]
    UnsupportedScheme(String),
}

/// Something that can turn a source URL into bytes.
pub trait Fetcher: Send + Sync {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError> + Send + Sync,
{
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self(url)
    }
}

/// Reads `file://` URLs and plain filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

impl Fetcher for LocalFetcher {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        std::fs::read(&path).map_err(|source| FetchError::Io { path, source })
    }
}

/// Downloads `http://` and `https://` URLs.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        log::info!("Downloading {}", url);
        let http_error = |e: ureq::Error| FetchError::Http {
            url: url.to_string(),
            message: e.to_string(),
        };
        ureq::get(url)
            .call()
            .map_err(http_error)?
            .into_body()
            .read_to_vec()
            .map_err(http_error)
    }
}

/// Routes by scheme: HTTP(S) over the network, everything else from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceFetcher;

impl Fetcher for SourceFetcher {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            #[cfg(feature = "http")]
            return HttpFetcher.download(url);
            #[cfg(not(feature = "http"))]
            return Err(FetchError::UnsupportedScheme(url.to_string()));
        }
        if url.contains("://") && !url.starts_with("file://") {
            return Err(FetchError::UnsupportedScheme(url.to_string()));
        }
        LocalFetcher.download(url)
    }
}
