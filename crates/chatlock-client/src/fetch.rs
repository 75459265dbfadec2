//! Transport for attachment blobs.

use async_trait::async_trait;
use thiserror::Error;

/// Why a blob could not be fetched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Server answered with a non-success status (423 for a locked chat)
    #[error("unexpected status {0}")]
    Status(u16),

    /// Request never completed
    #[error("transport error: {0}")]
    Transport(String),
}

/// Fetches `ciphertext || tag` blobs by download path.
///
/// Implementations carry whatever the host needs (cookies, base URL); the
/// decryptor only hands over the path from the metadata.
#[async_trait]
pub trait MediaFetcher: Send + Sync + 'static {
    /// Download the blob at `path`.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

/// Normalize a download URL the way the browser client does: relative paths
/// get a leading `/`, absolute URLs are kept.
pub(crate) fn normalize_path(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if url.starts_with('/') || url.contains("://") {
        return Some(url.to_string());
    }
    Some(format!("/{url}"))
}
