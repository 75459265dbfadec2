//! Fetch-then-decrypt of attachments on the consumer side.
//!
//! ```text
//! MediaMetadata ──► validate ──► fetch(downloadUrl) ──► split ciphertext || tag
//!                                                            │
//!                         MediaHandle ◄── register ◄── AES-256-GCM decrypt
//! ```
//!
//! Every failure, whatever its cause, surfaces as the same
//! [`DecryptFailure`]. The cause is only logged.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chatlock_crypto::{MediaMetadata, decrypt, split_combined};
use thiserror::Error;
use tokio::task::{AbortHandle, JoinHandle};

use crate::{
    fetch::{MediaFetcher, normalize_path},
    handle::{HandleRegistry, MediaHandle},
};

/// Message shown to users when an attachment cannot be displayed
pub const DECRYPT_FAILURE_MESSAGE: &str = "Failed to load image";

/// The single failure of the decrypt path.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Failed to load image")]
pub struct DecryptFailure;

/// Decrypts attachments fetched through `F`.
pub struct ClientDecryptor<F> {
    fetcher: Arc<F>,
    registry: HandleRegistry,
}

impl<F> Clone for ClientDecryptor<F> {
    fn clone(&self) -> Self {
        Self { fetcher: Arc::clone(&self.fetcher), registry: self.registry.clone() }
    }
}

impl<F: MediaFetcher> ClientDecryptor<F> {
    /// Decryptor registering results in `registry`.
    pub fn new(fetcher: F, registry: HandleRegistry) -> Self {
        Self { fetcher: Arc::new(fetcher), registry }
    }

    /// Registry that receives decrypted objects.
    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Fetch, decrypt and register the attachment described by `metadata`.
    ///
    /// Dropping the returned future before completion creates no handle.
    pub async fn decrypt(&self, metadata: &MediaMetadata) -> Result<MediaHandle, DecryptFailure> {
        let key = metadata
            .ensure_complete()
            .and_then(|()| metadata.decode_key())
            .inspect_err(|e| tracing::debug!(error = %e, "Attachment metadata rejected"))
            .map_err(|_| DecryptFailure)?;
        let iv = metadata
            .decode_iv()
            .inspect_err(|e| tracing::debug!(error = %e, "Attachment metadata rejected"))
            .map_err(|_| DecryptFailure)?;
        let Some(path) = normalize_path(&metadata.download_url) else {
            tracing::debug!("Attachment metadata has no download URL");
            return Err(DecryptFailure);
        };

        let blob = self
            .fetcher
            .fetch(&path)
            .await
            .inspect_err(|e| tracing::debug!(path = %path, error = %e, "Attachment fetch failed"))
            .map_err(|_| DecryptFailure)?;

        let plaintext = split_combined(&blob)
            .and_then(|(ciphertext, tag)| decrypt(ciphertext, key.bytes(), &iv, &tag))
            .inspect_err(|e| tracing::debug!(path = %path, error = %e, "Attachment decrypt failed"))
            .map_err(|_| DecryptFailure)?;

        Ok(self.registry.register(plaintext, metadata.mime_type.clone()))
    }

    /// Run [`decrypt`](Self::decrypt) as a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, metadata: MediaMetadata) -> DecryptTask {
        let decryptor = self.clone();
        let join = tokio::spawn(async move { decryptor.decrypt(&metadata).await });
        let abort = join.abort_handle();
        DecryptTask { join: Some(join), abort, aborted: AtomicBool::new(false) }
    }
}

impl<F> std::fmt::Debug for ClientDecryptor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientDecryptor").field("registry", &self.registry).finish_non_exhaustive()
    }
}

/// A running decryption.
///
/// Aborted when dropped. An aborted task delivers nothing and leaves no
/// registered object behind, even if it had already finished.
#[derive(Debug)]
pub struct DecryptTask {
    join: Option<JoinHandle<Result<MediaHandle, DecryptFailure>>>,
    abort: AbortHandle,
    aborted: AtomicBool,
}

impl DecryptTask {
    /// Stop the task. Any result it already produced is discarded on join.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.abort.abort();
    }

    /// True once the task has finished or been aborted.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    /// Wait for the result.
    ///
    /// Returns `None` if the task was aborted. A handle produced before the
    /// abort is released.
    pub async fn join(mut self) -> Option<Result<MediaHandle, DecryptFailure>> {
        let join = self.join.take()?;
        let result = join.await;
        if self.aborted.load(Ordering::Acquire) {
            return None;
        }
        match result {
            Ok(result) => Some(result),
            Err(err) if err.is_cancelled() => None,
            Err(err) => {
                tracing::error!(error = %err, "Decrypt task failed");
                Some(Err(DecryptFailure))
            },
        }
    }
}

impl Drop for DecryptTask {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.abort.abort();
        }
    }
}
