//! Chat-Lock client-side attachment decryption.
//!
//! The server ships each attachment's metadata inline (base64 key, iv, tag,
//! MIME type and download path) and serves `ciphertext || tag` separately,
//! behind the chat-lock gate. [`ClientDecryptor`] fetches the blob through a
//! [`MediaFetcher`], decrypts it locally and registers the plaintext in a
//! [`HandleRegistry`].
//!
//! # Lifecycle
//!
//! - A decryption can be started as a [`DecryptTask`] and aborted at any
//!   point; an aborted task delivers nothing and leaves nothing registered
//! - A [`MediaHandle`] frees its bytes on [`MediaHandle::release`] or drop

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod decryptor;
mod fetch;
mod handle;

pub use decryptor::{ClientDecryptor, DECRYPT_FAILURE_MESSAGE, DecryptFailure, DecryptTask};
pub use fetch::{FetchError, MediaFetcher};
pub use handle::{HandleId, HandleRegistry, MediaHandle};
