//! Chat-Lock server glue.
//!
//! Wraps [`chatlock_core`]'s gate with production pieces: a wall clock and OS
//! RNG, durable redb storage, the media read path and a Sans-IO HTTP layer.
//!
//! # Architecture
//!
//! ```text
//!   host web framework (auth, sockets)
//!            │ ownerId + ApiRequest
//!            ▼
//!       ChatLockApi ──────────────► CachedDirectory ──► PeerDirectory
//!        │        │
//!        ▼        ▼
//!   AccessGate  MediaService ──► MediaStore
//!        │        │ require_access first
//!        ▼        ▼
//!      Storage (RedbStorage / MemoryStorage)
//! ```
//!
//! # Components
//!
//! - [`ChatLockApi`]: routing, validation, status mapping, grant cookies
//! - [`MediaService`]: seal on upload, gate check before any reveal
//! - [`RedbStorage`]: owner records and attachments in one redb file
//! - [`SystemEnv`]: production environment (wall clock, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod cookie;
pub mod directory;
mod error;
pub mod media;
mod server_error;
pub mod storage;
mod system_env;

pub use api::{ApiRequest, ApiResponse, ChatLockApi, Method, ResponseBody};
pub use config::ServerConfig;
pub use cookie::{SetCookie, grant_cookie_name};
pub use directory::{CachedDirectory, PeerDirectory, PeerProfile, StaticDirectory};
pub use error::{ApiError, MediaError};
pub use media::{MediaService, MediaStore, MemoryMediaStore, StoredMedia};
pub use server_error::ServerError;
pub use storage::RedbStorage;
pub use system_env::SystemEnv;
