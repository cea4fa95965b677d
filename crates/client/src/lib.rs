//! Courier client.
//!
//! A [`ClientSession`] resolves the file service through a
//! [`Locator`](courier_locator::Locator), confirms compatibility with a
//! handshake, and then exposes the remote file operations.

pub mod session;

pub use session::{ClientConfig, ClientSession, SessionState};

use std::path::PathBuf;

use courier_protocol::RemoteError;

/// Errors from client session operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not connected to server")]
    NotConnected,

    #[error("local file not found: {}", .0.display())]
    LocalFileNotFound(PathBuf),

    #[error("local file too large to upload: {} is {size} bytes (max {max})", .path.display())]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("handshake mismatch: expected {expected:?}, got {actual:?}")]
    HandshakeMismatch { expected: String, actual: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),
}
