//! Transfer protocol contract for Courier.
//!
//! Defines the operations a client can invoke on a file server
//! ([`FileTransfer`]), the error kinds they fail with ([`RemoteError`]),
//! and the JSON envelope plus length-prefixed framing used to carry them
//! over TCP.
//!
//! # Wire format
//!
//! See the [`wire`] module for the frame layout.

pub mod constants;
pub mod envelope;
pub mod error;
pub mod messages;
pub mod service;
pub mod wire;

// Re-export primary types for convenience.
pub use constants::{
    CALL_TIMEOUT, CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_STORAGE_ROOT, HANDSHAKE_TOKEN,
    MAX_FILE_SIZE, MAX_FRAME_SIZE, MessageType, SERVICE_NAME,
};
pub use envelope::{ErrorPayload, Message};
pub use error::RemoteError;
pub use service::{CallFuture, FileTransfer};
pub use wire::{WireError, encode_frame, read_frame, write_frame};
