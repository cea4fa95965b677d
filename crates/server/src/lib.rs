//! Courier file server.
//!
//! [`Storage`] keeps files under a root directory, [`ServerSession`]
//! exposes it through the [`FileTransfer`](courier_protocol::FileTransfer)
//! operations, and [`TransferServer`] publishes sessions on a TCP port.

pub mod dispatch;
pub mod server;
pub mod session;
pub mod storage;

pub use dispatch::Dispatcher;
pub use server::{ServerConfig, TransferServer};
pub use session::ServerSession;
pub use storage::{Storage, StorageError};

/// Errors from the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire error: {0}")]
    Wire(#[from] courier_protocol::WireError),

    #[error("registry error: {0}")]
    Registry(#[from] courier_locator::RegistryError),
}
