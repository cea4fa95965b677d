//! Endpoint locator for Courier.
//!
//! Servers publish handles under well-known names in a [`Registry`];
//! clients [`resolve`](Locator::resolve) a name at `host:port` into a
//! callable [`FileTransfer`](courier_protocol::FileTransfer) handle.

pub mod locator;
pub mod registry;
pub mod tcp;

// Re-export primary types.
pub use locator::{LocalLocator, Locator, ResolveFuture};
pub use registry::Registry;
pub use tcp::{RemoteEndpoint, TcpLocator};

/// Errors for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("name already bound: {0}")]
    AlreadyBound(String),

    #[error("name not bound: {0}")]
    NotBound(String),
}
