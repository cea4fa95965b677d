//! Resolution of published service names to callable handles.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use courier_protocol::{FileTransfer, RemoteError};

use crate::registry::Registry;

/// A boxed future returned by [`Locator::resolve`].
pub type ResolveFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Box<dyn FileTransfer>, RemoteError>> + Send + 'a>>;

/// Resolves a published name at `host:port` to a callable handle.
///
/// Every failure (unreachable host, timeout, unbound name) is reported as
/// [`RemoteError::Communication`].
pub trait Locator: Send + Sync {
    fn resolve<'a>(&'a self, host: &'a str, port: u16, name: &'a str) -> ResolveFuture<'a>;
}

/// Resolves names against an in-process registry.
///
/// `host` and `port` are ignored. Used to run a client session against a
/// server session without a network in between.
#[derive(Clone, Default)]
pub struct LocalLocator {
    registry: Arc<Registry<Arc<dyn FileTransfer>>>,
}

impl LocalLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry services are published into.
    pub fn registry(&self) -> &Registry<Arc<dyn FileTransfer>> {
        &self.registry
    }
}

impl Locator for LocalLocator {
    fn resolve<'a>(&'a self, _host: &'a str, _port: u16, name: &'a str) -> ResolveFuture<'a> {
        Box::pin(async move {
            let handle = self
                .registry
                .lookup(name)
                .map_err(|e| RemoteError::Communication(e.to_string()))?;
            Ok(Box::new(handle) as Box<dyn FileTransfer>)
        })
    }
}
