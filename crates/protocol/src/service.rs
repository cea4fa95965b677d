//! The transfer contract shared by the server implementation and client stubs.
//!
//! Methods return boxed futures so the trait stays object-safe: the client
//! holds a `Box<dyn FileTransfer>` without knowing whether calls cross the
//! network or stay in-process.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::RemoteError;

/// A boxed future returned by contract methods.
pub type CallFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Remote file-transfer operations.
///
/// All operations are request/response. Names are relative paths under the
/// server's storage root.
pub trait FileTransfer: Send + Sync {
    /// Returns the server's fixed greeting. Idempotent.
    fn handshake(&self) -> CallFuture<'_, String>;

    /// Writes `contents` under `name`, replacing any existing file.
    fn upload(&self, name: String, contents: Vec<u8>) -> CallFuture<'_, ()>;

    /// Returns the names of all stored files in lexicographic order.
    fn list_files(&self) -> CallFuture<'_, Vec<String>>;

    /// Returns the full contents of `name`, or `NotFound`.
    fn download(&self, name: String) -> CallFuture<'_, Vec<u8>>;

    /// Removes `name`, or fails with `NotFound`.
    fn delete(&self, name: String) -> CallFuture<'_, ()>;
}

impl<T: FileTransfer + ?Sized> FileTransfer for Arc<T> {
    fn handshake(&self) -> CallFuture<'_, String> {
        (**self).handshake()
    }

    fn upload(&self, name: String, contents: Vec<u8>) -> CallFuture<'_, ()> {
        (**self).upload(name, contents)
    }

    fn list_files(&self) -> CallFuture<'_, Vec<String>> {
        (**self).list_files()
    }

    fn download(&self, name: String) -> CallFuture<'_, Vec<u8>> {
        (**self).download(name)
    }

    fn delete(&self, name: String) -> CallFuture<'_, ()> {
        (**self).delete(name)
    }
}
