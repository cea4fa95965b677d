//! Client session state machine.

use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use courier_locator::Locator;
use courier_protocol::{
    DEFAULT_PORT, FileTransfer, HANDSHAKE_TOKEN, MAX_FILE_SIZE, RemoteError, SERVICE_NAME,
};

use crate::ClientError;

/// Connection state of a [`ClientSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No endpoint held. Initial state.
    Disconnected,
    /// Handshake succeeded; file operations are allowed.
    Connected,
}

/// Where and what to connect to.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Published name of the file service.
    pub service_name: String,
    /// Token the server must answer the handshake with.
    pub expected_token: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            service_name: SERVICE_NAME.into(),
            expected_token: HANDSHAKE_TOKEN.into(),
        }
    }
}

/// A single interactive client session.
///
/// Holds the resolved endpoint only while [`Connected`](SessionState::Connected).
/// Calls are issued one at a time. A communication fault during any call
/// drops the endpoint and returns the session to
/// [`Disconnected`](SessionState::Disconnected); other remote errors leave it
/// connected.
pub struct ClientSession<L: Locator> {
    config: ClientConfig,
    locator: L,
    endpoint: Option<Box<dyn FileTransfer>>,
}

impl<L: Locator> ClientSession<L> {
    pub fn new(config: ClientConfig, locator: L) -> Self {
        Self {
            config,
            locator,
            endpoint: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.endpoint.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Connects to the configured host and port.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let host = self.config.host.clone();
        let port = self.config.port;
        self.connect_to(&host, port).await
    }

    /// Resolves the file service at `host:port` and performs the handshake.
    ///
    /// Succeeds without doing anything if already connected. On any failure
    /// the session stays disconnected and no endpoint is retained.
    pub async fn connect_to(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        if self.endpoint.is_some() {
            info!("already connected");
            return Ok(());
        }

        debug!(host, port, service = %self.config.service_name, "resolving service");
        let endpoint = self
            .locator
            .resolve(host, port, &self.config.service_name)
            .await?;

        let token = endpoint.handshake().await?;
        if token != self.config.expected_token {
            warn!(expected = %self.config.expected_token, actual = %token, "handshake mismatch");
            return Err(ClientError::HandshakeMismatch {
                expected: self.config.expected_token.clone(),
                actual: token,
            });
        }

        info!(host, port, "connected to server");
        self.config.host = host.to_string();
        self.config.port = port;
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Drops the endpoint. Idempotent.
    pub fn disconnect(&mut self) {
        if self.endpoint.take().is_some() {
            info!("disconnected from server");
        }
    }

    /// Uploads the local file at `path` under its base name.
    ///
    /// Files larger than [`MAX_FILE_SIZE`] are refused before any call.
    /// Returns the remote name used.
    pub async fn upload_file(&mut self, path: &Path) -> Result<String, ClientError> {
        let endpoint = self.endpoint.as_deref().ok_or(ClientError::NotConnected)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ClientError::LocalFileNotFound(path.to_path_buf()))?;

        let contents = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() > MAX_FILE_SIZE as u64 => {
                return Err(ClientError::FileTooLarge {
                    path: path.to_path_buf(),
                    size: meta.len(),
                    max: MAX_FILE_SIZE as u64,
                });
            }
            Ok(meta) if meta.is_file() => tokio::fs::read(path).await?,
            Ok(_) => return Err(ClientError::LocalFileNotFound(path.to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ClientError::LocalFileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let size = contents.len();
        let result = endpoint.upload(name.clone(), contents).await;
        self.settle(result)?;

        info!(name = %name, size, "file uploaded");
        Ok(name)
    }

    /// Downloads `remote_name` into `local_path`, replacing any existing file.
    ///
    /// Returns the number of bytes written.
    pub async fn download_file(
        &mut self,
        remote_name: &str,
        local_path: &Path,
    ) -> Result<u64, ClientError> {
        let endpoint = self.endpoint.as_deref().ok_or(ClientError::NotConnected)?;
        let result = endpoint.download(remote_name.to_string()).await;
        let contents = self.settle(result)?;

        if let Some(parent) = local_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &contents).await?;

        info!(name = %remote_name, path = %local_path.display(), size = contents.len(), "file downloaded");
        Ok(contents.len() as u64)
    }

    /// Returns the names of all files stored on the server.
    pub async fn list_remote_files(&mut self) -> Result<Vec<String>, ClientError> {
        let endpoint = self.endpoint.as_deref().ok_or(ClientError::NotConnected)?;
        let result = endpoint.list_files().await;
        self.settle(result)
    }

    /// Deletes `remote_name` on the server.
    pub async fn delete_remote_file(&mut self, remote_name: &str) -> Result<(), ClientError> {
        let endpoint = self.endpoint.as_deref().ok_or(ClientError::NotConnected)?;
        let result = endpoint.delete(remote_name.to_string()).await;
        self.settle(result)?;

        info!(name = %remote_name, "file deleted");
        Ok(())
    }

    /// Applies the fault policy to a call result.
    fn settle<T>(&mut self, result: Result<T, RemoteError>) -> Result<T, ClientError> {
        match result {
            Err(e) if e.is_communication() => {
                warn!(error = %e, "lost connection to server");
                self.endpoint = None;
                Err(e.into())
            }
            other => other.map_err(ClientError::from),
        }
    }
}
