use std::sync::Arc;

use tracing::{debug, info, warn};

use courier_protocol::{CallFuture, FileTransfer, HANDSHAKE_TOKEN, RemoteError};

use crate::storage::{Storage, StorageError};

impl From<StorageError> for RemoteError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidName(reason) => RemoteError::InvalidName(reason),
            StorageError::NotFound(name) => RemoteError::NotFound(name),
            StorageError::Io { .. } | StorageError::TooLarge { .. } => {
                RemoteError::Io(err.to_string())
            }
        }
    }
}

/// Server-side implementation of the transfer operations over a [`Storage`].
///
/// Stateless apart from the storage handle; one instance serves every
/// connection.
#[derive(Debug, Clone)]
pub struct ServerSession {
    storage: Arc<Storage>,
}

impl ServerSession {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl FileTransfer for ServerSession {
    fn handshake(&self) -> CallFuture<'_, String> {
        Box::pin(async {
            debug!("handshake");
            Ok(HANDSHAKE_TOKEN.to_string())
        })
    }

    fn upload(&self, name: String, contents: Vec<u8>) -> CallFuture<'_, ()> {
        Box::pin(async move {
            let size = contents.len();
            match self.storage.write(&name, &contents).await {
                Ok(stored) => {
                    info!(name = %stored, size, "upload stored");
                    Ok(())
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "upload rejected");
                    Err(e.into())
                }
            }
        })
    }

    fn list_files(&self) -> CallFuture<'_, Vec<String>> {
        Box::pin(async move {
            let files = self.storage.list().await?;
            debug!(count = files.len(), "listed files");
            Ok(files)
        })
    }

    fn download(&self, name: String) -> CallFuture<'_, Vec<u8>> {
        Box::pin(async move {
            let contents = self.storage.read(&name).await?;
            info!(name = %name, size = contents.len(), "download served");
            Ok(contents)
        })
    }

    fn delete(&self, name: String) -> CallFuture<'_, ()> {
        Box::pin(async move {
            self.storage.delete(&name).await?;
            info!(name = %name, "file deleted");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (tempfile::TempDir, ServerSession) {
        let dir = tempfile::tempdir().unwrap();
        let session = ServerSession::new(Storage::new(dir.path().join("storedFiles")));
        (dir, session)
    }

    #[tokio::test]
    async fn handshake_returns_token() {
        let (_dir, session) = session();
        assert_eq!(session.handshake().await.unwrap(), HANDSHAKE_TOKEN);
    }

    #[tokio::test]
    async fn upload_list_download_delete() {
        let (_dir, session) = session();

        session
            .upload("a.txt".into(), b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(session.list_files().await.unwrap(), vec!["a.txt"]);
        assert_eq!(session.download("a.txt".into()).await.unwrap(), b"hello");

        session.delete("a.txt".into()).await.unwrap();
        assert!(session.list_files().await.unwrap().is_empty());
        assert_eq!(
            session.download("a.txt".into()).await,
            Err(RemoteError::NotFound("a.txt".into()))
        );
    }

    #[tokio::test]
    async fn invalid_name_maps_to_invalid_name() {
        let (_dir, session) = session();
        let result = session.upload("../x".into(), b"x".to_vec()).await;
        assert!(matches!(result, Err(RemoteError::InvalidName(_))));
    }

    #[tokio::test]
    async fn io_failure_maps_to_io() {
        let (_dir, session) = session();
        session.upload("a.txt".into(), b"x".to_vec()).await.unwrap();
        let result = session.upload("a.txt/b.txt".into(), b"y".to_vec()).await;
        assert!(matches!(result, Err(RemoteError::Io(_))));
    }

    #[tokio::test]
    async fn oversized_download_maps_to_io() {
        let (_dir, session) = session();
        session.storage().ensure_root().await.unwrap();
        let path = session.storage().root().join("huge.bin");
        let file = std::fs::File::create(path).unwrap();
        file.set_len(courier_protocol::MAX_FILE_SIZE as u64 + 1).unwrap();

        match session.download("huge.bin".into()).await {
            Err(RemoteError::Io(msg)) => assert!(msg.contains("too large"), "{msg}"),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let (_dir, session) = session();
        assert!(matches!(
            session.delete("ghost.txt".into()).await,
            Err(RemoteError::NotFound(_))
        ));
    }
}
