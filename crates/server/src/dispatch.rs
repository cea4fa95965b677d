//! Maps request envelopes onto [`FileTransfer`] calls.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use courier_protocol::constants::{ERR_CODE_INTERNAL, ERR_CODE_NOT_IMPLEMENTED};
use courier_protocol::messages::{
    DeleteResponse, FileContentsResponse, FileListResponse, HandshakeResponse, NameRequest,
    UploadRequest, UploadResponse,
};
use courier_protocol::{FileTransfer, Message, MessageType, RemoteError};

/// Decodes a request, invokes the bound service and encodes its reply.
///
/// Knows nothing about sockets, so it can be driven directly in tests.
#[derive(Clone)]
pub struct Dispatcher {
    service: Arc<dyn FileTransfer>,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn FileTransfer>) -> Self {
        Self { service }
    }

    /// Handles one request and returns the reply to send back.
    pub async fn dispatch(&self, request: Message) -> Message {
        debug!(id = %request.id, msg_type = ?request.msg_type, "dispatching request");

        match request.msg_type {
            MessageType::Handshake => {
                let result = self
                    .service
                    .handshake()
                    .await
                    .map(|token| HandshakeResponse { token });
                respond(&request, MessageType::HandshakeResponse, result)
            }
            MessageType::Upload => {
                let result = match payload::<UploadRequest>(&request) {
                    Ok(req) => {
                        let file_size = req.contents.len() as u64;
                        let name = req.name.clone();
                        self.service
                            .upload(req.name, req.contents)
                            .await
                            .map(|()| UploadResponse { name, file_size })
                    }
                    Err(e) => Err(e),
                };
                respond(&request, MessageType::UploadResponse, result)
            }
            MessageType::ListFiles => {
                let result = self
                    .service
                    .list_files()
                    .await
                    .map(|files| FileListResponse { files });
                respond(&request, MessageType::FileList, result)
            }
            MessageType::Download => {
                let result = match payload::<NameRequest>(&request) {
                    Ok(req) => self
                        .service
                        .download(req.name.clone())
                        .await
                        .map(|contents| FileContentsResponse {
                            name: req.name,
                            contents,
                        }),
                    Err(e) => Err(e),
                };
                respond(&request, MessageType::FileContents, result)
            }
            MessageType::Delete => {
                let result = match payload::<NameRequest>(&request) {
                    Ok(req) => self
                        .service
                        .delete(req.name.clone())
                        .await
                        .map(|()| DeleteResponse { name: req.name }),
                    Err(e) => Err(e),
                };
                respond(&request, MessageType::DeleteResponse, result)
            }
            other => {
                warn!(id = %request.id, msg_type = ?other, "unsupported request type");
                request.reply_error(
                    ERR_CODE_NOT_IMPLEMENTED,
                    format!("unsupported message type: {other:?}"),
                )
            }
        }
    }
}

/// Decodes the request payload, treating absence as a bad request.
fn payload<T: DeserializeOwned>(request: &Message) -> Result<T, RemoteError> {
    match request.parse_payload::<T>() {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(RemoteError::InvalidName(format!(
            "{:?} request is missing its payload",
            request.msg_type
        ))),
        Err(e) => Err(RemoteError::InvalidName(format!(
            "malformed {:?} payload: {e}",
            request.msg_type
        ))),
    }
}

fn respond<T: Serialize>(
    request: &Message,
    msg_type: MessageType,
    result: Result<T, RemoteError>,
) -> Message {
    match result {
        Ok(body) => request.reply(msg_type, Some(&body)).unwrap_or_else(|e| {
            request.reply_error(ERR_CODE_INTERNAL, format!("failed to encode reply: {e}"))
        }),
        Err(err) => {
            let payload = err.to_payload();
            request.reply_error(payload.code, payload.message)
        }
    }
}
