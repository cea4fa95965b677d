use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Greeting returned by every server build and checked by clients before
/// any file operation is issued.
pub const HANDSHAKE_TOKEN: &str = "Successfully connected to server!";

/// Port the server listens on when none is configured.
pub const DEFAULT_PORT: u16 = 1099;

/// Well-known name the server publishes its file service under.
pub const SERVICE_NAME: &str = "courier.ftp";

/// Storage root used when the server is not configured with one.
pub const DEFAULT_STORAGE_ROOT: &str = "storedFiles";

/// Timeout for the TCP connection attempt during resolution.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a single request/response exchange.
///
/// Covers writing the request frame and reading the full reply, so it
/// must be generous enough for whole-file uploads and downloads.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum frame size in bytes (128 MB).
pub const MAX_FRAME_SIZE: usize = 128 * 1024 * 1024;

/// Largest file an upload or download can carry.
///
/// File bytes travel base64-encoded (4 bytes per 3) inside a frame; 64 KiB
/// is left for the envelope and file name.
pub const MAX_FILE_SIZE: usize = MAX_FRAME_SIZE / 4 * 3 - 64 * 1024;

/// Message type identifier carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Requests from client to server
    #[serde(rename = "lookup")]
    Lookup,
    #[serde(rename = "handshake")]
    Handshake,
    #[serde(rename = "upload")]
    Upload,
    #[serde(rename = "list_files")]
    ListFiles,
    #[serde(rename = "download")]
    Download,
    #[serde(rename = "delete")]
    Delete,

    // Responses from server to client
    #[serde(rename = "bound")]
    Bound,
    #[serde(rename = "handshake_response")]
    HandshakeResponse,
    #[serde(rename = "upload_response")]
    UploadResponse,
    #[serde(rename = "file_list")]
    FileList,
    #[serde(rename = "file_contents")]
    FileContents,
    #[serde(rename = "delete_response")]
    DeleteResponse,
    #[serde(rename = "error")]
    Error,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// Returns the reply type a server sends for this request type.
    ///
    /// `None` for types that are not requests.
    pub fn reply_type(self) -> Option<MessageType> {
        match self {
            MessageType::Lookup => Some(MessageType::Bound),
            MessageType::Handshake => Some(MessageType::HandshakeResponse),
            MessageType::Upload => Some(MessageType::UploadResponse),
            MessageType::ListFiles => Some(MessageType::FileList),
            MessageType::Download => Some(MessageType::FileContents),
            MessageType::Delete => Some(MessageType::DeleteResponse),
            _ => None,
        }
    }
}

/// Wire error codes.
pub const ERR_CODE_BAD_REQUEST: i32 = 400;
pub const ERR_CODE_NOT_FOUND: i32 = 404;
pub const ERR_CODE_INTERNAL: i32 = 500;
pub const ERR_CODE_NOT_IMPLEMENTED: i32 = 501;
