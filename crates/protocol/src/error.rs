//! Error kinds a transfer call can fail with.

use crate::constants::{
    ERR_CODE_BAD_REQUEST, ERR_CODE_INTERNAL, ERR_CODE_NOT_FOUND, ERR_CODE_NOT_IMPLEMENTED,
};
use crate::envelope::ErrorPayload;

/// Failure of a single [`FileTransfer`](crate::FileTransfer) call.
///
/// Every variant except [`Communication`](Self::Communication) is produced
/// by the server and carried over the wire as an [`ErrorPayload`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("storage error: {0}")]
    Io(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("communication fault: {0}")]
    Communication(String),
}

impl RemoteError {
    /// Returns `true` for transport-level faults (unreachable endpoint,
    /// timeout, broken connection).
    pub fn is_communication(&self) -> bool {
        matches!(self, RemoteError::Communication(_))
    }

    /// Converts the error into its wire representation.
    pub fn to_payload(&self) -> ErrorPayload {
        let (code, message) = match self {
            RemoteError::NotFound(name) => (ERR_CODE_NOT_FOUND, name.clone()),
            RemoteError::InvalidName(reason) => (ERR_CODE_BAD_REQUEST, reason.clone()),
            RemoteError::Io(message) => (ERR_CODE_INTERNAL, message.clone()),
            RemoteError::Unsupported(op) => (ERR_CODE_NOT_IMPLEMENTED, op.clone()),
            // Never sent by a server; encoded as internal so the peer still
            // gets a well-formed reply.
            RemoteError::Communication(message) => (ERR_CODE_INTERNAL, message.clone()),
        };
        ErrorPayload { code, message }
    }

    /// Rebuilds the error from its wire representation.
    pub fn from_payload(payload: &ErrorPayload) -> Self {
        let message = payload.message.clone();
        match payload.code {
            ERR_CODE_NOT_FOUND => RemoteError::NotFound(message),
            ERR_CODE_BAD_REQUEST => RemoteError::InvalidName(message),
            ERR_CODE_INTERNAL => RemoteError::Io(message),
            ERR_CODE_NOT_IMPLEMENTED => RemoteError::Unsupported(message),
            code => RemoteError::Communication(format!("unexpected error code {code}: {message}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_survive_the_wire() {
        for err in [
            RemoteError::NotFound("a.txt".into()),
            RemoteError::InvalidName("parent traversal not allowed: ../x".into()),
            RemoteError::Io("disk full".into()),
            RemoteError::Unsupported("rename_file".into()),
        ] {
            assert_eq!(RemoteError::from_payload(&err.to_payload()), err);
        }
    }

    #[test]
    fn unknown_code_is_a_communication_fault() {
        let payload = ErrorPayload {
            code: 418,
            message: "teapot".into(),
        };
        let err = RemoteError::from_payload(&payload);
        assert!(err.is_communication());
        assert!(err.to_string().contains("418"));
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            RemoteError::NotFound("a.txt".into()).to_string(),
            "file not found: a.txt"
        );
        assert_eq!(
            RemoteError::Communication("connection closed".into()).to_string(),
            "communication fault: connection closed"
        );
    }
}
