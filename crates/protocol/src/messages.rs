//! Payload types carried inside [`Message`](crate::Message) envelopes.

use serde::{Deserialize, Serialize};

/// Request payload for `lookup`: the published name to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub name: String,
}

/// Response payload for `bound`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub name: String,
}

/// Response payload for `handshake_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub token: String,
}

/// Request payload for `upload`.
///
/// The `contents` field is base64-encoded in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub contents: Vec<u8>,
}

/// Response payload for `upload_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub name: String,
    pub file_size: u64,
}

/// Request payload for `download` and `delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

/// Response payload for `file_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<String>,
}

/// Response payload for `file_contents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContentsResponse {
    pub name: String,
    #[serde(with = "base64_bytes")]
    pub contents: Vec<u8>,
}

/// Response payload for `delete_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub name: String,
}

/// Serde module encoding byte buffers as standard base64 strings.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_contents_are_base64() {
        let req = UploadRequest {
            name: "a.txt".into(),
            contents: b"hello".to_vec(),
        };
        let json = serde_json::to_string(&req).unwrap();
        // "hello" = "aGVsbG8="
        assert!(json.contains("aGVsbG8="));
        let parsed: UploadRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.contents, b"hello");
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let json = r#"{"name":"a.txt","contents":"not base64!"}"#;
        assert!(serde_json::from_str::<UploadRequest>(json).is_err());
    }

    #[test]
    fn upload_response_camel_case() {
        let resp = UploadResponse {
            name: "a.txt".into(),
            file_size: 5,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"fileSize\":5"));
    }

    #[test]
    fn file_list_defaults_to_empty() {
        let parsed: FileListResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.files.is_empty());
    }
}
