//! TCP locator and the call stub it hands out.
//!
//! Resolution opens one TCP connection to the server, confirms the name is
//! bound with a `lookup` exchange, and keeps the connection in a
//! [`RemoteEndpoint`] for all later calls.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use courier_protocol::messages::{
    DeleteResponse, FileContentsResponse, FileListResponse, HandshakeResponse, LookupRequest,
    LookupResponse, NameRequest, UploadRequest, UploadResponse,
};
use courier_protocol::{
    CALL_TIMEOUT, CONNECT_TIMEOUT, CallFuture, FileTransfer, MAX_FRAME_SIZE, Message, MessageType,
    RemoteError, WireError, encode_frame, read_frame,
};

use crate::locator::{Locator, ResolveFuture};

/// Resolves names by asking the server listening at `host:port`.
#[derive(Debug, Clone)]
pub struct TcpLocator {
    connect_timeout: Duration,
    call_timeout: Duration,
    max_frame_size: usize,
}

impl TcpLocator {
    pub fn new(connect_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            call_timeout,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Caps the size of request frames sent by resolved endpoints.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

impl Default for TcpLocator {
    fn default() -> Self {
        Self::new(CONNECT_TIMEOUT, CALL_TIMEOUT)
    }
}

impl Locator for TcpLocator {
    fn resolve<'a>(&'a self, host: &'a str, port: u16, name: &'a str) -> ResolveFuture<'a> {
        Box::pin(async move {
            let endpoint =
                RemoteEndpoint::connect(host, port, name, self.connect_timeout, self.call_timeout)
                    .await?
                    .with_max_frame_size(self.max_frame_size);
            Ok(Box::new(endpoint) as Box<dyn FileTransfer>)
        })
    }
}

/// Handle to a service published on a remote server.
///
/// Owns a single connection; calls are serialized on it. After a transport
/// failure the connection is dropped and every later call fails fast with
/// [`RemoteError::Communication`]. A request too large to frame is refused
/// before anything is sent and leaves the connection usable.
pub struct RemoteEndpoint {
    service: String,
    peer: SocketAddr,
    call_timeout: Duration,
    max_frame_size: usize,
    conn: Mutex<Option<BufStream<TcpStream>>>,
}

impl RemoteEndpoint {
    /// Connects to `host:port` and verifies `service` is bound there.
    pub async fn connect(
        host: &str,
        port: u16,
        service: &str,
        connect_timeout: Duration,
        call_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let stream =
            match tokio::time::timeout(connect_timeout, TcpStream::connect((host, port))).await {
                Ok(Ok(s)) => s,
                Ok(Err(e)) => {
                    return Err(RemoteError::Communication(format!(
                        "failed to connect to {host}:{port}: {e}"
                    )));
                }
                Err(_) => {
                    return Err(RemoteError::Communication(format!(
                        "timed out connecting to {host}:{port}"
                    )));
                }
            };

        let peer = stream
            .peer_addr()
            .map_err(|e| RemoteError::Communication(e.to_string()))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "failed to disable Nagle's algorithm");
        }

        let endpoint = Self {
            service: service.to_string(),
            peer,
            call_timeout,
            max_frame_size: MAX_FRAME_SIZE,
            conn: Mutex::new(Some(BufStream::new(stream))),
        };

        let request = LookupRequest {
            name: service.to_string(),
        };
        let reply = match endpoint.call(MessageType::Lookup, Some(&request)).await {
            Ok(reply) => reply,
            Err(RemoteError::NotFound(name)) => {
                return Err(RemoteError::Communication(format!(
                    "service not bound at {peer}: {name}"
                )));
            }
            Err(e) => return Err(e),
        };
        let bound: LookupResponse = decode(&reply)?;

        info!(%peer, service = %bound.name, "resolved remote endpoint");
        Ok(endpoint)
    }

    /// Caps the size of request frames this endpoint sends.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Returns the service name this endpoint is bound to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns the server address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Sends one request and waits for its reply under the call timeout.
    async fn call<T: Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Message, RemoteError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut request = Message::new(&id, msg_type, payload)
            .map_err(|e| RemoteError::Communication(format!("failed to encode request: {e}")))?;
        if msg_type != MessageType::Lookup {
            request = request.with_service(&self.service);
        }
        let frame = encode_frame(&request, self.max_frame_size).map_err(|e| match e {
            WireError::FrameTooLarge { size, max } => RemoteError::Io(format!(
                "request too large to send: {size} bytes (max {max})"
            )),
            e => RemoteError::Communication(format!("failed to encode request: {e}")),
        })?;
        drop(request);

        let mut conn = self.conn.lock().await;
        let Some(stream) = conn.as_mut() else {
            return Err(RemoteError::Communication("connection closed".into()));
        };

        let exchange = async {
            stream.write_all(&frame).await?;
            stream.flush().await?;
            read_frame(stream).await
        };
        let outcome = tokio::time::timeout(self.call_timeout, exchange).await;
        let reply = match outcome {
            Ok(Ok(Some(reply))) => reply,
            Ok(Ok(None)) => {
                *conn = None;
                return Err(RemoteError::Communication(
                    "connection closed by server".into(),
                ));
            }
            Ok(Err(e)) => {
                warn!(peer = %self.peer, error = %e, "call failed, dropping connection");
                *conn = None;
                return Err(RemoteError::Communication(e.to_string()));
            }
            Err(_) => {
                warn!(peer = %self.peer, ?msg_type, "call timed out, dropping connection");
                *conn = None;
                return Err(RemoteError::Communication(format!(
                    "call timed out after {}s",
                    self.call_timeout.as_secs_f64()
                )));
            }
        };
        drop(conn);

        if reply.id != id {
            *self.conn.lock().await = None;
            return Err(RemoteError::Communication(format!(
                "reply id mismatch: expected {id}, got {}",
                reply.id
            )));
        }

        if let Some(err) = &reply.error {
            debug!(?msg_type, code = err.code, "server returned error");
            return Err(RemoteError::from_payload(err));
        }

        if Some(reply.msg_type) != msg_type.reply_type() {
            return Err(RemoteError::Communication(format!(
                "unexpected reply type {:?} for {msg_type:?}",
                reply.msg_type
            )));
        }

        Ok(reply)
    }
}

/// Decodes a reply payload, treating absence as a protocol fault.
fn decode<T: DeserializeOwned>(reply: &Message) -> Result<T, RemoteError> {
    reply
        .parse_payload()
        .map_err(|e| RemoteError::Communication(format!("malformed reply payload: {e}")))?
        .ok_or_else(|| RemoteError::Communication("reply is missing its payload".into()))
}

impl FileTransfer for RemoteEndpoint {
    fn handshake(&self) -> CallFuture<'_, String> {
        Box::pin(async move {
            let reply = self.call::<()>(MessageType::Handshake, None).await?;
            let resp: HandshakeResponse = decode(&reply)?;
            Ok(resp.token)
        })
    }

    fn upload(&self, name: String, contents: Vec<u8>) -> CallFuture<'_, ()> {
        Box::pin(async move {
            let request = UploadRequest { name, contents };
            let reply = self.call(MessageType::Upload, Some(&request)).await?;
            let resp: UploadResponse = decode(&reply)?;
            debug!(name = %resp.name, size = resp.file_size, "upload acknowledged");
            Ok(())
        })
    }

    fn list_files(&self) -> CallFuture<'_, Vec<String>> {
        Box::pin(async move {
            let reply = self.call::<()>(MessageType::ListFiles, None).await?;
            let resp: FileListResponse = decode(&reply)?;
            Ok(resp.files)
        })
    }

    fn download(&self, name: String) -> CallFuture<'_, Vec<u8>> {
        Box::pin(async move {
            let request = NameRequest { name };
            let reply = self.call(MessageType::Download, Some(&request)).await?;
            let resp: FileContentsResponse = decode(&reply)?;
            Ok(resp.contents)
        })
    }

    fn delete(&self, name: String) -> CallFuture<'_, ()> {
        Box::pin(async move {
            let request = NameRequest { name };
            let reply = self.call(MessageType::Delete, Some(&request)).await?;
            let _: DeleteResponse = decode(&reply)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_protocol::constants::ERR_CODE_NOT_FOUND;
    use courier_protocol::write_frame;
    use tokio::net::TcpListener;

    /// One scripted server reaction: the reply to send, or `None` to hang up.
    type Step = Box<dyn Fn(Message) -> Option<Message> + Send>;

    fn step(f: impl Fn(Message) -> Option<Message> + Send + 'static) -> Step {
        Box::new(f)
    }

    /// Serves a scripted sequence of replies on a single connection.
    async fn scripted_server(script: Vec<Step>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = BufStream::new(stream);
            for reaction in script {
                let Some(request) = read_frame(&mut stream).await.unwrap() else {
                    return;
                };
                match reaction(request) {
                    Some(reply) => write_frame(&mut stream, &reply).await.unwrap(),
                    None => return,
                }
            }
            // Hold the connection open until the client hangs up.
            let _ = read_frame(&mut stream).await;
        });

        port
    }

    fn bind_ok() -> Step {
        step(|req| {
            let payload: LookupRequest = req.parse_payload().unwrap().unwrap();
            Some(
                req.reply(MessageType::Bound, Some(&LookupResponse { name: payload.name }))
                    .unwrap(),
            )
        })
    }

    fn locator() -> TcpLocator {
        TcpLocator::new(Duration::from_secs(2), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn resolve_then_handshake() {
        let port = scripted_server(vec![
            bind_ok(),
            step(|req| {
                assert_eq!(req.msg_type, MessageType::Handshake);
                assert_eq!(req.service.as_deref(), Some("courier.ftp"));
                let resp = HandshakeResponse {
                    token: "hello".into(),
                };
                Some(req.reply(MessageType::HandshakeResponse, Some(&resp)).unwrap())
            }),
        ])
        .await;

        let handle = locator()
            .resolve("127.0.0.1", port, "courier.ftp")
            .await
            .unwrap();
        assert_eq!(handle.handshake().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn unbound_service_is_communication_fault() {
        let port = scripted_server(vec![step(|req| {
            Some(req.reply_error(ERR_CODE_NOT_FOUND, "courier.ftp"))
        })])
        .await;

        let result = locator().resolve("127.0.0.1", port, "courier.ftp").await;
        match result {
            Err(RemoteError::Communication(msg)) => assert!(msg.contains("not bound")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected resolution failure"),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_communication_fault() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = locator().resolve("127.0.0.1", port, "courier.ftp").await;
        assert!(matches!(result, Err(RemoteError::Communication(_))));
    }

    #[tokio::test]
    async fn server_error_is_decoded() {
        let port = scripted_server(vec![
            bind_ok(),
            step(|req| Some(req.reply_error(ERR_CODE_NOT_FOUND, "a.txt"))),
        ])
        .await;

        let handle = locator()
            .resolve("127.0.0.1", port, "courier.ftp")
            .await
            .unwrap();
        let result = handle.download("a.txt".into()).await;
        assert_eq!(result, Err(RemoteError::NotFound("a.txt".into())));
    }

    #[tokio::test]
    async fn oversized_request_keeps_connection() {
        let port = scripted_server(vec![
            bind_ok(),
            step(|req| {
                assert_eq!(req.msg_type, MessageType::Handshake);
                let resp = HandshakeResponse {
                    token: "still here".into(),
                };
                Some(req.reply(MessageType::HandshakeResponse, Some(&resp)).unwrap())
            }),
        ])
        .await;

        let handle = locator()
            .with_max_frame_size(1024)
            .resolve("127.0.0.1", port, "courier.ftp")
            .await
            .unwrap();

        match handle.upload("big.bin".into(), vec![1u8; 4096]).await {
            Err(RemoteError::Io(msg)) => assert!(msg.contains("too large"), "{msg}"),
            other => panic!("expected a non-fatal size error, got {other:?}"),
        }
        assert_eq!(handle.handshake().await.unwrap(), "still here");
    }

    #[tokio::test]
    async fn closed_connection_poisons_endpoint() {
        let port = scripted_server(vec![bind_ok(), step(|_req| None)]).await;

        let handle = locator()
            .resolve("127.0.0.1", port, "courier.ftp")
            .await
            .unwrap();

        let first = handle.list_files().await;
        assert!(matches!(first, Err(RemoteError::Communication(_))));

        let second = handle.list_files().await;
        match second {
            Err(RemoteError::Communication(msg)) => assert_eq!(msg, "connection closed"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = BufStream::new(stream);
            let req = read_frame(&mut stream).await.unwrap().unwrap();
            let resp = LookupResponse {
                name: "courier.ftp".into(),
            };
            write_frame(&mut stream, &req.reply(MessageType::Bound, Some(&resp)).unwrap())
                .await
                .unwrap();
            // Swallow the next request and never answer.
            let _ = read_frame(&mut stream).await;
            std::future::pending::<()>().await;
        });

        let endpoint = RemoteEndpoint::connect(
            "127.0.0.1",
            port,
            "courier.ftp",
            Duration::from_secs(5),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let result = endpoint.handshake().await;
        match result {
            Err(RemoteError::Communication(msg)) => assert!(msg.contains("timed out")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatched_reply_type_is_rejected() {
        let port = scripted_server(vec![
            bind_ok(),
            step(|req| {
                let resp = FileListResponse { files: vec![] };
                Some(req.reply(MessageType::FileList, Some(&resp)).unwrap())
            }),
        ])
        .await;

        let handle = locator()
            .resolve("127.0.0.1", port, "courier.ftp")
            .await
            .unwrap();
        let result = handle.handshake().await;
        assert!(matches!(result, Err(RemoteError::Communication(_))));
    }
}
