//! TCP listener hosting the service registry.
//!
//! Every accepted connection runs on its own task and carries a sequence
//! of request/reply frames. `lookup` requests are answered from the
//! registry; everything else is routed to the [`Dispatcher`] bound under
//! the request's `service` name.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use courier_locator::Registry;
use courier_protocol::constants::{ERR_CODE_BAD_REQUEST, ERR_CODE_INTERNAL, ERR_CODE_NOT_FOUND};
use courier_protocol::messages::{LookupRequest, LookupResponse};
use courier_protocol::{
    DEFAULT_PORT, FileTransfer, MAX_FRAME_SIZE, Message, MessageType, WireError, encode_frame,
    read_frame,
};

use crate::ServerError;
use crate::dispatch::Dispatcher;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: IpAddr,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

/// The file transfer server.
pub struct TransferServer {
    config: ServerConfig,
    registry: Registry<Dispatcher>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl TransferServer {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: Registry::new(),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the registry of published services.
    pub fn registry(&self) -> &Registry<Dispatcher> {
        &self.registry
    }

    /// Publishes `service` under `name`.
    pub fn publish(
        &self,
        name: impl Into<String>,
        service: Arc<dyn FileTransfer>,
    ) -> Result<(), ServerError> {
        self.registry.publish(name, Dispatcher::new(service))?;
        Ok(())
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`bind`](Self::bind) or [`run`](Self::run).
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Gracefully shuts down the server and every open connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Binds the configured address and records the bound port.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = SocketAddr::new(self.config.bind_addr, self.config.port);
        let listener = TcpListener::bind(addr).await?;

        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!("transfer server listening on {local_addr}");
        Ok(listener)
    }

    /// Binds and serves until [`shutdown`](Self::shutdown) is called.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accepts connections on `listener` until cancellation.
    pub async fn serve(self: &Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    tracing::warn!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "failed to disable Nagle's algorithm");
        }
        let mut stream = BufStream::new(stream);
        tracing::debug!(%peer_addr, "client connected");

        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => break,
                frame = read_frame(&mut stream) => frame?,
            };
            let Some(request) = frame else {
                break;
            };

            let reply = self.route(request).await;
            let frame = encode_reply(&reply, MAX_FRAME_SIZE)?;
            stream.write_all(&frame).await?;
            stream.flush().await?;
        }

        tracing::debug!(%peer_addr, "client disconnected");
        Ok(())
    }

    /// Answers lookups from the registry and forwards calls to services.
    pub async fn route(&self, request: Message) -> Message {
        if request.msg_type == MessageType::Lookup {
            return self.lookup(&request);
        }

        let Some(service) = request.service.as_deref() else {
            return request.reply_error(ERR_CODE_BAD_REQUEST, "request is missing its service name");
        };
        match self.registry.lookup(service) {
            Ok(dispatcher) => dispatcher.dispatch(request).await,
            Err(e) => request.reply_error(ERR_CODE_NOT_FOUND, e.to_string()),
        }
    }

    fn lookup(&self, request: &Message) -> Message {
        let name = match request.parse_payload::<LookupRequest>() {
            Ok(Some(req)) => req.name,
            Ok(None) => {
                return request.reply_error(ERR_CODE_BAD_REQUEST, "lookup is missing its payload");
            }
            Err(e) => {
                return request.reply_error(ERR_CODE_BAD_REQUEST, format!("malformed lookup: {e}"));
            }
        };

        if let Err(e) = self.registry.lookup(&name) {
            tracing::debug!(service = %name, "lookup of unbound service");
            return request.reply_error(ERR_CODE_NOT_FOUND, e.to_string());
        }

        let bound = LookupResponse { name };
        request
            .reply(MessageType::Bound, Some(&bound))
            .unwrap_or_else(|e| {
                request.reply_error(ERR_CODE_INTERNAL, format!("failed to encode reply: {e}"))
            })
    }
}

/// Encodes `reply`, substituting an error reply when it does not fit in
/// a frame so the caller gets an answer and the connection stays open.
fn encode_reply(reply: &Message, max_size: usize) -> Result<Vec<u8>, WireError> {
    match encode_frame(reply, max_size) {
        Err(WireError::FrameTooLarge { size, max }) => {
            tracing::warn!(id = %reply.id, size, max, "reply too large, sending error instead");
            let error = Message::error(
                &reply.id,
                ERR_CODE_INTERNAL,
                format!("reply too large to transfer: {size} bytes (max {max})"),
            );
            encode_frame(&error, max_size)
        }
        other => other,
    }
}
