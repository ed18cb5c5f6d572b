//! Connection server.
//!
//! # Responsibilities
//! - Run the accept loop until shutdown is signalled
//! - Spawn one task per accepted connection
//! - Per connection: read once, parse, authorize, route, respond, close
//! - Contain every per-connection failure inside its task
//!
//! # Design Decisions
//! - Accept never waits on a handler; handlers run on their own task
//! - The listener is dropped as soon as the accept loop exits, then in-flight
//!   connections are drained
//! - Generic error replies are only written when nothing else has been sent

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::Instrument;
use uuid::Uuid;

use crate::batch::BatchDispatcher;
use crate::config::ServerConfig;
use crate::http::chunked::{ChunkedStreamer, StreamError, StreamSummary};
use crate::http::request::{parse_payload, ParseError, Payload, Request};
use crate::http::response::Response;
use crate::net::{ConnectionGuard, ConnectionTracker, Listener, ListenerError};
use crate::routing::{Handled, Route, RouteError, Router};
use crate::security::BearerGate;

/// Everything that can end a connection early.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("no request received within {0:?}")]
    ReadTimeout(Duration),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("batch serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

impl ConnectionError {
    /// Generic reply for failures that happen before any byte is written.
    pub fn reply(&self) -> Option<Response> {
        match self {
            ConnectionError::Parse(_) => Some(Response::bad_request()),
            ConnectionError::Route(_) | ConnectionError::Serialize(_) => {
                Some(Response::internal_error())
            }
            ConnectionError::Read(_)
            | ConnectionError::ReadTimeout(_)
            | ConnectionError::Stream(_)
            | ConnectionError::Write(_) => None,
        }
    }
}

/// How a connection was served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Peer closed before sending anything.
    PeerClosed,
    /// A buffered response with this status was written.
    Responded(u16),
    /// A batch reply with this many results was written.
    Batch(usize),
    /// A chunked stream ran to its terminal chunk.
    Streamed(StreamSummary),
}

/// Read-only state shared by every connection task.
#[derive(Debug)]
struct ServerContext {
    router: Router,
    gate: BearerGate,
    gate_streaming: bool,
    streamer: ChunkedStreamer,
    dispatcher: BatchDispatcher,
    read_buffer_size: usize,
    read_timeout: Duration,
}

/// The server value owned by the accept loop.
pub struct HttpServer {
    ctx: Arc<ServerContext>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a new server from a validated configuration.
    pub fn new(config: &ServerConfig) -> Self {
        let ctx = ServerContext {
            router: Router::from_config(&config.canned),
            gate: BearerGate::from_config(&config.auth),
            gate_streaming: config.auth.gate_streaming,
            streamer: ChunkedStreamer::from_config(&config.streaming),
            dispatcher: BatchDispatcher::from_config(&config.batch),
            read_buffer_size: config.listener.read_buffer_size,
            read_timeout: config.listener.read_timeout(),
        };

        Self {
            ctx: Arc::new(ctx),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Run the accept loop until `shutdown` fires, then drain connections.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Server started on {}", addr);

        let mut shutdown_open = true;
        loop {
            tokio::select! {
                signal = shutdown.recv(), if shutdown_open => match signal {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        tracing::info!("Shutdown requested, no longer accepting");
                        break;
                    }
                    Err(RecvError::Closed) => {
                        // All senders dropped.
                        tracing::warn!("Shutdown channel closed, serving until the process exits");
                        shutdown_open = false;
                    }
                },
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let _permit = permit;
                            ctx.serve(stream, peer, guard).await;
                        });
                    }
                    Err(ListenerError::Closed) => {
                        tracing::error!("Connection limiter closed, stopping accept loop");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        // Persistent errors (EMFILE) would otherwise spin.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
            }
        }

        drop(listener);
        tracing::info!(
            in_flight = self.tracker.active_count(),
            "Listener closed, draining connections"
        );
        self.tracker.wait_idle().await;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Serve one connection over any byte stream. The caller closes it.
    pub async fn handle_connection<S>(&self, io: &mut S) -> Result<Outcome, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.ctx.handle(io).await
    }
}

impl ServerContext {
    async fn serve(&self, mut stream: TcpStream, peer: SocketAddr, guard: ConnectionGuard) {
        let span = tracing::info_span!(
            "connection",
            connection_id = %guard.id(),
            request_id = %Uuid::new_v4(),
            peer_addr = %peer,
        );

        async {
            match self.handle(&mut stream).await {
                Ok(outcome) => tracing::debug!(?outcome, "Connection served"),
                Err(e) => {
                    tracing::warn!(error = %e, "Connection failed");
                    if let Some(reply) = e.reply() {
                        if let Err(e) = write_response(&mut stream, &reply).await {
                            tracing::debug!(error = %e, "Failed to send error reply");
                        }
                    }
                }
            }

            if let Err(e) = stream.shutdown().await {
                tracing::trace!(error = %e, "Socket shutdown failed");
            }
        }
        .instrument(span)
        .await;

        drop(guard);
    }

    async fn handle<S>(&self, io: &mut S) -> Result<Outcome, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.read_buffer_size];
        let n = tokio::time::timeout(self.read_timeout, io.read(&mut buf))
            .await
            .map_err(|_| ConnectionError::ReadTimeout(self.read_timeout))?
            .map_err(ConnectionError::Read)?;
        if n == 0 {
            return Ok(Outcome::PeerClosed);
        }

        match parse_payload(&buf[..n])? {
            Payload::Batch(batch) => {
                let items = batch.len();
                tracing::info!(items, "Received batch");
                let body = self.dispatcher.dispatch_json(batch).await?;
                write_flush(io, &body).await?;
                Ok(Outcome::Batch(items))
            }
            Payload::Http(request) => self.handle_http(io, &request).await,
        }
    }

    async fn handle_http<S>(&self, io: &mut S, request: &Request) -> Result<Outcome, ConnectionError>
    where
        S: AsyncWrite + Unpin,
    {
        tracing::info!(method = %request.method(), path = %request.path(), "Received request");

        let route = self.router.resolve(request);
        let handled = if route != Route::Stream || self.gate_streaming {
            match self.gate.authorize(request, |req| self.router.handle(route, req)) {
                Ok(handled) => handled?,
                Err(denied) => {
                    tracing::info!(reason = %denied, "Request rejected");
                    Handled::Buffered(denied.to_response())
                }
            }
        } else {
            self.router.handle(route, request)?
        };

        match handled {
            Handled::Buffered(response) => {
                write_response(io, &response).await?;
                tracing::debug!(status = response.status_code(), "Response sent");
                Ok(Outcome::Responded(response.status_code()))
            }
            Handled::Stream => {
                let summary = self.streamer.stream(io).await?;
                Ok(Outcome::Streamed(summary))
            }
        }
    }
}

async fn write_response<S>(io: &mut S, response: &Response) -> Result<(), ConnectionError>
where
    S: AsyncWrite + Unpin,
{
    write_flush(io, &response.to_bytes()).await
}

async fn write_flush<S>(io: &mut S, bytes: &[u8]) -> Result<(), ConnectionError>
where
    S: AsyncWrite + Unpin,
{
    io.write_all(bytes).await.map_err(ConnectionError::Write)?;
    io.flush().await.map_err(ConnectionError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatchOrdering, JitterRange};
    use tokio::io::duplex;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.streaming.fragments = vec!["Hello ".into(), "streaming ".into(), "world".into()];
        config.streaming.chunk_delay_ms = 0;
        config.batch.admission_jitter_ms = JitterRange(0, 5);
        config.batch.processing_jitter_ms = JitterRange(0, 5);
        config
    }

    /// Feed `input` to the server over an in-memory pipe and collect the reply.
    async fn exchange(server: &HttpServer, input: &[u8]) -> (Result<Outcome, ConnectionError>, String) {
        let (mut client, mut server_io) = duplex(64 * 1024);
        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();

        let outcome = server.handle_connection(&mut server_io).await;
        if let Err(e) = &outcome {
            if let Some(reply) = e.reply() {
                write_response(&mut server_io, &reply).await.unwrap();
            }
        }
        drop(server_io);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    fn http(method: &str, path: &str, auth: Option<&str>) -> Vec<u8> {
        let mut req = format!("{method} {path} HTTP/1.1\r\nHost: 127.0.0.1:8080\r\n");
        if let Some(auth) = auth {
            req.push_str(&format!("Authorization: {auth}\r\n"));
        }
        req.push_str("\r\n");
        req.into_bytes()
    }

    #[tokio::test]
    async fn authorized_get_is_handled() {
        let server = HttpServer::new(&test_config());
        let (outcome, reply) = exchange(&server, &http("GET", "/test", Some("Bearer token"))).await;

        assert_eq!(outcome.unwrap(), Outcome::Responded(200));
        assert_eq!(
            reply,
            "HTTP/1.1 200 OK\r\nContent-Length: 29\r\n\r\nHandled GET request for /test"
        );
    }

    #[tokio::test]
    async fn missing_credential_is_401_for_any_route() {
        let server = HttpServer::new(&test_config());
        for (method, path) in [("DELETE", "/delete"), ("GET", "/x"), ("POST", "/generate-response")] {
            let (outcome, reply) = exchange(&server, &http(method, path, None)).await;
            assert_eq!(outcome.unwrap(), Outcome::Responded(401));
            assert_eq!(reply, "HTTP/1.1 401 OK\r\nContent-Length: 12\r\n\r\nUnauthorized");
        }
    }

    #[tokio::test]
    async fn credential_must_match_exactly() {
        let server = HttpServer::new(&test_config());
        for raw in [
            "GET /x HTTP/1.1\r\nAuthorization:    Bearer token\r\n\r\n",
            "GET /x HTTP/1.1\r\nAuthorization:Bearer token\r\n\r\n",
            "GET /x HTTP/1.1\r\nAuthorization: Bearer token \r\n\r\n",
        ] {
            let (outcome, reply) = exchange(&server, raw.as_bytes()).await;
            assert_eq!(outcome.unwrap(), Outcome::Responded(401), "{raw:?}");
            assert!(reply.ends_with("Unauthorized"));
        }
    }

    #[tokio::test]
    async fn generate_response_returns_head_of_sequence() {
        let server = HttpServer::new(&test_config());
        let (_, reply) = exchange(&server, &http("GET", "/generate-response", Some("Bearer token"))).await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.ends_with("Hello, World!"));
    }

    #[tokio::test]
    async fn stream_route_bypasses_gate_by_default() {
        let server = HttpServer::new(&test_config());
        let (outcome, reply) = exchange(&server, &http("GET", "/stream-response", None)).await;

        assert!(matches!(outcome.unwrap(), Outcome::Streamed(s) if s.chunks == 3));
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n"));
        assert!(reply.ends_with("6\r\nHello \r\nA\r\nstreaming \r\n5\r\nworld\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn gated_stream_requires_credential() {
        let mut config = test_config();
        config.auth.gate_streaming = true;
        let server = HttpServer::new(&config);

        let (outcome, reply) = exchange(&server, &http("GET", "/stream-response", None)).await;
        assert_eq!(outcome.unwrap(), Outcome::Responded(401));
        assert!(reply.ends_with("Unauthorized"));

        let (outcome, _) =
            exchange(&server, &http("GET", "/stream-response", Some("Bearer token"))).await;
        assert!(matches!(outcome.unwrap(), Outcome::Streamed(_)));
    }

    #[tokio::test]
    async fn malformed_request_gets_generic_error() {
        let server = HttpServer::new(&test_config());
        let (outcome, reply) = exchange(&server, b"NONSENSE\r\n\r\n").await;

        assert!(matches!(outcome, Err(ConnectionError::Parse(_))));
        assert_eq!(reply, "HTTP/1.1 400 OK\r\nContent-Length: 11\r\n\r\nBad Request");
    }

    #[tokio::test]
    async fn malformed_json_gets_generic_error() {
        let server = HttpServer::new(&test_config());
        let (outcome, reply) = exchange(&server, b"{\"requests\": [").await;
        assert!(matches!(outcome, Err(ConnectionError::Parse(ParseError::Json(_)))));
        assert!(reply.starts_with("HTTP/1.1 400 OK"));
    }

    #[tokio::test]
    async fn exhausted_canned_sequence_is_500() {
        let mut config = test_config();
        config.canned.responses.clear();
        let server = HttpServer::new(&config);

        let (outcome, reply) =
            exchange(&server, &http("GET", "/generate-response", Some("Bearer token"))).await;
        assert!(matches!(outcome, Err(ConnectionError::Route(_))));
        assert!(reply.starts_with("HTTP/1.1 500 OK"));
    }

    #[tokio::test]
    async fn batch_envelope_returns_json_array() {
        let mut config = test_config();
        config.batch.ordering = BatchOrdering::Input;
        let server = HttpServer::new(&config);

        let body = br#"{"requests": [{"method": "GET", "path": "/a", "headers": {}}, {"method": "POST", "path": "/b", "headers": {}}]}"#;
        let (outcome, reply) = exchange(&server, body).await;

        assert_eq!(outcome.unwrap(), Outcome::Batch(2));
        assert_eq!(
            reply,
            r#"[["Async response for GET /a",200],["Async response for POST /b",200]]"#
        );
    }

    #[tokio::test]
    async fn closed_peer_gets_nothing() {
        let server = HttpServer::new(&test_config());
        let (outcome, reply) = exchange(&server, b"").await;
        assert_eq!(outcome.unwrap(), Outcome::PeerClosed);
        assert!(reply.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out_without_reply() {
        let mut config = test_config();
        config.listener.read_timeout_secs = 2;
        let server = HttpServer::new(&config);

        let (_client, mut server_io) = duplex(1024);
        let outcome = server.handle_connection(&mut server_io).await;

        match outcome {
            Err(e @ ConnectionError::ReadTimeout(_)) => assert!(e.reply().is_none()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
