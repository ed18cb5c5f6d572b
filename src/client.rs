//! Client for the server's wire formats.
//!
//! Speaks the three reply shapes the server produces: a buffered
//! `HTTP/1.1 <code> OK` response, a chunked stream, and the raw JSON array
//! returned for a batch envelope. Each call opens its own connection.

use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::batch::{BatchReply, BatchRequest, RequestRecord};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A buffered response as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub head: String,
    pub body: String,
}

/// A chunked response split into its fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedResponse {
    pub head: String,
    pub fragments: Vec<String>,
}

impl StreamedResponse {
    pub fn body(&self) -> String {
        self.fragments.concat()
    }
}

/// Render a request line plus headers.
pub fn build_request(method: &str, path: &str, headers: &[(&str, &str)]) -> String {
    let mut request = format!("{method} {path} HTTP/1.1\r\n");
    for (key, value) in headers {
        request.push_str(&format!("{key}: {value}\r\n"));
    }
    request.push_str("\r\n");
    request
}

#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
}

impl Client {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and read the whole reply.
    pub async fn send_request(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<RawResponse, ClientError> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream
            .write_all(build_request(method, path, headers).as_bytes())
            .await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        parse_response(&String::from_utf8_lossy(&raw))
    }

    /// Send one request and return once the header block of a chunked reply
    /// has arrived. Fragments are then pulled with [`ChunkStream::next_chunk`].
    pub async fn open_stream(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<ChunkStream, ClientError> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream
            .write_all(build_request(method, path, headers).as_bytes())
            .await?;
        ChunkStream::start(stream).await
    }

    /// Send one request and collect every fragment of the chunked reply.
    pub async fn stream_request(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<StreamedResponse, ClientError> {
        let mut chunks = self.open_stream(method, path, headers).await?;
        let mut fragments = Vec::new();
        while let Some(fragment) = chunks.next_chunk().await? {
            fragments.push(fragment);
        }

        Ok(StreamedResponse {
            head: chunks.head,
            fragments,
        })
    }

    /// Send a batch envelope and decode the `[body, status]` array.
    pub async fn send_batch(&self, requests: Vec<RequestRecord>) -> Result<Vec<BatchReply>, ClientError> {
        let envelope = serde_json::to_vec(&BatchRequest::new(requests))?;

        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.write_all(&envelope).await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// A chunked reply read one frame at a time.
pub struct ChunkStream<R = TcpStream> {
    head: String,
    reader: BufReader<R>,
    finished: bool,
}

impl<R> ChunkStream<R>
where
    R: AsyncRead + Unpin,
{
    /// Consume the header block and check that the reply is chunked.
    pub async fn start(inner: R) -> Result<Self, ClientError> {
        let mut reader = BufReader::new(inner);
        let mut head = String::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Err(ClientError::Malformed("connection closed in headers".into()));
            }
            head.push_str(&line);
            if line == "\r\n" {
                break;
            }
        }

        if !head.contains("Transfer-Encoding: chunked") {
            return Err(ClientError::Malformed(format!("not a chunked response: {head:?}")));
        }

        Ok(Self {
            head,
            reader,
            finished: false,
        })
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    /// Next fragment as soon as its frame arrives, `None` after the terminal chunk.
    pub async fn next_chunk(&mut self) -> Result<Option<String>, ClientError> {
        if self.finished {
            return Ok(None);
        }

        let mut size_line = String::new();
        if self.reader.read_line(&mut size_line).await? == 0 {
            return Err(ClientError::Malformed("stream ended without terminal chunk".into()));
        }
        let size = usize::from_str_radix(size_line.trim(), 16)
            .map_err(|_| ClientError::Malformed(format!("bad chunk size {size_line:?}")))?;

        let mut payload = vec![0u8; size + 2];
        self.reader.read_exact(&mut payload).await?;
        if !payload.ends_with(b"\r\n") {
            return Err(ClientError::Malformed("chunk missing CRLF".into()));
        }
        if size == 0 {
            self.finished = true;
            return Ok(None);
        }
        payload.truncate(size);
        Ok(Some(String::from_utf8_lossy(&payload).into_owned()))
    }
}

/// Split a buffered reply into status, header block and body.
pub fn parse_response(raw: &str) -> Result<RawResponse, ClientError> {
    let (head, body) = raw
        .split_once("\r\n\r\n")
        .ok_or_else(|| ClientError::Malformed(format!("no header terminator in {raw:?}")))?;

    let status = head
        .split(' ')
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| ClientError::Malformed(format!("bad status line in {head:?}")))?;

    Ok(RawResponse {
        status,
        head: head.to_string(),
        body: body.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_request_text() {
        let text = build_request("GET", "/test", &[("Authorization", "Bearer token")]);
        assert_eq!(text, "GET /test HTTP/1.1\r\nAuthorization: Bearer token\r\n\r\n");
    }

    #[test]
    fn parses_buffered_reply() {
        let parsed = parse_response("HTTP/1.1 404 OK\r\nContent-Length: 9\r\n\r\nNot Found").unwrap();
        assert_eq!(parsed.status, 404);
        assert_eq!(parsed.body, "Not Found");
        assert!(parsed.head.contains("Content-Length: 9"));
    }

    #[test]
    fn rejects_truncated_reply() {
        assert!(matches!(
            parse_response("HTTP/1.1 200 OK\r\n"),
            Err(ClientError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn chunks_are_yielded_before_the_stream_ends() {
        let (mut server, client) = tokio::io::duplex(1024);
        server
            .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nfirst\r\n")
            .await
            .unwrap();

        let mut chunks = ChunkStream::start(client).await.unwrap();
        assert!(chunks.head().ends_with("chunked\r\n\r\n"));
        // The server side is still open and silent here.
        assert_eq!(chunks.next_chunk().await.unwrap().as_deref(), Some("first"));

        server.write_all(b"6\r\nsecond\r\n0\r\n\r\n").await.unwrap();
        assert_eq!(chunks.next_chunk().await.unwrap().as_deref(), Some("second"));
        assert_eq!(chunks.next_chunk().await.unwrap(), None);
        assert_eq!(chunks.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn non_chunked_reply_is_rejected() {
        let (mut server, client) = tokio::io::duplex(1024);
        server
            .write_all(b"HTTP/1.1 401 OK\r\nContent-Length: 12\r\n\r\nUnauthorized")
            .await
            .unwrap();
        assert!(matches!(
            ChunkStream::start(client).await,
            Err(ClientError::Malformed(_))
        ));
    }
}
