//! Chunked transfer-encoding stream engine.
//!
//! # Responsibilities
//! - Write the fixed chunked header block
//! - Emit each fragment as a `<hex-len>\r\n<payload>\r\n` frame, in order
//! - Pace frames with a non-blocking delay
//! - Finish with the `0\r\n\r\n` terminal chunk
//!
//! # States
//! ```text
//! HeaderSent → Streaming(0) → … → Streaming(n-1) → Terminated
//! ```
//! A write error at any point abandons the remaining fragments. The socket is
//! unusable at that point, so no terminal chunk is attempted.

use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::StreamingConfig;

pub const STREAM_HEADER: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n";

pub const TERMINAL_CHUNK: &[u8] = b"0\r\n\r\n";

/// A single wire-level chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFrame<'a> {
    length_hex: String,
    payload: &'a [u8],
}

impl<'a> ChunkFrame<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            length_hex: format!("{:X}", payload.len()),
            payload,
        }
    }

    pub fn length_hex(&self) -> &str {
        &self.length_hex
    }

    pub fn payload(&self) -> &[u8] {
        self.payload
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.length_hex.len() + self.payload.len() + 4);
        out.extend_from_slice(self.length_hex.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(self.payload);
        out.extend_from_slice(b"\r\n");
        out
    }
}

/// Position of a stream in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    HeaderSent,
    Streaming(usize),
    Terminated,
}

/// Error raised when the peer goes away mid-stream.
#[derive(Debug, Error)]
#[error("stream aborted in state {state:?} after {chunks_sent} chunks: {source}")]
pub struct StreamError {
    pub state: StreamState,
    pub chunks_sent: usize,
    #[source]
    pub source: io::Error,
}

/// Outcome of a completed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub chunks: usize,
    pub payload_bytes: usize,
}

/// Emits a fixed, ordered fragment list as a chunked response.
#[derive(Debug, Clone)]
pub struct ChunkedStreamer {
    fragments: Vec<String>,
    delay: Duration,
}

impl ChunkedStreamer {
    /// Empty fragments are dropped: their frame would read as the terminal chunk.
    pub fn new(fragments: Vec<String>, delay: Duration) -> Self {
        let total = fragments.len();
        let fragments: Vec<String> = fragments.into_iter().filter(|f| !f.is_empty()).collect();
        if fragments.len() < total {
            tracing::warn!(dropped = total - fragments.len(), "Ignoring empty stream fragments");
        }
        Self { fragments, delay }
    }

    pub fn from_config(config: &StreamingConfig) -> Self {
        Self::new(config.fragments.clone(), config.chunk_delay())
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Drive the full header → frames → terminator sequence over `writer`.
    pub async fn stream<W>(&self, writer: &mut W) -> Result<StreamSummary, StreamError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut state = StreamState::Idle;
        let mut summary = StreamSummary {
            chunks: 0,
            payload_bytes: 0,
        };

        let fail = |state, chunks_sent, source| StreamError {
            state,
            chunks_sent,
            source,
        };

        write_flush(writer, STREAM_HEADER)
            .await
            .map_err(|e| fail(state, 0, e))?;
        state = StreamState::HeaderSent;

        for (index, fragment) in self.fragments.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            state = StreamState::Streaming(index);
            let frame = ChunkFrame::new(fragment.as_bytes());
            write_flush(writer, &frame.encode())
                .await
                .map_err(|e| fail(state, summary.chunks, e))?;

            summary.chunks += 1;
            summary.payload_bytes += frame.payload().len();
            tracing::trace!(chunk = index, len = %frame.length_hex(), "Chunk sent");
        }

        write_flush(writer, TERMINAL_CHUNK)
            .await
            .map_err(|e| fail(state, summary.chunks, e))?;
        state = StreamState::Terminated;

        tracing::debug!(
            chunks = summary.chunks,
            bytes = summary.payload_bytes,
            state = ?state,
            "Stream completed"
        );
        Ok(summary)
    }
}

async fn write_flush<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
