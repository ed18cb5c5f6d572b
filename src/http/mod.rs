//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (one read)
//!     → request.rs (classify: batch envelope or request line + headers)
//!     → server.rs (authorize, route, or hand to batch dispatcher)
//!     → response.rs (buffered `HTTP/1.1 <code> OK` reply)
//!       or chunked.rs (chunked transfer-encoding stream)
//!     → Close connection
//! ```

pub mod chunked;
pub mod request;
pub mod response;
pub mod server;

pub use chunked::{ChunkFrame, ChunkedStreamer, StreamError, StreamState, StreamSummary};
pub use request::{parse_payload, ParseError, Payload, Request};
pub use response::Response;
pub use server::{ConnectionError, HttpServer, Outcome};
