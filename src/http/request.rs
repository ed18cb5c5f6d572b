//! Request parsing.
//!
//! # Responsibilities
//! - Classify the bytes of a single read as a batch envelope or an HTTP request
//! - Parse the request line and `KEY: VALUE` header lines
//! - Reject structurally broken input with a typed error
//!
//! # Design Decisions
//! - One read per connection; requests spanning several reads are not reassembled
//! - Header keys keep their literal casing, the last duplicate wins
//! - A leading `{` selects the JSON path and skips line parsing entirely

use std::collections::HashMap;
use thiserror::Error;

use crate::batch::BatchRequest;

/// Errors produced while turning raw bytes into a [`Payload`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// Nothing was received.
    #[error("empty request")]
    Empty,

    /// Bytes were not valid UTF-8.
    #[error("request is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Request line had fewer than two tokens.
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    /// Batch envelope could not be decoded.
    #[error("invalid batch envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// A parsed HTTP-style request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    path: String,
    headers: HashMap<String, String>,
}

impl Request {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Look up a header by its exact key.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

/// What a connection delivered.
#[derive(Debug)]
pub enum Payload {
    Http(Request),
    Batch(BatchRequest),
}

/// Classify and parse the bytes of a single read.
pub fn parse_payload(buf: &[u8]) -> Result<Payload, ParseError> {
    if buf.is_empty() {
        return Err(ParseError::Empty);
    }

    if buf.first() == Some(&b'{') {
        let batch: BatchRequest = serde_json::from_slice(buf)?;
        return Ok(Payload::Batch(batch));
    }

    let text = std::str::from_utf8(buf)?;
    parse_http_request(text).map(Payload::Http)
}

/// Parse a CRLF-delimited request line and header block.
pub fn parse_http_request(text: &str) -> Result<Request, ParseError> {
    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();

    let mut tokens = request_line.split(' ').filter(|t| !t.is_empty());
    let (method, path) = match (tokens.next(), tokens.next()) {
        (Some(method), Some(path)) => (method, path),
        _ => return Err(ParseError::MalformedRequestLine(request_line.to_string())),
    };

    let mut headers = HashMap::new();
    for line in lines.take_while(|l| !l.is_empty()) {
        // `KEY: VALUE`, both kept verbatim; other lines are ignored.
        if let Some((key, value)) = line.split_once(": ") {
            headers.insert(key.to_string(), value.to_string());
        }
    }

    Ok(Request::new(method, path, headers))
}
