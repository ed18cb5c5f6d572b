//! Buffered response framing.
//!
//! Every status line carries the literal reason phrase `OK`, including 4xx and
//! 5xx codes. Clients of this server match on that exact text.

pub const STATUS_TEXT: &str = "OK";

pub const OK: u16 = 200;
pub const CREATED: u16 = 201;
pub const BAD_REQUEST: u16 = 400;
pub const UNAUTHORIZED: u16 = 401;
pub const METHOD_NOT_ALLOWED: u16 = 405;
pub const INTERNAL_SERVER_ERROR: u16 = 500;

/// A complete, buffered response produced by exactly one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    body: String,
    status_code: u16,
}

impl Response {
    pub fn new(body: impl Into<String>, status_code: u16) -> Self {
        Self {
            body: body.into(),
            status_code,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_text(&self) -> &'static str {
        STATUS_TEXT
    }

    /// Reply sent when the incoming bytes could not be parsed.
    pub fn bad_request() -> Self {
        Self::new("Bad Request", BAD_REQUEST)
    }

    /// Reply sent when handling failed before anything was written.
    pub fn internal_error() -> Self {
        Self::new("Internal Server Error", INTERNAL_SERVER_ERROR)
    }

    /// Serialize to the wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n\r\n{}",
            self.status_code,
            STATUS_TEXT,
            self.body.len(),
            self.body
        )
        .into_bytes()
    }
}
