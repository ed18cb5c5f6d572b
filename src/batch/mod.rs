//! Batch envelope processing.
//!
//! # Data Flow
//! ```text
//! {"requests": [{method, path, headers}, ...]}
//!     → http::request (leading '{' selects this path)
//!     → dispatcher.rs (one concurrent unit per record, random latency)
//!     → JSON array of [body, status] pairs, written once
//! ```
//!
//! # Design Decisions
//! - Batches bypass the authorization gate and the router
//! - Results default to completion order; `ordering = "input"` restores array order
//! - No partial replies: the array is serialized only after every unit finished

pub mod dispatcher;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use dispatcher::BatchDispatcher;

/// One request-shaped record inside a batch envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RequestRecord {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl RequestRecord {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// The batch envelope. Array position identifies each record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BatchRequest {
    pub requests: Vec<RequestRecord>,
}

impl BatchRequest {
    pub fn new(requests: Vec<RequestRecord>) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// A single `[body, status]` result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BatchReply(pub String, pub u16);

impl BatchReply {
    pub fn body(&self) -> &str {
        &self.0
    }

    pub fn status(&self) -> u16 {
        self.1
    }
}
