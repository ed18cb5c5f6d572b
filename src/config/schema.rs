//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Bearer-token authorization settings.
    pub auth: AuthConfig,

    /// Canned responses served on `/generate-response`.
    pub canned: CannedConfig,

    /// Chunked streaming content and pacing.
    pub streaming: StreamingConfig,

    /// Batch envelope processing.
    pub batch: BatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Size of the single read performed per connection.
    pub read_buffer_size: usize,

    /// How long a connection may stay silent before it is closed, in seconds.
    pub read_timeout_secs: u64,
}

impl ListenerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
            read_buffer_size: 4096,
            read_timeout_secs: 30,
        }
    }
}

/// Authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token expected after the `Bearer ` prefix of the `Authorization` header.
    pub bearer_token: String,

    /// Also require the credential on `/stream-response`.
    pub gate_streaming: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bearer_token: "token".to_string(),
            gate_streaming: false,
        }
    }
}

impl AuthConfig {
    /// Full header value a request must carry.
    pub fn expected_header(&self) -> String {
        format!("Bearer {}", self.bearer_token)
    }
}

/// A single canned `(body, status)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CannedResponse {
    pub body: String,
    pub status: u16,
}

impl CannedResponse {
    pub fn new(body: impl Into<String>, status: u16) -> Self {
        Self {
            body: body.into(),
            status,
        }
    }
}

/// Canned response sequence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CannedConfig {
    /// Ordered responses; consumed front to back.
    pub responses: Vec<CannedResponse>,
}

impl Default for CannedConfig {
    fn default() -> Self {
        Self {
            responses: vec![
                CannedResponse::new("Hello, World!", 200),
                CannedResponse::new("Not Found", 404),
                CannedResponse::new("Internal Server Error", 500),
            ],
        }
    }
}

/// Chunked streaming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Fragments emitted in order, one chunk each.
    pub fragments: Vec<String>,

    /// Pause between chunks in milliseconds.
    pub chunk_delay_ms: u64,
}

impl StreamingConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        let fragments = [
            "Once upon a time, ",
            "in a small village, ",
            "there lived kind villagers. ",
            "They loved welcoming travelers. ",
            "One sunny morning, ",
            "a weary traveler arrived. ",
            "He was greeted warmly, ",
            "given food and shelter. ",
            "The traveler shared stories ",
            "of distant lands and adventures. ",
            "The villagers listened eagerly ",
            "and enjoyed his tales. ",
            "He decided to stay, ",
            "building a small house. ",
            "He planted a garden ",
            "with fresh vegetables and herbs. ",
        ];

        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            chunk_delay_ms: 250,
        }
    }
}

/// Order in which batch results are written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOrdering {
    /// Results appear as their units finish.
    #[default]
    Completion,
    /// Results are re-sorted to match the request array.
    Input,
}

/// Inclusive millisecond range used for random delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct JitterRange(pub u64, pub u64);

impl JitterRange {
    pub fn min(&self) -> u64 {
        self.0
    }

    pub fn max(&self) -> u64 {
        self.1
    }

    pub fn is_valid(&self) -> bool {
        self.0 <= self.1
    }
}

/// Batch dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Delay applied to each item as it is admitted.
    pub admission_jitter_ms: JitterRange,

    /// Simulated processing time of each item.
    pub processing_jitter_ms: JitterRange,

    /// Result ordering policy.
    pub ordering: BatchOrdering,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            admission_jitter_ms: JitterRange(100, 500),
            processing_jitter_ms: JitterRange(500, 1500),
            ordering: BatchOrdering::Completion,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_design() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.auth.expected_header(), "Bearer token");
        assert_eq!(config.canned.responses.len(), 3);
        assert_eq!(config.canned.responses[0], CannedResponse::new("Hello, World!", 200));
        assert_eq!(config.streaming.fragments.len(), 16);
        assert_eq!(config.streaming.chunk_delay(), Duration::from_millis(250));
        assert_eq!(config.batch.ordering, BatchOrdering::Completion);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "0.0.0.0:9000"

            [batch]
            ordering = "input"
            processing_jitter_ms = [1, 2]
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(config.listener.read_buffer_size, 4096);
        assert_eq!(config.batch.ordering, BatchOrdering::Input);
        assert_eq!(config.batch.processing_jitter_ms, JitterRange(1, 2));
        assert_eq!(config.batch.admission_jitter_ms, JitterRange(100, 500));
        assert_eq!(config.auth.bearer_token, "token");
    }
}
