//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffer sizes, jitter ranges, limits)
//! - Reject content the handlers cannot serve (empty canned sequence)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ServerConfig;

pub const MIN_READ_BUFFER: usize = 64;
pub const MAX_READ_BUFFER: usize = 64 * 1024;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a valid socket address")]
    BindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    MaxConnections,

    #[error("listener.read_buffer_size {0} outside {min}..={max}", min = MIN_READ_BUFFER, max = MAX_READ_BUFFER)]
    ReadBufferSize(usize),

    #[error("listener.read_timeout_secs must be greater than zero")]
    ReadTimeout,

    #[error("auth.bearer_token must not be empty")]
    EmptyToken,

    #[error("canned.responses must contain at least one entry")]
    EmptyCannedSequence,

    #[error("canned.responses[{index}] has invalid status {status}")]
    CannedStatus { index: usize, status: u16 },

    #[error("streaming.fragments[{0}] is empty and would encode as the terminal chunk")]
    EmptyFragment(usize),

    #[error("{field} range [{min}, {max}] is inverted")]
    JitterRange {
        field: &'static str,
        min: u64,
        max: u64,
    },
}

/// Check every section of the configuration and collect all problems.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(listener.bind_address.clone()));
    }
    if listener.max_connections == 0 {
        errors.push(ValidationError::MaxConnections);
    }
    if !(MIN_READ_BUFFER..=MAX_READ_BUFFER).contains(&listener.read_buffer_size) {
        errors.push(ValidationError::ReadBufferSize(listener.read_buffer_size));
    }
    if listener.read_timeout_secs == 0 {
        errors.push(ValidationError::ReadTimeout);
    }

    if config.auth.bearer_token.is_empty() {
        errors.push(ValidationError::EmptyToken);
    }

    if config.canned.responses.is_empty() {
        errors.push(ValidationError::EmptyCannedSequence);
    }
    for (index, canned) in config.canned.responses.iter().enumerate() {
        if !(100..=999).contains(&canned.status) {
            errors.push(ValidationError::CannedStatus {
                index,
                status: canned.status,
            });
        }
    }

    // A zero-length chunk is the stream terminator.
    for (index, fragment) in config.streaming.fragments.iter().enumerate() {
        if fragment.is_empty() {
            errors.push(ValidationError::EmptyFragment(index));
        }
    }

    for (field, range) in [
        ("batch.admission_jitter_ms", config.batch.admission_jitter_ms),
        ("batch.processing_jitter_ms", config.batch.processing_jitter_ms),
    ] {
        if !range.is_valid() {
            errors.push(ValidationError::JitterRange {
                field,
                min: range.min(),
                max: range.max(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
