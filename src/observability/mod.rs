//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured key/value fields)
//!     → per-connection spans (connection_id, request_id, peer_addr)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, filtered by level)
//! ```

pub mod logging;

pub use logging::init_logging;
