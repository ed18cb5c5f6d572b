//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed Request
//!     → auth.rs (bearer-token check on the Authorization header)
//!     → authorized: routing layer
//!     → rejected: 401 "Unauthorized", handler never invoked
//! ```

pub mod auth;

pub use auth::{AuthError, BearerGate, AUTHORIZATION};
