//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Authorized Request (method, path, headers)
//!     → router.rs (route lookup, fixed rule order)
//!     → canned.rs (finite response sequence for /generate-response)
//!     → Return: buffered Response or hand-off to the stream engine
//! ```
//!
//! # Design Decisions
//! - Tagged route variants instead of a handler hierarchy
//! - Deterministic: same input always matches same route
//! - Canned sequence never wraps; exhaustion is an explicit error

pub mod canned;
pub mod router;

pub use canned::{CannedSequence, SequenceExhausted};
pub use router::{Handled, Route, RouteError, Router, GENERATE_PATH, STREAM_PATH};
