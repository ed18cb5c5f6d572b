//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → accept loop exits → listener dropped → in-flight connections drain → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, release listener, drain
//! - No forced abort: a stream in progress finishes its last chunk

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
