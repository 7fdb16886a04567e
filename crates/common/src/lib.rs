//! Overlay Engine Common Utilities
//!
//! Shared infrastructure for all overlay engine crates:
//! - Error types and result aliases
//! - Stream clock and per-frame budget timing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
