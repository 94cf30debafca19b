//! Shared library for RECAP microservices
//!
//! Provides the common error type, configuration loading, the event bus
//! used for cross-component notification, and SSE helpers.

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
