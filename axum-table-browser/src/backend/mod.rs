//! Backend abstraction layer
//!
//! This module provides the fixed client-side interface to the hosted service
//! and its implementations.

pub mod postgrest;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the main traits
pub use traits::{Backend, BackendError, Connector};
