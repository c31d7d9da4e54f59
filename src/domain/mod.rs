//! Domain layer - Core call rules
//!
//! This layer contains:
//! - The call aggregate and its events
//! - Value objects (identity, mute flags, decline reasons)
//! - The signaling gateway port, implemented by the infrastructure layer

pub mod call;
pub mod gateway;
pub mod mute;
pub mod shared;

// Re-export commonly used types
pub use shared::{DomainError, Result};
