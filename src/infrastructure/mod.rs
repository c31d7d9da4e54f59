//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Signaling gateway implementations
//! - Metrics recording and export

pub mod gateway;
pub mod metrics;
