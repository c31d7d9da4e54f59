//! Signaling gateway implementations
pub mod simulated;

pub use simulated::SimulatedGateway;
