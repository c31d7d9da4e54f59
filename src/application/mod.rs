//! Application layer - the call session controller
//!
//! This layer orchestrates the call aggregate and the gateway port:
//! - Publishing domain events to subscribers
//! - Translating gateway notifications into transitions
//! - Serializing every state mutation behind one lock
//! - Exposing the public controller surface

pub mod event_bus;
pub mod mute;
pub mod session;
pub mod state_machine;
pub mod translator;

mod state;

pub use event_bus::{EventBus, Subscription};
pub use mute::MuteController;
pub use session::CallingClient;
pub use state_machine::CallStateMachine;
pub use translator::{GatewayEventTranslator, Translation};
