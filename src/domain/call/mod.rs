//! Call bounded context - the single call and its lifecycle

pub mod aggregate;
pub mod entity;
pub mod event;
pub mod value_object;

pub use aggregate::CallSession;
pub use entity::Call;
pub use event::{CallStateChange, ClientEvent, IncomingCall};
pub use value_object::{CallDirection, CallState, Decline, DeclineReason};
