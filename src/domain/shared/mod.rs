//! Shared kernel - Common types used across the controller

pub mod error;
pub mod events;
pub mod result;
pub mod value_objects;

pub use error::DomainError;
pub use events::{DomainEvent, EventMetadata};
pub use result::Result;
pub use value_objects::*;
