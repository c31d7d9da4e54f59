//! Hackaphone - a voice calling client built with Rust
//!
//! This is a Domain-Driven Design (DDD) implementation of a call session
//! controller: register a short numeric identity with a signaling gateway,
//! then place or receive one voice call at a time.

#![deny(unused_doc_comments)]

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{CallingClient, Subscription};
pub use domain::call::{Call, CallDirection, CallState, ClientEvent, Decline, DeclineReason};
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
