//! Domain errors

use crate::domain::gateway::TransportError;
use thiserror::Error;

/// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Not registered")]
    NotRegistered,

    #[error("Already registered as {0}")]
    AlreadyRegistered(String),

    #[error("No active call")]
    NoActiveCall,

    #[error("No incoming call")]
    NoIncomingCall,

    #[error("Call already in progress")]
    CallInProgress,

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
