//! Signaling/transport client interface

use super::notification::{GatewayErrorCode, GatewayNotification, Jsep};
use crate::domain::shared::value_objects::{Identity, SessionId};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Push channel returned by [`SignalingTransport::connect`]
pub type NotificationStream = mpsc::UnboundedReceiver<GatewayNotification>;

/// The collaborator rejected a request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("not connected to the gateway")]
    NotConnected,

    #[error("gateway error {code}: {reason}")]
    Gateway {
        code: GatewayErrorCode,
        reason: String,
    },

    #[error("request failed: {0}")]
    Request(String),
}

/// Control requests sent to the gateway
#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    /// Announce our identity
    Register { username: Identity },
    /// Terminate the current call
    Hangup,
}

impl ControlRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlRequest::Register { .. } => "register",
            ControlRequest::Hangup => "hangup",
        }
    }
}

/// Handle on a negotiation started by [`SignalingTransport::begin_negotiation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationHandle {
    pub session_id: SessionId,
}

/// Signaling/transport client
///
/// Timeouts are the implementation's business; every method resolves
/// eventually with success or a [`TransportError`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Open the gateway connection and attach the signaling capability
    async fn connect(&self, identity: &Identity) -> Result<NotificationStream, TransportError>;

    /// Create a local offer and ask the gateway to call `target`
    async fn begin_negotiation(&self, target: &Identity)
        -> Result<NegotiationHandle, TransportError>;

    /// Answer an incoming offer
    async fn complete_negotiation(&self, incoming: &Jsep) -> Result<(), TransportError>;

    /// Hand a remote payload (answer or renegotiation offer) to the media stack
    async fn apply_remote(&self, jsep: &Jsep) -> Result<(), TransportError>;

    async fn send_control(&self, request: ControlRequest) -> Result<(), TransportError>;

    /// Tear down the gateway session
    async fn terminate(&self) -> Result<(), TransportError>;

    /// Enable or disable the local audio source
    async fn set_outbound_enabled(&self, enabled: bool) -> Result<(), TransportError>;
}
