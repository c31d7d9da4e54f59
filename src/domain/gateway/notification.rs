//! Push notifications delivered by the gateway

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque negotiation payload (offer/answer), passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jsep(serde_json::Value);

impl Jsep {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Gateway error codes the controller understands
///
/// Numbering follows the videocall plugin of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayErrorCode {
    /// 478: no registrant with that identity
    DestinationDoesNotExist,
    /// 479: the gateway refuses calls to oneself
    SelfCallRejected,
    Other(u16),
}

impl GatewayErrorCode {
    pub fn from_code(code: u16) -> Self {
        match code {
            478 => GatewayErrorCode::DestinationDoesNotExist,
            479 => GatewayErrorCode::SelfCallRejected,
            other => GatewayErrorCode::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            GatewayErrorCode::DestinationDoesNotExist => 478,
            GatewayErrorCode::SelfCallRejected => 479,
            GatewayErrorCode::Other(code) => *code,
        }
    }
}

impl fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Raw notification pushed by the gateway
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayNotification {
    /// Someone is calling us; `jsep` is their offer
    IncomingCall { from: String, jsep: Jsep },
    /// The callee accepted; `jsep` is their answer, if any
    Accepted { jsep: Option<Jsep> },
    /// The remote side wants to renegotiate media
    Renegotiation { jsep: Jsep },
    /// The call ended on the gateway side
    Hangup { reason: String },
    /// Asynchronous error for the last request
    Error { code: GatewayErrorCode, reason: String },
}

impl GatewayNotification {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayNotification::IncomingCall { .. } => "incomingcall",
            GatewayNotification::Accepted { .. } => "accepted",
            GatewayNotification::Renegotiation { .. } => "update",
            GatewayNotification::Hangup { .. } => "hangup",
            GatewayNotification::Error { .. } => "error",
        }
    }
}
