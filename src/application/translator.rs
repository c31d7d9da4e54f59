//! Gateway event translator
//!
//! Pure mapping from gateway notifications to what they mean for the
//! active call. Holds nothing but lookup tables.

use crate::domain::call::{Call, CallDirection, CallState, Decline, DeclineReason};
use crate::domain::gateway::{GatewayErrorCode, GatewayNotification, Jsep, TransportError};
use crate::domain::shared::value_objects::Identity;

/// Hangup reason codes reported while a call is still unanswered
const HANGUP_REASONS: &[(&str, DeclineReason)] = &[
    ("user busy", DeclineReason::Busy),
    ("remote explicit hangup", DeclineReason::TheyDeclinedIncoming),
    ("local explicit hangup", DeclineReason::WeDeclinedIncoming),
];

/// Gateway errors that decline an unanswered call
const DECLINING_ERRORS: &[(GatewayErrorCode, &str)] = &[
    (GatewayErrorCode::DestinationDoesNotExist, "number does not exist"),
    (GatewayErrorCode::SelfCallRejected, "cannot call self"),
];

/// What a notification asks the state machine to do
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// Create an incoming call in `unanswered`
    CreateIncoming {
        from: Identity,
        to: Identity,
        offer: Jsep,
    },
    /// Move the call to `accepted`, then hand the answer to the transport
    Accept { answer: Option<Jsep> },
    Decline(Decline),
    Finish,
    /// Forward to the transport, no state change
    Renegotiate { offer: Jsep },
    /// Nothing to do
    Ignore { reason: &'static str },
}

pub struct GatewayEventTranslator;

impl GatewayEventTranslator {
    /// Translate a notification given our identity and the current call
    pub fn translate(
        notification: GatewayNotification,
        own: &Identity,
        current: Option<&Call>,
    ) -> Translation {
        match notification {
            GatewayNotification::IncomingCall { from, jsep } => match current {
                Some(_) => Translation::Ignore {
                    reason: "already in a call",
                },
                None => Translation::CreateIncoming {
                    from: Identity::from_gateway(from),
                    to: own.clone(),
                    offer: jsep,
                },
            },

            GatewayNotification::Accepted { jsep } => match current {
                Some(call)
                    if call.direction() == CallDirection::Outgoing
                        && call.state() == CallState::Unanswered =>
                {
                    Translation::Accept { answer: jsep }
                }
                Some(call) if call.direction() == CallDirection::Incoming => Translation::Ignore {
                    reason: "incoming calls are accepted locally",
                },
                _ => Translation::Ignore {
                    reason: "no unanswered outgoing call",
                },
            },

            GatewayNotification::Renegotiation { jsep } => match current {
                Some(_) => Translation::Renegotiate { offer: jsep },
                None => Translation::Ignore {
                    reason: "no active call",
                },
            },

            GatewayNotification::Hangup { reason } => match current.map(Call::state) {
                Some(CallState::Unanswered) => {
                    let decline_reason = Self::decline_reason_for(&reason);
                    Translation::Decline(match decline_reason {
                        DeclineReason::Other => Decline::with_message(decline_reason, reason),
                        _ => Decline::new(decline_reason),
                    })
                }
                Some(CallState::Accepted) => Translation::Finish,
                _ => Translation::Ignore {
                    reason: "no active call",
                },
            },

            GatewayNotification::Error { code, .. } => {
                match (current.map(Call::state), Self::decline_for_error(code)) {
                    (Some(CallState::Unanswered), Some(decline)) => Translation::Decline(decline),
                    _ => Translation::Ignore {
                        reason: "error does not affect the call",
                    },
                }
            }
        }
    }

    /// Map a hangup reason code to a decline reason
    pub fn decline_reason_for(reason: &str) -> DeclineReason {
        let reason = reason.trim();
        HANGUP_REASONS
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(reason))
            .map(|(_, decline_reason)| *decline_reason)
            .unwrap_or(DeclineReason::Other)
    }

    /// Decline produced by a gateway error code, if it declines at all
    pub fn decline_for_error(code: GatewayErrorCode) -> Option<Decline> {
        DECLINING_ERRORS
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, message)| Decline::with_message(DeclineReason::Error, *message))
    }

    /// Decline for a call whose negotiation request failed
    pub fn decline_for_transport_error(err: &TransportError) -> Decline {
        match err {
            TransportError::Gateway { code, .. } => Self::decline_for_error(*code)
                .unwrap_or_else(|| Decline::with_message(DeclineReason::Error, err.to_string())),
            _ => Decline::with_message(DeclineReason::Error, err.to_string()),
        }
    }
}
