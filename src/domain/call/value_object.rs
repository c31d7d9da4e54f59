//! Call value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Call direction, fixed when the call is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// The gateway told us someone is calling
    Incoming,
    /// We placed the call
    Outgoing,
}

/// Call state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    /// Ringing, nobody has answered yet
    Unanswered,
    /// Media path established
    Accepted,
    /// Ended before being answered
    Declined,
    /// Ended after being answered
    Finished,
}

impl CallState {
    /// Check if state transition is valid
    pub fn can_transition_to(&self, new_state: CallState) -> bool {
        use CallState::*;

        matches!(
            (self, new_state),
            (Unanswered, Accepted) | (Unanswered, Declined) | (Accepted, Finished)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Declined | CallState::Finished)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Unanswered => "unanswered",
            CallState::Accepted => "accepted",
            CallState::Declined => "declined",
            CallState::Finished => "finished",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a call was declined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclineReason {
    WeDeclinedIncoming,
    TheyDeclinedIncoming,
    Busy,
    Error,
    Other,
}

impl DeclineReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclineReason::WeDeclinedIncoming => "weDeclinedIncoming",
            DeclineReason::TheyDeclinedIncoming => "theyDeclinedIncoming",
            DeclineReason::Busy => "busy",
            DeclineReason::Error => "error",
            DeclineReason::Other => "other",
        }
    }
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explanation attached to a transition to [`CallState::Declined`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decline {
    pub reason: DeclineReason,
    pub message: Option<String>,
}

impl Decline {
    pub fn new(reason: DeclineReason) -> Self {
        Self {
            reason,
            message: None,
        }
    }

    pub fn with_message(reason: DeclineReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_state_transitions() {
        let unanswered = CallState::Unanswered;
        assert!(unanswered.can_transition_to(CallState::Accepted));
        assert!(unanswered.can_transition_to(CallState::Declined));
        assert!(!unanswered.can_transition_to(CallState::Finished));

        let accepted = CallState::Accepted;
        assert!(accepted.can_transition_to(CallState::Finished));
        assert!(!accepted.can_transition_to(CallState::Declined));
        assert!(!accepted.can_transition_to(CallState::Unanswered));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [CallState::Declined, CallState::Finished] {
            assert!(terminal.is_terminal());
            for next in [
                CallState::Unanswered,
                CallState::Accepted,
                CallState::Declined,
                CallState::Finished,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!CallState::Unanswered.is_terminal());
        assert!(!CallState::Accepted.is_terminal());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&DeclineReason::TheyDeclinedIncoming).unwrap(),
            "\"theyDeclinedIncoming\""
        );
        assert_eq!(serde_json::to_string(&CallState::Unanswered).unwrap(), "\"unanswered\"");
        assert_eq!(serde_json::to_string(&CallDirection::Outgoing).unwrap(), "\"outgoing\"");
    }
}
