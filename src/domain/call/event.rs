//! Call domain events

use crate::domain::call::entity::Call;
use crate::domain::call::value_object::Decline;
use crate::domain::shared::events::{DomainEvent, EventMetadata};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A new incoming call was created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomingCall {
    pub metadata: EventMetadata,
    pub call: Call,
}

impl DomainEvent for IncomingCall {
    fn event_type(&self) -> &'static str {
        "call.incoming"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }
}

/// The active (or just terminated) call changed state
///
/// `decline` is present exactly when `call.state` is `declined`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallStateChange {
    pub metadata: EventMetadata,
    pub call: Call,
    pub decline: Option<Decline>,
}

impl DomainEvent for CallStateChange {
    fn event_type(&self) -> &'static str {
        "call.state_change"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }
}

/// Union of all events delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    IncomingCall(IncomingCall),
    CallStateChange(CallStateChange),
}

impl ClientEvent {
    pub fn incoming_call(call: Call) -> Self {
        ClientEvent::IncomingCall(IncomingCall {
            metadata: EventMetadata::new("call.incoming"),
            call,
        })
    }

    pub fn state_change(call: Call, decline: Option<Decline>) -> Self {
        ClientEvent::CallStateChange(CallStateChange {
            metadata: EventMetadata::new("call.state_change"),
            call,
            decline,
        })
    }

    pub fn call(&self) -> &Call {
        match self {
            ClientEvent::IncomingCall(e) => &e.call,
            ClientEvent::CallStateChange(e) => &e.call,
        }
    }

    pub fn decline(&self) -> Option<&Decline> {
        match self {
            ClientEvent::IncomingCall(_) => None,
            ClientEvent::CallStateChange(e) => e.decline.as_ref(),
        }
    }
}

impl DomainEvent for ClientEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::IncomingCall(e) => e.event_type(),
            ClientEvent::CallStateChange(e) => e.event_type(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ClientEvent::IncomingCall(e) => e.occurred_at(),
            ClientEvent::CallStateChange(e) => e.occurred_at(),
        }
    }
}
