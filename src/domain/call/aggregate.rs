//! Call aggregate root

use crate::domain::call::entity::Call;
use crate::domain::call::event::ClientEvent;
use crate::domain::call::value_object::{CallDirection, CallState, Decline};
use crate::domain::gateway::Jsep;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, Identity};
use chrono::Utc;

/// Call aggregate root
///
/// Owns the single [`Call`] together with what the controller needs to
/// drive it: the remote offer of an incoming call and the domain events
/// recorded by transitions but not yet published.
#[derive(Debug)]
pub struct CallSession {
    call: Call,
    /// Offer cached from the incoming-call notification
    remote_jsep: Option<Jsep>,
    /// Pending domain events
    events: Vec<ClientEvent>,
}

impl CallSession {
    /// Create an outgoing call in `unanswered`
    pub fn outgoing(from: Identity, to: Identity) -> Self {
        let mut session = Self::new(CallDirection::Outgoing, from, to, None);
        session.record_event(ClientEvent::state_change(session.call.clone(), None));
        session
    }

    /// Create an incoming call in `unanswered`
    pub fn incoming(from: Identity, to: Identity, offer: Jsep) -> Self {
        let mut session = Self::new(CallDirection::Incoming, from, to, Some(offer));
        session.record_event(ClientEvent::incoming_call(session.call.clone()));
        session.record_event(ClientEvent::state_change(session.call.clone(), None));
        session
    }

    fn new(direction: CallDirection, from: Identity, to: Identity, remote_jsep: Option<Jsep>) -> Self {
        Self {
            call: Call {
                id: CallId::new(),
                direction,
                from_number: from,
                to_number: to,
                state: CallState::Unanswered,
                started_at: Utc::now(),
            },
            remote_jsep,
            events: Vec::new(),
        }
    }

    /// Answer the call
    pub fn accept(&mut self) -> Result<()> {
        self.transition_to(CallState::Accepted)?;
        self.record_event(ClientEvent::state_change(self.call.clone(), None));
        Ok(())
    }

    /// End the call before it was answered
    pub fn decline(&mut self, decline: Decline) -> Result<()> {
        self.transition_to(CallState::Declined)?;
        self.record_event(ClientEvent::state_change(self.call.clone(), Some(decline)));
        Ok(())
    }

    /// End an answered call
    pub fn finish(&mut self) -> Result<()> {
        self.transition_to(CallState::Finished)?;
        self.record_event(ClientEvent::state_change(self.call.clone(), None));
        Ok(())
    }

    /// Transition to a new state
    fn transition_to(&mut self, new_state: CallState) -> Result<()> {
        if !self.call.state.can_transition_to(new_state) {
            return Err(DomainError::InvalidStateTransition(format!(
                "Cannot transition from {} to {}",
                self.call.state, new_state
            )));
        }

        self.call.state = new_state;
        Ok(())
    }

    /// Record a domain event
    fn record_event(&mut self, event: ClientEvent) {
        self.events.push(event);
    }

    /// Take all pending events
    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }

    // Getters
    pub fn id(&self) -> CallId {
        self.call.id
    }

    pub fn call(&self) -> &Call {
        &self.call
    }

    pub fn state(&self) -> CallState {
        self.call.state
    }

    pub fn direction(&self) -> CallDirection {
        self.call.direction
    }

    pub fn remote_jsep(&self) -> Option<&Jsep> {
        self.remote_jsep.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.call.state.is_terminal()
    }

    pub fn is_incoming_unanswered(&self) -> bool {
        self.call.direction == CallDirection::Incoming && self.call.state == CallState::Unanswered
    }
}
