//! Call State Machine
//!
//! Applies local actions and translated gateway notifications to the single
//! call. Every check-and-mutate runs under the controller lock; the lock is
//! released before any transport round trip so notifications can be applied
//! while a request is outstanding.
//!
//! Events recorded under the lock go to an outbox. After the lock is
//! released, one flusher at a time drains the outbox into the event bus, so
//! events reach subscribers in the order the state changed and handlers are
//! free to read the controller.

use super::event_bus::EventBus;
use super::mute::MuteController;
use super::state::{ControllerState, InFlight, LocalAction, SharedState};
use super::translator::{GatewayEventTranslator, Translation};
use crate::domain::call::{Call, CallDirection, CallSession, CallState, ClientEvent, Decline, DeclineReason};
use crate::domain::gateway::{ControlRequest, GatewayNotification, Jsep, SignalingTransport};
use crate::domain::mute::MuteFlags;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, Identity};
use crate::infrastructure::metrics;
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{debug, info, warn};

/// Transport work left over once a notification has been applied
enum FollowUp {
    Nothing,
    Accepted(Option<Jsep>),
    Forward(Jsep),
}

#[derive(Clone)]
pub struct CallStateMachine {
    state: SharedState,
    transport: Arc<dyn SignalingTransport>,
    bus: EventBus,
    mute: MuteController,
    /// Held by whoever is draining the outbox
    delivering: Arc<Mutex<()>>,
}

impl CallStateMachine {
    pub(crate) fn new(
        state: SharedState,
        transport: Arc<dyn SignalingTransport>,
        bus: EventBus,
        mute: MuteController,
    ) -> Self {
        Self {
            state,
            transport,
            bus,
            mute,
            delivering: Arc::new(Mutex::new(())),
        }
    }

    /// Snapshot of the active call
    pub fn active_call(&self) -> Option<Call> {
        self.state.lock().session.as_ref().map(|s| s.call().clone())
    }

    /// Place a call to `to`
    ///
    /// The call exists (and its `unanswered` event is out) before the
    /// transport is asked to negotiate, so a failure or hangup notification
    /// racing the request always finds it.
    pub async fn start_outgoing_call(&self, to: Identity) -> Result<()> {
        let call_id = {
            let mut state = self.state.lock();
            let from = state.identity.clone().ok_or(DomainError::NotRegistered)?;
            if state.session.is_some() {
                return Err(DomainError::CallInProgress);
            }

            let session = CallSession::outgoing(from, to.clone());
            let call_id = session.id();
            state.session = Some(session);
            Self::settle(&mut state);
            call_id
        };
        self.flush();
        info!("Calling {} (call {})", to, call_id);
        metrics::record_call_placed();

        match self.transport.begin_negotiation(&to).await {
            Ok(handle) => {
                debug!("Negotiation {} started for call {}", handle.session_id, call_id);
                Ok(())
            }
            Err(err) => {
                warn!("Negotiation for call {} failed: {}", call_id, err);
                let decline = GatewayEventTranslator::decline_for_transport_error(&err);
                let declined = self.apply_to(call_id, |session| match session.state() {
                    CallState::Unanswered => session.decline(decline),
                    _ => Ok(()),
                });
                if let Err(e) = declined {
                    warn!("Could not decline call {}: {}", call_id, e);
                }
                Err(err.into())
            }
        }
    }

    /// Answer the incoming call with the offer cached from its notification
    ///
    /// Only one accept runs per call; a second one fails with
    /// `NoIncomingCall` before reaching the transport.
    pub async fn accept_incoming(&self) -> Result<()> {
        let (call_id, offer) = {
            let mut state = self.state.lock();
            if state.identity.is_none() {
                return Err(DomainError::NotRegistered);
            }
            let (call_id, offer) = match state.session.as_ref() {
                Some(session) if session.is_incoming_unanswered() => {
                    (session.id(), session.remote_jsep().cloned())
                }
                _ => return Err(DomainError::NoIncomingCall),
            };
            let offer = offer.ok_or(DomainError::NoIncomingCall)?;
            if !state.begin(LocalAction::Accept, call_id) {
                return Err(DomainError::NoIncomingCall);
            }
            (call_id, offer)
        };
        let _accepting = InFlight::adopt(&self.state, LocalAction::Accept, call_id);

        // On failure the call stays unanswered and nothing is emitted
        self.transport.complete_negotiation(&offer).await?;

        let accepted = {
            let mut state = self.state.lock();
            let ringing = state
                .session
                .as_ref()
                .is_some_and(|s| s.id() == call_id && s.is_incoming_unanswered());
            if ringing {
                Self::accept_active(&mut state)?;
            }
            ringing
        };
        self.flush();

        if !accepted {
            warn!("Call {} ended while it was being accepted", call_id);
            return Err(DomainError::NoIncomingCall);
        }
        info!("Accepted call {}", call_id);
        self.mute.sync_outbound().await;
        Ok(())
    }

    /// Ask the gateway to end the call, then close it locally
    ///
    /// A second hangup while the first waits on the gateway fails with
    /// `NoActiveCall`.
    pub async fn hangup(&self) -> Result<()> {
        let call_id = {
            let mut state = self.state.lock();
            if state.identity.is_none() {
                return Err(DomainError::NotRegistered);
            }
            let call_id = state
                .session
                .as_ref()
                .map(CallSession::id)
                .ok_or(DomainError::NoActiveCall)?;
            if !state.begin(LocalAction::Hangup, call_id) {
                return Err(DomainError::NoActiveCall);
            }
            call_id
        };
        let _hanging_up = InFlight::adopt(&self.state, LocalAction::Hangup, call_id);

        self.transport.send_control(ControlRequest::Hangup).await?;

        let closed = self.apply_to(call_id, |session| match session.state() {
            CallState::Unanswered => session.decline(Self::local_decline(session.direction())),
            _ => session.finish(),
        })?;
        if closed {
            info!("Hung up call {}", call_id);
        } else {
            debug!("Call {} was already closed by the gateway", call_id);
        }
        Ok(())
    }

    /// Apply a gateway notification
    pub async fn on_gateway_event(&self, notification: GatewayNotification) {
        let kind = notification.kind();
        let follow_up = {
            let mut state = self.state.lock();
            let Some(own) = state.identity.clone() else {
                debug!("Dropping {} notification: not registered", kind);
                return;
            };

            let current = state.session.as_ref().map(CallSession::call);
            match GatewayEventTranslator::translate(notification, &own, current) {
                Translation::CreateIncoming { from, to, offer } => {
                    info!("Incoming call from {}", from);
                    state.session = Some(CallSession::incoming(from, to, offer));
                    Self::settle(&mut state);
                    FollowUp::Nothing
                }
                Translation::Accept { answer } => {
                    match Self::accept_active(&mut state) {
                        Ok(true) => FollowUp::Accepted(answer),
                        Ok(false) => FollowUp::Nothing,
                        Err(e) => {
                            warn!("Ignoring {} notification: {}", kind, e);
                            FollowUp::Nothing
                        }
                    }
                }
                Translation::Decline(decline) => {
                    if let Err(e) = Self::transition(&mut state, |s| s.decline(decline)) {
                        warn!("Ignoring {} notification: {}", kind, e);
                    }
                    FollowUp::Nothing
                }
                Translation::Finish => {
                    if let Err(e) = Self::transition(&mut state, CallSession::finish) {
                        warn!("Ignoring {} notification: {}", kind, e);
                    }
                    FollowUp::Nothing
                }
                Translation::Renegotiate { offer } => FollowUp::Forward(offer),
                Translation::Ignore { reason } => {
                    debug!("Ignoring {} notification: {}", kind, reason);
                    FollowUp::Nothing
                }
            }
        };
        self.flush();

        match follow_up {
            FollowUp::Nothing => {}
            FollowUp::Accepted(answer) => {
                if let Some(answer) = answer {
                    if let Err(e) = self.transport.apply_remote(&answer).await {
                        warn!("Transport rejected the remote answer: {}", e);
                    }
                }
                self.mute.sync_outbound().await;
            }
            FollowUp::Forward(offer) => {
                if let Err(e) = self.transport.apply_remote(&offer).await {
                    warn!("Transport rejected the renegotiation: {}", e);
                }
            }
        }
    }

    /// Close whatever call is active without talking to the gateway
    pub(crate) fn close_active_call(&self, message: &str) {
        let result = {
            let mut state = self.state.lock();
            Self::transition(&mut state, |session| match session.state() {
                CallState::Unanswered => {
                    session.decline(Decline::with_message(DeclineReason::Other, message))
                }
                _ => session.finish(),
            })
        };
        self.flush();

        if let Err(e) = result {
            warn!("Could not close the active call: {}", e);
        }
    }

    /// Accept the active call, resetting the mute flags in the same step
    fn accept_active(state: &mut ControllerState) -> Result<bool> {
        let accepted = Self::transition(state, CallSession::accept)?;
        if accepted {
            state.mute = MuteFlags::default();
        }
        Ok(accepted)
    }

    fn local_decline(direction: CallDirection) -> Decline {
        match direction {
            CallDirection::Incoming => Decline::new(DeclineReason::WeDeclinedIncoming),
            CallDirection::Outgoing => Decline::with_message(DeclineReason::Other, "call cancelled"),
        }
    }

    /// Run `transition` on the call `call_id` if it is still the active one
    fn apply_to<F>(&self, call_id: CallId, transition: F) -> Result<bool>
    where
        F: FnOnce(&mut CallSession) -> Result<()>,
    {
        let applied = {
            let mut state = self.state.lock();
            if state.session.as_ref().map(CallSession::id) == Some(call_id) {
                Self::transition(&mut state, transition)?
            } else {
                false
            }
        };
        self.flush();
        Ok(applied)
    }

    /// Run `transition` on the active call; `false` if there is none
    fn transition<F>(state: &mut ControllerState, transition: F) -> Result<bool>
    where
        F: FnOnce(&mut CallSession) -> Result<()>,
    {
        let Some(session) = state.session.as_mut() else {
            return Ok(false);
        };
        transition(session)?;
        Self::settle(state);
        Ok(true)
    }

    /// Move recorded events to the outbox and drop the call once terminal
    fn settle(state: &mut ControllerState) {
        let Some(session) = state.session.as_mut() else {
            return;
        };

        let events = session.take_events();
        let terminal = session.is_terminal();
        let call_id = session.id();
        let new_state = session.state();

        for event in &events {
            metrics::record_event(event);
        }
        state.outbox.extend(events);

        if terminal {
            state.session = None;
            debug!("Call {} cleared ({})", call_id, new_state);
        }
        metrics::set_active_calls(state.session.is_some());
    }

    /// Publish pending events in order
    fn flush(&self) {
        loop {
            let delivering = match self.delivering.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                // The current flusher will pick our events up
                Err(TryLockError::WouldBlock) => return,
            };

            while let Some(event) = self.next_pending() {
                self.bus.publish(&event);
            }
            drop(delivering);

            // Events queued while we held the flag but after our last pop
            if self.state.lock().outbox.is_empty() {
                return;
            }
        }
    }

    fn next_pending(&self) -> Option<ClientEvent> {
        self.state.lock().outbox.pop_front()
    }
}
