//! Controller state behind the single mutual-exclusion boundary

use crate::domain::call::{CallSession, ClientEvent};
use crate::domain::mute::MuteFlags;
use crate::domain::shared::value_objects::{CallId, Identity};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Local actions that talk to the gateway before touching the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalAction {
    Accept,
    Hangup,
}

/// Everything the controller mutates
#[derive(Debug, Default)]
pub(crate) struct ControllerState {
    /// Set once registration succeeds
    pub identity: Option<Identity>,
    /// At most one call, cleared as soon as it becomes terminal
    pub session: Option<CallSession>,
    pub mute: MuteFlags,
    /// Events recorded under the lock, published after it is released
    pub outbox: VecDeque<ClientEvent>,
    /// Call an `accept_incoming` is negotiating for
    pub accepting: Option<CallId>,
    /// Call a `hangup` is waiting on the gateway for
    pub hanging_up: Option<CallId>,
}

impl ControllerState {
    pub fn in_flight(&mut self, action: LocalAction) -> &mut Option<CallId> {
        match action {
            LocalAction::Accept => &mut self.accepting,
            LocalAction::Hangup => &mut self.hanging_up,
        }
    }

    /// Claim `action` on `call_id`; `false` if it is already claimed
    pub fn begin(&mut self, action: LocalAction, call_id: CallId) -> bool {
        let slot = self.in_flight(action);
        if *slot == Some(call_id) {
            return false;
        }
        *slot = Some(call_id);
        true
    }
}

/// Shared handle on [`ControllerState`]
///
/// The guard is a std mutex guard: it must never be held across an await.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedState(Arc<Mutex<ControllerState>>);

impl SharedState {
    pub fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases a claim made with [`ControllerState::begin`] when dropped
pub(crate) struct InFlight {
    state: SharedState,
    action: LocalAction,
    call_id: CallId,
}

impl InFlight {
    /// Take over a claim already made under the lock
    ///
    /// Must be created after that lock guard is gone.
    pub fn adopt(state: &SharedState, action: LocalAction, call_id: CallId) -> Self {
        Self {
            state: state.clone(),
            action,
            call_id,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        let slot = state.in_flight(self.action);
        if *slot == Some(self.call_id) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_are_exclusive_per_action() {
        let state = SharedState::default();
        let call_id = CallId::new();

        assert!(state.lock().begin(LocalAction::Accept, call_id));
        assert!(!state.lock().begin(LocalAction::Accept, call_id));
        assert!(state.lock().begin(LocalAction::Hangup, call_id));

        drop(InFlight::adopt(&state, LocalAction::Accept, call_id));
        assert!(state.lock().accepting.is_none());
        assert_eq!(state.lock().hanging_up, Some(call_id));
    }

    #[test]
    fn test_release_leaves_newer_claims_alone() {
        let state = SharedState::default();
        let old = CallId::new();
        let new = CallId::new();

        let guard = InFlight::adopt(&state, LocalAction::Hangup, old);
        assert!(state.lock().begin(LocalAction::Hangup, new));
        drop(guard);

        assert_eq!(state.lock().hanging_up, Some(new));
    }
}
