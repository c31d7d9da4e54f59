//! Session Manager - the public call session controller
//!
//! Owns the registration lifecycle with the gateway and composes the event
//! bus, mute controller and call state machine. Construct one per process
//! and share it (e.g. behind an `Arc`) with whoever drives the UI.

use super::event_bus::{EventBus, Subscription};
use super::mute::MuteController;
use super::state::SharedState;
use super::state_machine::CallStateMachine;
use crate::config::ClientConfig;
use crate::domain::call::{Call, ClientEvent};
use crate::domain::gateway::{ControlRequest, NotificationStream, SignalingTransport};
use crate::domain::mute::MuteFlags;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::Identity;
use crate::infrastructure::metrics;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct CallingClient {
    config: ClientConfig,
    transport: Arc<dyn SignalingTransport>,
    state: SharedState,
    bus: EventBus,
    mute: MuteController,
    machine: CallStateMachine,
    /// Task draining gateway notifications into the state machine
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl CallingClient {
    pub fn new(transport: Arc<dyn SignalingTransport>, config: ClientConfig) -> Self {
        let state = SharedState::default();
        let bus = EventBus::default();
        let mute = MuteController::new(state.clone(), transport.clone());
        let machine = CallStateMachine::new(state.clone(), transport.clone(), bus.clone(), mute.clone());

        Self {
            config,
            transport,
            state,
            bus,
            mute,
            machine,
            pump: Mutex::new(None),
        }
    }

    /// Register under `identity`
    ///
    /// Validates the identity, connects, then announces it to the gateway.
    /// Any failure leaves the client unregistered. Callers must not race two
    /// registrations.
    pub async fn register(&self, identity: &str) -> Result<()> {
        let identity = Identity::parse(identity, self.config.identity_length)?;
        if let Some(current) = self.identity() {
            return Err(DomainError::AlreadyRegistered(current.to_string()));
        }

        let notifications = match self.transport.connect(&identity).await {
            Ok(notifications) => notifications,
            Err(e) => {
                warn!("Failed to connect as {}: {}", identity, e);
                metrics::record_registration(false);
                return Err(e.into());
            }
        };

        let request = ControlRequest::Register {
            username: identity.clone(),
        };
        if let Err(e) = self.transport.send_control(request).await {
            warn!("Gateway refused registration of {}: {}", identity, e);
            if let Err(teardown) = self.transport.terminate().await {
                warn!("Failed to tear down the gateway session: {}", teardown);
            }
            metrics::record_registration(false);
            return Err(e.into());
        }

        self.state.lock().identity = Some(identity.clone());
        self.spawn_pump(notifications);
        metrics::record_registration(true);
        info!("Registered as {}", identity);
        Ok(())
    }

    /// Leave the gateway
    ///
    /// An active call is closed locally first. The client is unregistered
    /// afterwards even if the gateway teardown fails; that failure is still
    /// returned.
    pub async fn unregister(&self) -> Result<()> {
        let identity = self.require_registered()?;

        let pump = self.pump_slot().take();
        if let Some(pump) = pump {
            pump.abort();
        }
        self.machine.close_active_call("disconnected");
        self.state.lock().identity = None;
        info!("Unregistered {}", identity);

        self.transport.terminate().await?;
        Ok(())
    }

    /// Call `number`
    ///
    /// Returns once the gateway started ringing the callee; whether they
    /// answer is reported through events.
    pub async fn call(&self, number: &str) -> Result<()> {
        self.require_registered()?;
        let target = Identity::parse(number, self.config.identity_length)?;
        self.machine.start_outgoing_call(target).await
    }

    pub async fn accept_incoming(&self) -> Result<()> {
        self.require_registered()?;
        self.machine.accept_incoming().await
    }

    /// Decline an unanswered call or end an accepted one
    pub async fn hangup(&self) -> Result<()> {
        self.require_registered()?;
        self.machine.hangup().await
    }

    pub async fn set_outbound_muted(&self, muted: bool) -> Result<()> {
        self.require_registered()?;
        self.mute.set_outbound_muted(muted).await
    }

    pub fn set_inbound_muted(&self, muted: bool) -> Result<()> {
        self.require_registered()?;
        self.mute.set_inbound_muted(muted);
        Ok(())
    }

    pub fn active_call(&self) -> Option<Call> {
        self.machine.active_call()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.lock().identity.clone()
    }

    pub fn mute_flags(&self) -> MuteFlags {
        self.mute.flags()
    }

    pub fn is_outbound_muted(&self) -> bool {
        self.mute_flags().outbound_muted
    }

    pub fn is_inbound_muted(&self) -> bool {
        self.mute_flags().inbound_muted
    }

    /// Register an event handler
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    /// Events as an async stream
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.bus.stream()
    }

    fn require_registered(&self) -> Result<Identity> {
        self.identity().ok_or(DomainError::NotRegistered)
    }

    fn spawn_pump(&self, mut notifications: NotificationStream) {
        let machine = self.machine.clone();
        let handle = tokio::spawn(async move {
            while let Some(notification) = notifications.recv().await {
                machine.on_gateway_event(notification).await;
            }
            debug!("Gateway notification stream closed");
        });

        if let Some(previous) = self.pump_slot().replace(handle) {
            previous.abort();
        }
    }

    fn pump_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pump.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CallingClient {
    fn drop(&mut self) {
        if let Some(pump) = self.pump_slot().take() {
            pump.abort();
        }
    }
}
