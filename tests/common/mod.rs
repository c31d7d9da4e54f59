//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hackaphone::config::ClientConfig;
use hackaphone::domain::gateway::{
    ControlRequest, GatewayNotification, Jsep, NegotiationHandle, NotificationStream,
    SignalingTransport, TransportError,
};
use hackaphone::domain::shared::value_objects::{Identity, SessionId};
use hackaphone::{CallingClient, ClientEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};

/// Transport operations that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Connect,
    Register,
    Negotiation,
    Accept,
    Hangup,
    Terminate,
    Mute,
}

#[derive(Default)]
struct Script {
    notifier: Option<mpsc::UnboundedSender<GatewayNotification>>,
    failures: HashMap<Op, TransportError>,
    hold_negotiation: bool,
    requests: Vec<&'static str>,
    outbound_enabled: Option<bool>,
}

/// Transport whose answers are scripted by the test
///
/// Accept, control and mute requests yield once before answering, so
/// concurrent local actions interleave on a single-threaded runtime.
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<Script>,
    negotiation_started: Notify,
    negotiation_released: Notify,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later `op` fail with `error`
    pub fn fail(&self, op: Op, error: TransportError) {
        self.script.lock().unwrap().failures.insert(op, error);
    }

    pub fn succeed(&self, op: Op) {
        self.script.lock().unwrap().failures.remove(&op);
    }

    /// Keep `begin_negotiation` pending until [`release_negotiation`](Self::release_negotiation)
    pub fn hold_negotiations(&self) {
        self.script.lock().unwrap().hold_negotiation = true;
    }

    pub fn release_negotiation(&self) {
        self.negotiation_released.notify_one();
    }

    /// Resolves once a `begin_negotiation` request has been received
    pub async fn negotiation_started(&self) {
        tokio::time::timeout(Duration::from_secs(2), self.negotiation_started.notified())
            .await
            .expect("negotiation never started");
    }

    /// Deliver a notification as the gateway would
    pub fn push(&self, notification: GatewayNotification) {
        let script = self.script.lock().unwrap();
        script
            .notifier
            .as_ref()
            .expect("transport not connected")
            .send(notification)
            .expect("notification pump stopped");
    }

    pub fn requests(&self) -> Vec<&'static str> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn outbound_enabled(&self) -> Option<bool> {
        self.script.lock().unwrap().outbound_enabled
    }

    pub fn is_connected(&self) -> bool {
        self.script.lock().unwrap().notifier.is_some()
    }

    fn record(&self, request: &'static str, op: Op) -> Result<(), TransportError> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request);
        match script.failures.get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SignalingTransport for FakeTransport {
    async fn connect(&self, _identity: &Identity) -> Result<NotificationStream, TransportError> {
        self.record("connect", Op::Connect)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().notifier = Some(tx);
        Ok(rx)
    }

    async fn begin_negotiation(
        &self,
        _target: &Identity,
    ) -> Result<NegotiationHandle, TransportError> {
        let outcome = self.record("call", Op::Negotiation);
        let hold = self.script.lock().unwrap().hold_negotiation;
        self.negotiation_started.notify_one();
        if hold {
            self.negotiation_released.notified().await;
        }
        outcome?;
        Ok(NegotiationHandle {
            session_id: SessionId::new(),
        })
    }

    async fn complete_negotiation(&self, _incoming: &Jsep) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        self.record("accept", Op::Accept)
    }

    async fn apply_remote(&self, _jsep: &Jsep) -> Result<(), TransportError> {
        self.script.lock().unwrap().requests.push("remote");
        Ok(())
    }

    async fn send_control(&self, request: ControlRequest) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        match request {
            ControlRequest::Register { .. } => self.record("register", Op::Register),
            ControlRequest::Hangup => self.record("hangup", Op::Hangup),
        }
    }

    async fn terminate(&self) -> Result<(), TransportError> {
        self.script.lock().unwrap().notifier = None;
        self.record("terminate", Op::Terminate)
    }

    async fn set_outbound_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        self.record("mute", Op::Mute)?;
        self.script.lock().unwrap().outbound_enabled = Some(enabled);
        Ok(())
    }
}

pub fn client(transport: &Arc<FakeTransport>) -> Arc<CallingClient> {
    Arc::new(CallingClient::new(transport.clone(), ClientConfig::default()))
}

/// Client already registered as `1234`
pub async fn registered_client(transport: &Arc<FakeTransport>) -> Arc<CallingClient> {
    let client = client(transport);
    client.register("1234").await.unwrap();
    client
}

pub fn offer() -> Jsep {
    Jsep::new(serde_json::json!({ "type": "offer", "sdp": "v=0" }))
}

pub fn answer() -> Jsep {
    Jsep::new(serde_json::json!({ "type": "answer", "sdp": "v=0" }))
}

pub fn incoming_from(from: &str) -> GatewayNotification {
    GatewayNotification::IncomingCall {
        from: from.to_string(),
        jsep: offer(),
    }
}

pub fn hangup(reason: &str) -> GatewayNotification {
    GatewayNotification::Hangup {
        reason: reason.to_string(),
    }
}

/// Next event on the stream, failing the test after two seconds
pub async fn next_event(events: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream closed")
}

/// Assert nothing else was published
pub fn assert_no_event(events: &mut broadcast::Receiver<ClientEvent>) {
    match events.try_recv() {
        Err(broadcast::error::TryRecvError::Empty) => {}
        other => panic!("unexpected event: {:?}", other),
    }
}
