//! Simulated signaling gateway
//!
//! Plays both the gateway and everybody else registered on it, so the
//! controller can be exercised without a network. Requests take
//! `latency_ms`, fail with probability `failure_rate`, and a called party
//! answers (or not) after `answer_delay_ms`.

use crate::config::GatewayConfig;
use crate::domain::gateway::{
    ControlRequest, GatewayErrorCode, GatewayNotification, Jsep, NegotiationHandle,
    NotificationStream, SignalingTransport, TransportError,
};
use crate::domain::shared::value_objects::{Identity, SessionId};
use async_trait::async_trait;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Default)]
struct SimState {
    identity: Option<Identity>,
    notifier: Option<mpsc::UnboundedSender<GatewayNotification>>,
    /// Negotiation of the current call, if any
    session: Option<SessionId>,
    outbound_enabled: bool,
    /// Remote party deciding whether to pick up
    ringing: Option<JoinHandle<()>>,
}

impl SimState {
    fn notifier(&self) -> Result<mpsc::UnboundedSender<GatewayNotification>, TransportError> {
        self.notifier.clone().ok_or(TransportError::NotConnected)
    }

    fn stop_ringing(&mut self) {
        if let Some(ringing) = self.ringing.take() {
            ringing.abort();
        }
    }
}

pub struct SimulatedGateway {
    config: GatewayConfig,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Make `from` call us
    pub fn ring(&self, from: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        let notifier = state.notifier()?;
        state.session = Some(SessionId::new());
        info!("Simulated call from {}", from);
        send(
            &notifier,
            GatewayNotification::IncomingCall {
                from: from.to_string(),
                jsep: fake_jsep("offer"),
            },
        );
        Ok(())
    }

    /// The remote party hangs up
    pub fn remote_hangup(&self, reason: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        let notifier = state.notifier()?;
        state.stop_ringing();
        state.session = None;
        send(
            &notifier,
            GatewayNotification::Hangup {
                reason: reason.to_string(),
            },
        );
        Ok(())
    }

    pub fn is_outbound_enabled(&self) -> bool {
        self.lock().outbound_enabled
    }

    pub fn is_connected(&self) -> bool {
        self.lock().notifier.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulated round trip plus random failure
    async fn round_trip(&self, request: &str) -> Result<(), TransportError> {
        tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        if roll(self.config.failure_rate) {
            warn!("Simulated failure of {} request", request);
            return Err(TransportError::Request(format!("{} request failed", request)));
        }
        Ok(())
    }

    fn is_known(&self, target: &Identity) -> bool {
        self.config.directory.is_empty()
            || self.config.directory.iter().any(|known| known == target.as_str())
    }

    /// Let the callee think it over, then answer or decline
    fn spawn_callee(&self, notifier: mpsc::UnboundedSender<GatewayNotification>) -> JoinHandle<()> {
        let delay = Duration::from_millis(self.config.answer_delay_ms);
        let answer_probability = self.config.answer_probability;
        let state = self.state.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let notification = if roll(answer_probability) {
                GatewayNotification::Accepted {
                    jsep: Some(fake_jsep("answer")),
                }
            } else {
                let reason = if roll(0.5) {
                    "user busy"
                } else {
                    "remote explicit hangup"
                };
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .session = None;
                GatewayNotification::Hangup {
                    reason: reason.to_string(),
                }
            };
            send(&notifier, notification);
        })
    }
}

#[async_trait]
impl SignalingTransport for SimulatedGateway {
    async fn connect(&self, identity: &Identity) -> Result<NotificationStream, TransportError> {
        self.round_trip("attach").await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.stop_ringing();
        state.identity = Some(identity.clone());
        state.notifier = Some(tx);
        state.session = None;
        debug!("Simulated gateway attached for {}", identity);
        Ok(rx)
    }

    async fn begin_negotiation(&self, target: &Identity) -> Result<NegotiationHandle, TransportError> {
        self.lock().notifier()?;
        self.round_trip("call").await?;

        let mut state = self.lock();
        let notifier = state.notifier()?;
        let session_id = SessionId::new();
        state.session = Some(session_id);

        // The request itself is acknowledged; refusals arrive as events
        if state.identity.as_ref() == Some(target) {
            send(
                &notifier,
                GatewayNotification::Error {
                    code: GatewayErrorCode::SelfCallRejected,
                    reason: "You can't call yourself... use the EchoTest for that".to_string(),
                },
            );
        } else if !self.is_known(target) {
            send(
                &notifier,
                GatewayNotification::Error {
                    code: GatewayErrorCode::DestinationDoesNotExist,
                    reason: format!("Username '{}' doesn't exist", target),
                },
            );
        } else {
            state.stop_ringing();
            state.ringing = Some(self.spawn_callee(notifier));
        }

        Ok(NegotiationHandle { session_id })
    }

    async fn complete_negotiation(&self, incoming: &Jsep) -> Result<(), TransportError> {
        self.lock().notifier()?;
        self.round_trip("accept").await?;
        debug!("Simulated answer to {}", incoming.as_value());
        Ok(())
    }

    async fn apply_remote(&self, jsep: &Jsep) -> Result<(), TransportError> {
        self.lock().notifier()?;
        debug!("Simulated remote description {}", jsep.as_value());
        Ok(())
    }

    async fn send_control(&self, request: ControlRequest) -> Result<(), TransportError> {
        self.lock().notifier()?;
        self.round_trip(request.kind()).await?;

        let mut state = self.lock();
        let notifier = state.notifier()?;
        match request {
            ControlRequest::Register { username } => {
                debug!("Simulated registration of {}", username);
            }
            ControlRequest::Hangup => {
                state.stop_ringing();
                state.session = None;
                send(
                    &notifier,
                    GatewayNotification::Hangup {
                        reason: "local explicit hangup".to_string(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn terminate(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.stop_ringing();
        state.notifier = None;
        state.identity = None;
        state.session = None;
        debug!("Simulated gateway detached");
        Ok(())
    }

    async fn set_outbound_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.notifier()?;
        state.outbound_enabled = enabled;
        Ok(())
    }
}

impl Drop for SimulatedGateway {
    fn drop(&mut self) {
        self.lock().stop_ringing();
    }
}

fn send(notifier: &mpsc::UnboundedSender<GatewayNotification>, notification: GatewayNotification) {
    let kind = notification.kind();
    if notifier.send(notification).is_err() {
        debug!("Dropped simulated {} notification: nobody listening", kind);
    }
}

fn roll(probability: f64) -> bool {
    rand::thread_rng().gen_bool(probability.clamp(0.0, 1.0))
}

fn fake_jsep(kind: &str) -> Jsep {
    Jsep::new(serde_json::json!({
        "type": kind,
        "sdp": format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n",
            rand::thread_rng().gen::<u32>()
        ),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig {
            latency_ms: 0,
            failure_rate: 0.0,
            answer_delay_ms: 10,
            answer_probability: 1.0,
            directory: vec!["1234".to_string(), "5678".to_string()],
        }
    }

    fn identity(raw: &str) -> Identity {
        Identity::parse(raw, 4).unwrap()
    }

    #[tokio::test]
    async fn test_requests_fail_before_connect() {
        let gateway = SimulatedGateway::new(config());

        assert_eq!(
            gateway.begin_negotiation(&identity("5678")).await,
            Err(TransportError::NotConnected)
        );
        assert_eq!(gateway.ring("1231"), Err(TransportError::NotConnected));
        assert_eq!(
            gateway.set_outbound_enabled(true).await,
            Err(TransportError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_callee_answers() {
        let gateway = SimulatedGateway::new(config());
        let mut notifications = gateway.connect(&identity("1234")).await.unwrap();

        gateway.begin_negotiation(&identity("5678")).await.unwrap();

        let notification = notifications.recv().await.unwrap();
        assert!(matches!(notification, GatewayNotification::Accepted { jsep: Some(_) }));

        gateway.set_outbound_enabled(true).await.unwrap();
        assert!(gateway.is_outbound_enabled());
    }

    #[tokio::test]
    async fn test_callee_declines() {
        let gateway = SimulatedGateway::new(GatewayConfig {
            answer_probability: 0.0,
            ..config()
        });
        let mut notifications = gateway.connect(&identity("1234")).await.unwrap();

        gateway.begin_negotiation(&identity("5678")).await.unwrap();

        match notifications.recv().await.unwrap() {
            GatewayNotification::Hangup { reason } => {
                assert!(reason == "user busy" || reason == "remote explicit hangup");
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_self_call_and_unknown_numbers_are_refused() {
        let gateway = SimulatedGateway::new(config());
        let mut notifications = gateway.connect(&identity("1234")).await.unwrap();

        gateway.begin_negotiation(&identity("1234")).await.unwrap();
        assert!(matches!(
            notifications.recv().await.unwrap(),
            GatewayNotification::Error {
                code: GatewayErrorCode::SelfCallRejected,
                ..
            }
        ));

        gateway.begin_negotiation(&identity("9999")).await.unwrap();
        assert!(matches!(
            notifications.recv().await.unwrap(),
            GatewayNotification::Error {
                code: GatewayErrorCode::DestinationDoesNotExist,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_local_hangup_is_echoed_and_stops_ringing() {
        let gateway = SimulatedGateway::new(GatewayConfig {
            answer_delay_ms: 60_000,
            ..config()
        });
        let mut notifications = gateway.connect(&identity("1234")).await.unwrap();

        gateway.begin_negotiation(&identity("5678")).await.unwrap();
        gateway.send_control(ControlRequest::Hangup).await.unwrap();

        assert_eq!(
            notifications.recv().await.unwrap(),
            GatewayNotification::Hangup {
                reason: "local explicit hangup".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_ring_and_terminate() {
        let gateway = SimulatedGateway::new(config());
        let mut notifications = gateway.connect(&identity("1234")).await.unwrap();

        gateway.ring("1231").unwrap();
        assert!(matches!(
            notifications.recv().await.unwrap(),
            GatewayNotification::IncomingCall { ref from, .. } if from == "1231"
        ));

        gateway.terminate().await.unwrap();
        assert!(!gateway.is_connected());
        assert!(notifications.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failure_rate_one_fails_every_request() {
        let gateway = SimulatedGateway::new(GatewayConfig {
            failure_rate: 1.0,
            ..config()
        });

        assert!(matches!(
            gateway.connect(&identity("1234")).await,
            Err(TransportError::Request(_))
        ));
    }
}
