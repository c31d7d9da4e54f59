//! Mute controller
//!
//! The outbound flag mirrors the local audio source on the transport and
//! only changes once the transport agreed. The inbound flag is purely
//! local: the playback side reads it to gate the remote stream.
//!
//! Outbound round trips are serialized, so the flag and the transport never
//! disagree once they are all done.

use super::state::SharedState;
use crate::domain::gateway::SignalingTransport;
use crate::domain::mute::MuteFlags;
use crate::domain::shared::result::Result;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct MuteController {
    state: SharedState,
    transport: Arc<dyn SignalingTransport>,
    /// Held across each outbound round trip
    outbound: Arc<AsyncMutex<()>>,
}

impl MuteController {
    pub(crate) fn new(state: SharedState, transport: Arc<dyn SignalingTransport>) -> Self {
        Self {
            state,
            transport,
            outbound: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn flags(&self) -> MuteFlags {
        self.state.lock().mute
    }

    /// Ask the transport to disable/enable the local source, then record it
    pub async fn set_outbound_muted(&self, muted: bool) -> Result<()> {
        let _outbound = self.outbound.lock().await;
        self.transport.set_outbound_enabled(!muted).await?;
        self.state.lock().mute.outbound_muted = muted;
        debug!("Outbound audio {}", if muted { "muted" } else { "unmuted" });
        Ok(())
    }

    pub fn set_inbound_muted(&self, muted: bool) {
        self.state.lock().mute.inbound_muted = muted;
        debug!("Inbound audio {}", if muted { "muted" } else { "unmuted" });
    }

    /// Bring the local source in line with the outbound flag
    ///
    /// Runs after a call is accepted, once the flags were reset under the
    /// controller lock. Failure is logged, not returned.
    pub(crate) async fn sync_outbound(&self) {
        let _outbound = self.outbound.lock().await;
        let muted = self.flags().outbound_muted;
        if let Err(e) = self.transport.set_outbound_enabled(!muted).await {
            let action = if muted { "disable" } else { "enable" };
            warn!("Failed to {} outbound audio after accept: {}", action, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::{MockSignalingTransport, TransportError};
    use crate::domain::shared::error::DomainError;
    use mockall::predicate::eq;
    use tokio_test::{assert_err, assert_ok};

    fn controller(transport: MockSignalingTransport) -> MuteController {
        MuteController::new(SharedState::default(), Arc::new(transport))
    }

    #[tokio::test]
    async fn test_unmute_enables_outbound_source() {
        let mut transport = MockSignalingTransport::new();
        transport
            .expect_set_outbound_enabled()
            .with(eq(true))
            .times(1)
            .returning(|_| Ok(()));
        let mute = controller(transport);

        assert_ok!(mute.set_outbound_muted(false).await);
        assert!(!mute.flags().outbound_muted);
    }

    #[tokio::test]
    async fn test_transport_rejection_leaves_flag_unchanged() {
        let mut transport = MockSignalingTransport::new();
        transport
            .expect_set_outbound_enabled()
            .returning(|_| Err(TransportError::NotConnected));
        let mute = controller(transport);

        let err = assert_err!(mute.set_outbound_muted(false).await);
        assert_eq!(err, DomainError::Transport(TransportError::NotConnected));
        assert!(mute.flags().outbound_muted);
    }

    #[tokio::test]
    async fn test_inbound_mute_is_local() {
        // no expectations: any transport call would panic
        let mute = controller(MockSignalingTransport::new());

        mute.set_inbound_muted(true);
        assert!(mute.flags().inbound_muted);
        mute.set_inbound_muted(false);
        assert!(!mute.flags().inbound_muted);
    }

    #[tokio::test]
    async fn test_sync_follows_the_current_flag_and_tolerates_failure() {
        let mut transport = MockSignalingTransport::new();
        transport
            .expect_set_outbound_enabled()
            .with(eq(false))
            .times(1)
            .returning(|_| Err(TransportError::Request("closed".to_string())));
        let mute = controller(transport);
        mute.state.lock().mute = MuteFlags::default();

        mute.sync_outbound().await;

        assert_eq!(mute.flags(), MuteFlags::default());
    }

    #[tokio::test]
    async fn test_sync_waits_for_a_pending_outbound_change() {
        let mut transport = MockSignalingTransport::new();
        transport
            .expect_set_outbound_enabled()
            .with(eq(true))
            .times(1)
            .returning(|_| Ok(()));
        let mute = controller(transport);

        let held = mute.outbound.clone().lock_owned().await;
        let syncing = {
            let mute = mute.clone();
            tokio::spawn(async move { mute.sync_outbound().await })
        };
        tokio::task::yield_now().await;

        mute.state.lock().mute.outbound_muted = false;
        drop(held);
        syncing.await.unwrap();
    }
}
