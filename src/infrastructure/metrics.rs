//! Call metrics
//!
//! Recording is a no-op until a recorder is installed, which
//! [`init_metrics`] does when an exporter address is configured.

use crate::domain::call::{CallState, ClientEvent};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Install the Prometheus exporter listening on `listen`
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(listen: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(listen).install()?;

    describe_gauge!("active_calls", "Whether a call is currently active (0 or 1)");
    describe_counter!(
        "registrations_total",
        "Total number of registration attempts"
    );
    describe_counter!("calls_placed_total", "Total number of outgoing calls placed");
    describe_counter!(
        "calls_incoming_total",
        "Total number of incoming calls received"
    );
    describe_counter!("calls_accepted_total", "Total number of calls accepted");
    describe_counter!(
        "calls_declined_total",
        "Total number of calls declined, by reason"
    );
    describe_counter!(
        "calls_finished_total",
        "Total number of accepted calls that finished"
    );

    Ok(())
}

/// Record a registration attempt
pub fn record_registration(success: bool) {
    counter!("registrations_total", "success" => success.to_string()).increment(1);
}

/// Record an outgoing call
pub fn record_call_placed() {
    counter!("calls_placed_total").increment(1);
}

/// Record a published domain event
pub fn record_event(event: &ClientEvent) {
    match event {
        ClientEvent::IncomingCall(_) => counter!("calls_incoming_total").increment(1),
        ClientEvent::CallStateChange(change) => match change.call.state() {
            CallState::Unanswered => {}
            CallState::Accepted => counter!("calls_accepted_total").increment(1),
            CallState::Declined => {
                let reason = change
                    .decline
                    .as_ref()
                    .map(|d| d.reason.as_str())
                    .unwrap_or("other");
                counter!("calls_declined_total", "reason" => reason).increment(1);
            }
            CallState::Finished => counter!("calls_finished_total").increment(1),
        },
    }
}

/// Update active calls gauge
pub fn set_active_calls(active: bool) {
    gauge!("active_calls").set(if active { 1.0 } else { 0.0 });
}
