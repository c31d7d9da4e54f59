use hackaphone::config::Config;
use hackaphone::infrastructure::gateway::SimulatedGateway;
use hackaphone::infrastructure::metrics::init_metrics;
use hackaphone::{CallState, CallingClient, ClientEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Longest we wait for the gateway to report an outcome
const EVENT_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HACKAPHONE_CONFIG").ok());
    let config = Config::load(path.as_deref())?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Hackaphone");
    info!("Configuration loaded: {:?}", config);

    if let Some(listen) = config.metrics.listen {
        init_metrics(listen)?;
        info!("Metrics exporter listening on http://{}/metrics", listen);
    }

    let gateway = Arc::new(SimulatedGateway::new(config.gateway.clone()));
    let client = CallingClient::new(gateway.clone(), config.client.clone());

    let mut events = client.events();
    let _logger = client.subscribe(|event| match event.decline() {
        Some(decline) => info!(
            "Call with {} {}: {} {}",
            event.call().remote_number(),
            event.call().state(),
            decline.reason,
            decline.message.as_deref().unwrap_or("")
        ),
        None => info!(
            "Call with {} {}",
            event.call().remote_number(),
            event.call().state()
        ),
    });

    client.register(&config.demo.identity).await?;

    demo_outgoing_call(&client, &mut events, &config.demo.target).await?;
    demo_incoming_call(&client, &gateway, &mut events).await?;

    client.unregister().await?;
    info!("Hackaphone demo finished");

    Ok(())
}

/// Call the configured target and hang up shortly after they answer
async fn demo_outgoing_call(
    client: &CallingClient,
    events: &mut broadcast::Receiver<ClientEvent>,
    target: &str,
) -> anyhow::Result<()> {
    info!("=== Outgoing call to {} ===", target);

    if let Err(e) = client.call(target).await {
        warn!("Call to {} failed: {}", target, e);
        return Ok(());
    }

    let outcome = wait_for(events, |event| event.call().state() != CallState::Unanswered).await?;
    if outcome != CallState::Accepted {
        info!("Call to {} was not answered", target);
        return Ok(());
    }

    // Outbound audio starts muted on every accepted call
    client.set_outbound_muted(false).await?;
    info!("Talking to {} for a second", target);
    tokio::time::sleep(Duration::from_secs(1)).await;

    client.hangup().await?;
    wait_for(events, |event| event.call().state().is_terminal()).await?;
    Ok(())
}

/// Let someone ring us, pick up, and wait for them to hang up
async fn demo_incoming_call(
    client: &CallingClient,
    gateway: &SimulatedGateway,
    events: &mut broadcast::Receiver<ClientEvent>,
) -> anyhow::Result<()> {
    info!("=== Incoming call ===");

    gateway.ring("1231")?;
    wait_for(events, |event| matches!(event, ClientEvent::IncomingCall(_))).await?;

    client.accept_incoming().await?;
    client.set_inbound_muted(true)?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    gateway.remote_hangup("remote explicit hangup")?;
    wait_for(events, |event| event.call().state().is_terminal()).await?;
    Ok(())
}

/// Next event matching `done`, returning the state of its call
async fn wait_for<F>(
    events: &mut broadcast::Receiver<ClientEvent>,
    done: F,
) -> anyhow::Result<CallState>
where
    F: Fn(&ClientEvent) -> bool,
{
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) if done(&event) => return Ok(event.call().state()),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    anyhow::bail!("event stream closed");
                }
            }
        }
    })
    .await?
}
