//! Configuration management
//!
//! Layered: built-in defaults, then an optional file, then `HACKAPHONE__*`
//! environment variables (e.g. `HACKAPHONE__GATEWAY__LATENCY_MS=100`).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Number of digits in an identity
    pub identity_length: usize,
}

/// Behaviour of the simulated gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Round trip of every request
    pub latency_ms: u64,
    /// Probability that a request fails outright
    pub failure_rate: f64,
    /// How long the callee lets it ring
    pub answer_delay_ms: u64,
    /// Probability that the callee picks up
    pub answer_probability: f64,
    /// Known identities; empty means everybody exists
    pub directory: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus exporter address; disabled when absent
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    pub identity: String,
    pub target: String,
}

impl Config {
    /// Load the configuration, reading `path` if given
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder
            .add_source(
                config::Environment::with_prefix("HACKAPHONE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("gateway.directory")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { identity_length: 4 }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            latency_ms: 400,
            failure_rate: 0.0,
            answer_delay_ms: 3000,
            answer_probability: 0.5,
            directory: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            identity: "1234".to_string(),
            target: "5678".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_load_without_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.client.identity_length, 4);
        assert_eq!(config.gateway.latency_ms, 400);
        assert!(config.metrics.listen.is_none());
        assert_eq!(config.demo.identity, "1234");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("hackaphone-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[gateway]\nlatency_ms = 5\ndirectory = [\"1111\", \"2222\"]\n\n[client]\nidentity_length = 6"
        )
        .unwrap();

        let config = Config::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.gateway.latency_ms, 5);
        assert_eq!(config.gateway.directory, vec!["1111", "2222"]);
        assert_eq!(config.client.identity_length, 6);
        // untouched keys keep their defaults
        assert_eq!(config.gateway.answer_delay_ms, 3000);
    }
}
