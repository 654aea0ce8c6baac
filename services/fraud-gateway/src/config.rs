use config::{ConfigError, Environment};
use serde::{Deserialize, Serialize};
use signal_engine::EngineConfig;
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionSettings,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            workers: 4,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionSettings {
    /// Bounded mailbox size per session actor
    pub mailbox_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { mailbox_capacity: 32 }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 4000)?
            .set_default("server.workers", 4)?
            // Session defaults
            .set_default("session.mailbox_capacity", 32)?;

        builder = builder.add_source(
            Environment::with_prefix("FRAUD_GATEWAY")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("engine.geo_device.high_risk_countries")
                .with_list_parse_key("engine.email.keywords"),
        );

        // Override from environment variables
        if let Ok(port) = env::var("SERVICE_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.session.mailbox_capacity, 32);
        assert_eq!(config.engine.ip_velocity.window_seconds, 90);
    }

    #[test]
    fn test_from_env_uses_defaults() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.session.mailbox_capacity, 32);
        assert_eq!(config.engine.amount.avg_window, 20);
    }
}
