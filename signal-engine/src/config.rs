//! Engine configuration
//!
//! One section per evaluator. Every field has a default, so an empty
//! configuration is valid; per-call arguments override these again.

use crate::evaluators::{
    amount::AmountConfig, email::EmailConfig, geo_device::GeoDeviceConfig,
    ip_velocity::IpVelocityConfig, login::LoginConfig, session::SessionConfig,
};
use serde::{Deserialize, Serialize};

/// Defaults for all evaluators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `amountTransaction`
    pub amount: AmountConfig,

    /// `userBehavior`
    pub login: LoginConfig,

    /// `geoDevice`
    pub geo_device: GeoDeviceConfig,

    /// `sessionConsistency`
    pub session: SessionConfig,

    /// `ipVelocity`
    pub ip_velocity: IpVelocityConfig,

    /// `fakeEmailDetector`
    pub email: EmailConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.amount.avg_window, 20);
        assert_eq!(config.amount.high_risk_threshold, Decimal::from(10_000));
        assert_eq!(config.login.window_seconds, 3600);
        assert_eq!(config.ip_velocity.window_seconds, 90);
        assert_eq!(config.session.max_history, 50);
        assert!(config.geo_device.high_risk_countries.is_empty());
        assert!(config.email.enabled);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"amount": {"high_risk_threshold": "5000"}, "geo_device": {"high_risk_countries": ["KP"]}}"#)
                .unwrap();
        assert_eq!(config.amount.high_risk_threshold, Decimal::from(5000));
        assert_eq!(config.amount.avg_window, 20);
        assert_eq!(config.geo_device.high_risk_countries, vec!["KP".to_string()]);
        assert_eq!(config.email.lookup_timeout_ms, 2000);
    }
}
