//! Tool dispatch over the shared history store

use crate::evaluators::{amount, email, geo_device, ip_velocity, login, session};
use crate::tools::{ToolDescriptor, ToolKind, ToolRegistry};
use crate::{DohRecordLookup, DomainRecordLookup, EngineConfig, EntityHistoryStore, Error, Result, ToolOutput};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Runs tools by name against one history store
///
/// Cheap to clone; clones share the store and lookup.
#[derive(Clone)]
pub struct SignalEngine {
    config: Arc<EngineConfig>,
    store: EntityHistoryStore,
    lookup: Arc<dyn DomainRecordLookup>,
}

impl SignalEngine {
    /// Create engine with explicit collaborators
    pub fn new(config: EngineConfig, store: EntityHistoryStore, lookup: Arc<dyn DomainRecordLookup>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            lookup,
        }
    }

    /// Create engine with a fresh store and DNS-over-HTTPS lookups
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let lookup = DohRecordLookup::new(config.email.doh_endpoint.clone(), config.email.lookup_timeout())?;
        Ok(Self::new(config, EntityHistoryStore::new(), Arc::new(lookup)))
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared history store
    pub fn store(&self) -> &EntityHistoryStore {
        &self.store
    }

    /// Tools offered under the current configuration
    pub fn tools(&self) -> impl Iterator<Item = &'static ToolDescriptor> + '_ {
        ToolRegistry::all().iter().filter(move |t| self.is_enabled(t.kind))
    }

    fn is_enabled(&self, kind: ToolKind) -> bool {
        kind != ToolKind::FakeEmailDetector || self.config.email.enabled
    }

    /// Resolve an offered tool by name
    pub fn resolve(&self, name: &str) -> Result<&'static ToolDescriptor> {
        let tool = ToolRegistry::lookup(name)?;
        if !self.is_enabled(tool.kind) {
            return Err(Error::UnknownTool(name.to_string()));
        }
        Ok(tool)
    }

    /// Validate `arguments` against the tool's contract and run it
    ///
    /// Contract violations are returned before any history is touched.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        let tool = self.resolve(name)?;
        let config = &self.config;

        match tool.kind {
            ToolKind::IpVelocity => ip_velocity::run(&self.store, &config.ip_velocity, parse(tool, arguments)?),
            ToolKind::GeoDevice => geo_device::run(&self.store, &config.geo_device, parse(tool, arguments)?),
            ToolKind::UserBehavior => login::run(&self.store, &config.login, parse(tool, arguments)?),
            ToolKind::AmountTransaction => amount::run(&self.store, &config.amount, parse(tool, arguments)?),
            ToolKind::SessionConsistency => session::run(&self.store, &config.session, parse(tool, arguments)?),
            ToolKind::FakeEmailDetector => {
                let input = parse(tool, arguments)?;
                Ok(email::run(self.lookup.as_ref(), &config.email, input).await)
            }
        }
    }
}

fn parse<T: DeserializeOwned>(tool: &ToolDescriptor, arguments: Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| Error::invalid_input(tool.name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, StaticRecordLookup};
    use serde_json::json;

    fn engine(config: EngineConfig) -> SignalEngine {
        SignalEngine::new(config, EntityHistoryStore::new(), Arc::new(StaticRecordLookup::new()))
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = engine(EngineConfig::default())
            .call_tool("teleport", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_contract_violation_leaves_history_untouched() {
        let engine = engine(EngineConfig::default());
        let err = engine
            .call_tool("amountTransaction", json!({"user_id": "u1", "transaction_id": "t1", "amount": "lots"}))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput { tool: "amountTransaction", .. }));
        assert_eq!(engine.store().tracked_entities(), 0);
    }

    #[tokio::test]
    async fn test_missing_required_field() {
        let engine = engine(EngineConfig::default());
        let err = engine.call_tool("ipVelocity", Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("remote_address"));
    }

    #[tokio::test]
    async fn test_large_transaction_is_high() {
        let engine = engine(EngineConfig::default());
        let out = engine
            .call_tool(
                "amountTransaction",
                json!({"user_id": "u2", "transaction_id": "t1", "amount": 15000}),
            )
            .await
            .unwrap();

        let details = out.details.unwrap();
        assert_eq!(details["score"], json!(70));
        assert_eq!(details["severity"], json!("high"));
        assert_eq!(out.recommendation, "Action: Block or hold transaction pending manual review.");
        assert_eq!(engine.store().len(Category::Transaction, "u2"), 1);
    }

    #[tokio::test]
    async fn test_email_tool_can_be_disabled() {
        let mut config = EngineConfig::default();
        config.email.enabled = false;
        let engine = engine(config);

        assert!(engine.tools().all(|t| t.kind != ToolKind::FakeEmailDetector));
        assert!(engine
            .call_tool("fakeEmailDetector", json!({"from": "a@b.c"}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_login_uses_camel_case_contract() {
        let engine = engine(EngineConfig::default());
        let out = engine
            .call_tool(
                "userBehavior",
                json!({"userId": "alice", "passwordAttempt": "pw", "successfulLogin": false}),
            )
            .await
            .unwrap();
        assert!(out.summary.contains("Failed: 1"));
    }
}
