//! Request rate per IP

use super::{event_time, window};
use crate::{
    EntityHistoryStore, EventPayload, HistoryRecord, Result, ScoreResult, ToolOutput, WindowLimits,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

const TOOL: &str = "ipVelocity";

/// IP velocity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpVelocityConfig {
    /// Trailing window for counting requests
    pub window_seconds: i64,

    /// Requests tolerated inside the window
    pub max_requests: usize,
}

impl Default for IpVelocityConfig {
    fn default() -> Self {
        Self {
            window_seconds: 90,
            max_requests: 1,
        }
    }
}

/// `ipVelocity` arguments
#[derive(Debug, Clone, Deserialize)]
pub struct IpVelocityInput {
    /// Address whose requests are counted
    pub remote_address: String,
    /// Event time in epoch milliseconds
    pub timestamp_ms: Option<i64>,
    /// Overrides [`IpVelocityConfig::window_seconds`] for this call
    pub window_seconds: Option<i64>,
}

/// Count the windowed requests; any repeat inside the window is abuse
pub fn evaluate(history: &[HistoryRecord], config: &IpVelocityConfig) -> (usize, ScoreResult) {
    let count = history.len();
    let flagged = count > config.max_requests;
    let reasons = if flagged {
        vec![format!("{} requests in the last {}s.", count, config.window_seconds)]
    } else {
        Vec::new()
    };
    (count, ScoreResult::from_verdict(false, flagged, reasons))
}

pub(crate) fn run(store: &EntityHistoryStore, defaults: &IpVelocityConfig, input: IpVelocityInput) -> Result<ToolOutput> {
    let timestamp = event_time(TOOL, input.timestamp_ms)?;
    let window_seconds = input.window_seconds.unwrap_or(defaults.window_seconds);
    let max_age = window(TOOL, "window_seconds", window_seconds)?;
    let config = IpVelocityConfig {
        window_seconds,
        ..defaults.clone()
    };

    let record = HistoryRecord::new(
        input.remote_address.clone(),
        timestamp,
        EventPayload::Request {
            remote_address: input.remote_address.clone(),
        },
    );
    let history = store.append_and_fetch(record, WindowLimits::age(max_age));
    let (count, result) = evaluate(&history, &config);
    let flagged = result.suspicious;

    let summary = if flagged {
        format!(
            "⚠ Too many requests from IP {} ({} in last {}s)",
            input.remote_address, count, config.window_seconds
        )
    } else {
        format!(
            "✅ IP {} activity normal ({} in last {}s)",
            input.remote_address, count, config.window_seconds
        )
    };

    let recommendation = result.recommendation(
        "Action: Block requests from this IP.",
        "Recommendation: Throttle or challenge further requests from this IP.",
    );

    let mut details = Map::new();
    details.insert("remote_address".into(), json!(input.remote_address));
    details.insert("flagged".into(), json!(flagged));
    details.insert("count".into(), json!(count));

    Ok(ToolOutput {
        summary,
        recommendation: recommendation.to_string(),
        details: Some(details),
    })
}
