//! Geo consistency per device

use super::{distinct, event_time, positive};
use crate::{
    EntityHistoryStore, EventPayload, HistoryRecord, Result, ScoreResult, ToolOutput, WindowLimits,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

const TOOL: &str = "geoDevice";

/// Geo/device evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoDeviceConfig {
    /// Geo codes that always warrant escalation; empty unless configured
    pub high_risk_countries: Vec<String>,

    /// Logins kept per device
    pub max_history: usize,
}

impl Default for GeoDeviceConfig {
    fn default() -> Self {
        Self {
            high_risk_countries: Vec::new(),
            max_history: 50,
        }
    }
}

impl GeoDeviceConfig {
    fn is_high_risk(&self, geo: &str) -> bool {
        self.high_risk_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(geo))
    }
}

/// `geoDevice` arguments
#[derive(Debug, Clone, Deserialize)]
pub struct GeoDeviceInput {
    /// Entity whose logins are tracked
    pub device_id: String,
    /// Client IP, echoed into details
    pub remote_address: String,
    /// Country or region code of this login
    pub geo: String,
    /// Event time in epoch milliseconds
    pub timestamp_ms: Option<i64>,
    /// Overrides [`GeoDeviceConfig::max_history`] for this call
    pub max_history: Option<usize>,
}

/// Device verdict plus the geo codes behind it
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDeviceAssessment {
    /// Score, severity and reasons
    pub result: ScoreResult,
    /// Geo differs from the device's previous login
    pub mismatch: bool,
    /// Geo is on the configured high-risk list
    pub high_risk: bool,
    /// Geos seen before this login, oldest first
    pub previous_geos: Vec<String>,
    /// Distinct geos across the retained history
    pub distinct_geos: Vec<String>,
}

impl GeoDeviceAssessment {
    /// A geo mismatch is a hard stop, not just a score
    pub fn block(&self) -> bool {
        self.mismatch
    }
}

fn geos(history: &[HistoryRecord]) -> impl Iterator<Item = &str> {
    history.iter().filter_map(|r| match &r.payload {
        EventPayload::DeviceGeo { geo, .. } => Some(geo.as_str()),
        _ => None,
    })
}

/// Judge the device's post-append history; the last record is the new login
pub fn evaluate(geo: &str, history: &[HistoryRecord], config: &GeoDeviceConfig) -> GeoDeviceAssessment {
    let earlier = &history[..history.len().saturating_sub(1)];
    let previous_geos = distinct(geos(earlier));
    let distinct_geos = distinct(geos(history));

    let mismatch = distinct_geos.len() > 1;
    let high_risk = config.is_high_risk(geo);

    let mut reasons = Vec::new();
    if mismatch {
        reasons.push(format!("Device seen from multiple geos: {}.", distinct_geos.join(", ")));
    }
    if high_risk {
        reasons.push(format!("Geo {} is in the high-risk set.", geo));
    }

    GeoDeviceAssessment {
        result: ScoreResult::from_verdict(mismatch, high_risk, reasons),
        mismatch,
        high_risk,
        previous_geos,
        distinct_geos,
    }
}

pub(crate) fn run(store: &EntityHistoryStore, defaults: &GeoDeviceConfig, input: GeoDeviceInput) -> Result<ToolOutput> {
    let timestamp = event_time(TOOL, input.timestamp_ms)?;
    let max_history = positive(TOOL, "max_history", input.max_history.unwrap_or(defaults.max_history))?;

    let record = HistoryRecord::new(
        input.device_id.clone(),
        timestamp,
        EventPayload::DeviceGeo {
            remote_address: input.remote_address.clone(),
            geo: input.geo.clone(),
        },
    );
    let history = store.append_and_fetch(record, WindowLimits::count(max_history));
    let assessment = evaluate(&input.geo, &history, defaults);
    let result = &assessment.result;

    if assessment.block() {
        tracing::warn!(
            device_id = %input.device_id,
            remote_address = %input.remote_address,
            geo = %input.geo,
            "Geo mismatch, blocking device session"
        );
    }

    let summary = if result.suspicious {
        format!(
            "⚠ Suspicious login for device {} from IP {}: {}, previous: {}{}.",
            input.device_id,
            input.remote_address,
            input.geo,
            assessment.previous_geos.join(", "),
            if assessment.high_risk { " (high-risk)" } else { "" }
        )
    } else {
        format!("✅ Device {} login normal from {}.", input.device_id, input.geo)
    };

    // mismatch is a hard verdict, so block always lands in the high band
    let recommendation = result.recommendation(
        "Action: Block this session due to geo mismatch.",
        "Recommendation: Escalate immediately (high-risk region).",
    );

    let mut details = Map::new();
    details.insert("device_id".into(), json!(input.device_id));
    details.insert("remote_address".into(), json!(input.remote_address));
    details.insert("geo".into(), json!(input.geo));
    details.insert("distinct_geos".into(), json!(assessment.distinct_geos));
    details.insert("mismatch".into(), json!(assessment.mismatch));
    details.insert("high_risk".into(), json!(assessment.high_risk));
    details.insert("block".into(), json!(assessment.block()));

    Ok(ToolOutput {
        summary,
        recommendation: recommendation.to_string(),
        details: Some(details),
    })
}
