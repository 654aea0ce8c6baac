//! Session IP/geo consistency

use super::{distinct, event_time, positive};
use crate::{
    EntityHistoryStore, EventPayload, HistoryRecord, Result, ScoreResult, ToolOutput, WindowLimits,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

const TOOL: &str = "sessionConsistency";

/// Session evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Observations kept per session
    pub max_history: usize,

    /// Trailing window for the burst rule
    pub recent_window_seconds: i64,

    /// Observations in the recent window above which the burst rule fires
    pub recent_burst_threshold: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: 50,
            recent_window_seconds: 300,
            recent_burst_threshold: 20,
        }
    }
}

/// `sessionConsistency` arguments
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInput {
    /// Entity whose observations are tracked
    pub session_id: String,
    /// Client IP of this observation
    pub ip: String,
    /// Country or region code, when known
    pub geo: Option<String>,
    /// Event time in epoch milliseconds
    pub timestamp_ms: Option<i64>,
    /// Overrides [`SessionConfig::max_history`] for this call
    pub max_history: Option<usize>,
}

/// Anomaly score plus the counts behind it
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAssessment {
    /// Score, severity and reasons
    pub result: ScoreResult,
    /// Distinct IPs in first-seen order
    pub distinct_ips: Vec<String>,
    /// Distinct geos in first-seen order
    pub distinct_geos: Vec<String>,
    /// Observations retained, this one included
    pub history_count: usize,
    /// Observations inside the burst window
    pub recent_count: usize,
}

/// Score the session's post-append history as of `now`
pub fn evaluate(now: DateTime<Utc>, history: &[HistoryRecord], config: &SessionConfig) -> SessionAssessment {
    let observations: Vec<(&str, Option<&str>, DateTime<Utc>)> = history
        .iter()
        .filter_map(|r| match &r.payload {
            EventPayload::SessionIp { ip, geo } => Some((ip.as_str(), geo.as_deref(), r.timestamp)),
            _ => None,
        })
        .collect();

    let distinct_ips = distinct(observations.iter().map(|(ip, _, _)| *ip));
    let distinct_geos = distinct(
        observations
            .iter()
            .filter_map(|(_, geo, _)| *geo)
            .filter(|geo| !geo.is_empty()),
    );

    let recent_window_ms = config.recent_window_seconds.saturating_mul(1000);
    let recent_count = observations
        .iter()
        .filter(|(_, _, ts)| (now - *ts).num_milliseconds() <= recent_window_ms)
        .count();

    let ip_points = (distinct_ips.len() as u32 * 20).min(60);
    let geo_points = (distinct_geos.len() as u32 * 15).min(30);
    let mut points = ip_points + geo_points;

    let mut reasons = Vec::new();
    if distinct_ips.len() > 1 {
        reasons.push(format!("{} distinct IPs in session.", distinct_ips.len()));
    }
    if distinct_geos.len() > 1 {
        reasons.push(format!("{} distinct geos in session.", distinct_geos.len()));
    }
    if recent_count > config.recent_burst_threshold {
        points += 10;
        reasons.push(format!(
            "{} events in the last {}s.",
            recent_count, config.recent_window_seconds
        ));
    }

    SessionAssessment {
        result: ScoreResult::from_points(points, reasons),
        distinct_ips,
        distinct_geos,
        history_count: observations.len(),
        recent_count,
    }
}

pub(crate) fn run(store: &EntityHistoryStore, defaults: &SessionConfig, input: SessionInput) -> Result<ToolOutput> {
    let timestamp = event_time(TOOL, input.timestamp_ms)?;
    let config = SessionConfig {
        max_history: positive(TOOL, "max_history", input.max_history.unwrap_or(defaults.max_history))?,
        ..defaults.clone()
    };

    let record = HistoryRecord::new(
        input.session_id.clone(),
        timestamp,
        EventPayload::SessionIp {
            ip: input.ip.clone(),
            geo: input.geo.clone(),
        },
    );
    let history = store.append_and_fetch(record, WindowLimits::count(config.max_history));
    let assessment = evaluate(timestamp, &history, &config);
    let result = &assessment.result;

    tracing::debug!(
        session_id = %input.session_id,
        score = result.score.score(),
        distinct_ips = assessment.distinct_ips.len(),
        recent_count = assessment.recent_count,
        "Session consistency evaluated"
    );

    let summary = if result.suspicious {
        format!(
            "⚠ Session {} anomaly detected (score {}/100, severity {}).",
            input.session_id, result.score, result.severity
        )
    } else {
        format!(
            "✅ Session {} looks consistent (score {}/100).",
            input.session_id, result.score
        )
    };

    let recommendation = result.recommendation(
        "Action: Immediately invalidate session token and force password reset / MFA.",
        "Recommendation: Step-up authentication (MFA) and monitor.",
    );

    let mut details = Map::new();
    details.insert("session_id".into(), json!(input.session_id));
    details.insert("score".into(), json!(result.score.score()));
    details.insert("severity".into(), json!(result.severity.as_str()));
    details.insert("distinct_ips".into(), json!(assessment.distinct_ips));
    details.insert("distinct_geos".into(), json!(assessment.distinct_geos));
    details.insert("history_count".into(), json!(assessment.history_count));
    details.insert("recent_count".into(), json!(assessment.recent_count));

    Ok(ToolOutput {
        summary,
        recommendation: recommendation.to_string(),
        details: Some(details),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use chrono::Duration;

    const BASE_MS: i64 = 1_700_000_000_000;

    fn observe(ip: &str, geo: Option<&str>, offset_ms: i64) -> SessionInput {
        SessionInput {
            session_id: "sess-1".to_string(),
            ip: ip.to_string(),
            geo: geo.map(str::to_string),
            timestamp_ms: Some(BASE_MS + offset_ms),
            max_history: None,
        }
    }

    #[test]
    fn test_single_ip_is_low() {
        let store = EntityHistoryStore::new();
        let out = run(&store, &SessionConfig::default(), observe("1.1.1.1", Some("US"), 0)).unwrap();
        // 20 + 15
        assert!(out.summary.contains("score 35/100"));
        assert_eq!(out.recommendation, crate::NO_ACTION);
    }

    #[test]
    fn test_ip_and_geo_caps() {
        let store = EntityHistoryStore::new();
        let config = SessionConfig::default();
        let geos = ["US", "DE", "FR", "BR"];
        let mut out = None;
        for (i, geo) in geos.iter().enumerate() {
            let ip = format!("10.0.0.{}", i);
            out = Some(run(&store, &config, observe(&ip, Some(geo), i as i64 * 60_000)).unwrap());
        }

        let details = out.unwrap().details.unwrap();
        // min(4*20, 60) + min(4*15, 30)
        assert_eq!(details["score"], json!(90));
        assert_eq!(details["severity"], json!("high"));
    }

    #[test]
    fn test_burst_rule() {
        let config = SessionConfig::default();
        let now = DateTime::from_timestamp_millis(BASE_MS).unwrap();
        let history: Vec<HistoryRecord> = (0..21)
            .map(|i| {
                HistoryRecord::new(
                    "sess-2",
                    now - Duration::seconds(i),
                    EventPayload::SessionIp {
                        ip: "1.1.1.1".to_string(),
                        geo: None,
                    },
                )
            })
            .collect();

        let assessment = evaluate(now, &history, &config);
        assert_eq!(assessment.recent_count, 21);
        // 20 for the single IP + 10 burst
        assert_eq!(assessment.result.score.score(), 30);
        assert_eq!(assessment.result.severity, Severity::Low);
    }

    #[test]
    fn test_history_capped() {
        let store = EntityHistoryStore::new();
        let config = SessionConfig::default();
        for i in 0..60 {
            run(&store, &config, observe("1.1.1.1", None, i * 1000)).unwrap();
        }
        assert_eq!(store.len(crate::Category::SessionIp, "sess-1"), 50);
    }

    #[test]
    fn test_max_history_override_per_call() {
        let store = EntityHistoryStore::new();
        let config = SessionConfig::default();
        let mut out = None;
        for i in 0..8 {
            let mut input = observe(&format!("10.1.0.{}", i), None, i * 1000);
            input.max_history = Some(2);
            out = Some(run(&store, &config, input).unwrap());
        }

        let details = out.unwrap().details.unwrap();
        assert_eq!(details["history_count"], json!(2));
        assert_eq!(details["distinct_ips"].as_array().unwrap().len(), 2);
        assert_eq!(store.len(crate::Category::SessionIp, "sess-1"), 2);
    }

    #[test]
    fn test_huge_burst_window_counts_everything() {
        let config = SessionConfig {
            recent_window_seconds: i64::MAX,
            ..SessionConfig::default()
        };
        let now = DateTime::from_timestamp_millis(BASE_MS).unwrap();
        let history = vec![HistoryRecord::new(
            "sess-3",
            now - Duration::days(3650),
            EventPayload::SessionIp {
                ip: "1.1.1.1".to_string(),
                geo: None,
            },
        )];

        assert_eq!(evaluate(now, &history, &config).recent_count, 1);
    }
}
