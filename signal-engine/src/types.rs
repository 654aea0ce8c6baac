//! Core types for the signal engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Points contributed by a hard boolean verdict (block, lock)
pub const HARD_VERDICT_POINTS: u32 = 70;

/// Points contributed by a soft boolean verdict (escalate, throttle)
pub const SOFT_VERDICT_POINTS: u32 = 40;

/// Recommendation returned when nothing warrants action
pub const NO_ACTION: &str = "No action needed.";

/// Risk score (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RiskScore(u8);

impl RiskScore {
    /// Create new risk score, clamping accumulated points to 100
    pub fn new(points: u32) -> Self {
        Self(points.min(100) as u8)
    }

    /// Get raw score
    pub fn score(&self) -> u8 {
        self.0
    }

    /// Check if high risk (>= 70)
    pub fn is_high_risk(&self) -> bool {
        self.0 >= 70
    }

    /// Check if medium risk (40-69)
    pub fn is_medium_risk(&self) -> bool {
        (40..70).contains(&self.0)
    }

    /// Check if low risk (< 40)
    pub fn is_low_risk(&self) -> bool {
        self.0 < 40
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
}

impl Severity {
    /// Lower-case label used in summaries and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RiskScore> for Severity {
    fn from(score: RiskScore) -> Self {
        if score.is_high_risk() {
            Severity::High
        } else if score.is_medium_risk() {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Outcome of one evaluator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Clamped score
    pub score: RiskScore,

    /// Band derived from the score
    pub severity: Severity,

    /// Whether the event should be reported
    pub suspicious: bool,

    /// Rules that fired, in evaluation order
    pub reasons: Vec<String>,
}

impl ScoreResult {
    /// Build a result from additive rule points
    pub fn from_points(points: u32, reasons: Vec<String>) -> Self {
        let score = RiskScore::new(points);
        Self {
            score,
            severity: Severity::from(score),
            suspicious: !score.is_low_risk(),
            reasons,
        }
    }

    /// Build a result from a boolean verdict: hard wins over soft
    pub fn from_verdict(hard: bool, soft: bool, reasons: Vec<String>) -> Self {
        let points = if hard {
            HARD_VERDICT_POINTS
        } else if soft {
            SOFT_VERDICT_POINTS
        } else {
            0
        };
        Self::from_points(points, reasons)
    }

    /// Pick the recommendation for this result's severity
    pub fn recommendation<'a>(&self, hard_action: &'a str, soft_action: &'a str) -> &'a str {
        match self.severity {
            Severity::High => hard_action,
            Severity::Medium => soft_action,
            Severity::Low => NO_ACTION,
        }
    }
}

/// Evaluator family a history belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Payment amounts per user
    Transaction,
    /// Login attempts per user
    Login,
    /// Geo codes per device
    DeviceGeo,
    /// IP and geo observations per session
    SessionIp,
    /// Raw request arrivals per IP
    RequestVelocity,
}

/// Category-specific fields of an observed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// A payment
    Transaction {
        /// Caller-supplied transaction id
        transaction_id: String,
        /// Payment amount
        amount: Decimal,
        /// ISO currency code
        currency: String,
    },

    /// A login attempt
    Login {
        /// SHA-256 hex digest of the attempted password
        password_fingerprint: String,
        /// Whether the attempt succeeded
        successful: bool,
    },

    /// A device login from some address
    DeviceGeo {
        /// Remote IP address
        remote_address: String,
        /// Geo code resolved for the address
        geo: String,
    },

    /// A session observation
    SessionIp {
        /// Remote IP address
        ip: String,
        /// Optional geo code
        geo: Option<String>,
    },

    /// A request arrival
    Request {
        /// Remote IP address
        remote_address: String,
    },
}

impl EventPayload {
    /// Category implied by the payload
    pub fn category(&self) -> Category {
        match self {
            EventPayload::Transaction { .. } => Category::Transaction,
            EventPayload::Login { .. } => Category::Login,
            EventPayload::DeviceGeo { .. } => Category::DeviceGeo,
            EventPayload::SessionIp { .. } => Category::SessionIp,
            EventPayload::Request { .. } => Category::RequestVelocity,
        }
    }
}

/// One observed event for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// User, device, IP or session identifier
    pub entity_id: String,

    /// Event time
    pub timestamp: DateTime<Utc>,

    /// Category-specific fields
    pub payload: EventPayload,
}

impl HistoryRecord {
    /// Create a record
    pub fn new(entity_id: impl Into<String>, timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp,
            payload,
        }
    }

    /// Category of the record
    pub fn category(&self) -> Category {
        self.payload.category()
    }
}

/// Result of a tool call, before wire encoding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    /// One-line verdict
    pub summary: String,

    /// What the caller should do
    pub recommendation: String,

    /// Flat machine-readable detail blob
    pub details: Option<Map<String, Value>>,
}

impl ToolOutput {
    /// Ordered text segments: summary, recommendation, then details if any
    pub fn segments(&self) -> Vec<String> {
        let mut segments = vec![self.summary.clone(), self.recommendation.clone()];
        if let Some(details) = &self.details {
            segments.push(format!("Details: {}", Value::Object(details.clone())));
        }
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_clamped() {
        assert_eq!(RiskScore::new(110).score(), 100);
        assert_eq!(RiskScore::new(0).score(), 0);
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(Severity::from(RiskScore::new(39)), Severity::Low);
        assert_eq!(Severity::from(RiskScore::new(40)), Severity::Medium);
        assert_eq!(Severity::from(RiskScore::new(69)), Severity::Medium);
        assert_eq!(Severity::from(RiskScore::new(70)), Severity::High);
    }

    #[test]
    fn test_verdict_mapping() {
        let hard = ScoreResult::from_verdict(true, true, vec![]);
        assert_eq!(hard.severity, Severity::High);
        assert!(hard.suspicious);

        let soft = ScoreResult::from_verdict(false, true, vec![]);
        assert_eq!(soft.severity, Severity::Medium);

        let clear = ScoreResult::from_verdict(false, false, vec![]);
        assert!(!clear.suspicious);
        assert_eq!(clear.recommendation("block", "escalate"), NO_ACTION);
    }

    #[test]
    fn test_segments_include_details() {
        let mut details = Map::new();
        details.insert("count".to_string(), Value::from(2));
        let output = ToolOutput {
            summary: "s".to_string(),
            recommendation: "r".to_string(),
            details: Some(details),
        };
        let segments = output.segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2], r#"Details: {"count":2}"#);
    }
}
