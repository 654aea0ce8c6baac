//! Login attempt velocity per user
//!
//! Unlike the additive evaluators this one is a boolean OR of two rules:
//! too many failed attempts in the window, or more than one distinct
//! password tried. Only failed attempts enter the history, so successful
//! logins never push failures out of the count cap. Passwords are only ever
//! held as SHA-256 fingerprints.

use super::{event_time, window};
use crate::{
    Category, EntityHistoryStore, EventPayload, HistoryRecord, Result, ScoreResult, ToolOutput,
    WindowLimits,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

const TOOL: &str = "userBehavior";

/// Login evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Trailing window for counting attempts
    pub window_seconds: i64,

    /// Failed attempts tolerated inside the window
    pub max_failed_attempts: usize,

    /// Failed attempts kept per user
    pub max_history: usize,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            window_seconds: 3600,
            max_failed_attempts: 3,
            max_history: 50,
        }
    }
}

/// `userBehavior` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    /// Entity whose failures are tracked
    pub user_id: String,
    /// Attempted password; only its fingerprint is stored
    pub password_attempt: String,
    /// Successful attempts are scored but never recorded
    pub successful_login: bool,
    /// Echoed into details
    pub transactions_last_day: Option<u64>,
    /// Event time in epoch milliseconds
    #[serde(rename = "timestamp_ms")]
    pub timestamp_ms: Option<i64>,
    /// Overrides [`LoginConfig::window_seconds`] for this call
    #[serde(rename = "window_seconds")]
    pub window_seconds: Option<i64>,
}

/// Login verdict plus the counts behind it
#[derive(Debug, Clone, PartialEq)]
pub struct LoginAssessment {
    /// Score, severity and reasons
    pub result: ScoreResult,
    /// Failures inside the window
    pub failed_attempts: usize,
    /// Distinct password fingerprints among those failures
    pub unique_passwords: usize,
}

/// Hex SHA-256 of a password attempt
pub fn fingerprint(password_attempt: &str) -> String {
    hex::encode(Sha256::digest(password_attempt.as_bytes()))
}

/// Judge the windowed attempt history
pub fn evaluate(history: &[HistoryRecord], config: &LoginConfig) -> LoginAssessment {
    let failed: Vec<&str> = history
        .iter()
        .filter_map(|r| match &r.payload {
            EventPayload::Login {
                password_fingerprint,
                successful: false,
            } => Some(password_fingerprint.as_str()),
            _ => None,
        })
        .collect();

    let failed_attempts = failed.len();
    let unique_passwords = failed.iter().collect::<HashSet<_>>().len();

    let mut reasons = Vec::new();
    if failed_attempts > config.max_failed_attempts {
        reasons.push(format!(
            "{} failed attempts in the last {}s (limit {}).",
            failed_attempts, config.window_seconds, config.max_failed_attempts
        ));
    }
    if unique_passwords > 1 {
        reasons.push(format!("{} different passwords attempted.", unique_passwords));
    }

    LoginAssessment {
        result: ScoreResult::from_verdict(!reasons.is_empty(), false, reasons),
        failed_attempts,
        unique_passwords,
    }
}

pub(crate) fn run(store: &EntityHistoryStore, defaults: &LoginConfig, input: LoginInput) -> Result<ToolOutput> {
    let timestamp = event_time(TOOL, input.timestamp_ms)?;
    let window_seconds = input.window_seconds.unwrap_or(defaults.window_seconds);
    let max_age = window(TOOL, "window_seconds", window_seconds)?;
    let limits = WindowLimits::count(defaults.max_history).with_age(max_age);
    let config = LoginConfig {
        window_seconds,
        ..defaults.clone()
    };

    let history = if input.successful_login {
        store.fetch(Category::Login, &input.user_id, timestamp, limits)
    } else {
        let record = HistoryRecord::new(
            input.user_id.clone(),
            timestamp,
            EventPayload::Login {
                password_fingerprint: fingerprint(&input.password_attempt),
                successful: false,
            },
        );
        store.append_and_fetch(record, limits)
    };
    let assessment = evaluate(&history, &config);
    let result = &assessment.result;

    if result.suspicious {
        tracing::info!(
            user_id = %input.user_id,
            failed_attempts = assessment.failed_attempts,
            unique_passwords = assessment.unique_passwords,
            "Suspicious login pattern"
        );
    }

    let summary = if result.suspicious {
        format!(
            "⚠ Suspicious login for {}. Failed attempts: {}, unique passwords: {}.",
            input.user_id, assessment.failed_attempts, assessment.unique_passwords
        )
    } else {
        format!(
            "✅ User {} behavior normal. Failed: {}, unique passwords: {}.",
            input.user_id, assessment.failed_attempts, assessment.unique_passwords
        )
    };

    let recommendation = result.recommendation(
        "Recommendation: Lock account temporarily and require MFA.",
        "Recommendation: Require MFA on next login.",
    );

    let mut details = Map::new();
    details.insert("user_id".into(), json!(input.user_id));
    details.insert("failed_attempts".into(), json!(assessment.failed_attempts));
    details.insert("unique_passwords".into(), json!(assessment.unique_passwords));
    details.insert("transactions_last_day".into(), json!(input.transactions_last_day.unwrap_or(0)));
    details.insert("suspicious".into(), json!(result.suspicious));

    Ok(ToolOutput {
        summary,
        recommendation: recommendation.to_string(),
        details: Some(details),
    })
}
