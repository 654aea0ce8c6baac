//! Transaction amount anomalies against a user's rolling average

use super::{event_time, positive};
use crate::{
    EntityHistoryStore, EventPayload, HistoryRecord, Result, ScoreResult, ToolOutput, WindowLimits,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

const TOOL: &str = "amountTransaction";

/// Amount evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountConfig {
    /// Transactions kept per user for the rolling average
    pub avg_window: usize,

    /// Amount above which a transaction is always high risk
    pub high_risk_threshold: Decimal,

    /// Multiple of the average that counts as a spike
    pub spike_multiplier: Decimal,

    /// Fraction of the average below which an amount is unusually small
    pub small_ratio: Decimal,
}

impl Default for AmountConfig {
    fn default() -> Self {
        Self {
            avg_window: 20,
            high_risk_threshold: Decimal::from(10_000),
            spike_multiplier: Decimal::from(5),
            small_ratio: Decimal::new(1, 1), // 0.1
        }
    }
}

/// `amountTransaction` arguments
#[derive(Debug, Clone, Deserialize)]
pub struct AmountInput {
    /// Entity whose average is tracked
    pub user_id: String,
    /// Caller's transaction reference
    pub transaction_id: String,
    /// Amount in `currency` units
    pub amount: Decimal,
    /// ISO code, recorded as given
    pub currency: Option<String>,
    /// Event time in epoch milliseconds, now when absent
    pub timestamp_ms: Option<i64>,
    /// Overrides [`AmountConfig::avg_window`] for this call
    pub avg_window: Option<usize>,
    /// Overrides [`AmountConfig::high_risk_threshold`] for this call
    pub high_risk_threshold: Option<Decimal>,
}

/// Scoring outcome plus the statistics it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct AmountAssessment {
    /// Score, severity and reasons
    pub result: ScoreResult,
    /// Mean of the windowed amounts, the current one included
    pub average: Decimal,
    /// Transactions the average covers
    pub history_count: usize,
}

/// Mean that stays in range when the plain sum would overflow
fn mean(amounts: &[Decimal]) -> Decimal {
    if amounts.is_empty() {
        return Decimal::ZERO;
    }
    let count = Decimal::from(amounts.len());
    match amounts.iter().try_fold(Decimal::ZERO, |acc, a| acc.checked_add(*a)) {
        Some(sum) => sum / count,
        None => amounts
            .iter()
            .fold(Decimal::ZERO, |acc, a| acc.saturating_add(*a / count)),
    }
}

/// Score `amount` against the post-append history
pub fn evaluate(amount: Decimal, history: &[HistoryRecord], config: &AmountConfig) -> AmountAssessment {
    let amounts: Vec<Decimal> = history
        .iter()
        .filter_map(|r| match &r.payload {
            EventPayload::Transaction { amount, .. } => Some(*amount),
            _ => None,
        })
        .collect();

    let average = mean(&amounts);

    let mut points = 0u32;
    let mut reasons = Vec::new();

    if amount > config.high_risk_threshold {
        points += 70;
        reasons.push(format!(
            "Amount {} > high-risk threshold {}.",
            amount, config.high_risk_threshold
        ));
    }

    // a product past Decimal::MAX is above any amount
    let spike = average
        .checked_mul(config.spike_multiplier)
        .map_or(false, |limit| amount > limit);
    if average > Decimal::ZERO && spike {
        points += 30;
        reasons.push(format!(
            "Amount {} is >{}x the user's average ({}).",
            amount,
            config.spike_multiplier,
            average.round_dp(2)
        ));
    }

    let small = average
        .checked_mul(config.small_ratio)
        .map_or(true, |limit| amount < limit);
    if average > Decimal::ZERO && small {
        points += 10;
        let percent = config
            .small_ratio
            .checked_mul(Decimal::ONE_HUNDRED)
            .unwrap_or(config.small_ratio)
            .normalize();
        reasons.push(format!(
            "Amount {} is unusually small (<{}% of average {}).",
            amount,
            percent,
            average.round_dp(2)
        ));
    }

    AmountAssessment {
        result: ScoreResult::from_points(points, reasons),
        average,
        history_count: amounts.len(),
    }
}

pub(crate) fn run(store: &EntityHistoryStore, defaults: &AmountConfig, input: AmountInput) -> Result<ToolOutput> {
    let timestamp = event_time(TOOL, input.timestamp_ms)?;
    let config = AmountConfig {
        avg_window: positive(TOOL, "avg_window", input.avg_window.unwrap_or(defaults.avg_window))?,
        high_risk_threshold: input.high_risk_threshold.unwrap_or(defaults.high_risk_threshold),
        ..defaults.clone()
    };
    let currency = input.currency.unwrap_or_else(|| "USD".to_string());

    let record = HistoryRecord::new(
        input.user_id.clone(),
        timestamp,
        EventPayload::Transaction {
            transaction_id: input.transaction_id.clone(),
            amount: input.amount,
            currency: currency.clone(),
        },
    );
    let history = store.append_and_fetch(record, WindowLimits::count(config.avg_window));
    let assessment = evaluate(input.amount, &history, &config);
    let result = &assessment.result;

    tracing::debug!(
        user_id = %input.user_id,
        transaction_id = %input.transaction_id,
        score = result.score.score(),
        history_count = assessment.history_count,
        "Transaction amount evaluated"
    );

    let summary = if result.suspicious {
        format!(
            "⚠ Suspicious transaction {} for user {}: amount {} {} (score {}, severity {}).",
            input.transaction_id, input.user_id, input.amount, currency, result.score, result.severity
        )
    } else {
        format!(
            "✅ Transaction {} for user {} looks normal (amount {} {}).",
            input.transaction_id, input.user_id, input.amount, currency
        )
    };

    let recommendation = result.recommendation(
        "Action: Block or hold transaction pending manual review.",
        "Recommendation: Escalate for verification (MFA, step-up auth).",
    );

    let mut details = Map::new();
    details.insert("user_id".into(), json!(input.user_id));
    details.insert("transaction_id".into(), json!(input.transaction_id));
    details.insert("amount".into(), json!(input.amount.to_string()));
    details.insert("avg_amount".into(), json!(format!("{:.2}", assessment.average)));
    details.insert("history_count".into(), json!(assessment.history_count));
    details.insert("score".into(), json!(result.score.score()));
    details.insert("severity".into(), json!(result.severity.as_str()));
    details.insert("reasons".into(), json!(result.reasons));

    Ok(ToolOutput {
        summary,
        recommendation: recommendation.to_string(),
        details: Some(details),
    })
}
