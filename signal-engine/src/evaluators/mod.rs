//! Evaluator family
//!
//! Every evaluator follows the same shape: validate the call's input once,
//! append the event through [`EntityHistoryStore`](crate::EntityHistoryStore),
//! score the post-append history with a pure `evaluate` function, and render
//! a [`ToolOutput`](crate::ToolOutput).

pub mod amount;
pub mod email;
pub mod geo_device;
pub mod ip_velocity;
pub mod login;
pub mod session;

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};

/// Resolve an optional Unix-millis event time, defaulting to now
pub(crate) fn event_time(tool: &'static str, timestamp_ms: Option<i64>) -> Result<DateTime<Utc>> {
    match timestamp_ms {
        None => Ok(Utc::now()),
        Some(ms) => DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| Error::invalid_input(tool, format!("timestamp_ms {} out of range", ms))),
    }
}

/// Reject zero-sized windows and caps
pub(crate) fn positive<T>(tool: &'static str, field: &str, value: T) -> Result<T>
where
    T: Copy + PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(Error::invalid_input(
            tool,
            format!("{} must be positive, got {}", field, value),
        ));
    }
    Ok(value)
}

/// Positive window length in seconds that fits a `Duration`
pub(crate) fn window(tool: &'static str, field: &str, seconds: i64) -> Result<Duration> {
    let seconds = positive(tool, field, seconds)?;
    Duration::try_seconds(seconds)
        .ok_or_else(|| Error::invalid_input(tool, format!("{} {} out of range", field, seconds)))
}

/// Distinct values in first-seen order
pub(crate) fn distinct<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        if !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_preserves_order() {
        assert_eq!(distinct(["b", "a", "b", "c"]), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_positive_rejects_zero() {
        assert!(positive("t", "max_history", 0usize).is_err());
        assert_eq!(positive("t", "max_history", 5usize).unwrap(), 5);
    }

    #[test]
    fn test_window_bounds() {
        assert_eq!(window("t", "window_seconds", 90).unwrap(), Duration::seconds(90));
        assert!(window("t", "window_seconds", 0).is_err());
        assert!(window("t", "window_seconds", -5).is_err());
        assert!(window("t", "window_seconds", i64::MAX).is_err());
    }

    #[test]
    fn test_event_time() {
        let ts = event_time("t", Some(1_700_000_000_000)).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert!(event_time("t", Some(i64::MAX)).is_err());
    }
}
