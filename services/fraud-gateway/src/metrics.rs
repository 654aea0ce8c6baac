use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    // Transport metrics
    pub static ref MCP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fraud_gateway_mcp_requests_total", "Total MCP transport requests"),
        &["route", "outcome"]
    ).expect("metric can be created");

    // Session lifecycle
    pub static ref SESSIONS_OPENED_TOTAL: IntCounter = IntCounter::new(
        "fraud_gateway_sessions_opened_total",
        "Total sessions opened"
    ).expect("metric can be created");

    pub static ref SESSIONS_CLOSED_TOTAL: IntCounter = IntCounter::new(
        "fraud_gateway_sessions_closed_total",
        "Total sessions closed"
    ).expect("metric can be created");

    pub static ref ACTIVE_SESSIONS: IntGauge = IntGauge::new(
        "fraud_gateway_active_sessions",
        "Number of open sessions"
    ).expect("metric can be created");

    // Scoring metrics
    pub static ref TOOL_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fraud_gateway_tool_calls_total", "Total tool calls by outcome severity"),
        &["tool", "severity"]
    ).expect("metric can be created");

    pub static ref TOOL_CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("fraud_gateway_tool_call_duration_seconds", "Tool call duration in seconds")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["tool"]
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(MCP_REQUESTS_TOTAL.clone()))?;

    registry.register(Box::new(SESSIONS_OPENED_TOTAL.clone()))?;
    registry.register(Box::new(SESSIONS_CLOSED_TOTAL.clone()))?;
    registry.register(Box::new(ACTIVE_SESSIONS.clone()))?;

    registry.register(Box::new(TOOL_CALLS_TOTAL.clone()))?;
    registry.register(Box::new(TOOL_CALL_DURATION.clone()))?;

    Ok(())
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler(registry: &Registry) -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
