//! Structured log lines and coarse operation counters.
//!
//! Log lines are JSON objects on stderr so CloudWatch Logs captures them
//! as-is. Metric emission is best-effort: sink failures are logged by the
//! sink itself and never surface to handlers.

use serde_json::json;

pub fn log_event(component: &str, event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": component,
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

pub fn log_error(component: &str, event: &str, details: serde_json::Value) {
    eprintln!(
        "{}",
        json!({
            "component": component,
            "level": "error",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Count,
    Milliseconds,
    Bytes,
}

impl MetricUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Milliseconds => "Milliseconds",
            Self::Bytes => "Bytes",
        }
    }
}

/// Coarse counter/duration/size sink. Implementations must not fail the
/// operation being measured.
pub trait MetricSink {
    fn record(&self, name: &str, value: f64, unit: MetricUnit);

    fn count(&self, name: &str) {
        self.record(name, 1.0, MetricUnit::Count);
    }

    fn millis(&self, name: &str, value: f64) {
        self.record(name, value, MetricUnit::Milliseconds);
    }

    fn bytes(&self, name: &str, value: f64) {
        self.record(name, value, MetricUnit::Bytes);
    }
}

pub struct NoopMetrics;

impl MetricSink for NoopMetrics {
    fn record(&self, _name: &str, _value: f64, _unit: MetricUnit) {}
}

/// Shields the operation being measured from a misbehaving sink: a panic in
/// `record` is contained and logged, never propagated to the caller.
pub struct GuardedMetrics<'a> {
    inner: &'a dyn MetricSink,
}

impl<'a> GuardedMetrics<'a> {
    pub fn new(inner: &'a dyn MetricSink) -> Self {
        Self { inner }
    }
}

impl MetricSink for GuardedMetrics<'_> {
    fn record(&self, name: &str, value: f64, unit: MetricUnit) {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.inner.record(name, value, unit);
        }));
        if outcome.is_err() {
            log_error(
                "telemetry",
                "metric_sink_panicked",
                json!({ "metric": name }),
            );
        }
    }
}
