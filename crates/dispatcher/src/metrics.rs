//! Dispatcher metrics recording.
//!
//! Uses the `metrics` crate macros inline; pair with a Prometheus exporter
//! (see `rpcbus-infrastructure::observability`) to expose them.

use metrics::{counter, histogram};

/// Target label used for delayed (fire-and-forget) sends.
pub const DELAY_TARGET_LABEL: &str = "delay";

/// Outcome of a dispatch, used as a counter label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    Timeout,
    Cancelled,
    Rejected,
}

impl DispatchOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Success => "success",
            DispatchOutcome::Timeout => "timeout",
            DispatchOutcome::Cancelled => "cancelled",
            DispatchOutcome::Rejected => "rejected",
        }
    }
}

/// Record elapsed time from publish to resolution for one request.
///
/// Keyed by `(target, resource, method)`; recorded for success and
/// failure outcomes alike.
pub fn record_request_process_time(
    target: &str,
    resource: &str,
    method: &str,
    outcome: DispatchOutcome,
    elapsed_ms: f64,
) {
    histogram!(
        "rpcbus_request_process_time_milliseconds",
        "target" => target.to_string(),
        "resource" => resource.to_string(),
        "method" => method.to_string()
    )
    .record(elapsed_ms);

    counter!(
        "rpcbus_requests_total",
        "target" => target.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a reply that arrived for an unknown or already-resolved
/// correlation id and was dropped.
pub fn record_dropped_reply(reply_queue: &str) {
    counter!(
        "rpcbus_dropped_replies_total",
        "reply_queue" => reply_queue.to_string()
    )
    .increment(1);
}

/// Record entries reaped by the expiry sweeper.
pub fn record_expired_calls(count: u64) {
    counter!("rpcbus_expired_calls_total").increment(count);
}
