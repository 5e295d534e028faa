//! Metrics seam
//!
//! The engine emits through one injected [`MetricsSink`] so tests can
//! assert exact counts with [`RecordingSink`]; production wires
//! [`FacadeSink`], which forwards to the `metrics` facade and whatever
//! recorder the binary installed.

use dashmap::DashMap;

/// Metric names emitted by the engine
pub mod names {
    pub const INIT_REQUESTS: &str = "payment_init_requests_total";
    pub const INIT_AMOUNT: &str = "payment_init_amount_total";
    pub const CONFIRM_REQUESTS: &str = "payment_confirm_requests_total";
    pub const CANCEL_REQUESTS: &str = "payment_cancel_requests_total";
    pub const CHECK_REQUESTS: &str = "payment_check_requests_total";
    pub const AUTHORIZATIONS: &str = "payment_authorizations_total";
    pub const EXPIRED: &str = "payment_expiry_total";
    pub const IDEMPOTENT_HITS: &str = "idempotency_hits_total";
    pub const REPLAYS: &str = "auth_replays_total";
    pub const WEBHOOKS: &str = "webhook_dispatch_total";
    pub const CACHE_ENTRIES: &str = "response_cache_entries";
    pub const TEAM_REGISTRATIONS: &str = "team_registrations_total";
}

/// Counter label for an operation outcome
pub fn result_label(err: &paygate_types::GatewayError) -> &'static str {
    use paygate_types::GatewayError as E;
    match err {
        E::Validation(_) => "validation",
        E::Auth(_) => "auth_error",
        E::Forbidden(_) => "forbidden",
        E::NotFound(_) => "not_found",
        E::InvalidState(_) => "invalid_state",
        E::Conflict(_) => "conflict",
        E::LimitExceeded(_) => "limit_exceeded",
        E::RateLimited { .. } => "rate_limited",
        E::Timeout(_) => "timeout",
        E::AdapterFailure(_) => "adapter_failure",
        E::Internal(_) => "internal",
    }
}

pub trait MetricsSink: Send + Sync {
    fn counter(&self, name: &'static str, labels: &[(&'static str, String)], value: u64);
    fn histogram(&self, name: &'static str, labels: &[(&'static str, String)], value: f64);
    fn gauge(&self, name: &'static str, labels: &[(&'static str, String)], value: f64);
}

/// Forwards to the global `metrics` recorder
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeSink;

fn to_labels(labels: &[(&'static str, String)]) -> Vec<metrics::Label> {
    labels
        .iter()
        .map(|(k, v)| metrics::Label::new(*k, v.clone()))
        .collect()
}

impl MetricsSink for FacadeSink {
    fn counter(&self, name: &'static str, labels: &[(&'static str, String)], value: u64) {
        metrics::counter!(name, to_labels(labels)).increment(value);
    }

    fn histogram(&self, name: &'static str, labels: &[(&'static str, String)], value: f64) {
        metrics::histogram!(name, to_labels(labels)).record(value);
    }

    fn gauge(&self, name: &'static str, labels: &[(&'static str, String)], value: f64) {
        metrics::gauge!(name, to_labels(labels)).set(value);
    }
}

/// In-memory sink for tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    counters: DashMap<String, u64>,
    histograms: DashMap<String, Vec<f64>>,
    gauges: DashMap<String, f64>,
}

fn series_key(name: &str, labels: &[(&'static str, String)]) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let rendered: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{name}{{{}}}", rendered.join(","))
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact series lookup, e.g. `counter_value(INIT_REQUESTS, &[("result", "success".into())])`.
    pub fn counter_value(&self, name: &str, labels: &[(&'static str, String)]) -> u64 {
        self.counters
            .get(&series_key(name, labels))
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// Sum over every label combination of `name`.
    pub fn counter_total(&self, name: &str) -> u64 {
        let prefix = format!("{name}{{");
        self.counters
            .iter()
            .filter(|e| e.key().as_str() == name || e.key().starts_with(&prefix))
            .map(|e| *e.value())
            .sum()
    }

    pub fn histogram_samples(&self, name: &str, labels: &[(&'static str, String)]) -> Vec<f64> {
        self.histograms
            .get(&series_key(name, labels))
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn gauge_value(&self, name: &str, labels: &[(&'static str, String)]) -> Option<f64> {
        self.gauges.get(&series_key(name, labels)).map(|v| *v)
    }
}

impl MetricsSink for RecordingSink {
    fn counter(&self, name: &'static str, labels: &[(&'static str, String)], value: u64) {
        *self.counters.entry(series_key(name, labels)).or_insert(0) += value;
    }

    fn histogram(&self, name: &'static str, labels: &[(&'static str, String)], value: f64) {
        self.histograms
            .entry(series_key(name, labels))
            .or_default()
            .push(value);
    }

    fn gauge(&self, name: &'static str, labels: &[(&'static str, String)], value: f64) {
        self.gauges.insert(series_key(name, labels), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_counts_per_series() {
        let sink = RecordingSink::new();
        sink.counter(names::INIT_REQUESTS, &[("result", "success".into())], 1);
        sink.counter(names::INIT_REQUESTS, &[("result", "success".into())], 1);
        sink.counter(names::INIT_REQUESTS, &[("result", "auth".into())], 1);

        assert_eq!(
            sink.counter_value(names::INIT_REQUESTS, &[("result", "success".into())]),
            2
        );
        assert_eq!(sink.counter_total(names::INIT_REQUESTS), 3);
        assert_eq!(sink.counter_total(names::CONFIRM_REQUESTS), 0);
    }
}
