//! Prometheus metrics collection for chatrelay.
//!
//! Exposed on the HTTP API at `/metrics`. Tracks live connections and
//! sessions, relay throughput, evictions, and rejected clients.
//!
//! - `chatrelay_message_fanout` - Recipients per relayed message (histogram)
//! - `chatrelay_publish_duration_seconds` - Time to fan one message out
//! - `chatrelay_protocol_errors_total{code}` - Connections closed for protocol errors

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Messages accepted for fan-out.
pub static MESSAGES_RELAYED: OnceLock<IntCounter> = OnceLock::new();

/// Individual member deliveries that succeeded.
pub static DELIVERIES: OnceLock<IntCounter> = OnceLock::new();

/// Members evicted after a failed or timed-out send.
pub static EVICTIONS: OnceLock<IntCounter> = OnceLock::new();

/// Connections closed for protocol errors, by wire code.
pub static PROTOCOL_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Rejected credentials, by reason.
pub static AUTH_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Currently open chat streams.
pub static CONNECTED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();

/// Sessions with at least one registered connection.
pub static ACTIVE_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Message fan-out histogram: how many recipients per relayed message.
pub static MESSAGE_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Wall time of one `publish`, including slow members.
pub static PUBLISH_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at server startup. Later calls are no-ops.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(MESSAGES_RELAYED, IntCounter::new("chatrelay_messages_relayed_total", "Messages accepted for fan-out"));
    register!(DELIVERIES, IntCounter::new("chatrelay_deliveries_total", "Successful per-member deliveries"));
    register!(EVICTIONS, IntCounter::new("chatrelay_evictions_total", "Members evicted after a failed send"));
    register!(PROTOCOL_ERRORS, IntCounterVec::new(Opts::new("chatrelay_protocol_errors_total", "Connections closed for protocol errors"), &["code"]));
    register!(AUTH_FAILURES, IntCounterVec::new(Opts::new("chatrelay_auth_failures_total", "Rejected session credentials"), &["reason"]));
    register!(CONNECTED_CLIENTS, IntGauge::new("chatrelay_connected_clients", "Currently attached connections"));
    register!(ACTIVE_SESSIONS, IntGauge::new("chatrelay_active_sessions", "Sessions with live members"));
    register!(MESSAGE_FANOUT, Histogram::with_opts(
        HistogramOpts::new("chatrelay_message_fanout", "Recipients per relayed message")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0])));
    register!(PUBLISH_LATENCY, Histogram::with_opts(
        HistogramOpts::new("chatrelay_publish_duration_seconds", "Time to fan one message out")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions (no-ops until `init` has run)
// ============================================================================

#[inline]
fn inc(metric: &OnceLock<IntCounter>, by: u64) {
    if let Some(c) = metric.get() {
        c.inc_by(by);
    }
}

#[inline]
fn gauge_add(metric: &OnceLock<IntGauge>, delta: i64) {
    if let Some(g) = metric.get() {
        g.add(delta);
    }
}

/// Record one completed fan-out.
#[inline]
pub fn record_fanout(delivered: usize, evicted: usize) {
    inc(&MESSAGES_RELAYED, 1);
    inc(&DELIVERIES, delivered as u64);
    inc(&EVICTIONS, evicted as u64);
    if let Some(h) = MESSAGE_FANOUT.get() {
        h.observe((delivered + evicted) as f64);
    }
}

#[inline]
pub fn record_publish_latency(duration_secs: f64) {
    if let Some(h) = PUBLISH_LATENCY.get() {
        h.observe(duration_secs);
    }
}

#[inline]
pub fn record_protocol_error(code: &str) {
    if let Some(c) = PROTOCOL_ERRORS.get() {
        c.with_label_values(&[code]).inc();
    }
}

#[inline]
pub fn record_auth_failure(reason: &str) {
    if let Some(c) = AUTH_FAILURES.get() {
        c.with_label_values(&[reason]).inc();
    }
}

#[inline]
pub fn client_connected() {
    gauge_add(&CONNECTED_CLIENTS, 1);
}

#[inline]
pub fn client_disconnected() {
    gauge_add(&CONNECTED_CLIENTS, -1);
}

#[inline]
pub fn session_opened() {
    gauge_add(&ACTIVE_SESSIONS, 1);
}

#[inline]
pub fn session_drained() {
    gauge_add(&ACTIVE_SESSIONS, -1);
}
