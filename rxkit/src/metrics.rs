use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref PAGES_FETCHED: IntCounter = register_int_counter!(
        "rxkit_pages_fetched_total",
        "Pages pulled from upstream publishers"
    ).unwrap();

    pub static ref TERMINAL_SIGNALS: IntCounterVec = register_int_counter_vec!(
        "rxkit_terminal_signals_total",
        "Terminal signals observed by subscriptions",
        &["signal"]
    ).unwrap();

    pub static ref DOUBLE_SUBSCRIPTIONS: IntCounter = register_int_counter!(
        "rxkit_double_subscriptions_total",
        "Rejected second subscriptions on single-subscriber streams"
    ).unwrap();
}

pub fn record_page() {
    PAGES_FETCHED.inc();
}

pub fn record_terminal(signal: &str) {
    TERMINAL_SIGNALS.with_label_values(&[signal]).inc();
}

pub fn record_double_subscription() {
    DOUBLE_SUBSCRIPTIONS.inc();
}

/// Renders the default registry in the Prometheus text format.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
