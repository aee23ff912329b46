//! Prometheus metrics fabric (spec.md §4.7), registered once behind a
//! `LazyLock<Registry>` the same way `commands/watch.rs` and
//! `commands/reconcile.rs` register `CLUSTER_SCORE` / `POD_EVENTS`.

use std::sync::LazyLock;

use prometheus::{Encoder, IntCounter, IntCounterVec, GaugeVec, Opts, Registry, TextEncoder};

use crate::state::TemporalState;

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static VALIDATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let v = IntCounterVec::new(
        Opts::new("kogaro_validation_errors_total", "Total validation findings emitted"),
        &[
            "resource_type",
            "validation_type",
            "namespace",
            "resource_name",
            "severity",
            "workload_category",
            "expected_pattern",
            "error_code",
        ],
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(v.clone())).expect("metric not yet registered");
    v
});

static VALIDATION_RUNS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let c = IntCounter::new("kogaro_validation_runs_total", "Total scans completed")
        .expect("metric definition is valid");
    REGISTRY.register(Box::new(c.clone())).expect("metric not yet registered");
    c
});

static VALIDATION_FIRST_SEEN_TIMESTAMP: LazyLock<GaugeVec> = LazyLock::new(|| {
    let v = GaugeVec::new(
        Opts::new("kogaro_validation_first_seen_timestamp", "Unix timestamp a finding was first observed"),
        &["namespace", "kind", "name", "check", "temporal_state"],
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(v.clone())).expect("metric not yet registered");
    v
});

static VALIDATION_LAST_SEEN_TIMESTAMP: LazyLock<GaugeVec> = LazyLock::new(|| {
    let v = GaugeVec::new(
        Opts::new("kogaro_validation_last_seen_timestamp", "Unix timestamp a finding was last observed"),
        &["namespace", "kind", "name", "check", "temporal_state"],
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(v.clone())).expect("metric not yet registered");
    v
});

static VALIDATION_AGE_HOURS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let v = GaugeVec::new(
        Opts::new("kogaro_validation_age_hours", "Hours since a finding was first observed"),
        &["namespace", "kind", "name", "check", "temporal_state"],
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(v.clone())).expect("metric not yet registered");
    v
});

static VALIDATION_STATE_CHANGES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let v = IntCounterVec::new(
        Opts::new("kogaro_validation_state_changes_total", "Total severity/resolution transitions observed"),
        &["namespace", "kind", "name", "check"],
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(v.clone())).expect("metric not yet registered");
    v
});

static VALIDATION_RESOLVED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let v = IntCounterVec::new(
        Opts::new("kogaro_validation_resolved_total", "Total findings that transitioned to resolved"),
        &["namespace", "kind", "check"],
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(v.clone())).expect("metric not yet registered");
    v
});

/// Registers Prometheus series for one finding observation. Call sites pass
/// the same `temporal_state` the state tracker just computed so the gauges
/// and the tracker never disagree, and `workload_category` from
/// `classify_workload(&err.namespace)` so the label always matches the
/// namespace it was derived from.
pub fn record_finding(
    err: &crate::errors::ValidationError,
    temporal_state: TemporalState,
    age_hours: f64,
    now_unix: f64,
    workload_category: &str,
) {
    VALIDATION_ERRORS_TOTAL
        .with_label_values(&[
            &err.kind,
            &err.check,
            &err.namespace,
            &err.name,
            &err.severity.to_string(),
            workload_category,
            &err.expected_pattern,
            &err.code,
        ])
        .inc();

    let state_label = temporal_state.as_label();
    VALIDATION_LAST_SEEN_TIMESTAMP
        .with_label_values(&[&err.namespace, &err.kind, &err.name, &err.check, state_label])
        .set(now_unix);
    VALIDATION_AGE_HOURS
        .with_label_values(&[&err.namespace, &err.kind, &err.name, &err.check, state_label])
        .set(age_hours);
}

pub fn record_first_seen(err: &crate::errors::ValidationError, temporal_state: TemporalState, first_seen_unix: f64) {
    VALIDATION_FIRST_SEEN_TIMESTAMP
        .with_label_values(&[&err.namespace, &err.kind, &err.name, &err.check, temporal_state.as_label()])
        .set(first_seen_unix);
}

pub fn record_state_change(namespace: &str, kind: &str, name: &str, check: &str) {
    VALIDATION_STATE_CHANGES_TOTAL.with_label_values(&[namespace, kind, name, check]).inc();
}

pub fn record_resolved(namespace: &str, kind: &str, check: &str) {
    VALIDATION_RESOLVED_TOTAL.with_label_values(&[namespace, kind, check]).inc();
}

pub fn record_scan_completed() {
    VALIDATION_RUNS_TOTAL.inc();
}

/// Render the registry in Prometheus text exposition format, for the
/// `/metrics` HTTP handler.
pub fn gather_text() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
