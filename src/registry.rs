//! Validator Registry & Scan Orchestrator (spec.md §4.1, SPEC_FULL.md §4.2).

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{info, warn};

use crate::cluster::{ClusterReader, ClusterSnapshot};
use crate::config::SharedConfig;
use crate::errors::ValidationError;
use crate::metrics;
use crate::server::Readiness;
use crate::state::{StateKey, StateTracker};

/// Everything a validator needs for one scan: the snapshot, the config, and
/// a single shared timestamp so every finding in the scan is stamped
/// identically (spec.md §5).
pub struct ScanContext {
    pub snapshot: ClusterSnapshot,
    pub config: Arc<SharedConfig>,
    pub now: DateTime<Utc>,
}

/// One validator domain. `validate_cluster` never raises a `ValidationError`
/// as an `Err` — only cluster-read/operational failures are `Err`; findings
/// are the `Ok` payload.
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate_cluster<'a>(
        &'a self,
        ctx: &'a ScanContext,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<Vec<ValidationError>>> + Send + 'a>>;
}

/// Validators in fixed registration order (spec.md §4.2): reference,
/// resources, security, image, networking.
#[derive(Default)]
pub struct Registry {
    validators: Vec<Box<dyn Validator>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, validator: Box<dyn Validator>) -> &mut Self {
        self.validators.push(validator);
        self
    }

    pub fn validators(&self) -> &[Box<dyn Validator>] {
        &self.validators
    }
}

/// Owns the registry, the cluster reader, the state tracker, and the
/// metrics fabric; drives the scan loop.
pub struct ScanOrchestrator<R: ClusterReader> {
    registry: Registry,
    reader: R,
    config: Arc<SharedConfig>,
    tracker: StateTracker,
    scan_lock: tokio::sync::Mutex<()>,
    readiness: Readiness,
}

impl<R: ClusterReader + Send + Sync> ScanOrchestrator<R> {
    pub fn new(registry: Registry, reader: R, config: Arc<SharedConfig>) -> Self {
        Self {
            registry,
            reader,
            config,
            tracker: StateTracker::new(),
            scan_lock: tokio::sync::Mutex::new(()),
            readiness: Readiness::new(),
        }
    }

    /// Share the HTTP server's readiness flag so `/readyz` flips to 200 once
    /// the first snapshot has loaded (SPEC_FULL.md §6).
    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// Fetch one snapshot, run every registered validator sequentially
    /// against it, and update the state tracker and metrics fabric. A
    /// validator that errors or panics is logged and skipped; the scan
    /// continues with the remaining validators.
    pub async fn run_scan(&self) -> anyhow::Result<Vec<ValidationError>> {
        let now = Utc::now();
        info!(event = "scan_started");

        let snapshot = ClusterSnapshot::load(&self.reader).await?;
        self.readiness.mark_ready();
        let ctx = ScanContext {
            snapshot,
            config: self.config.clone(),
            now,
        };

        let mut all_findings = Vec::new();
        let mut observed = HashSet::new();

        for validator in self.registry.validators() {
            let name = validator.name();
            let result = AssertUnwindSafe(validator.validate_cluster(&ctx)).catch_unwind().await;
            match result {
                Ok(Ok(findings)) => {
                    for err in findings {
                        let key = StateKey::from_error(&err);
                        observed.insert(key.clone());
                        let temporal_state = self.tracker.record_validation_error_with_state(&err, now);
                        let state = self.tracker.get(&key).expect("just recorded");
                        let age_hours = (now - state.first_seen).num_seconds() as f64 / 3600.0;
                        let workload_category = ctx.config.classify_workload(&err.namespace).as_label();
                        metrics::record_finding(&err, temporal_state, age_hours, now.timestamp() as f64, workload_category);
                        metrics::record_first_seen(&err, temporal_state, state.first_seen.timestamp() as f64);
                        if state.change_count > 1 {
                            metrics::record_state_change(&err.namespace, &err.kind, &err.name, &err.check);
                        }
                        warn!(
                            namespace = %err.namespace,
                            kind = %err.kind,
                            name = %err.name,
                            check = %err.check,
                            severity = %err.severity,
                            code = %err.code,
                            "validation_finding"
                        );
                        all_findings.push(err);
                    }
                }
                Ok(Err(e)) => {
                    warn!(validator = name, error = %e, event = "validator_failed");
                }
                Err(_) => {
                    warn!(validator = name, event = "validator_panicked");
                }
            }
        }

        for key in self.tracker.mark_unobserved_resolved(&observed, now) {
            metrics::record_resolved(&key.namespace, &key.kind, &key.check);
        }
        metrics::record_scan_completed();
        info!(event = "scan_completed", findings = all_findings.len());

        Ok(all_findings)
    }

    /// Run one scan immediately, then loop on `interval`, skipping a tick if
    /// the previous scan is still in flight, until `shutdown` fires.
    pub async fn start(self: Arc<Self>, interval: Duration, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        if let Err(e) = self.run_scan().await {
            warn!(error = %e, event = "initial_scan_failed");
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(event = "scan_loop_stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let Ok(_permit) = self.scan_lock.try_lock() else {
                        info!(event = "scan_tick_dropped_previous_in_flight");
                        continue;
                    };
                    if let Err(e) = self.run_scan().await {
                        warn!(error = %e, event = "scan_failed");
                    }
                }
            }
        }
    }
}
