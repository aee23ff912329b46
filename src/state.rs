//! Temporal state tracking (spec.md §4.7): every finding is identified by a
//! stable key across scans so Kogaro can tell "still broken", "newly
//! broken", and "fixed since last scan" apart.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::errors::ValidationError;

/// `(namespace, kind, name, check)`, stable across scans. `to_label`/`parse`
/// round-trip on `/`-delimited fields; unlike the legacy stub this replaced,
/// a `/` inside a name cannot be confused with the delimiter because the
/// delimiter only ever appears between the four fixed fields, not inside
/// them (Kubernetes names never contain `/`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub namespace: String,
    pub kind: String,
    pub name: String,
    pub check: String,
}

impl StateKey {
    pub fn new(namespace: impl Into<String>, kind: impl Into<String>, name: impl Into<String>, check: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
            check: check.into(),
        }
    }

    pub fn from_error(err: &ValidationError) -> Self {
        Self::new(&err.namespace, &err.kind, &err.name, &err.check)
    }

    pub fn to_label(&self) -> String {
        format!("{}/{}/{}/{}", self.namespace, self.kind, self.name, self.check)
    }

    pub fn parse(label: &str) -> Option<Self> {
        let mut parts = label.splitn(4, '/');
        let namespace = parts.next()?;
        let kind = parts.next()?;
        let name = parts.next()?;
        let check = parts.next()?;
        Some(Self::new(namespace, kind, name, check))
    }
}

/// How long a finding has been in its current (non-resolved) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalState {
    New,
    Recent,
    Stable,
    Resolved,
}

impl TemporalState {
    pub fn as_label(&self) -> &'static str {
        match self {
            TemporalState::New => "new",
            TemporalState::Recent => "recent",
            TemporalState::Stable => "stable",
            TemporalState::Resolved => "resolved",
        }
    }
}

/// Classify age into a bucket: `<1h` new, `1h..24h` recent, `>=24h` stable.
/// Resolution is tracked separately since it isn't a function of age alone.
pub fn classify_temporal_state(age: Duration) -> TemporalState {
    if age < Duration::from_secs(3600) {
        TemporalState::New
    } else if age < Duration::from_secs(24 * 3600) {
        TemporalState::Recent
    } else {
        TemporalState::Stable
    }
}

/// Per-key bookkeeping the tracker maintains across scans.
#[derive(Debug, Clone)]
pub struct ValidationState {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub severity: crate::errors::Severity,
    pub change_count: u64,
    pub resolved: bool,
}

/// Scan-to-scan memory of every finding Kogaro has ever observed. Shared via
/// `Arc` between the orchestrator and the metrics fabric.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    inner: Arc<RwLock<HashMap<StateKey, ValidationState>>>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `err` was observed at `now`. Returns the resulting
    /// temporal state and whether this is a state change (severity flip or
    /// a transition out of `resolved`).
    pub fn record_validation_error_with_state(
        &self,
        err: &ValidationError,
        now: DateTime<Utc>,
    ) -> TemporalState {
        let key = StateKey::from_error(err);
        let mut map = self.inner.write().expect("state tracker lock poisoned");
        match map.get_mut(&key) {
            Some(state) => {
                let was_resolved = state.resolved;
                let severity_changed = state.severity != err.severity;
                state.last_seen = now;
                state.severity = err.severity;
                state.resolved = false;
                if was_resolved || severity_changed {
                    state.change_count += 1;
                }
                if was_resolved {
                    state.first_seen = now;
                    TemporalState::New
                } else {
                    let age = (now - state.first_seen)
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    classify_temporal_state(age)
                }
            }
            None => {
                map.insert(
                    key,
                    ValidationState {
                        first_seen: now,
                        last_seen: now,
                        severity: err.severity,
                        change_count: 1,
                        resolved: false,
                    },
                );
                TemporalState::New
            }
        }
    }

    pub fn mark_resolved(&self, key: &StateKey, now: DateTime<Utc>) {
        let mut map = self.inner.write().expect("state tracker lock poisoned");
        if let Some(state) = map.get_mut(key) {
            if !state.resolved {
                state.resolved = true;
                state.last_seen = now;
                state.change_count += 1;
            }
        }
    }

    /// End-of-scan sweep: any previously tracked key not present in
    /// `observed_this_scan` has disappeared from the cluster and is marked
    /// resolved. Resolves the "what happens to a finding that vanishes
    /// without an explicit fix event" question: disappearance IS the fix
    /// event.
    pub fn mark_unobserved_resolved(&self, observed_this_scan: &std::collections::HashSet<StateKey>, now: DateTime<Utc>) -> Vec<StateKey> {
        let mut map = self.inner.write().expect("state tracker lock poisoned");
        let mut newly_resolved = Vec::new();
        for (key, state) in map.iter_mut() {
            if !state.resolved && !observed_this_scan.contains(key) {
                state.resolved = true;
                state.last_seen = now;
                state.change_count += 1;
                newly_resolved.push(key.clone());
            }
        }
        newly_resolved
    }

    pub fn get(&self, key: &StateKey) -> Option<ValidationState> {
        self.inner.read().expect("state tracker lock poisoned").get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("state tracker lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop bookkeeping for keys resolved longer than `older_than` ago, to
    /// bound memory growth over long-running deployments.
    pub fn cleanup_resolved(&self, now: DateTime<Utc>, older_than: Duration) {
        let mut map = self.inner.write().expect("state tracker lock poisoned");
        map.retain(|_, state| {
            !state.resolved
                || (now - state.last_seen).to_std().unwrap_or(Duration::ZERO) < older_than
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{codes, Severity};
    use chrono::Duration as ChronoDuration;

    fn sample_error(severity: Severity) -> ValidationError {
        ValidationError::new(
            "Ingress",
            "web",
            "default",
            "dangling_ingress_class",
            "missing",
            severity,
            codes::reference::DANGLING_INGRESS_CLASS,
        )
    }

    #[test]
    fn test_state_key_round_trip() {
        let key = StateKey::new("default", "Pod", "web-0", "dangling_ingress_class");
        let label = key.to_label();
        assert_eq!(StateKey::parse(&label), Some(key));
    }

    #[test]
    fn test_classify_temporal_state_buckets() {
        assert_eq!(classify_temporal_state(Duration::from_secs(10)), TemporalState::New);
        assert_eq!(classify_temporal_state(Duration::from_secs(3700)), TemporalState::Recent);
        assert_eq!(classify_temporal_state(Duration::from_secs(25 * 3600)), TemporalState::Stable);
    }

    #[test]
    fn test_first_observation_is_new() {
        let tracker = StateTracker::new();
        let now = Utc::now();
        let state = tracker.record_validation_error_with_state(&sample_error(Severity::Error), now);
        assert_eq!(state, TemporalState::New);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_repeated_observation_ages_into_stable() {
        let tracker = StateTracker::new();
        let t0 = Utc::now();
        tracker.record_validation_error_with_state(&sample_error(Severity::Error), t0);
        let later = t0 + ChronoDuration::hours(30);
        let state = tracker.record_validation_error_with_state(&sample_error(Severity::Error), later);
        assert_eq!(state, TemporalState::Stable);
    }

    #[test]
    fn test_resolved_then_reobserved_is_new_again() {
        let tracker = StateTracker::new();
        let t0 = Utc::now();
        tracker.record_validation_error_with_state(&sample_error(Severity::Error), t0);
        let key = StateKey::from_error(&sample_error(Severity::Error));
        tracker.mark_resolved(&key, t0 + ChronoDuration::hours(1));
        let state = tracker.record_validation_error_with_state(&sample_error(Severity::Error), t0 + ChronoDuration::hours(2));
        assert_eq!(state, TemporalState::New);
    }

    #[test]
    fn test_resolved_then_reobserved_restarts_first_seen() {
        let tracker = StateTracker::new();
        let t0 = Utc::now();
        tracker.record_validation_error_with_state(&sample_error(Severity::Error), t0);
        let key = StateKey::from_error(&sample_error(Severity::Error));
        let resolve_time = t0 + ChronoDuration::hours(1);
        tracker.mark_resolved(&key, resolve_time);
        let reobserve_time = t0 + ChronoDuration::hours(2);
        tracker.record_validation_error_with_state(&sample_error(Severity::Error), reobserve_time);
        assert_eq!(tracker.get(&key).unwrap().first_seen, reobserve_time);
    }

    #[test]
    fn test_mark_unobserved_resolved() {
        let tracker = StateTracker::new();
        let t0 = Utc::now();
        let err = sample_error(Severity::Error);
        tracker.record_validation_error_with_state(&err, t0);
        let key = StateKey::from_error(&err);
        tracker.mark_unobserved_resolved(&std::collections::HashSet::new(), t0 + ChronoDuration::hours(1));
        let state = tracker.get(&key).unwrap();
        assert!(state.resolved);
    }

    #[test]
    fn test_mark_unobserved_resolved_skips_observed() {
        let tracker = StateTracker::new();
        let t0 = Utc::now();
        let err = sample_error(Severity::Error);
        tracker.record_validation_error_with_state(&err, t0);
        let key = StateKey::from_error(&err);
        let mut observed = std::collections::HashSet::new();
        observed.insert(key.clone());
        tracker.mark_unobserved_resolved(&observed, t0 + ChronoDuration::hours(1));
        assert!(!tracker.get(&key).unwrap().resolved);
    }

    #[test]
    fn test_cleanup_resolved_evicts_old_entries() {
        let tracker = StateTracker::new();
        let t0 = Utc::now();
        let err = sample_error(Severity::Error);
        tracker.record_validation_error_with_state(&err, t0);
        let key = StateKey::from_error(&err);
        tracker.mark_resolved(&key, t0);
        tracker.cleanup_resolved(t0 + ChronoDuration::days(30), Duration::from_secs(3600));
        assert!(tracker.get(&key).is_none());
    }

    #[test]
    fn test_severity_change_counts_as_state_change() {
        let tracker = StateTracker::new();
        let t0 = Utc::now();
        tracker.record_validation_error_with_state(&sample_error(Severity::Warning), t0);
        tracker.record_validation_error_with_state(&sample_error(Severity::Error), t0 + ChronoDuration::minutes(5));
        let key = StateKey::from_error(&sample_error(Severity::Error));
        assert_eq!(tracker.get(&key).unwrap().change_count, 2);
    }
}
