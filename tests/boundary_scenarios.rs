//! End-to-end boundary scenarios run through the real validators against a
//! `FakeClusterReader`, one per literal example in the scan design notes.

mod common;

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use kogaro::cluster::ClusterSnapshot;
use kogaro::config::SharedConfig;
use kogaro::errors::codes;
use kogaro::registry::{ScanContext, Validator};
use kogaro::state::{classify_temporal_state, StateKey, StateTracker, TemporalState};
use kogaro::testing::FakeClusterReader;
use kogaro::validators::{networking::NetworkingValidator, reference::ReferenceValidator, resources::ResourceLimitsValidator, security::SecurityValidator};

async fn ctx(reader: &FakeClusterReader, config: SharedConfig) -> ScanContext {
    let snapshot = ClusterSnapshot::load(reader).await.unwrap();
    ScanContext {
        snapshot,
        config: Arc::new(config),
        now: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn dangling_ingress_class_is_the_only_finding() {
    let mut reader = FakeClusterReader::default();
    reader.ingresses.push(common::make_ingress("web", "web", Some("missing"), &[]));
    let context = ctx(&reader, SharedConfig::builder().build()).await;

    let findings = ReferenceValidator.validate_cluster(&context).await.unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, "Ingress");
    assert_eq!(findings[0].check, "dangling_ingress_class");
    assert_eq!(findings[0].code, codes::reference::DANGLING_INGRESS_CLASS);
    assert_eq!(findings[0].severity, kogaro::errors::Severity::Error);
}

#[tokio::test]
async fn best_effort_pod_yields_requests_limits_and_qos_findings() {
    let mut reader = FakeClusterReader::default();
    reader.add_pod("default", "foo", |mut p| {
        p.spec.as_mut().unwrap().containers = vec![common::make_container("c", None, None)];
        p
    });
    let context = ctx(&reader, SharedConfig::builder().build()).await;

    let findings = ResourceLimitsValidator.validate_cluster(&context).await.unwrap();
    let checks: Vec<&str> = findings.iter().map(|f| f.check.as_str()).collect();
    assert!(checks.contains(&"missing_resource_requests"));
    assert!(checks.contains(&"missing_resource_limits"));
    assert!(checks.contains(&"qos_class_issue"));
    let qos = findings.iter().find(|f| f.check == "qos_class_issue").unwrap();
    assert!(qos.message.contains("BestEffort"));
}

#[tokio::test]
async fn insufficient_cpu_request_does_not_imply_insufficient_memory() {
    let mut reader = FakeClusterReader::default();
    reader.add_pod("default", "foo", |mut p| {
        p.spec.as_mut().unwrap().containers = vec![common::make_container("c", Some(("1m", "32Mi")), Some(("1m", "32Mi")))];
        p
    });
    let config = SharedConfig::builder()
        .min_cpu_request(Some("10m"))
        .unwrap()
        .build();
    let context = ctx(&reader, config).await;

    let findings = ResourceLimitsValidator.validate_cluster(&context).await.unwrap();
    let checks: Vec<&str> = findings.iter().map(|f| f.check.as_str()).collect();
    assert!(checks.contains(&"insufficient_cpu_request"));
    assert!(!checks.contains(&"insufficient_memory_request"));
}

#[tokio::test]
async fn privileged_container_flagged_in_default_namespace_but_not_system_namespace() {
    let mut reader = FakeClusterReader::default();
    reader.add_pod("default", "foo", |mut p| {
        p.spec.as_mut().unwrap().containers = vec![common::make_privileged_container("c")];
        p
    });
    let context = ctx(&reader, SharedConfig::builder().build()).await;
    let findings = SecurityValidator.validate_cluster(&context).await.unwrap();
    let checks: Vec<&str> = findings.iter().map(|f| f.check.as_str()).collect();
    assert!(checks.contains(&"container_privileged_mode"));
    assert!(checks.contains(&"container_writable_root_filesystem"));
    assert!(checks.contains(&"container_additional_capabilities"));

    let mut system_reader = FakeClusterReader::default();
    system_reader.add_pod("kube-system", "foo", |mut p| {
        p.spec.as_mut().unwrap().containers = vec![common::make_privileged_container("c")];
        p
    });
    let system_context = ctx(&system_reader, SharedConfig::builder().build()).await;
    let system_findings = SecurityValidator.validate_cluster(&system_context).await.unwrap();
    assert!(system_findings.is_empty());
}

#[tokio::test]
async fn ingress_chain_reports_only_no_backend_pods() {
    let mut reader = FakeClusterReader::default();
    reader.add_service("default", "web", |mut s| {
        s.spec = Some(common::make_service_spec(80, [("app".to_string(), "web".to_string())].into()));
        s
    });
    reader.add_pod("default", "web-0", |mut p| {
        p.metadata.labels = Some([("app".to_string(), "web".to_string())].into());
        p.spec.as_mut().unwrap().containers = vec![common::make_container_with_port("c", 80)];
        p
    });
    reader.ingresses.push(common::make_ingress("web", "default", None, &[("web", 80)]));
    // No Endpoints object at all ⇒ the backend is considered to have no ready pods.

    let context = ctx(&reader, SharedConfig::builder().build()).await;
    let findings = NetworkingValidator.validate_cluster(&context).await.unwrap();
    let ingress_checks: Vec<&str> = findings
        .iter()
        .filter(|f| f.kind == "Ingress")
        .map(|f| f.check.as_str())
        .collect();
    assert_eq!(ingress_checks, vec!["ingress_no_backend_pods"]);
    assert!(!ingress_checks.contains(&"ingress_service_missing"));
    assert!(!ingress_checks.contains(&"ingress_service_port_mismatch"));
}

#[test]
fn temporal_progression_matches_literal_timeline() {
    let tracker = StateTracker::new();
    let t0 = chrono::Utc::now();
    let err = kogaro::errors::ValidationError::new(
        "Ingress",
        "web",
        "default",
        "dangling_ingress_class",
        "missing",
        kogaro::errors::Severity::Error,
        codes::reference::DANGLING_INGRESS_CLASS,
    );
    let key = StateKey::from_error(&err);

    let s0 = tracker.record_validation_error_with_state(&err, t0);
    assert_eq!(s0, TemporalState::New);

    tracker.record_validation_error_with_state(&err, t0 + ChronoDuration::minutes(30));
    let age30m = (t0 + ChronoDuration::minutes(30) - tracker.get(&key).unwrap().first_seen).to_std().unwrap();
    assert_eq!(classify_temporal_state(age30m), TemporalState::New);

    let age2h = (t0 + ChronoDuration::hours(2) - tracker.get(&key).unwrap().first_seen).to_std().unwrap();
    assert_eq!(classify_temporal_state(age2h), TemporalState::Recent);

    let age25h = (t0 + ChronoDuration::hours(25) - tracker.get(&key).unwrap().first_seen).to_std().unwrap();
    assert_eq!(classify_temporal_state(age25h), TemporalState::Stable);

    assert_eq!(tracker.get(&key).unwrap().first_seen, t0);
}
