//! Process-wide configuration. `SharedConfig` is built once at startup from
//! parsed CLI flags and is immutable afterward — every validator and the
//! orchestrator hold only a shared reference (`Arc<SharedConfig>`).

use std::collections::HashSet;

use crate::quantity::{parse_cpu_millis, parse_memory_bytes};

/// Workload category used as a metric label for dashboard filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadCategory {
    Infrastructure,
    Application,
}

impl WorkloadCategory {
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkloadCategory::Infrastructure => "infrastructure",
            WorkloadCategory::Application => "application",
        }
    }
}

const DEFAULT_SYSTEM_NAMESPACES: &[&str] = &[
    "kube-system",
    "kube-public",
    "kube-node-lease",
    "kogaro-system",
];

const DEFAULT_UNEXPOSED_POD_PREFIXES: &[&str] = &["migration-", "backup-"];

const DEFAULT_BATCH_OWNER_KINDS: &[&str] = &["Job", "CronJob"];

const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Builder for [`SharedConfig`]. Fields mirror the CLI flags in
/// `src/cli.rs`; defaults here are the single source of truth for both the
/// CLI's `#[arg(default_value = ...)]` annotations and programmatic/test
/// construction.
#[derive(Debug, Clone)]
pub struct SharedConfigBuilder {
    min_cpu_request_millis: Option<i64>,
    min_memory_request_bytes: Option<i64>,
    system_namespaces: HashSet<String>,
    security_required_namespaces: HashSet<String>,
    networking_required_namespaces: HashSet<String>,
    batch_owner_kinds: HashSet<String>,
    unexposed_pod_prefixes: Vec<String>,
    default_service_account: String,

    pub enable_reference_validation: bool,
    pub enable_resource_validation: bool,
    pub enable_security_validation: bool,
    pub enable_image_validation: bool,
    pub enable_networking_validation: bool,

    pub enable_dangling_service_account_validation: bool,
    pub warn_unexposed_pods: bool,

    pub allow_missing_images: bool,
    pub allow_architecture_mismatch: bool,
}

impl Default for SharedConfigBuilder {
    fn default() -> Self {
        Self {
            min_cpu_request_millis: None,
            min_memory_request_bytes: None,
            system_namespaces: DEFAULT_SYSTEM_NAMESPACES.iter().map(|s| s.to_string()).collect(),
            security_required_namespaces: HashSet::new(),
            networking_required_namespaces: HashSet::new(),
            batch_owner_kinds: DEFAULT_BATCH_OWNER_KINDS.iter().map(|s| s.to_string()).collect(),
            unexposed_pod_prefixes: DEFAULT_UNEXPOSED_POD_PREFIXES.iter().map(|s| s.to_string()).collect(),
            default_service_account: DEFAULT_SERVICE_ACCOUNT.to_string(),

            enable_reference_validation: true,
            enable_resource_validation: true,
            enable_security_validation: true,
            enable_image_validation: false,
            enable_networking_validation: true,

            enable_dangling_service_account_validation: false,
            warn_unexposed_pods: false,

            allow_missing_images: false,
            allow_architecture_mismatch: false,
        }
    }
}

impl SharedConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and set the minimum CPU request (e.g. `"10m"`, `"0.5"`).
    /// Returns an error if the quantity does not parse.
    pub fn min_cpu_request(mut self, quantity: Option<&str>) -> anyhow::Result<Self> {
        self.min_cpu_request_millis = quantity
            .map(|q| parse_cpu_millis_str(q))
            .transpose()?;
        Ok(self)
    }

    pub fn min_memory_request(mut self, quantity: Option<&str>) -> anyhow::Result<Self> {
        self.min_memory_request_bytes = quantity
            .map(|q| parse_memory_bytes_str(q))
            .transpose()?;
        Ok(self)
    }

    pub fn system_namespaces_add(mut self, extra: impl IntoIterator<Item = String>) -> Self {
        self.system_namespaces.extend(extra);
        self
    }

    pub fn security_required_namespaces(mut self, ns: impl IntoIterator<Item = String>) -> Self {
        self.security_required_namespaces = ns.into_iter().collect();
        self
    }

    pub fn networking_required_namespaces(mut self, ns: impl IntoIterator<Item = String>) -> Self {
        self.networking_required_namespaces = ns.into_iter().collect();
        self
    }

    pub fn default_service_account(mut self, name: impl Into<String>) -> Self {
        self.default_service_account = name.into();
        self
    }

    pub fn build(self) -> SharedConfig {
        SharedConfig {
            min_cpu_request_millis: self.min_cpu_request_millis,
            min_memory_request_bytes: self.min_memory_request_bytes,
            system_namespaces: self.system_namespaces,
            security_required_namespaces: self.security_required_namespaces,
            networking_required_namespaces: self.networking_required_namespaces,
            batch_owner_kinds: self.batch_owner_kinds,
            unexposed_pod_prefixes: self.unexposed_pod_prefixes,
            default_service_account: self.default_service_account,
            enable_reference_validation: self.enable_reference_validation,
            enable_resource_validation: self.enable_resource_validation,
            enable_security_validation: self.enable_security_validation,
            enable_image_validation: self.enable_image_validation,
            enable_networking_validation: self.enable_networking_validation,
            enable_dangling_service_account_validation: self.enable_dangling_service_account_validation,
            warn_unexposed_pods: self.warn_unexposed_pods,
            allow_missing_images: self.allow_missing_images,
            allow_architecture_mismatch: self.allow_architecture_mismatch,
        }
    }
}

fn parse_cpu_millis_str(q: &str) -> anyhow::Result<i64> {
    parse_cpu_millis(q).ok_or_else(|| anyhow::anyhow!("invalid CPU quantity: {q}"))
}

fn parse_memory_bytes_str(q: &str) -> anyhow::Result<i64> {
    parse_memory_bytes(q).ok_or_else(|| anyhow::anyhow!("invalid memory quantity: {q}"))
}

/// Immutable, process-wide configuration set at startup.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    min_cpu_request_millis: Option<i64>,
    min_memory_request_bytes: Option<i64>,
    system_namespaces: HashSet<String>,
    security_required_namespaces: HashSet<String>,
    networking_required_namespaces: HashSet<String>,
    batch_owner_kinds: HashSet<String>,
    unexposed_pod_prefixes: Vec<String>,
    default_service_account: String,

    pub enable_reference_validation: bool,
    pub enable_resource_validation: bool,
    pub enable_security_validation: bool,
    pub enable_image_validation: bool,
    pub enable_networking_validation: bool,

    pub enable_dangling_service_account_validation: bool,
    pub warn_unexposed_pods: bool,

    pub allow_missing_images: bool,
    pub allow_architecture_mismatch: bool,
}

impl SharedConfig {
    pub fn builder() -> SharedConfigBuilder {
        SharedConfigBuilder::new()
    }

    pub fn min_cpu_request_millis(&self) -> Option<i64> {
        self.min_cpu_request_millis
    }

    pub fn min_memory_request_bytes(&self) -> Option<i64> {
        self.min_memory_request_bytes
    }

    pub fn is_system_namespace(&self, namespace: &str) -> bool {
        self.system_namespaces.contains(namespace)
            || ["system", "monitoring", "logging", "security"]
                .iter()
                .any(|kw| namespace.contains(kw))
    }

    pub fn is_security_required_namespace(&self, namespace: &str) -> bool {
        self.security_required_namespaces.contains(namespace)
    }

    pub fn security_required_namespaces(&self) -> impl Iterator<Item = &str> {
        self.security_required_namespaces.iter().map(String::as_str)
    }

    pub fn is_networking_required_namespace(&self, namespace: &str) -> bool {
        self.networking_required_namespaces.contains(namespace)
    }

    pub fn is_batch_owner_kind(&self, kind: &str) -> bool {
        self.batch_owner_kinds.contains(kind)
    }

    pub fn is_unexposed_pod_name(&self, name: &str) -> bool {
        self.unexposed_pod_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    pub fn default_service_account(&self) -> &str {
        &self.default_service_account
    }

    /// Workload classification is a pure function of namespace (spec.md §3):
    /// `Infrastructure` iff the namespace is in the system set or its name
    /// contains one of a fixed set of keywords; otherwise `Application`.
    pub fn classify_workload(&self, namespace: &str) -> WorkloadCategory {
        if self.is_system_namespace(namespace) {
            WorkloadCategory::Infrastructure
        } else {
            WorkloadCategory::Application
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_system_namespaces() {
        let cfg = SharedConfig::builder().build();
        assert!(cfg.is_system_namespace("kube-system"));
        assert!(!cfg.is_system_namespace("default"));
    }

    #[test]
    fn test_system_namespace_keyword_match() {
        let cfg = SharedConfig::builder().build();
        assert!(cfg.is_system_namespace("cert-manager-system"));
        assert!(cfg.is_system_namespace("monitoring"));
        assert!(cfg.is_system_namespace("app-logging"));
        assert!(cfg.is_system_namespace("security-scanners"));
        assert!(!cfg.is_system_namespace("production"));
    }

    #[test]
    fn test_system_namespace_additions() {
        let cfg = SharedConfig::builder()
            .system_namespaces_add(["istio-system".to_string()])
            .build();
        assert!(cfg.is_system_namespace("istio-system"));
    }

    #[test]
    fn test_classify_workload_total_and_deterministic() {
        let cfg = SharedConfig::builder().build();
        for ns in ["kube-system", "default", "monitoring", "prod"] {
            let a = cfg.classify_workload(ns);
            let b = cfg.classify_workload(ns);
            assert_eq!(a, b);
        }
        assert_eq!(cfg.classify_workload("kube-system"), WorkloadCategory::Infrastructure);
        assert_eq!(cfg.classify_workload("prod"), WorkloadCategory::Application);
    }

    #[test]
    fn test_min_cpu_request_parses() {
        let cfg = SharedConfig::builder().min_cpu_request(Some("10m")).unwrap().build();
        assert_eq!(cfg.min_cpu_request_millis(), Some(10));
    }

    #[test]
    fn test_min_cpu_request_rejects_garbage() {
        let result = SharedConfig::builder().min_cpu_request(Some("not-a-quantity"));
        assert!(result.is_err());
    }

    #[test]
    fn test_min_cpu_request_none_by_default() {
        let cfg = SharedConfig::builder().build();
        assert_eq!(cfg.min_cpu_request_millis(), None);
    }

    #[test]
    fn test_unexposed_pod_prefixes() {
        let cfg = SharedConfig::builder().build();
        assert!(cfg.is_unexposed_pod_name("migration-2024-01"));
        assert!(cfg.is_unexposed_pod_name("backup-nightly"));
        assert!(!cfg.is_unexposed_pod_name("web-server"));
    }

    #[test]
    fn test_default_service_account_never_reported() {
        let cfg = SharedConfig::builder().build();
        assert_eq!(cfg.default_service_account(), "default");
    }

    #[test]
    fn test_batch_owner_kinds() {
        let cfg = SharedConfig::builder().build();
        assert!(cfg.is_batch_owner_kind("Job"));
        assert!(cfg.is_batch_owner_kind("CronJob"));
        assert!(!cfg.is_batch_owner_kind("Deployment"));
    }

    #[test]
    fn test_security_required_namespaces() {
        let cfg = SharedConfig::builder()
            .security_required_namespaces(["payments".to_string()])
            .build();
        assert!(cfg.is_security_required_namespace("payments"));
        assert!(!cfg.is_security_required_namespace("default"));
    }

    #[test]
    fn test_dangling_service_account_disabled_by_default() {
        let cfg = SharedConfig::builder().build();
        assert!(!cfg.enable_dangling_service_account_validation);
    }

    #[test]
    fn test_image_validation_disabled_by_default() {
        let cfg = SharedConfig::builder().build();
        assert!(!cfg.enable_image_validation);
    }
}
