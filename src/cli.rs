use std::time::Duration;

use clap::{Parser, Subcommand};

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "kogaro")]
#[command(about = "Kubernetes cluster configuration hygiene auditor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the scan orchestrator: leader election, metrics/health HTTP
    /// server, scan loop (also the default when no subcommand is given).
    Run(RunArgs),

    /// One-shot connectivity and RBAC smoke test against the connected
    /// cluster: probes every resource kind Kogaro reads.
    Check,

    /// Print the crate version.
    Version,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    /// How often to re-scan the cluster.
    #[arg(long, value_parser = parse_duration, default_value = "5m")]
    pub scan_interval: Duration,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_reference_validation: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_resource_validation: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_security_validation: bool,

    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub enable_image_validation: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_networking_validation: bool,

    /// Also flag `ServiceAccount`s reachable only through a dangling
    /// `RoleBinding`/`ClusterRoleBinding` (spec.md §4.2), off by default
    /// since most clusters carry stale bindings that predate a cleanup.
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub enable_dangling_service_account_validation: bool,

    /// Minimum CPU request, e.g. "10m". Containers below this floor are
    /// flagged (KOGARO-RES-003).
    #[arg(long)]
    pub min_cpu_request: Option<String>,

    /// Minimum memory request, e.g. "64Mi". Containers below this floor
    /// are flagged (KOGARO-RES-004).
    #[arg(long)]
    pub min_memory_request: Option<String>,

    /// Namespaces that must have a NetworkPolicy restricting pod access
    /// (KOGARO-SEC-012). Repeatable.
    #[arg(long = "security-required-namespace")]
    pub security_required_namespaces: Vec<String>,

    /// Namespaces that must have a default-deny NetworkPolicy
    /// (KOGARO-NET-009). Repeatable.
    #[arg(long = "networking-required-namespace")]
    pub networking_required_namespaces: Vec<String>,

    /// Downgrade `missing_image` (KOGARO-IMG-002) to a warning
    /// (KOGARO-IMG-003) instead of an error.
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub allow_missing_images: bool,

    /// Downgrade `architecture_mismatch` (KOGARO-IMG-004) to a warning
    /// (KOGARO-IMG-005) instead of an error.
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub allow_architecture_mismatch: bool,

    /// Enable the opt-in `pod_no_service` check (KOGARO-NET-004).
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub warn_unexposed_pods: bool,

    /// Additional namespaces to treat as infrastructure, beyond the
    /// built-in `kube-system`/`kube-public`/`kube-node-lease`/`kogaro-system`
    /// set. Repeatable.
    #[arg(long = "system-namespace")]
    pub system_namespaces: Vec<String>,

    /// The service account name never reported by SEC-010/SEC-011 (a
    /// cluster's "no SA specified" default is not itself a finding).
    #[arg(long, default_value = "default")]
    pub default_service_account: String,

    /// Bind address for the `/metrics` and `/healthz`/`/readyz` HTTP server.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub metrics_bind_address: String,

    /// Bind address for the health probe HTTP server, if served separately
    /// from `--metrics-bind-address`. Kogaro serves both on the same
    /// router, so this is currently an alias; kept as a distinct flag so a
    /// future split doesn't change the CLI surface.
    #[arg(long, default_value = "0.0.0.0:8081")]
    pub health_probe_bind_address: String,

    /// Kubernetes namespace the leader-election Lease lives in.
    #[arg(long, default_value = "default")]
    pub lease_namespace: String,
}
