//! Kogaro: a Kubernetes cluster-configuration-hygiene auditor. Scans a
//! cluster on an interval, runs five independent validator domains against
//! a single in-memory snapshot, and exposes findings as Prometheus metrics
//! with temporal state (new / recent / stable / resolved).
//!
//! `main.rs` stays thin: parse flags into [`config::SharedConfig`], build a
//! `kube::Client`, wire the [`registry::Registry`], and call into
//! [`registry::ScanOrchestrator`]. All validation logic lives here.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod errors;
pub mod leader;
pub mod metrics;
pub mod quantity;
pub mod registry;
pub mod server;
pub mod state;
pub mod templates;
pub mod testing;
pub mod validators;
