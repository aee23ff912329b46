//! Lease-based leader election (SPEC_FULL.md §5), grounded in
//! `commands/watch.rs`'s `acquire_leader`/`lease_renewal_loop`. Only the
//! leader runs the scan loop; standbys wait so multiple replicas never
//! double-count findings or race the metrics fabric.

use std::time::Duration;

use anyhow::Result;
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::{Api, Client};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::info;

const LEASE_NAME: &str = "kogaro-leader";
const LEASE_DURATION_SECONDS: i32 = 15;
const LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(5);
const HOLDER_IDENTITY: &str = "kogaro-instance";

/// Attempt to become leader: create the lease if absent, or take over an
/// expired/self-held one. Returns `false` if another live holder has it.
pub async fn acquire_leader(client: &Client, namespace: &str) -> Result<bool> {
    let leases: Api<Lease> = Api::namespaced(client.clone(), namespace);

    let now = MicroTime(chrono::Utc::now());
    let lease = Lease {
        metadata: ObjectMeta {
            name: Some(LEASE_NAME.to_string()),
            ..Default::default()
        },
        spec: Some(LeaseSpec {
            holder_identity: Some(HOLDER_IDENTITY.to_string()),
            lease_duration_seconds: Some(LEASE_DURATION_SECONDS),
            acquire_time: Some(now.clone()),
            renew_time: Some(now),
            ..Default::default()
        }),
    };

    match leases.create(&Default::default(), &lease).await {
        Ok(_) => return Ok(true),
        Err(kube::Error::Api(err)) if err.code == 409 => {
            info!(event = "lease_exists_checking_expiry");
        }
        Err(_) => return Ok(false),
    }

    let existing = leases.get(LEASE_NAME).await?;

    let can_take = match &existing.spec {
        Some(spec) => {
            let is_ours = spec.holder_identity.as_deref() == Some(HOLDER_IDENTITY);
            let is_expired = spec.renew_time.as_ref().is_none_or(|t| {
                let duration_secs = spec.lease_duration_seconds.unwrap_or(LEASE_DURATION_SECONDS) as i64;
                chrono::Utc::now().signed_duration_since(t.0) > chrono::Duration::seconds(duration_secs)
            });
            is_ours || is_expired
        }
        None => true,
    };

    if !can_take {
        return Ok(false);
    }

    info!(event = "lease_takeover");
    let now = MicroTime(chrono::Utc::now());
    let patch = serde_json::json!({
        "spec": {
            "holderIdentity": HOLDER_IDENTITY,
            "leaseDurationSeconds": LEASE_DURATION_SECONDS,
            "acquireTime": now,
            "renewTime": now,
        }
    });

    match leases
        .patch(LEASE_NAME, &kube::api::PatchParams::default(), &kube::api::Patch::Merge(&patch))
        .await
    {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Periodically renew the lease until `shutdown` fires.
pub async fn lease_renewal_loop(client: Client, namespace: String, mut shutdown: broadcast::Receiver<()>) {
    let leases: Api<Lease> = Api::namespaced(client, &namespace);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!(event = "lease_renewal_stopped");
                return;
            }
            _ = sleep(LEASE_RENEW_INTERVAL) => {
                let now = MicroTime(chrono::Utc::now());
                let patch = serde_json::json!({ "spec": { "renewTime": now } });
                if let Err(e) = leases
                    .patch(LEASE_NAME, &kube::api::PatchParams::default(), &kube::api::Patch::Merge(&patch))
                    .await
                {
                    info!(error = %e, event = "lease_renewal_failed");
                }
            }
        }
    }
}
