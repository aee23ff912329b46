use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use kube::Client;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

use kogaro::cli::RunArgs;
use kogaro::cluster::KubeClusterReader;
use kogaro::config::SharedConfig;
use kogaro::leader::{acquire_leader, lease_renewal_loop};
use kogaro::registry::{Registry, ScanOrchestrator};
use kogaro::server::{start_http_server, Readiness};
use kogaro::validators::{image, networking, reference, resources, security};

fn build_config(args: &RunArgs) -> anyhow::Result<SharedConfig> {
    let mut builder = SharedConfig::builder()
        .min_cpu_request(args.min_cpu_request.as_deref())
        .context("invalid --min-cpu-request")?
        .min_memory_request(args.min_memory_request.as_deref())
        .context("invalid --min-memory-request")?
        .system_namespaces_add(args.system_namespaces.clone())
        .security_required_namespaces(args.security_required_namespaces.clone())
        .networking_required_namespaces(args.networking_required_namespaces.clone())
        .default_service_account(args.default_service_account.clone());

    builder.enable_reference_validation = args.enable_reference_validation;
    builder.enable_resource_validation = args.enable_resource_validation;
    builder.enable_security_validation = args.enable_security_validation;
    builder.enable_image_validation = args.enable_image_validation;
    builder.enable_networking_validation = args.enable_networking_validation;
    builder.enable_dangling_service_account_validation = args.enable_dangling_service_account_validation;
    builder.warn_unexposed_pods = args.warn_unexposed_pods;
    builder.allow_missing_images = args.allow_missing_images;
    builder.allow_architecture_mismatch = args.allow_architecture_mismatch;

    Ok(builder.build())
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    info!(event = "orchestrator_starting");

    let client = Client::try_default()
        .await
        .context("failed to connect to Kubernetes cluster")?;

    print!("  Cluster connection .......... ");
    match client.apiserver_version().await {
        Ok(v) => println!("OK (v{}.{})", v.major, v.minor),
        Err(e) => {
            println!("FAIL");
            anyhow::bail!("cannot reach cluster: {e}");
        }
    }

    print!("  Leader election .............. ");
    if !acquire_leader(&client, &args.lease_namespace).await? {
        println!("waiting (another instance holds the lease)");
        info!(event = "not_leader_waiting");
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        }
    }
    println!("acquired");
    info!(event = "leader_acquired");

    let config = Arc::new(build_config(&args)?);

    let mut registry = Registry::new();
    registry.register(Box::new(reference::ReferenceValidator));
    registry.register(Box::new(resources::ResourceLimitsValidator));
    registry.register(Box::new(security::SecurityValidator));
    registry.register(Box::new(image::ImageValidator::default()));
    registry.register(Box::new(networking::NetworkingValidator));

    let reader = KubeClusterReader::new(client.clone());
    let readiness = Readiness::new();
    let orchestrator = Arc::new(
        ScanOrchestrator::new(registry, reader, config).with_readiness(readiness.clone()),
    );

    let addr: SocketAddr = args
        .metrics_bind_address
        .parse()
        .with_context(|| format!("invalid --metrics-bind-address '{}'", args.metrics_bind_address))?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let renewal_client = client.clone();
    let renewal_namespace = args.lease_namespace.clone();
    let renewal_shutdown = shutdown_tx.subscribe();
    let lease_handle = tokio::spawn(async move {
        lease_renewal_loop(renewal_client, renewal_namespace, renewal_shutdown).await
    });

    let scan_shutdown = shutdown_tx.subscribe();
    let scan_orchestrator = orchestrator.clone();
    let scan_interval = args.scan_interval;
    let scan_handle = tokio::spawn(async move {
        scan_orchestrator.start(scan_interval, scan_shutdown).await
    });

    let http_shutdown = shutdown_tx.subscribe();
    let http_handle = tokio::spawn(async move { start_http_server(addr, readiness, http_shutdown).await });

    println!("  HTTP server ................. http://{addr}");
    println!();
    println!("  Available endpoints:");
    println!("    GET /healthz .............. Liveness probe (always 200 OK)");
    println!("    GET /readyz ............... Readiness probe (503 until first scan, then 200)");
    println!("    GET /metrics .............. Prometheus metrics scrape endpoint");
    println!();
    println!("Kogaro running. Press Ctrl+C to stop.");

    wait_for_shutdown_signal().await?;
    info!(event = "shutdown_signal_received");
    println!("\nShutdown signal received. Stopping Kogaro...");

    let _ = shutdown_tx.send(());

    scan_handle.await?;
    lease_handle.await?;
    http_handle.await??;

    info!(event = "orchestrator_stopped");
    println!("Kogaro stopped.");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    signal::ctrl_c().await?;
    Ok(())
}
