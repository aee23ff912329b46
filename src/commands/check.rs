use kube::Client;

use kogaro::cluster::{ClusterReader, KubeClusterReader};

/// One-shot connectivity/RBAC smoke test, generalized from the teacher's
/// pods+nodes probe to every resource kind Kogaro reads (SPEC_FULL.md §4.1).
pub async fn run() -> anyhow::Result<()> {
    println!("Running cluster connectivity checks...\n");

    print!("  Kubeconfig .................. ");
    let client = match Client::try_default().await {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAIL");
            anyhow::bail!("Cannot load kubeconfig: {e}");
        }
    };

    print!("  Cluster connection .......... ");
    let version = match client.apiserver_version().await {
        Ok(v) => {
            println!("OK (v{}.{})", v.major, v.minor);
            Some(v)
        }
        Err(e) => {
            println!("FAIL");
            println!("\n  Error: {e}");
            println!("  Hint:  Is the cluster running? Check with: kubectl cluster-info\n");
            return Ok(());
        }
    };

    let reader = KubeClusterReader::new(client);

    probe("pods", reader.list_pods().await.map(|v| v.len())).await;
    probe("deployments", reader.list_deployments().await.map(|v| v.len())).await;
    probe("statefulsets", reader.list_statefulsets().await.map(|v| v.len())).await;
    probe("daemonsets", reader.list_daemonsets().await.map(|v| v.len())).await;
    probe("jobs", reader.list_jobs().await.map(|v| v.len())).await;
    probe("cronjobs", reader.list_cronjobs().await.map(|v| v.len())).await;
    probe("services", reader.list_services().await.map(|v| v.len())).await;
    probe("endpoints", reader.list_endpoints().await.map(|v| v.len())).await;
    probe("ingresses", reader.list_ingresses().await.map(|v| v.len())).await;
    probe("ingressclasses", reader.list_ingress_classes().await.map(|v| v.len())).await;
    probe("configmaps", reader.list_configmaps().await.map(|v| v.len())).await;
    probe("secrets", reader.list_secrets().await.map(|v| v.len())).await;
    probe("serviceaccounts", reader.list_service_accounts().await.map(|v| v.len())).await;
    probe("persistentvolumeclaims", reader.list_pvcs().await.map(|v| v.len())).await;
    probe("storageclasses", reader.list_storage_classes().await.map(|v| v.len())).await;
    probe("networkpolicies", reader.list_network_policies().await.map(|v| v.len())).await;
    probe("rolebindings", reader.list_role_bindings().await.map(|v| v.len())).await;
    probe("clusterrolebindings", reader.list_cluster_role_bindings().await.map(|v| v.len())).await;
    probe("nodes", reader.list_nodes().await.map(|v| v.len())).await;
    probe("namespaces", reader.list_namespaces().await.map(|v| v.len())).await;

    if let Some(v) = version {
        println!("\n  Kubernetes version: {}.{}", v.major, v.minor);
    }

    println!("\nAll checks completed.");
    Ok(())
}

async fn probe(label: &str, result: anyhow::Result<usize>) {
    print!("  List {label} permission ........ ");
    match result {
        Ok(count) => println!("OK ({count} found)"),
        Err(e) => println!("FAIL ({e})"),
    }
}
