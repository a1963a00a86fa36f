use std::path::Path;

use kube::Api;
use kube::api::{DynamicObject, ListParams};

use grc_e2e::client::{KubeClusterClient, ResourceKind};
use grc_e2e::config::E2eConfig;

pub async fn run(config: &E2eConfig) -> anyhow::Result<()> {
    println!("Running cluster connectivity checks...\n");

    let hub_ok = check_cluster("hub", config.kubeconfig_hub.as_deref(), &config.user_namespace).await;
    println!();
    let managed_ok = check_cluster(
        "managed",
        config.kubeconfig_managed.as_deref(),
        &config.cluster_namespace,
    )
    .await;

    println!("\nAll checks completed.");
    if !(hub_ok && managed_ok) {
        anyhow::bail!("One or more connectivity checks failed");
    }
    Ok(())
}

async fn check_cluster(label: &str, kubeconfig: Option<&Path>, namespace: &str) -> bool {
    println!("  [{label}]");

    // 1. Build client from kubeconfig
    print!("  Kubeconfig .................. ");
    let client = match KubeClusterClient::connect(kubeconfig, label).await {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAIL");
            println!("  Error: {e:#}");
            return false;
        }
    };

    // 2. Verify actual connectivity by fetching server version
    print!("  Cluster connection .......... ");
    match client.inner().apiserver_version().await {
        Ok(v) => println!("OK (v{}.{})", v.major, v.minor),
        Err(e) => {
            println!("FAIL");
            println!("\n  Error: {e}");
            println!("  Hint:  Is the cluster running? Check with: kubectl cluster-info\n");
            return false;
        }
    }

    // 3. List policies permission in the namespace the suite reads
    print!("  List policies ({namespace}) ... ");
    let policies: Api<DynamicObject> = Api::namespaced_with(
        client.inner().clone(),
        namespace,
        &ResourceKind::POLICY.api_resource(),
    );
    match policies.list(&ListParams::default().limit(1)).await {
        Ok(_) => {
            println!("OK");
            true
        }
        Err(e) => {
            println!("FAIL ({e})");
            false
        }
    }
}
