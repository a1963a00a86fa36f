use anyhow::Result;
use kube::CustomResourceExt;

use grc_e2e::client::KubeClusterClient;
use grc_e2e::config::E2eConfig;
use grc_e2e::crd::Policy;

/// Print the Policy CRD YAML to stdout for `kubectl apply -f`.
pub fn generate() -> Result<()> {
    let crd = Policy::crd();
    let yaml = serde_yaml::to_string(&crd)?;
    println!("{yaml}");
    Ok(())
}

/// Apply the Policy CRD to the hub cluster, for test clusters without the
/// governance framework installed.
pub async fn install(config: &E2eConfig) -> Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::Api;

    let hub = KubeClusterClient::connect(config.kubeconfig_hub.as_deref(), "hub").await?;
    let crds: Api<CustomResourceDefinition> = Api::all(hub.inner().clone());

    let crd = Policy::crd();
    let name = crd.metadata.name.clone().unwrap_or_default();

    match crds.create(&Default::default(), &crd).await {
        Ok(_) => {
            println!("CRD '{name}' installed successfully");
        }
        Err(kube::Error::Api(err)) if err.code == 409 => {
            println!("CRD '{name}' already exists, skipping");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
