//! CRD rendering and installation

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, CustomResourceExt};

use webapp_common::crd::WebappCR;
use webapp_common::FIELD_MANAGER;

/// Render the WebappCR CRD as YAML
pub fn crd_yaml() -> anyhow::Result<String> {
    serde_yaml::to_string(&WebappCR::crd())
        .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))
}

/// Ensure the WebappCR CRD is installed
///
/// Uses server-side apply so the installed schema always matches the
/// operator version.
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let crd = WebappCR::crd();
    let name = WebappCR::crd_name();

    tracing::info!(crd = %name, "Installing WebappCR CRD...");
    crds.patch(name, &params, &Patch::Apply(&crd))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install WebappCR CRD: {}", e))?;

    tracing::info!("WebappCR CRD installed/updated");
    Ok(())
}
