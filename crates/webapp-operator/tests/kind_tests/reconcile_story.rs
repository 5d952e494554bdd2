//! Integration tests for the reconcile loop
//!
//! Each test runs the real controller against a kind cluster and observes
//! the CronJob and WebappCR status it produces.

use std::time::Duration;

use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};

use webapp_common::crd::{ExecutionStatus, WebappCR, WebappCRSpec};
use webapp_cronjob::builder::OWNER_LABEL;

use super::helpers::{ensure_controller_running, ensure_test_cluster, wait_for};

const WAIT: Duration = Duration::from_secs(60);

// =============================================================================
// Test Fixtures
// =============================================================================

fn sample_webapp(name: &str, backoff_limit: i32) -> WebappCR {
    WebappCR {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: WebappCRSpec {
            uri: "http://example.com/healthz".to_string(),
            backoff_limit,
        },
        status: None,
    }
}

async fn fresh_namespace(client: &Client, name: &str) {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {}
        Err(kube::Error::Api(e)) if e.code == 409 => {}
        Err(e) => panic!("failed to create namespace {name}: {e}"),
    }
}

fn job_backoff_limit(cj: &CronJob) -> Option<i32> {
    cj.spec.as_ref()?.job_template.spec.as_ref()?.backoff_limit
}

// =============================================================================
// Stories
// =============================================================================

/// Story: a platform user creates a WebappCR, tunes its retry budget, and
/// later removes it
#[tokio::test]
#[ignore]
async fn story_webapp_lifecycle_drives_owned_cronjob() {
    let client = ensure_test_cluster().await.unwrap();
    let ns = "webapp-lifecycle";
    fresh_namespace(&client, ns).await;
    ensure_controller_running();

    let webapps: &Api<WebappCR> = &Api::namespaced(client.clone(), ns);
    let cronjobs: &Api<CronJob> = &Api::namespaced(client.clone(), ns);

    // Create
    let created = webapps
        .create(&PostParams::default(), &sample_webapp("web", 3))
        .await
        .expect("create WebappCR");

    let cj = wait_for("CronJob to be created", WAIT, || async move {
        cronjobs.get_opt("web").await.ok().flatten()
    })
    .await;
    assert_eq!(job_backoff_limit(&cj), Some(3));
    assert_eq!(cj.labels().get(OWNER_LABEL).map(String::as_str), Some("web"));
    let oref = &cj.owner_references()[0];
    assert_eq!(Some(oref.uid.clone()), created.uid());
    assert_eq!(oref.controller, Some(true));

    let status = wait_for("status to be reported", WAIT, || async move {
        webapps
            .get_opt("web")
            .await
            .ok()
            .flatten()
            .and_then(|w| w.status)
            .filter(|s| s.execution_status.is_some())
    })
    .await;
    assert!(matches!(
        status.execution_status,
        Some(ExecutionStatus::Active | ExecutionStatus::Inactive)
    ));

    // Update
    let patch = serde_json::json!({ "spec": { "backoffLimit": 5 } });
    webapps
        .patch("web", &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .expect("patch WebappCR");

    let cj = wait_for("CronJob to pick up backoffLimit 5", WAIT, || async move {
        cronjobs
            .get_opt("web")
            .await
            .ok()
            .flatten()
            .filter(|cj| job_backoff_limit(cj) == Some(5))
    })
    .await;
    assert_eq!(cj.spec.as_ref().map(|s| s.schedule.as_str()), Some("*/1 * * * *"));

    // Delete; the CronJob goes with its owner via garbage collection
    webapps
        .delete("web", &DeleteParams::foreground())
        .await
        .expect("delete WebappCR");

    wait_for("CronJob to be garbage collected", WAIT, || async move {
        match cronjobs.get_opt("web").await {
            Ok(None) => Some(()),
            _ => None,
        }
    })
    .await;
}

/// Story: someone hand-edits the generated CronJob and the controller puts
/// it back
#[tokio::test]
#[ignore]
async fn story_manual_cronjob_edit_is_reverted() {
    let client = ensure_test_cluster().await.unwrap();
    let ns = "webapp-drift";
    fresh_namespace(&client, ns).await;
    ensure_controller_running();

    let webapps: &Api<WebappCR> = &Api::namespaced(client.clone(), ns);
    let cronjobs: &Api<CronJob> = &Api::namespaced(client.clone(), ns);

    webapps
        .create(&PostParams::default(), &sample_webapp("drift", 2))
        .await
        .expect("create WebappCR");

    wait_for("CronJob to be created", WAIT, || async move {
        cronjobs.get_opt("drift").await.ok().flatten()
    })
    .await;

    let patch = serde_json::json!({
        "spec": { "jobTemplate": { "spec": { "backoffLimit": 9 } } }
    });
    cronjobs
        .patch("drift", &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .expect("hand-edit CronJob");

    wait_for("controller to restore backoffLimit 2", WAIT, || async move {
        cronjobs
            .get_opt("drift")
            .await
            .ok()
            .flatten()
            .filter(|cj| job_backoff_limit(cj) == Some(2))
    })
    .await;

    let _ = webapps.delete("drift", &DeleteParams::default()).await;
}
