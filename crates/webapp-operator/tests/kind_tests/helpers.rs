//! Test helpers for integration tests
//!
//! Provides utilities for managing the kind cluster and waiting on resources.

use std::future::Future;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use kube::{Client, Config};
use tokio::sync::OnceCell;
use tokio::time::{sleep, Instant};

use webapp_cronjob::ControllerSettings;
use webapp_operator::controller_runner::build_webapp_controller;
use webapp_operator::crds::ensure_crds_installed;

/// Name of the kind cluster used for integration tests
pub const TEST_CLUSTER_NAME: &str = "webapp-integration-test";

/// Global lock to ensure cluster is created only once
static CLUSTER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Track if CRD has been installed (async-safe)
static CRD_INSTALLED: OnceCell<Result<(), String>> = OnceCell::const_new();

/// The one controller shared by every test in the process
static CONTROLLER_STARTED: OnceLock<()> = OnceLock::new();

/// Check if a kind cluster with the given name exists
pub fn kind_cluster_exists(name: &str) -> bool {
    let output = Command::new("kind")
        .args(["get", "clusters"])
        .output()
        .expect("failed to run kind");

    let clusters = String::from_utf8_lossy(&output.stdout);
    clusters.lines().any(|line| line.trim() == name)
}

/// Create a kind cluster for testing
pub fn create_kind_cluster(name: &str) -> Result<(), String> {
    if kind_cluster_exists(name) {
        println!("Kind cluster '{name}' already exists, reusing it");
        return Ok(());
    }

    println!("Creating kind cluster '{name}'...");
    let output = Command::new("kind")
        .args(["create", "cluster", "--name", name, "--wait", "60s"])
        .output()
        .map_err(|e| format!("failed to run kind: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "failed to create kind cluster: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    println!("Kind cluster '{name}' created successfully");
    Ok(())
}

/// Create a Kubernetes client connected to the test cluster
pub async fn create_test_client() -> Result<Client, String> {
    let context_name = format!("kind-{TEST_CLUSTER_NAME}");

    let config = Config::from_kubeconfig(&kube::config::KubeConfigOptions {
        context: Some(context_name),
        ..Default::default()
    })
    .await
    .map_err(|e| format!("failed to load kubeconfig: {e}"))?;

    Client::try_from(config).map_err(|e| format!("failed to create client: {e}"))
}

/// Ensure the test cluster is ready with the WebappCR CRD installed
///
/// Returns a fresh Client for each call.
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let cluster_result = CLUSTER_INIT.get_or_init(|| create_kind_cluster(TEST_CLUSTER_NAME));
    cluster_result.clone()?;

    let client = create_test_client().await?;

    let crd_result = CRD_INSTALLED
        .get_or_init(|| async {
            let client = create_test_client().await?;
            ensure_crds_installed(&client)
                .await
                .map_err(|e| format!("failed to install CRD: {e}"))?;
            // Give the API server a moment to establish the CRD
            sleep(Duration::from_secs(2)).await;
            Ok(())
        })
        .await;
    crd_result.clone()?;

    Ok(client)
}

/// Start the controller once for the whole test process
///
/// Each `#[tokio::test]` owns its runtime, so the controller gets a thread and
/// runtime of its own that outlive any single test.
pub fn ensure_controller_running() {
    CONTROLLER_STARTED.get_or_init(|| {
        std::thread::spawn(|| {
            let runtime = tokio::runtime::Runtime::new().expect("controller runtime");
            runtime.block_on(async {
                let client = create_test_client().await.expect("controller client");
                let settings = ControllerSettings {
                    resync_interval: Duration::from_secs(5),
                    ..Default::default()
                };
                build_webapp_controller(client, settings).await;
            });
        });
    });
}

/// Poll `check` until it yields `Some` or `timeout` elapses
pub async fn wait_for<T, F, Fut>(what: &str, timeout: Duration, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return value;
        }
        if Instant::now() >= deadline {
            panic!("timed out after {timeout:?} waiting for {what}");
        }
        sleep(Duration::from_millis(500)).await;
    }
}
