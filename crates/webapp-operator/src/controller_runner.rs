//! Controller runner - builds the WebappCR controller future
//!
//! The controller watches WebappCRs and the CronJobs they own, so an edit to
//! either side (including the platform updating a CronJob's status when a
//! Job starts or finishes) triggers a pass for the owning WebappCR.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::batch::v1::CronJob;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use webapp_common::crd::WebappCR;
use webapp_cronjob::{error_policy, reconcile, Context, ControllerSettings};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the WebappCR controller future
///
/// Runs until SIGTERM/SIGINT.
pub fn build_webapp_controller(
    client: Client,
    settings: ControllerSettings,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let ctx = Arc::new(Context::from_client(client.clone(), settings));
    let webapps: Api<WebappCR> = Api::all(client.clone());
    let cronjobs: Api<CronJob> = Api::all(client);

    tracing::info!("- WebappCR controller");

    Box::pin(
        Controller::new(webapps, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
            .owns(cronjobs, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(log_reconcile_result("WebappCR")),
    )
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
