//! WebappCR controller implementation
//!
//! One pass per invocation, no memory between passes:
//! fetch → build → link & apply → re-read → aggregate → persist status.
//!
//! Convergence comes from the runtime re-invoking the pass (watch events on
//! the WebappCR and its CronJob, plus a periodic requeue). The pass never
//! loops or retries in-process.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument};

use webapp_common::crd::{ExecutionStatus, WebappCR, WebappCRStatus};
use webapp_common::events::{actions, reasons, EventPublisher};
use webapp_common::KubeEventPublisher;
#[cfg(test)]
use webapp_common::NoopEventPublisher;

use crate::aggregator::{aggregate, ExecutionSummary};
use crate::applier::{apply_cronjob, CronJobChange};
use crate::builder::{build_cronjob, cronjob_name, owner_selector, TaskTemplate};
use crate::client::{CronJobKubeClient, CronJobKubeClientImpl};
use crate::error::ReconcileError;

/// Name reported on Kubernetes Events
pub const CONTROLLER_NAME: &str = "webapp-cronjob-controller";

/// Tunables for the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Requeue delay after a successful pass
    pub resync_interval: Duration,
    /// Requeue delay after a retryable failure
    pub error_backoff: Duration,
    /// Deadline for a single pass; exceeding it cancels the pass
    pub pass_timeout: Duration,
    /// Fixed parts of the generated CronJob
    pub task: TaskTemplate,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(60),
            error_backoff: Duration::from_secs(30),
            pass_timeout: Duration::from_secs(30),
            task: TaskTemplate::default(),
        }
    }
}

/// Shared context for the WebappCR controller
pub struct Context {
    /// Object-store access
    pub kube: Arc<dyn CronJobKubeClient>,
    /// Event publisher for status transitions and CronJob writes
    pub events: Arc<dyn EventPublisher>,
    pub settings: ControllerSettings,
}

impl Context {
    pub fn new(
        kube: Arc<dyn CronJobKubeClient>,
        events: Arc<dyn EventPublisher>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            kube,
            events,
            settings,
        }
    }

    /// Create a context backed by a real Kubernetes client
    pub fn from_client(client: Client, settings: ControllerSettings) -> Self {
        let events = Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME));
        Self {
            kube: Arc::new(CronJobKubeClientImpl::new(client)),
            events,
            settings,
        }
    }

    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn CronJobKubeClient>) -> Self {
        Self::new(kube, Arc::new(NoopEventPublisher), ControllerSettings::default())
    }
}

/// How a pass ended
#[derive(Clone, Debug, PartialEq)]
pub enum PassOutcome {
    /// The WebappCR no longer exists; nothing was written
    Deleted,
    /// The CronJob and status reflect the current spec
    Reconciled {
        status: WebappCRStatus,
        cronjob: CronJobChange,
        status_written: bool,
    },
}

/// Run one reconcile pass for the WebappCR identified by `namespace/name`.
pub async fn reconcile_key(
    namespace: &str,
    name: &str,
    ctx: &Context,
) -> Result<PassOutcome, ReconcileError> {
    // 1. Fetch
    let Some(webapp) = ctx.kube.get_webapp(name, namespace).await? else {
        debug!(webapp = %name, namespace = %namespace, "WebappCR gone, nothing to do");
        return Ok(PassOutcome::Deleted);
    };

    // 2. Build
    let desired = build_cronjob(name, namespace, &webapp.spec, &ctx.settings.task);

    // 3. Link & apply
    let applied = apply_cronjob(ctx.kube.as_ref(), &webapp, desired).await?;
    match applied.change {
        CronJobChange::Created => {
            publish(ctx, &webapp, EventType::Normal, reasons::CRONJOB_CREATED, actions::APPLY, None)
                .await
        }
        CronJobChange::Updated => {
            publish(ctx, &webapp, EventType::Normal, reasons::CRONJOB_UPDATED, actions::APPLY, None)
                .await
        }
        CronJobChange::Unchanged => {}
    }

    let mut status = webapp.status.clone().unwrap_or_default();

    // 4. Re-read observed schedule time
    let observed = ctx
        .kube
        .get_cronjob(&cronjob_name(name), namespace)
        .await?
        .unwrap_or(applied.cronjob);
    match observed.status.as_ref().and_then(|s| s.last_schedule_time.as_ref()) {
        Some(t) => status.last_execution_time = Some(t.0),
        None => info!(webapp = %name, "CronJob has not been scheduled yet"),
    }

    // 5. Aggregate
    let summary = aggregate(ctx.kube.as_ref(), namespace, &owner_selector(name)).await?;
    status.execution_status = Some(summary.status());
    status.observed_generation = webapp.metadata.generation;

    // 6. Persist
    let previous = webapp.status.as_ref().and_then(|s| s.execution_status);
    let status_written = persist_status(&webapp, &status, ctx).await?;
    if status_written {
        announce_transition(ctx, &webapp, previous, &summary).await;
    }

    Ok(PassOutcome::Reconciled {
        status,
        cronjob: applied.change,
        status_written,
    })
}

/// Reconcile a WebappCR
///
/// Entry point for `kube::runtime::Controller`. The pass is bounded by
/// `settings.pass_timeout`; hitting it yields [`ReconcileError::Cancelled`].
#[instrument(skip(webapp, ctx), fields(webapp = %webapp.name_any()))]
pub async fn reconcile(webapp: Arc<WebappCR>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let name = webapp.name_any();
    let namespace = webapp.namespace().ok_or(ReconcileError::MissingNamespace)?;
    let deadline = ctx.settings.pass_timeout;

    let outcome = tokio::time::timeout(deadline, reconcile_key(&namespace, &name, &ctx))
        .await
        .map_err(|_| ReconcileError::Cancelled(deadline))??;

    match outcome {
        PassOutcome::Deleted => Ok(Action::await_change()),
        PassOutcome::Reconciled { status, .. } => {
            debug!(execution = ?status.execution_status, "webapp reconciled");
            Ok(Action::requeue(ctx.settings.resync_interval))
        }
    }
}

/// Error policy for the WebappCR controller
///
/// Retryable errors requeue after `settings.error_backoff`; permanent ones
/// wait for the next change to the object.
pub fn error_policy(webapp: Arc<WebappCR>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        webapp = %webapp.name_any(),
        retryable = error.is_retryable(),
        "webapp reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ctx.settings.error_backoff)
    } else {
        Action::await_change()
    }
}

/// Write `status` if it differs from what is stored.
///
/// Skipping an identical write keeps the controller from re-triggering itself
/// through its own watch. Returns whether a write happened.
async fn persist_status(
    webapp: &WebappCR,
    status: &WebappCRStatus,
    ctx: &Context,
) -> Result<bool, ReconcileError> {
    if webapp.status.as_ref() == Some(status) {
        debug!("status unchanged, skipping update");
        return Ok(false);
    }

    let mut updated = webapp.clone();
    updated.status = Some(status.clone());
    ctx.kube.replace_webapp_status(&updated).await?;
    Ok(true)
}

async fn announce_transition(
    ctx: &Context,
    webapp: &WebappCR,
    previous: Option<ExecutionStatus>,
    summary: &ExecutionSummary,
) {
    let current = summary.status();
    if previous == Some(current) {
        return;
    }

    info!(
        webapp = %webapp.name_any(),
        from = ?previous,
        to = %current,
        running = summary.running,
        "execution status changed"
    );

    let reason = match current {
        ExecutionStatus::Active => reasons::EXECUTION_ACTIVE,
        ExecutionStatus::Inactive => reasons::EXECUTION_INACTIVE,
    };
    let note = format!(
        "{} of {} jobs running, {} succeeded, {} failed",
        summary.running,
        summary.total(),
        summary.succeeded,
        summary.failed
    );
    publish(ctx, webapp, EventType::Normal, reason, actions::RECONCILE, Some(note)).await;
}

async fn publish(
    ctx: &Context,
    webapp: &WebappCR,
    type_: EventType,
    reason: &str,
    action: &str,
    note: Option<String>,
) {
    ctx.events
        .publish(&webapp.object_ref(&()), type_, reason, action, note)
        .await;
}

// =============================================================================
// Tests
// =============================================================================
