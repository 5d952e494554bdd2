//! Execution aggregation over the Jobs spawned by a WebappCR's CronJob

use k8s_openapi::api::batch::v1::Job;
use kube::ResourceExt;
use tracing::{debug, trace};

use webapp_common::crd::ExecutionStatus;

use crate::client::CronJobKubeClient;
use crate::error::ReconcileError;

const CONDITION_COMPLETE: &str = "Complete";
const CONDITION_FAILED: &str = "Failed";
const CONDITION_TRUE: &str = "True";

/// Terminal state of a single Job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// No Complete or Failed condition is true yet
    Running,
    /// Complete=True
    Succeeded,
    /// Failed=True; wins over Complete=True when both are set
    Failed,
}

impl JobOutcome {
    /// Whether the Job has reached a terminal condition
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Classify a Job by its status conditions.
pub fn classify(job: &Job) -> JobOutcome {
    let conditions = job
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();

    let is_true = |type_: &str| {
        conditions
            .iter()
            .any(|c| c.type_ == type_ && c.status == CONDITION_TRUE)
    };

    if is_true(CONDITION_FAILED) {
        JobOutcome::Failed
    } else if is_true(CONDITION_COMPLETE) {
        JobOutcome::Succeeded
    } else {
        JobOutcome::Running
    }
}

/// Counts of Job outcomes from one listing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ExecutionSummary {
    /// Reduce a set of Jobs to outcome counts
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        jobs.into_iter()
            .fold(Self::default(), |mut acc, job| {
                match classify(job) {
                    JobOutcome::Running => acc.running += 1,
                    JobOutcome::Succeeded => acc.succeeded += 1,
                    JobOutcome::Failed => acc.failed += 1,
                }
                acc
            })
    }

    pub fn total(&self) -> usize {
        self.running + self.succeeded + self.failed
    }

    /// `Active` if any Job is unfinished, `Inactive` otherwise (including no Jobs)
    pub fn status(&self) -> ExecutionStatus {
        if self.running > 0 {
            ExecutionStatus::Active
        } else {
            ExecutionStatus::Inactive
        }
    }
}

/// List the Jobs matching `selector` in `namespace` and summarize them.
///
/// Read-only. A failed list propagates as [`ReconcileError::List`] so the
/// caller never persists a status computed from a partial view.
pub async fn aggregate(
    kube: &dyn CronJobKubeClient,
    namespace: &str,
    selector: &str,
) -> Result<ExecutionSummary, ReconcileError> {
    let jobs = kube.list_jobs(namespace, selector).await?;
    for job in jobs.iter().filter(|j| !classify(j).is_finished()) {
        trace!(job = %job.name_any(), namespace = %namespace, "job still running");
    }

    let summary = ExecutionSummary::from_jobs(&jobs);
    debug!(
        namespace = %namespace,
        selector = %selector,
        total = summary.total(),
        running = summary.running,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "aggregated job executions"
    );
    Ok(summary)
}
