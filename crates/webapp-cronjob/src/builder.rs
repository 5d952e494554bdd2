//! Desired-state builder for the CronJob owned by a WebappCR
//!
//! Pure construction: the same spec and template always produce the same
//! CronJob, so the controller can rebuild desired state on every pass.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use webapp_common::crd::WebappCRSpec;

/// Label linking a CronJob, its pod template and its Jobs to the owning WebappCR
pub const OWNER_LABEL: &str = "owner-cronjob";

/// Fires every minute
pub const DEFAULT_SCHEDULE: &str = "*/1 * * * *";

/// Default task container image
pub const DEFAULT_TASK_IMAGE: &str = "ubuntu";

/// Default task container name
pub const DEFAULT_CONTAINER_NAME: &str = "task";

/// Binary invoked with the URI as its only argument
pub const TASK_COMMAND: &str = "/bin/echo";

/// Pod restart policy for task Jobs
pub const RESTART_POLICY: &str = "OnFailure";

/// Fixed parts of the CronJob that do not come from the WebappCR spec
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskTemplate {
    /// Cron expression for the CronJob
    pub schedule: String,
    /// Name of the single task container
    pub container_name: String,
    /// Image of the single task container
    pub image: String,
}

impl Default for TaskTemplate {
    fn default() -> Self {
        Self {
            schedule: DEFAULT_SCHEDULE.to_string(),
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            image: DEFAULT_TASK_IMAGE.to_string(),
        }
    }
}

/// CronJob name for a WebappCR. Always the owner's own name.
pub fn cronjob_name(owner: &str) -> String {
    owner.to_string()
}

/// Ownership label set for a WebappCR
pub fn owner_labels(owner: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(OWNER_LABEL.to_string(), owner.to_string())])
}

/// Label selector matching everything carrying [`owner_labels`]
pub fn owner_selector(owner: &str) -> String {
    owner_labels(owner)
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build the desired CronJob for a WebappCR.
///
/// The URI is passed as an argument, never spliced into a shell string.
/// Owner references are not set here; the applier links ownership right
/// before writing.
pub fn build_cronjob(
    name: &str,
    namespace: &str,
    spec: &WebappCRSpec,
    template: &TaskTemplate,
) -> CronJob {
    let labels = owner_labels(name);

    let container = Container {
        name: template.container_name.clone(),
        image: Some(template.image.clone()),
        command: Some(vec![TASK_COMMAND.to_string()]),
        args: Some(vec![spec.uri.clone()]),
        ..Default::default()
    };

    CronJob {
        metadata: ObjectMeta {
            name: Some(cronjob_name(name)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(CronJobSpec {
            schedule: template.schedule.clone(),
            job_template: JobTemplateSpec {
                metadata: None,
                spec: Some(JobSpec {
                    backoff_limit: Some(spec.backoff_limit),
                    template: PodTemplateSpec {
                        metadata: Some(ObjectMeta {
                            labels: Some(labels),
                            ..Default::default()
                        }),
                        spec: Some(PodSpec {
                            containers: vec![container],
                            restart_policy: Some(RESTART_POLICY.to_string()),
                            ..Default::default()
                        }),
                    },
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}
