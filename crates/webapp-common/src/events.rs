//! Kubernetes Event recording for the webapp controllers.
//!
//! Wraps `kube::runtime::events::Recorder` behind a trait so reconciliation
//! can emit Events visible via `kubectl describe webappcr` while tests run
//! against a no-op publisher.
//!
//! Events are fire-and-forget: a failed publish is logged and never fails a
//! reconcile pass.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event on the given resource.
    ///
    /// * `resource_ref` - The object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason (see [`reasons`])
    /// * `action` - What the controller did (see [`actions`])
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation backed by `Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as `controller_name`.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "failed to publish Kubernetes event");
        }
    }
}

/// No-op implementation for tests and dry runs.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons, shown under REASON in `kubectl get events`.
pub mod reasons {
    /// The owned CronJob did not exist and was created
    pub const CRONJOB_CREATED: &str = "CronJobCreated";
    /// The owned CronJob drifted from the desired state and was re-applied
    pub const CRONJOB_UPDATED: &str = "CronJobUpdated";
    /// Execution status moved to Active
    pub const EXECUTION_ACTIVE: &str = "ExecutionActive";
    /// Execution status moved to Inactive
    pub const EXECUTION_INACTIVE: &str = "ExecutionInactive";
}

/// Event actions, shown under ACTION in `kubectl get events`.
pub mod actions {
    /// Standard reconciliation pass
    pub const RECONCILE: &str = "Reconcile";
    /// Writing the owned CronJob
    pub const APPLY: &str = "Apply";
}
