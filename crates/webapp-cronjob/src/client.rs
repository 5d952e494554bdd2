//! Kubernetes access for the WebappCR controller
//!
//! Every cluster read and write a reconcile pass performs goes through
//! [`CronJobKubeClient`], which is injected into [`crate::controller::Context`].
//! Production uses [`CronJobKubeClientImpl`]; tests use the generated
//! `MockCronJobKubeClient` or the in-memory store in [`fake`].

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use webapp_common::crd::WebappCR;
use webapp_common::FIELD_MANAGER;

use crate::error::{is_status, ReconcileError};

/// Object-store operations used by a reconcile pass.
///
/// Writes are conditional on the `resourceVersion` carried by the object, so
/// a write that loses a race fails with a conflict instead of clobbering.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CronJobKubeClient: Send + Sync {
    /// Get a WebappCR, `None` if it does not exist
    async fn get_webapp(&self, name: &str, namespace: &str)
        -> Result<Option<WebappCR>, ReconcileError>;

    /// Get a CronJob, `None` if it does not exist
    async fn get_cronjob(&self, name: &str, namespace: &str)
        -> Result<Option<CronJob>, ReconcileError>;

    /// Create a CronJob by server-side apply under [`FIELD_MANAGER`];
    /// `CreateConflict` if another writer's object is in the way
    async fn create_cronjob(
        &self,
        namespace: &str,
        cronjob: &CronJob,
    ) -> Result<CronJob, ReconcileError>;

    /// Replace the whole CronJob; `Conflict` on a stale resourceVersion
    async fn replace_cronjob(
        &self,
        namespace: &str,
        cronjob: &CronJob,
    ) -> Result<CronJob, ReconcileError>;

    /// List Jobs in a namespace matching a label selector
    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>, ReconcileError>;

    /// Replace the status subresource of a WebappCR
    async fn replace_webapp_status(&self, webapp: &WebappCR) -> Result<WebappCR, ReconcileError>;
}

/// Real Kubernetes client implementation
pub struct CronJobKubeClientImpl {
    client: Client,
}

impl CronJobKubeClientImpl {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CronJobKubeClient for CronJobKubeClientImpl {
    async fn get_webapp(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<WebappCR>, ReconcileError> {
        let api: Api<WebappCR> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_cronjob(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<CronJob>, ReconcileError> {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_cronjob(
        &self,
        namespace: &str,
        cronjob: &CronJob,
    ) -> Result<CronJob, ReconcileError> {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        let name = cronjob.name_any();
        // Not forced: fields already owned by another manager surface as 409
        let params = PatchParams::apply(FIELD_MANAGER);

        match api.patch(&name, &params, &Patch::Apply(cronjob)).await {
            Ok(created) => {
                debug!(cronjob = %name, namespace = %namespace, "created CronJob via SSA");
                Ok(created)
            }
            Err(e) if is_status(&e, 409) => Err(ReconcileError::CreateConflict {
                name,
                namespace: namespace.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_cronjob(
        &self,
        namespace: &str,
        cronjob: &CronJob,
    ) -> Result<CronJob, ReconcileError> {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        let name = cronjob.name_any();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        match api.replace(&name, &params, cronjob).await {
            Ok(replaced) => {
                debug!(cronjob = %name, namespace = %namespace, "replaced CronJob");
                Ok(replaced)
            }
            Err(e) if is_status(&e, 409) => Err(ReconcileError::Conflict {
                kind: "CronJob",
                name,
                namespace: namespace.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>, ReconcileError> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|source| ReconcileError::List {
                selector: selector.to_string(),
                source,
            })?;
        Ok(list.items)
    }

    async fn replace_webapp_status(&self, webapp: &WebappCR) -> Result<WebappCR, ReconcileError> {
        let namespace = webapp.namespace().ok_or(ReconcileError::MissingNamespace)?;
        let name = webapp.name_any();
        let api: Api<WebappCR> = Api::namespaced(self.client.clone(), &namespace);
        let body = serde_json::to_vec(webapp)?;

        match api.replace_status(&name, &PostParams::default(), body).await {
            Ok(updated) => Ok(updated),
            Err(e) if is_status(&e, 409) => Err(ReconcileError::Conflict {
                kind: "WebappCR",
                name,
                namespace,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
