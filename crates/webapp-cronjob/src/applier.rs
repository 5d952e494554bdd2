//! Upsert of the CronJob owned by a WebappCR
//!
//! Links ownership, then creates the CronJob if it is missing or replaces it
//! with the observed object merged with the full desired spec if any managed
//! field drifted. Managed fields are the owner labels, the controller
//! reference, the schedule, the backoff limit, the pod template labels, the
//! restart policy, and the container list: exactly the task container, with
//! its image, command and args. Server-populated defaults are never compared,
//! so a converged CronJob is left untouched.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Container, PodSpec};
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use webapp_common::crd::WebappCR;

use crate::client::CronJobKubeClient;
use crate::error::ReconcileError;

/// What the applier did to the live CronJob
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CronJobChange {
    Created,
    Updated,
    Unchanged,
}

/// Result of an upsert: the CronJob as the API server returned it
#[derive(Clone, Debug)]
pub struct Applied {
    pub cronjob: CronJob,
    pub change: CronJobChange,
}

/// Set `owner` as the controller of `desired`.
///
/// Fails if the owner has no name or uid yet, or if `desired` is already
/// controlled by a different object.
pub fn link_owner(owner: &WebappCR, desired: &mut CronJob) -> Result<(), ReconcileError> {
    let name = desired.name_any();
    let oref = owner
        .controller_owner_ref(&())
        .ok_or_else(|| ReconcileError::OwnershipLink {
            name: name.clone(),
            reason: "owner has no name or uid".to_string(),
        })?;

    ensure_not_foreign(desired, &oref.uid)?;

    let refs = desired.metadata.owner_references.get_or_insert_with(Vec::new);
    refs.retain(|r| r.uid != oref.uid);
    refs.push(oref);
    Ok(())
}

/// Reject objects whose controller reference points at someone else
fn ensure_not_foreign(cronjob: &CronJob, owner_uid: &str) -> Result<(), ReconcileError> {
    let foreign = cronjob
        .owner_references()
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != owner_uid);

    match foreign {
        Some(r) => Err(ReconcileError::OwnershipLink {
            name: cronjob.name_any(),
            reason: format!("already controlled by {} '{}'", r.kind, r.name),
        }),
        None => Ok(()),
    }
}

/// Create or update the CronJob so the live object matches `desired`.
///
/// The update path replaces the whole object in one write, conditioned on
/// the observed `resourceVersion`; a concurrent writer makes it fail with
/// [`ReconcileError::Conflict`] and the pass is retried later.
pub async fn apply_cronjob(
    kube: &dyn CronJobKubeClient,
    owner: &WebappCR,
    mut desired: CronJob,
) -> Result<Applied, ReconcileError> {
    link_owner(owner, &mut desired)?;

    let name = desired.name_any();
    let namespace = desired.namespace().ok_or(ReconcileError::MissingNamespace)?;

    let Some(observed) = kube.get_cronjob(&name, &namespace).await? else {
        info!(cronjob = %name, namespace = %namespace, "creating CronJob");
        let created = kube.create_cronjob(&namespace, &desired).await?;
        return Ok(Applied {
            cronjob: created,
            change: CronJobChange::Created,
        });
    };

    ensure_not_foreign(&observed, owner.uid().as_deref().unwrap_or_default())?;

    if !needs_update(&observed, &desired) {
        debug!(cronjob = %name, "CronJob already matches desired state");
        return Ok(Applied {
            cronjob: observed,
            change: CronJobChange::Unchanged,
        });
    }

    let merged = merge_desired(&observed, desired);
    let replaced = kube.replace_cronjob(&namespace, &merged).await?;
    info!(cronjob = %name, namespace = %namespace, "replaced drifted CronJob");
    Ok(Applied {
        cronjob: replaced,
        change: CronJobChange::Updated,
    })
}

/// Overlay `desired` onto `observed`.
///
/// Keeps the observed identity, resourceVersion and any labels or owner
/// references added by others, and takes the spec wholesale from `desired`
/// so nothing foreign survives in it.
pub fn merge_desired(observed: &CronJob, desired: CronJob) -> CronJob {
    let mut merged = observed.clone();

    if let Some(labels) = desired.metadata.labels {
        merged
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels);
    }

    let wanted = desired.metadata.owner_references.unwrap_or_default();
    let refs = merged.metadata.owner_references.get_or_insert_with(Vec::new);
    refs.retain(|have| wanted.iter().all(|w| w.uid != have.uid));
    refs.extend(wanted);

    merged.spec = desired.spec;
    merged
}

/// Whether any managed field of `observed` differs from `desired`
pub fn needs_update(observed: &CronJob, desired: &CronJob) -> bool {
    !(labels_contain(observed.metadata.labels.as_ref(), desired.metadata.labels.as_ref())
        && owners_contain(observed, desired)
        && spec_matches(observed, desired))
}

fn labels_contain(
    have: Option<&BTreeMap<String, String>>,
    want: Option<&BTreeMap<String, String>>,
) -> bool {
    let Some(want) = want else { return true };
    let Some(have) = have else {
        return want.is_empty();
    };
    want.iter().all(|(k, v)| have.get(k) == Some(v))
}

fn owners_contain(observed: &CronJob, desired: &CronJob) -> bool {
    desired.owner_references().iter().all(|want| {
        observed.owner_references().iter().any(|have| {
            have.uid == want.uid
                && have.controller == want.controller
                && have.block_owner_deletion == want.block_owner_deletion
        })
    })
}

fn spec_matches(observed: &CronJob, desired: &CronJob) -> bool {
    let (Some(have), Some(want)) = (observed.spec.as_ref(), desired.spec.as_ref()) else {
        return observed.spec.is_none() && desired.spec.is_none();
    };
    if have.schedule != want.schedule {
        return false;
    }

    let (Some(have_job), Some(want_job)) = (
        have.job_template.spec.as_ref(),
        want.job_template.spec.as_ref(),
    ) else {
        return want.job_template.spec.is_none();
    };
    if have_job.backoff_limit != want_job.backoff_limit {
        return false;
    }

    let have_tpl = &have_job.template;
    let want_tpl = &want_job.template;
    if !labels_contain(
        have_tpl.metadata.as_ref().and_then(|m| m.labels.as_ref()),
        want_tpl.metadata.as_ref().and_then(|m| m.labels.as_ref()),
    ) {
        return false;
    }

    match (have_tpl.spec.as_ref(), want_tpl.spec.as_ref()) {
        (Some(have_pod), Some(want_pod)) => pod_matches(have_pod, want_pod),
        (_, None) => true,
        (None, Some(_)) => false,
    }
}

fn pod_matches(have: &PodSpec, want: &PodSpec) -> bool {
    if want.restart_policy.is_some() && have.restart_policy != want.restart_policy {
        return false;
    }
    if have.containers.len() != want.containers.len() {
        return false;
    }
    want.containers.iter().all(|w| {
        have.containers
            .iter()
            .find(|h| h.name == w.name)
            .is_some_and(|h| container_matches(h, w))
    })
}

fn container_matches(have: &Container, want: &Container) -> bool {
    have.image == want.image && have.command == want.command && have.args == want.args
}
