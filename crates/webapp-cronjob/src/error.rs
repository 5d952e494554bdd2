//! Reconciliation error types

use std::time::Duration;

/// Errors that abort a WebappCR reconcile pass
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("CronJob {namespace}/{name} was created concurrently")]
    CreateConflict { name: String, namespace: String },

    #[error("write conflict on {kind} {namespace}/{name}: resource version changed")]
    Conflict {
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[error("cannot set controller reference on CronJob '{name}': {reason}")]
    OwnershipLink { name: String, reason: String },

    #[error("failed to list jobs matching '{selector}': {source}")]
    List {
        selector: String,
        #[source]
        source: kube::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("missing namespace on WebappCR")]
    MissingNamespace,

    #[error("reconcile pass exceeded its {0:?} deadline")]
    Cancelled(Duration),
}

impl ReconcileError {
    /// Whether requeueing with backoff can resolve the error.
    ///
    /// Lost races, transient API failures, and ownership errors (usually an
    /// owner being deleted mid-pass) clear up on a later pass. A missing
    /// namespace or an unserializable object needs a spec change.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MissingNamespace | Self::Serialization(_))
    }
}

/// True when the API server answered with the given HTTP status
pub(crate) fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == code)
}
