//! WebappCR CRD types
//!
//! Defines `WebappCR`, a periodic task against a target URI, backed by a
//! `batch/v1` CronJob that the controller owns and keeps in sync.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Execution status
// =============================================================================

/// Aggregated state of the Jobs spawned by a WebappCR's CronJob
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// At least one Job has not reached a terminal condition
    Active,
    /// Every listed Job is Complete or Failed (or none exist yet)
    Inactive,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Inactive => write!(f, "Inactive"),
        }
    }
}

// =============================================================================
// CRD
// =============================================================================

/// Periodic task specification backed by a CronJob
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "crwebapp.my.domain",
    version = "v1",
    kind = "WebappCR",
    plural = "webappcrs",
    shortname = "wcr",
    namespaced,
    status = "WebappCRStatus",
    printcolumn = r#"{"name":"URI","type":"string","jsonPath":".spec.uri"}"#,
    printcolumn = r#"{"name":"Execution","type":"string","jsonPath":".status.executionStatus"}"#,
    printcolumn = r#"{"name":"Last Run","type":"date","jsonPath":".status.lastExecutionTime"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WebappCRSpec {
    /// Target URI handed to the task container on every run
    pub uri: String,

    /// Retry limit copied onto the CronJob's job template
    #[schemars(range(min = 0))]
    pub backoff_limit: i32,
}

/// Status of a WebappCR, written only by the controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebappCRStatus {
    /// When the owned CronJob last scheduled a Job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_time: Option<DateTime<Utc>>,

    /// Snapshot of the owned Jobs at the last successful reconcile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<ExecutionStatus>,

    /// Spec generation this status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

// =============================================================================
// Tests
// =============================================================================
