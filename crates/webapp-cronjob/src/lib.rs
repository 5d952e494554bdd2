//! WebappCR controller: keeps one CronJob per WebappCR and reports on its runs
//!
//! Each pass:
//! - Builds the desired CronJob from the WebappCR spec
//! - Creates it, or re-applies it by server-side apply when a managed field drifted
//! - Summarizes the Jobs the CronJob spawned into an Active/Inactive status
//! - Writes `lastExecutionTime` and `executionStatus` back onto the WebappCR

pub mod aggregator;
pub mod applier;
pub mod builder;
pub mod client;
pub mod controller;
pub mod error;

pub use client::{CronJobKubeClient, CronJobKubeClientImpl};
pub use controller::{
    error_policy, reconcile, reconcile_key, Context, ControllerSettings, PassOutcome,
};
pub use error::ReconcileError;
