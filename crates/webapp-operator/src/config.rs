//! Command-line and environment configuration for the controller
//!
//! Every flag has an environment fallback so the operator can be configured
//! from a Deployment manifest without rewriting its args.

use std::time::Duration;

use clap::{ArgAction, Args};
use thiserror::Error;

use webapp_common::telemetry::{TelemetryConfig, DEFAULT_LOG_FILTER};
use webapp_cronjob::builder::{TaskTemplate, DEFAULT_CONTAINER_NAME, DEFAULT_SCHEDULE, DEFAULT_TASK_IMAGE};
use webapp_cronjob::ControllerSettings;

/// Rejected configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--{flag} must be greater than zero")]
    ZeroDuration { flag: &'static str },

    #[error("schedule '{0}' is not a five-field cron expression")]
    InvalidSchedule(String),

    #[error("task image must not be empty")]
    EmptyImage,
}

/// Controller tunables
#[derive(Args, Debug, Clone)]
pub struct ControllerArgs {
    /// Seconds between periodic re-reconciles of a healthy WebappCR
    #[arg(long, env = "WEBAPP_RESYNC_SECS", default_value_t = 60)]
    pub resync_secs: u64,

    /// Seconds to wait before retrying a failed pass
    #[arg(long, env = "WEBAPP_ERROR_BACKOFF_SECS", default_value_t = 30)]
    pub error_backoff_secs: u64,

    /// Deadline for a single reconcile pass
    #[arg(long, env = "WEBAPP_PASS_TIMEOUT_SECS", default_value_t = 30)]
    pub pass_timeout_secs: u64,

    /// Image the generated CronJob runs
    #[arg(long, env = "WEBAPP_TASK_IMAGE", default_value = DEFAULT_TASK_IMAGE)]
    pub task_image: String,

    /// Cron expression of the generated CronJob
    #[arg(long, env = "WEBAPP_SCHEDULE", default_value = DEFAULT_SCHEDULE)]
    pub schedule: String,

    /// Log one JSON object per line
    #[arg(long, env = "WEBAPP_LOG_JSON")]
    pub log_json: bool,

    /// Install or update the WebappCR CRD on startup
    #[arg(long, env = "WEBAPP_INSTALL_CRDS", default_value_t = true, action = ArgAction::Set)]
    pub install_crds: bool,
}

impl ControllerArgs {
    /// Validate and convert into controller settings
    pub fn settings(&self) -> Result<ControllerSettings, ConfigError> {
        let secs = |value: u64, flag: &'static str| {
            if value == 0 {
                Err(ConfigError::ZeroDuration { flag })
            } else {
                Ok(Duration::from_secs(value))
            }
        };

        if self.schedule.split_whitespace().count() != 5 {
            return Err(ConfigError::InvalidSchedule(self.schedule.clone()));
        }
        if self.task_image.trim().is_empty() {
            return Err(ConfigError::EmptyImage);
        }

        Ok(ControllerSettings {
            resync_interval: secs(self.resync_secs, "resync-secs")?,
            error_backoff: secs(self.error_backoff_secs, "error-backoff-secs")?,
            pass_timeout: secs(self.pass_timeout_secs, "pass-timeout-secs")?,
            task: TaskTemplate {
                schedule: self.schedule.clone(),
                container_name: DEFAULT_CONTAINER_NAME.to_string(),
                image: self.task_image.clone(),
            },
        })
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            json: self.log_json,
            default_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}
