//! Custom Resource Definitions for the webapp operator

mod webapp;

pub use webapp::{ExecutionStatus, WebappCR, WebappCRSpec, WebappCRStatus};
