//! webapp-operator - runs the WebappCR controller
//!
//! Split out of the binary so integration tests can start the same
//! controller against a real cluster.

pub mod config;
pub mod controller_runner;
pub mod crds;
