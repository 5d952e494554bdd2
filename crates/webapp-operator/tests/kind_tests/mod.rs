//! Integration tests for the webapp operator
//!
//! These tests require a Kubernetes cluster (kind) and tell the story of a
//! WebappCR's life under a running controller.
//!
//! # Test Organization
//!
//! - `reconcile_story`: creating a WebappCR yields an owned CronJob, editing
//!   its spec converges it, and deleting the WebappCR garbage-collects it
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test -p webapp-operator --test kind -- --ignored --nocapture
//! ```

mod helpers;
mod reconcile_story;
