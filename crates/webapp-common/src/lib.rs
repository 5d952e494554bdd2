//! Common types for the webapp operator: CRDs, events and telemetry

#![deny(missing_docs)]

pub mod crd;
pub mod events;
pub mod telemetry;

pub use events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};

/// Field manager used for every server-side apply issued by the operator
pub const FIELD_MANAGER: &str = "webapp-cronjob-controller";
