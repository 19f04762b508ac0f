//! D-Bus adaptor for the update engine.
//!
//! Translates bus method calls into calls on an [`engine::UpdateService`],
//! converts its status snapshots into wire messages and broadcasts status
//! changes as signals.

pub mod config;
pub mod daemon;
pub mod dbus;
pub mod engine;
pub mod status;

// Re-export commonly used types for convenience
pub use config::Config;
pub use dbus::{ServiceAdaptor, StatusResult, UpdateEngineAdaptor};
pub use engine::{ServiceError, UpdateService};
pub use status::{StatusRecord, UpdateStatus};
