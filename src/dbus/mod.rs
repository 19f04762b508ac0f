//! D-Bus integration for the update engine.
//!
//! Exports the `org.chromium.UpdateEngineInterface` interface at
//! `/org/chromium/UpdateEngine`, owns the `org.chromium.UpdateEngine` name and
//! broadcasts status changes as signals.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  method call   ┌─────────────────────┐  call   ┌───────────────┐
//! │ bus callers  │───────────────>│ UpdateEngineAdaptor │────────>│ UpdateService │
//! │ (UI, shell,  │                │  └ ServiceAdaptor   │         │ (engine)      │
//! │  daemons)    │<───────────────│  └ StatusPublisher  │<────────│               │
//! └──────────────┘ StatusUpdate / └─────────────────────┘ observer└───────────────┘
//!                  StatusUpdateAdvanced
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let connection = dbus::connect(BusKind::System).await?;
//! let adaptor = Arc::new(UpdateEngineAdaptor::new(connection, service));
//! adaptor.register().await?;
//! adaptor.request_ownership().await?;
//! let _forwarder = adaptor.start_status_forwarding();
//! ```

mod adaptor;
mod client;
mod codec;
mod interface;
mod service;
mod types;

use crate::config::BusKind;
use thiserror::Error;
use zbus::Connection;

pub use adaptor::{decode_attempt_flags, module_ids, ServiceAdaptor};
pub use client::UpdateEngineClient;
pub use codec::{
    operation_to_name, to_status_result, AdvancedStatusEncoder, LegacyStatus,
    LegacyStatusEncoder, SignalSink, StatusEncoder, StatusPublisher, StatusSignal,
};
pub use interface::UpdateEngineInterface;
pub use service::{StatusForwarder, UpdateEngineAdaptor};
pub use types::*;

/// Transport-level failures. These are fatal to service startup, not per call.
#[derive(Error, Debug)]
pub enum AdaptorError {
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    #[error("An object is already registered at {0}")]
    AlreadyRegistered(String),

    #[error("Could not become primary owner of {name} ({reply})")]
    NotPrimaryOwner { name: String, reply: String },

    #[error("Failed to emit {member} signal: {source}")]
    Signal {
        member: &'static str,
        #[source]
        source: zbus::Error,
    },
}

/// Open a connection to the requested message bus.
pub async fn connect(kind: BusKind) -> zbus::Result<Connection> {
    match kind {
        BusKind::System => Connection::system().await,
        BusKind::Session => Connection::session().await,
    }
}
