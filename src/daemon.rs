//! Service entry point.
//!
//! Startup order:
//! 1. Connect to the configured bus
//! 2. Export the interface object
//! 3. Claim the well-known name as primary owner
//! 4. Forward status changes from the update service as signals
//! 5. Run until SIGINT/SIGTERM

use crate::config::Config;
use crate::dbus::{self, AdaptorError, UpdateEngineAdaptor};
use crate::engine::UpdateService;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Failed to connect to the {kind:?} bus: {source}")]
    Connect {
        kind: crate::config::BusKind,
        #[source]
        source: zbus::Error,
    },

    #[error("Failed to register the update engine interface at {0}")]
    Registration(String),

    #[error("Failed to take ownership of the service name")]
    Ownership(#[source] AdaptorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serve `service` on the bus described by `config` until asked to stop.
pub async fn run(config: &Config, service: Arc<dyn UpdateService>) -> Result<(), DaemonError> {
    let kind = config.bus.kind;
    let connection = dbus::connect(kind)
        .await
        .map_err(|source| DaemonError::Connect { kind, source })?;

    let adaptor = Arc::new(
        UpdateEngineAdaptor::new(connection, service)
            .with_names(&config.bus.service_name, &config.bus.object_path),
    );

    let mut registered = false;
    adaptor.register_async(|succeeded| registered = succeeded).await;
    if !registered {
        return Err(DaemonError::Registration(adaptor.object_path().to_string()));
    }
    adaptor
        .request_ownership()
        .await
        .map_err(DaemonError::Ownership)?;

    let forwarding = adaptor.start_status_forwarding();
    info!(
        "Update engine service ready: {} at {}",
        adaptor.service_name(),
        adaptor.object_path()
    );

    wait_for_shutdown().await?;

    info!("Shutting down update engine service");
    forwarding.abort();
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = &result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            result
        }
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
