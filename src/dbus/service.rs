//! Bus-side lifecycle of the update engine service: object registration,
//! name ownership and status broadcasts.

use super::adaptor::ServiceAdaptor;
use super::codec::{SignalSink, StatusPublisher, StatusSignal};
use super::interface::UpdateEngineInterface;
use super::types::{SERVICE_NAME, SERVICE_PATH};
use super::AdaptorError;
use crate::engine::{ServiceObserver, UpdateService};
use crate::status::StatusRecord;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use zbus::fdo::{RequestNameFlags, RequestNameReply};
use zbus::object_server::SignalEmitter;
use zbus::Connection;

/// Owns the exported object and the well-known name on one bus connection.
///
/// The connection is handed in by the caller, so tests and alternative buses
/// can supply their own.
pub struct UpdateEngineAdaptor {
    connection: Connection,
    adaptor: ServiceAdaptor,
    publisher: StatusPublisher,
    service_name: String,
    object_path: String,
}

impl UpdateEngineAdaptor {
    /// Create an adaptor using the standard service name and object path.
    pub fn new(connection: Connection, service: Arc<dyn UpdateService>) -> Self {
        Self {
            connection,
            adaptor: ServiceAdaptor::new(service),
            publisher: StatusPublisher::default(),
            service_name: SERVICE_NAME.to_string(),
            object_path: SERVICE_PATH.to_string(),
        }
    }

    /// Override the well-known name and object path.
    pub fn with_names(
        mut self,
        service_name: impl Into<String>,
        object_path: impl Into<String>,
    ) -> Self {
        self.service_name = service_name.into();
        self.object_path = object_path.into();
        self
    }

    /// Replace the set of status signal encoders.
    pub fn with_publisher(mut self, publisher: StatusPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    /// Export the interface object. Callers must not assume the service is
    /// reachable before this completes.
    pub async fn register(&self) -> Result<(), AdaptorError> {
        let interface = UpdateEngineInterface::new(self.adaptor.clone());
        let added = self
            .connection
            .object_server()
            .at(self.object_path.as_str(), interface)
            .await?;
        if !added {
            return Err(AdaptorError::AlreadyRegistered(self.object_path.clone()));
        }

        info!("Update engine interface registered at {}", self.object_path);
        Ok(())
    }

    /// Export the interface object and report the outcome to `completion`,
    /// which is called exactly once.
    pub async fn register_async<F>(&self, completion: F)
    where
        F: FnOnce(bool),
    {
        let succeeded = match self.register().await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to register update engine interface: {}", e);
                false
            }
        };
        completion(succeeded);
    }

    /// Claim the well-known name as its primary owner. Queuing behind another
    /// owner counts as failure.
    pub async fn request_ownership(&self) -> Result<(), AdaptorError> {
        let reply = match self
            .connection
            .request_name_with_flags(
                self.service_name.as_str(),
                RequestNameFlags::DoNotQueue.into(),
            )
            .await
        {
            Ok(reply) => reply,
            // zbus reports an `Exists` reply as an error.
            Err(zbus::Error::NameTaken) => return Err(self.not_primary_owner("Exists")),
            Err(e) => return Err(e.into()),
        };

        match reply {
            RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner => {
                info!("Acquired ownership of {}", self.service_name);
                Ok(())
            }
            other => Err(self.not_primary_owner(format!("{:?}", other))),
        }
    }

    fn not_primary_owner(&self, reply: impl Into<String>) -> AdaptorError {
        AdaptorError::NotPrimaryOwner {
            name: self.service_name.clone(),
            reply: reply.into(),
        }
    }

    /// Broadcast `status` as every configured status signal, legacy first.
    ///
    /// All signals are built from this one snapshot.
    pub async fn send_status_update(&self, status: &StatusRecord) -> Result<(), AdaptorError> {
        debug!(
            "Broadcasting status {} (progress {:.3})",
            status.status, status.progress
        );
        let emitter = SignalEmitter::new(&self.connection, self.object_path.as_str())?;
        let sink = BusSignalSink { emitter };
        self.publisher.publish(status, &sink).await
    }

    /// Subscribe to the update service's status changes and broadcast each
    /// one. Runs until the service drops its observers.
    pub fn start_status_forwarding(self: &Arc<Self>) -> JoinHandle<()> {
        let (forwarder, mut updates) = StatusForwarder::channel();
        self.adaptor.service().add_observer(Arc::new(forwarder));

        let adaptor = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(status) = updates.recv().await {
                if let Err(e) = adaptor.send_status_update(&status).await {
                    warn!("Failed to broadcast status update: {}", e);
                }
            }
            debug!("Status forwarding stopped");
        })
    }
}

/// Emits status signals on the bus from the exported object.
struct BusSignalSink<'a> {
    emitter: SignalEmitter<'a>,
}

#[async_trait]
impl SignalSink for BusSignalSink<'_> {
    async fn emit(&self, signal: StatusSignal) -> Result<(), AdaptorError> {
        let member = signal.member();
        UpdateEngineInterface::emit(&self.emitter, signal)
            .await
            .map_err(|source| AdaptorError::Signal { member, source })
    }
}

/// Observer that hands status snapshots to the broadcast task.
///
/// Safe to call from any thread; it never blocks.
pub struct StatusForwarder {
    tx: mpsc::UnboundedSender<StatusRecord>,
}

impl StatusForwarder {
    /// Create a forwarder and the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ServiceObserver for StatusForwarder {
    fn send_status_update(&self, status: &StatusRecord) {
        if self.tx.send(status.clone()).is_err() {
            debug!("Status broadcast task gone, dropping update");
        }
    }
}
