//! Conversion from the internal status model to the wire formats, and the
//! fan-out that turns one status snapshot into every status signal.

use super::types::{Operation, StatusResult};
use super::AdaptorError;
use crate::status::{StatusRecord, UpdateStatus};
use async_trait::async_trait;
use tracing::{debug, warn};

impl From<UpdateStatus> for Operation {
    fn from(status: UpdateStatus) -> Self {
        match status {
            UpdateStatus::Idle => Operation::Idle,
            UpdateStatus::CheckingForUpdate => Operation::CheckingForUpdate,
            UpdateStatus::UpdateAvailable => Operation::UpdateAvailable,
            UpdateStatus::Downloading => Operation::Downloading,
            UpdateStatus::Verifying => Operation::Verifying,
            UpdateStatus::Finalizing => Operation::Finalizing,
            UpdateStatus::UpdatedNeedReboot => Operation::UpdatedNeedReboot,
            UpdateStatus::ReportingErrorEvent => Operation::ReportingErrorEvent,
            UpdateStatus::AttemptingRollback => Operation::AttemptingRollback,
            UpdateStatus::Disabled => Operation::Disabled,
            UpdateStatus::NeedPermissionToUpdate => Operation::NeedPermissionToUpdate,
        }
    }
}

impl From<Operation> for UpdateStatus {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Idle => UpdateStatus::Idle,
            Operation::CheckingForUpdate => UpdateStatus::CheckingForUpdate,
            Operation::UpdateAvailable => UpdateStatus::UpdateAvailable,
            Operation::Downloading => UpdateStatus::Downloading,
            Operation::Verifying => UpdateStatus::Verifying,
            Operation::Finalizing => UpdateStatus::Finalizing,
            Operation::UpdatedNeedReboot => UpdateStatus::UpdatedNeedReboot,
            Operation::ReportingErrorEvent => UpdateStatus::ReportingErrorEvent,
            Operation::AttemptingRollback => UpdateStatus::AttemptingRollback,
            Operation::Disabled => UpdateStatus::Disabled,
            Operation::NeedPermissionToUpdate => UpdateStatus::NeedPermissionToUpdate,
        }
    }
}

/// Canonical string name of a wire operation.
pub fn operation_to_name(op: Operation) -> &'static str {
    UpdateStatus::from(op).as_str()
}

/// Convert an internal status snapshot into the structured wire message.
pub fn to_status_result(record: &StatusRecord) -> StatusResult {
    StatusResult {
        last_checked_time: record.last_checked_time,
        progress: record.progress,
        current_operation: record.status.into(),
        new_version: record.new_version.clone(),
        new_size: i64::try_from(record.new_size_bytes).unwrap_or(i64::MAX),
        is_enterprise_rollback: record.is_enterprise_rollback,
        is_install: record.is_install,
    }
}

/// Arguments of the legacy `StatusUpdate` signal and `GetStatus` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyStatus {
    pub last_checked_time: i64,
    pub progress: f64,
    pub current_operation: String,
    pub new_version: String,
    pub new_size: i64,
}

impl From<&StatusResult> for LegacyStatus {
    fn from(status: &StatusResult) -> Self {
        Self {
            last_checked_time: status.last_checked_time,
            progress: status.progress,
            current_operation: operation_to_name(status.current_operation).to_string(),
            new_version: status.new_version.clone(),
            new_size: status.new_size,
        }
    }
}

/// One status signal ready to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusSignal {
    /// `StatusUpdate`. Kept for callers that predate `StatusUpdateAdvanced`.
    Legacy(LegacyStatus),
    /// `StatusUpdateAdvanced`.
    Advanced(StatusResult),
}

impl StatusSignal {
    /// Bus member name of the signal.
    pub fn member(&self) -> &'static str {
        match self {
            StatusSignal::Legacy(_) => "StatusUpdate",
            StatusSignal::Advanced(_) => "StatusUpdateAdvanced",
        }
    }
}

/// Turns a wire status message into one signal format.
pub trait StatusEncoder: Send + Sync {
    fn encode(&self, status: &StatusResult) -> StatusSignal;
}

/// Encoder for the legacy `StatusUpdate` signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyStatusEncoder;

impl StatusEncoder for LegacyStatusEncoder {
    fn encode(&self, status: &StatusResult) -> StatusSignal {
        StatusSignal::Legacy(LegacyStatus::from(status))
    }
}

/// Encoder for the `StatusUpdateAdvanced` signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdvancedStatusEncoder;

impl StatusEncoder for AdvancedStatusEncoder {
    fn encode(&self, status: &StatusResult) -> StatusSignal {
        StatusSignal::Advanced(status.clone())
    }
}

/// Destination for encoded status signals.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn emit(&self, signal: StatusSignal) -> Result<(), AdaptorError>;
}

/// Fans a single status snapshot out to every registered encoder.
pub struct StatusPublisher {
    encoders: Vec<Box<dyn StatusEncoder>>,
}

impl Default for StatusPublisher {
    /// Legacy signal first, then the structured one.
    fn default() -> Self {
        Self::new()
            .with_encoder(LegacyStatusEncoder)
            .with_encoder(AdvancedStatusEncoder)
    }
}

impl StatusPublisher {
    /// Publisher with no encoders.
    pub fn new() -> Self {
        Self {
            encoders: Vec::new(),
        }
    }

    pub fn with_encoder(mut self, encoder: impl StatusEncoder + 'static) -> Self {
        self.encoders.push(Box::new(encoder));
        self
    }

    /// Encode `record` once per encoder, in registration order.
    ///
    /// The record is converted a single time, so every signal describes the
    /// same snapshot.
    pub fn encode(&self, record: &StatusRecord) -> Vec<StatusSignal> {
        let status = to_status_result(record);
        self.encoders
            .iter()
            .map(|encoder| encoder.encode(&status))
            .collect()
    }

    /// Encode `record` and emit every signal through `sink`, in order.
    ///
    /// A failed emission does not suppress the ones after it; the first
    /// failure is returned once every signal has been attempted.
    pub async fn publish(
        &self,
        record: &StatusRecord,
        sink: &dyn SignalSink,
    ) -> Result<(), AdaptorError> {
        let mut first_error = None;
        for signal in self.encode(record) {
            let member = signal.member();
            debug!("Emitting {} signal", member);
            if let Err(e) = sink.emit(signal).await {
                warn!("Failed to emit {} signal: {}", member, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
