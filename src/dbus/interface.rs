//! D-Bus interface definition for the update engine.
//!
//! Exposes `org.chromium.UpdateEngineInterface`. Method and signal names are
//! spelled out explicitly: existing callers depend on them verbatim.

use super::adaptor::ServiceAdaptor;
use super::codec::StatusSignal;
use super::types::{ModuleList, StatusResult};
use crate::engine::ServiceError;
use zbus::interface;
use zbus::object_server::SignalEmitter;

/// Surface a service error as `org.freedesktop.DBus.Error.Failed`, keeping
/// the domain and code in the message.
fn to_bus_error(err: ServiceError) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(err.to_string())
}

/// Object registered at [`super::SERVICE_PATH`].
pub struct UpdateEngineInterface {
    adaptor: ServiceAdaptor,
}

impl UpdateEngineInterface {
    pub fn new(adaptor: ServiceAdaptor) -> Self {
        Self { adaptor }
    }

    /// Emit one encoded status signal from the object at `emitter`'s path.
    pub(crate) async fn emit(emitter: &SignalEmitter<'_>, signal: StatusSignal) -> zbus::Result<()> {
        match signal {
            StatusSignal::Legacy(status) => {
                Self::status_update(
                    emitter,
                    status.last_checked_time,
                    status.progress,
                    &status.current_operation,
                    &status.new_version,
                    status.new_size,
                )
                .await
            }
            StatusSignal::Advanced(status) => Self::status_update_advanced(emitter, status).await,
        }
    }
}

#[interface(name = "org.chromium.UpdateEngineInterface")]
impl UpdateEngineInterface {
    #[zbus(name = "AttemptUpdate")]
    fn attempt_update(&self, app_version: &str, omaha_url: &str) -> zbus::fdo::Result<()> {
        self.adaptor
            .attempt_update(app_version, omaha_url)
            .map_err(to_bus_error)
    }

    #[zbus(name = "AttemptUpdateWithFlags")]
    fn attempt_update_with_flags(
        &self,
        app_version: &str,
        omaha_url: &str,
        flags: i32,
    ) -> zbus::fdo::Result<()> {
        self.adaptor
            .attempt_update_with_flags(app_version, omaha_url, flags)
            .map_err(to_bus_error)
    }

    #[zbus(name = "AttemptInstall")]
    fn attempt_install(&self, request: ModuleList) -> zbus::fdo::Result<()> {
        self.adaptor.attempt_install(&request).map_err(to_bus_error)
    }

    #[zbus(name = "AttemptRollback")]
    fn attempt_rollback(&self, powerwash: bool) -> zbus::fdo::Result<()> {
        self.adaptor.attempt_rollback(powerwash).map_err(to_bus_error)
    }

    #[zbus(name = "CanRollback")]
    fn can_rollback(&self) -> zbus::fdo::Result<bool> {
        self.adaptor.can_rollback().map_err(to_bus_error)
    }

    #[zbus(name = "ResetStatus")]
    fn reset_status(&self) -> zbus::fdo::Result<()> {
        self.adaptor.reset_status().map_err(to_bus_error)
    }

    #[zbus(
        name = "GetStatus",
        out_args(
            "last_checked_time",
            "progress",
            "current_operation",
            "new_version",
            "new_size"
        )
    )]
    fn get_status(&self) -> zbus::fdo::Result<(i64, f64, String, String, i64)> {
        let status = self.adaptor.get_status().map_err(to_bus_error)?;
        Ok((
            status.last_checked_time,
            status.progress,
            status.current_operation,
            status.new_version,
            status.new_size,
        ))
    }

    #[zbus(name = "GetStatusAdvanced")]
    fn get_status_advanced(&self) -> zbus::fdo::Result<StatusResult> {
        self.adaptor.get_status_advanced().map_err(to_bus_error)
    }

    #[zbus(name = "RebootIfNeeded")]
    fn reboot_if_needed(&self) -> zbus::fdo::Result<()> {
        self.adaptor.reboot_if_needed().map_err(to_bus_error)
    }

    #[zbus(name = "SetChannel")]
    fn set_channel(&self, target_channel: &str, is_powerwash_allowed: bool) -> zbus::fdo::Result<()> {
        self.adaptor
            .set_channel(target_channel, is_powerwash_allowed)
            .map_err(to_bus_error)
    }

    #[zbus(name = "GetChannel")]
    fn get_channel(&self, get_current_channel: bool) -> zbus::fdo::Result<String> {
        self.adaptor
            .get_channel(get_current_channel)
            .map_err(to_bus_error)
    }

    #[zbus(name = "GetCohortHint")]
    fn get_cohort_hint(&self) -> zbus::fdo::Result<String> {
        self.adaptor.get_cohort_hint().map_err(to_bus_error)
    }

    #[zbus(name = "SetCohortHint")]
    fn set_cohort_hint(&self, cohort_hint: &str) -> zbus::fdo::Result<()> {
        self.adaptor.set_cohort_hint(cohort_hint).map_err(to_bus_error)
    }

    #[zbus(name = "SetP2PUpdatePermission")]
    fn set_p2p_update_permission(&self, enabled: bool) -> zbus::fdo::Result<()> {
        self.adaptor
            .set_p2p_update_permission(enabled)
            .map_err(to_bus_error)
    }

    #[zbus(name = "GetP2PUpdatePermission")]
    fn get_p2p_update_permission(&self) -> zbus::fdo::Result<bool> {
        self.adaptor.get_p2p_update_permission().map_err(to_bus_error)
    }

    #[zbus(name = "SetUpdateOverCellularPermission")]
    fn set_update_over_cellular_permission(&self, allowed: bool) -> zbus::fdo::Result<()> {
        self.adaptor
            .set_update_over_cellular_permission(allowed)
            .map_err(to_bus_error)
    }

    #[zbus(name = "SetUpdateOverCellularTarget")]
    fn set_update_over_cellular_target(
        &self,
        target_version: &str,
        target_size: i64,
    ) -> zbus::fdo::Result<()> {
        self.adaptor
            .set_update_over_cellular_target(target_version, target_size)
            .map_err(to_bus_error)
    }

    #[zbus(name = "GetUpdateOverCellularPermission")]
    fn get_update_over_cellular_permission(&self) -> zbus::fdo::Result<bool> {
        self.adaptor
            .get_update_over_cellular_permission()
            .map_err(to_bus_error)
    }

    #[zbus(name = "GetDurationSinceUpdate")]
    fn get_duration_since_update(&self) -> zbus::fdo::Result<i64> {
        self.adaptor.get_duration_since_update().map_err(to_bus_error)
    }

    #[zbus(name = "GetPrevVersion")]
    fn get_prev_version(&self) -> zbus::fdo::Result<String> {
        self.adaptor.get_prev_version().map_err(to_bus_error)
    }

    #[zbus(name = "GetRollbackPartition")]
    fn get_rollback_partition(&self) -> zbus::fdo::Result<String> {
        self.adaptor.get_rollback_partition().map_err(to_bus_error)
    }

    #[zbus(name = "GetLastAttemptError")]
    fn get_last_attempt_error(&self) -> zbus::fdo::Result<i32> {
        self.adaptor.get_last_attempt_error().map_err(to_bus_error)
    }

    #[zbus(name = "GetEolStatus")]
    fn get_eol_status(&self) -> zbus::fdo::Result<i32> {
        self.adaptor.get_eol_status().map_err(to_bus_error)
    }

    // TODO: drop StatusUpdate once no caller listens for it; StatusUpdateAdvanced carries a superset.
    #[zbus(signal, name = "StatusUpdate")]
    async fn status_update(
        emitter: &SignalEmitter<'_>,
        last_checked_time: i64,
        progress: f64,
        current_operation: &str,
        new_version: &str,
        new_size: i64,
    ) -> zbus::Result<()>;

    #[zbus(signal, name = "StatusUpdateAdvanced")]
    async fn status_update_advanced(
        emitter: &SignalEmitter<'_>,
        status: StatusResult,
    ) -> zbus::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_keeps_domain_and_code() {
        let err = to_bus_error(ServiceError::internal("Empty DLC ID passed."));
        match err {
            zbus::fdo::Error::Failed(message) => {
                assert_eq!(message, "update_engine/INTERNAL: Empty DLC ID passed.");
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }
}
