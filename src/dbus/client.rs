//! D-Bus client for the update engine service.
//!
//! Used by the CLI subcommands to drive a running service.

use super::types::{ModuleList, StatusResult};
use crate::config::BusKind;
use futures_util::StreamExt;
use zbus::{Connection, Result};

/// Client for `org.chromium.UpdateEngineInterface`.
pub struct UpdateEngineClient {
    proxy: UpdateEngineProxy<'static>,
}

impl UpdateEngineClient {
    /// Connect to the service at an explicit name and path.
    pub async fn connect_to(bus: BusKind, service_name: &str, object_path: &str) -> Result<Self> {
        let connection = super::connect(bus).await?;
        Self::with_connection(&connection, service_name.to_string(), object_path.to_string()).await
    }

    /// Build a client on an existing connection.
    pub async fn with_connection(
        connection: &Connection,
        service_name: String,
        object_path: String,
    ) -> Result<Self> {
        let proxy = UpdateEngineProxy::builder(connection)
            .destination(service_name)?
            .path(object_path)?
            .build()
            .await?;
        Ok(Self { proxy })
    }

    /// Check whether anything currently owns the service name.
    pub async fn is_service_running(&self) -> bool {
        let Ok(dbus) = zbus::fdo::DBusProxy::new(self.proxy.inner().connection()).await else {
            return false;
        };
        dbus.name_has_owner(self.proxy.inner().destination().clone())
            .await
            .unwrap_or(false)
    }

    pub async fn attempt_update(
        &self,
        app_version: &str,
        omaha_url: &str,
        flags: i32,
    ) -> Result<()> {
        self.proxy
            .attempt_update_with_flags(app_version, omaha_url, flags)
            .await
    }

    pub async fn attempt_install(&self, request: &ModuleList) -> Result<()> {
        self.proxy.attempt_install(request).await
    }

    pub async fn attempt_rollback(&self, powerwash: bool) -> Result<()> {
        self.proxy.attempt_rollback(powerwash).await
    }

    pub async fn can_rollback(&self) -> Result<bool> {
        self.proxy.can_rollback().await
    }

    pub async fn reset_status(&self) -> Result<()> {
        self.proxy.reset_status().await
    }

    /// Status as reported by the legacy `GetStatus` method.
    pub async fn get_status(&self) -> Result<(i64, f64, String, String, i64)> {
        self.proxy.get_status().await
    }

    pub async fn get_status_advanced(&self) -> Result<StatusResult> {
        self.proxy.get_status_advanced().await
    }

    pub async fn reboot_if_needed(&self) -> Result<()> {
        self.proxy.reboot_if_needed().await
    }

    pub async fn set_channel(&self, target_channel: &str, is_powerwash_allowed: bool) -> Result<()> {
        self.proxy
            .set_channel(target_channel, is_powerwash_allowed)
            .await
    }

    pub async fn get_channel(&self, get_current_channel: bool) -> Result<String> {
        self.proxy.get_channel(get_current_channel).await
    }

    pub async fn get_cohort_hint(&self) -> Result<String> {
        self.proxy.get_cohort_hint().await
    }

    pub async fn set_cohort_hint(&self, cohort_hint: &str) -> Result<()> {
        self.proxy.set_cohort_hint(cohort_hint).await
    }

    pub async fn get_p2p_update_permission(&self) -> Result<bool> {
        self.proxy.get_p2p_update_permission().await
    }

    pub async fn set_p2p_update_permission(&self, enabled: bool) -> Result<()> {
        self.proxy.set_p2p_update_permission(enabled).await
    }

    pub async fn get_update_over_cellular_permission(&self) -> Result<bool> {
        self.proxy.get_update_over_cellular_permission().await
    }

    pub async fn set_update_over_cellular_permission(&self, allowed: bool) -> Result<()> {
        self.proxy.set_update_over_cellular_permission(allowed).await
    }

    pub async fn set_update_over_cellular_target(
        &self,
        target_version: &str,
        target_size: i64,
    ) -> Result<()> {
        self.proxy
            .set_update_over_cellular_target(target_version, target_size)
            .await
    }

    pub async fn get_duration_since_update(&self) -> Result<i64> {
        self.proxy.get_duration_since_update().await
    }

    pub async fn get_prev_version(&self) -> Result<String> {
        self.proxy.get_prev_version().await
    }

    pub async fn get_rollback_partition(&self) -> Result<String> {
        self.proxy.get_rollback_partition().await
    }

    pub async fn get_last_attempt_error(&self) -> Result<i32> {
        self.proxy.get_last_attempt_error().await
    }

    pub async fn get_eol_status(&self) -> Result<i32> {
        self.proxy.get_eol_status().await
    }

    /// Call `on_status` for every `StatusUpdateAdvanced` signal until the
    /// stream ends or `on_status` returns `false`.
    pub async fn watch<F>(&self, mut on_status: F) -> Result<()>
    where
        F: FnMut(StatusResult) -> bool,
    {
        let mut updates = self.proxy.receive_status_update_advanced().await?;
        while let Some(signal) = updates.next().await {
            let args = signal.args()?;
            if !on_status(args.status().clone()) {
                break;
            }
        }
        Ok(())
    }
}

/// Generated proxy for calling update engine methods.
#[zbus::proxy(
    interface = "org.chromium.UpdateEngineInterface",
    default_service = "org.chromium.UpdateEngine",
    default_path = "/org/chromium/UpdateEngine"
)]
trait UpdateEngine {
    #[zbus(name = "AttemptUpdateWithFlags")]
    fn attempt_update_with_flags(
        &self,
        app_version: &str,
        omaha_url: &str,
        flags: i32,
    ) -> zbus::Result<()>;

    #[zbus(name = "AttemptInstall")]
    fn attempt_install(&self, request: &ModuleList) -> zbus::Result<()>;

    #[zbus(name = "AttemptRollback")]
    fn attempt_rollback(&self, powerwash: bool) -> zbus::Result<()>;

    #[zbus(name = "CanRollback")]
    fn can_rollback(&self) -> zbus::Result<bool>;

    #[zbus(name = "ResetStatus")]
    fn reset_status(&self) -> zbus::Result<()>;

    #[zbus(name = "GetStatus")]
    fn get_status(&self) -> zbus::Result<(i64, f64, String, String, i64)>;

    #[zbus(name = "GetStatusAdvanced")]
    fn get_status_advanced(&self) -> zbus::Result<StatusResult>;

    #[zbus(name = "RebootIfNeeded")]
    fn reboot_if_needed(&self) -> zbus::Result<()>;

    #[zbus(name = "SetChannel")]
    fn set_channel(&self, target_channel: &str, is_powerwash_allowed: bool) -> zbus::Result<()>;

    #[zbus(name = "GetChannel")]
    fn get_channel(&self, get_current_channel: bool) -> zbus::Result<String>;

    #[zbus(name = "GetCohortHint")]
    fn get_cohort_hint(&self) -> zbus::Result<String>;

    #[zbus(name = "SetCohortHint")]
    fn set_cohort_hint(&self, cohort_hint: &str) -> zbus::Result<()>;

    #[zbus(name = "SetP2PUpdatePermission")]
    fn set_p2p_update_permission(&self, enabled: bool) -> zbus::Result<()>;

    #[zbus(name = "GetP2PUpdatePermission")]
    fn get_p2p_update_permission(&self) -> zbus::Result<bool>;

    #[zbus(name = "SetUpdateOverCellularPermission")]
    fn set_update_over_cellular_permission(&self, allowed: bool) -> zbus::Result<()>;

    #[zbus(name = "SetUpdateOverCellularTarget")]
    fn set_update_over_cellular_target(
        &self,
        target_version: &str,
        target_size: i64,
    ) -> zbus::Result<()>;

    #[zbus(name = "GetUpdateOverCellularPermission")]
    fn get_update_over_cellular_permission(&self) -> zbus::Result<bool>;

    #[zbus(name = "GetDurationSinceUpdate")]
    fn get_duration_since_update(&self) -> zbus::Result<i64>;

    #[zbus(name = "GetPrevVersion")]
    fn get_prev_version(&self) -> zbus::Result<String>;

    #[zbus(name = "GetRollbackPartition")]
    fn get_rollback_partition(&self) -> zbus::Result<String>;

    #[zbus(name = "GetLastAttemptError")]
    fn get_last_attempt_error(&self) -> zbus::Result<i32>;

    #[zbus(name = "GetEolStatus")]
    fn get_eol_status(&self) -> zbus::Result<i32>;

    #[zbus(signal, name = "StatusUpdateAdvanced")]
    fn status_update_advanced(&self, status: StatusResult) -> zbus::Result<()>;
}
