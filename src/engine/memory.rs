//! In-memory update service.
//!
//! Holds channel, cohort and permission settings in process memory and never
//! downloads anything. Used to run the bus adaptor standalone and in tests.

use super::{ServiceError, ServiceObserver, ServiceResult, UpdateAttemptFlags, UpdateService};
use crate::status::{StatusRecord, UpdateStatus};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

const DEFAULT_CHANNEL: &str = "stable-channel";

#[derive(Debug, Clone)]
struct Settings {
    current_channel: String,
    target_channel: String,
    cohort_hint: String,
    p2p_enabled: bool,
    cellular_allowed: bool,
    cellular_target: Option<(String, i64)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            current_channel: DEFAULT_CHANNEL.to_string(),
            target_channel: DEFAULT_CHANNEL.to_string(),
            cohort_hint: String::new(),
            p2p_enabled: false,
            cellular_allowed: false,
            cellular_target: None,
        }
    }
}

/// Update service backed by plain memory.
///
/// Update checks only bump the last-checked timestamp and report idle again.
pub struct InMemoryUpdateService {
    status: Mutex<StatusRecord>,
    settings: Mutex<Settings>,
    observers: Mutex<Vec<Arc<dyn ServiceObserver>>>,
    boot_time: SystemTime,
}

impl Default for InMemoryUpdateService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUpdateService {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(StatusRecord::default()),
            settings: Mutex::new(Settings::default()),
            observers: Mutex::new(Vec::new()),
            boot_time: SystemTime::now(),
        }
    }

    /// Replace the current status and notify observers.
    pub fn set_status(&self, record: StatusRecord) {
        *lock(&self.status) = record.clone();
        self.notify(&record);
    }

    fn notify(&self, record: &StatusRecord) {
        let observers = lock(&self.observers).clone();
        debug!(
            "Notifying {} observer(s) of {}",
            observers.len(),
            record.status
        );
        for observer in observers {
            observer.send_status_update(record);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicked writer leaves plain data behind; keep serving it.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl UpdateService for InMemoryUpdateService {
    fn attempt_update(
        &self,
        app_version: &str,
        omaha_url: &str,
        flags: UpdateAttemptFlags,
    ) -> ServiceResult<bool> {
        info!(
            "Update requested (app_version={:?}, omaha_url={:?}, flags={:?})",
            app_version, omaha_url, flags
        );
        let checking = {
            let mut status = lock(&self.status);
            if status.status != UpdateStatus::Idle {
                return Ok(false);
            }
            status.last_checked_time = now_secs();
            status.status = UpdateStatus::CheckingForUpdate;
            status.is_install = false;
            status.clone()
        };
        self.notify(&checking);

        let mut idle = checking;
        idle.status = UpdateStatus::Idle;
        self.set_status(idle);
        Ok(true)
    }

    fn attempt_install(&self, omaha_url: &str, module_ids: &[String]) -> ServiceResult<()> {
        info!("Install requested for {:?} from {:?}", module_ids, omaha_url);
        let record = lock(&self.status).clone();
        if record.status != UpdateStatus::Idle {
            return Err(ServiceError::internal(
                "Cannot install while an update is in progress.",
            ));
        }
        self.set_status(record.with_install(true));
        Ok(())
    }

    fn attempt_rollback(&self, powerwash: bool) -> ServiceResult<()> {
        info!("Rollback requested (powerwash={})", powerwash);
        Err(ServiceError::internal("Rollback is not available."))
    }

    fn can_rollback(&self) -> ServiceResult<bool> {
        Ok(false)
    }

    fn reset_status(&self) -> ServiceResult<()> {
        let current = lock(&self.status).status;
        if current != UpdateStatus::Idle && current != UpdateStatus::UpdatedNeedReboot {
            return Err(ServiceError::internal(format!(
                "Cannot reset status while {}.",
                current
            )));
        }
        self.set_status(StatusRecord::default());
        Ok(())
    }

    fn get_status(&self) -> ServiceResult<StatusRecord> {
        Ok(lock(&self.status).clone())
    }

    fn reboot_if_needed(&self) -> ServiceResult<()> {
        if lock(&self.status).status != UpdateStatus::UpdatedNeedReboot {
            return Err(ServiceError::internal("Reboot is not needed."));
        }
        info!("Reboot would be requested now");
        Ok(())
    }

    fn set_channel(&self, target_channel: &str, is_powerwash_allowed: bool) -> ServiceResult<()> {
        if !target_channel.ends_with("-channel") {
            return Err(ServiceError::internal(format!(
                "Invalid channel: {}",
                target_channel
            )));
        }
        debug!(
            "Target channel set to {} (powerwash allowed: {})",
            target_channel, is_powerwash_allowed
        );
        lock(&self.settings).target_channel = target_channel.to_string();
        Ok(())
    }

    fn get_channel(&self, get_current_channel: bool) -> ServiceResult<String> {
        let settings = lock(&self.settings);
        Ok(if get_current_channel {
            settings.current_channel.clone()
        } else {
            settings.target_channel.clone()
        })
    }

    fn set_cohort_hint(&self, cohort_hint: &str) -> ServiceResult<()> {
        lock(&self.settings).cohort_hint = cohort_hint.to_string();
        Ok(())
    }

    fn get_cohort_hint(&self) -> ServiceResult<String> {
        Ok(lock(&self.settings).cohort_hint.clone())
    }

    fn set_p2p_update_permission(&self, enabled: bool) -> ServiceResult<()> {
        lock(&self.settings).p2p_enabled = enabled;
        Ok(())
    }

    fn get_p2p_update_permission(&self) -> ServiceResult<bool> {
        Ok(lock(&self.settings).p2p_enabled)
    }

    fn set_update_over_cellular_permission(&self, allowed: bool) -> ServiceResult<()> {
        lock(&self.settings).cellular_allowed = allowed;
        Ok(())
    }

    fn set_update_over_cellular_target(
        &self,
        target_version: &str,
        target_size: i64,
    ) -> ServiceResult<()> {
        if target_size < 0 {
            return Err(ServiceError::internal("Target size must not be negative."));
        }
        lock(&self.settings).cellular_target = Some((target_version.to_string(), target_size));
        Ok(())
    }

    fn get_update_over_cellular_permission(&self) -> ServiceResult<bool> {
        let settings = lock(&self.settings);
        Ok(settings.cellular_allowed || settings.cellular_target.is_some())
    }

    fn get_duration_since_update(&self) -> ServiceResult<i64> {
        // No update has been applied; report time since this service started.
        let elapsed = self
            .boot_time
            .elapsed()
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        Ok(i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX))
    }

    fn get_prev_version(&self) -> ServiceResult<String> {
        Ok(String::new())
    }

    fn get_rollback_partition(&self) -> ServiceResult<String> {
        Ok(String::new())
    }

    fn get_last_attempt_error(&self) -> ServiceResult<i32> {
        Ok(0)
    }

    fn get_eol_status(&self) -> ServiceResult<i32> {
        Ok(0)
    }

    fn add_observer(&self, observer: Arc<dyn ServiceObserver>) {
        lock(&self.observers).push(observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<UpdateStatus>>);

    impl ServiceObserver for Collect {
        fn send_status_update(&self, status: &StatusRecord) {
            self.0.lock().unwrap().push(status.status);
        }
    }

    #[test]
    fn test_attempt_update_notifies_observers() {
        let service = InMemoryUpdateService::new();
        let observer = Arc::new(Collect::default());
        service.add_observer(observer.clone());

        assert!(service
            .attempt_update("", "", UpdateAttemptFlags::NONE)
            .unwrap());

        assert_eq!(
            *observer.0.lock().unwrap(),
            vec![UpdateStatus::CheckingForUpdate, UpdateStatus::Idle]
        );
        assert!(service.get_status().unwrap().last_checked_time > 0);
    }

    #[test]
    fn test_attempt_update_rejected_when_busy() {
        let service = InMemoryUpdateService::new();
        service.set_status(StatusRecord::new(0, 0.5, UpdateStatus::Downloading, "1.2.3", 10));
        assert!(!service
            .attempt_update("", "", UpdateAttemptFlags::NONE)
            .unwrap());
    }

    #[test]
    fn test_channel_settings() {
        let service = InMemoryUpdateService::new();
        service.set_channel("beta-channel", false).unwrap();
        assert_eq!(service.get_channel(false).unwrap(), "beta-channel");
        assert_eq!(service.get_channel(true).unwrap(), DEFAULT_CHANNEL);
        assert!(service.set_channel("nonsense", false).is_err());
    }

    #[test]
    fn test_permissions() {
        let service = InMemoryUpdateService::new();
        assert!(!service.get_p2p_update_permission().unwrap());
        service.set_p2p_update_permission(true).unwrap();
        assert!(service.get_p2p_update_permission().unwrap());

        assert!(!service.get_update_over_cellular_permission().unwrap());
        service.set_update_over_cellular_target("1.2.3", 1024).unwrap();
        assert!(service.get_update_over_cellular_permission().unwrap());
    }

    #[test]
    fn test_reset_status_from_reboot_needed() {
        let service = InMemoryUpdateService::new();
        service.set_status(StatusRecord::new(5, 1.0, UpdateStatus::UpdatedNeedReboot, "2.0", 1));
        assert!(service.reboot_if_needed().is_ok());
        service.reset_status().unwrap();
        assert_eq!(service.get_status().unwrap(), StatusRecord::default());
        assert!(service.reboot_if_needed().is_err());
    }

    #[test]
    fn test_install_status_matches_broadcast() {
        let service = InMemoryUpdateService::new();
        let (forwarder, mut updates) = crate::dbus::StatusForwarder::channel();
        service.add_observer(Arc::new(forwarder));

        service
            .attempt_install("http://x", &["a".to_string()])
            .unwrap();

        let broadcast = updates.try_recv().unwrap();
        assert!(broadcast.is_install);
        assert_eq!(service.get_status().unwrap(), broadcast);

        service
            .attempt_update("", "", UpdateAttemptFlags::NONE)
            .unwrap();
        assert!(!service.get_status().unwrap().is_install);
    }

    #[test]
    fn test_duration_since_update_is_not_negative() {
        let service = InMemoryUpdateService::new();
        assert!(service.get_duration_since_update().unwrap() >= 0);
    }
}
