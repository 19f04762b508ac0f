//! Method implementations behind the bus interface.
//!
//! Each method validates and converts its arguments, calls the update
//! service, and converts the result back. Errors from the service are passed
//! through untouched.

use super::codec::{to_status_result, LegacyStatus};
use super::types::{ModuleList, StatusResult, ATTEMPT_UPDATE_FLAG_NON_INTERACTIVE};
use crate::engine::{ServiceError, ServiceResult, UpdateAttemptFlags, UpdateService};
use std::sync::Arc;
use tracing::{debug, warn};

/// Map the wire flags of `AttemptUpdateWithFlags` to engine flags.
///
/// Only bit 0 is meaningful; every other bit is ignored.
pub fn decode_attempt_flags(flags: i32) -> UpdateAttemptFlags {
    let interactive = flags & ATTEMPT_UPDATE_FLAG_NON_INTERACTIVE == 0;
    if interactive {
        UpdateAttemptFlags::NONE
    } else {
        UpdateAttemptFlags::NON_INTERACTIVE
    }
}

/// Collect module ids from an install request, rejecting empty ids.
pub fn module_ids(request: &ModuleList) -> ServiceResult<Vec<String>> {
    request
        .modules
        .iter()
        .map(|module| {
            if module.id.is_empty() {
                Err(ServiceError::internal("Empty DLC ID passed."))
            } else {
                Ok(module.id.clone())
            }
        })
        .collect()
}

/// Dispatch target for every exported method.
#[derive(Clone)]
pub struct ServiceAdaptor {
    service: Arc<dyn UpdateService>,
}

impl ServiceAdaptor {
    pub fn new(service: Arc<dyn UpdateService>) -> Self {
        Self { service }
    }

    /// The wrapped update service.
    pub fn service(&self) -> &Arc<dyn UpdateService> {
        &self.service
    }

    pub fn attempt_update(&self, app_version: &str, omaha_url: &str) -> ServiceResult<()> {
        self.attempt_update_with_flags(app_version, omaha_url, 0)
    }

    pub fn attempt_update_with_flags(
        &self,
        app_version: &str,
        omaha_url: &str,
        flags: i32,
    ) -> ServiceResult<()> {
        let flags = decode_attempt_flags(flags);
        let scheduled = self
            .service
            .attempt_update(app_version, omaha_url, flags)
            .inspect_err(|e| debug!("AttemptUpdate failed: {}", e))?;
        if !scheduled {
            debug!("AttemptUpdate ignored: an update attempt is already in progress");
        }
        Ok(())
    }

    pub fn attempt_install(&self, request: &ModuleList) -> ServiceResult<()> {
        let ids = module_ids(request).inspect_err(|e| warn!("Rejecting install request: {}", e))?;
        self.service
            .attempt_install(&request.omaha_url, &ids)
            .inspect_err(|e| debug!("AttemptInstall failed: {}", e))
    }

    pub fn attempt_rollback(&self, powerwash: bool) -> ServiceResult<()> {
        self.service.attempt_rollback(powerwash)
    }

    pub fn can_rollback(&self) -> ServiceResult<bool> {
        self.service.can_rollback()
    }

    pub fn reset_status(&self) -> ServiceResult<()> {
        self.service.reset_status()
    }

    /// Status with the operation as its string name.
    pub fn get_status(&self) -> ServiceResult<LegacyStatus> {
        let record = self.service.get_status()?;
        Ok(LegacyStatus::from(&to_status_result(&record)))
    }

    pub fn get_status_advanced(&self) -> ServiceResult<StatusResult> {
        let record = self.service.get_status()?;
        Ok(to_status_result(&record))
    }

    pub fn reboot_if_needed(&self) -> ServiceResult<()> {
        self.service.reboot_if_needed()
    }

    pub fn set_channel(&self, target_channel: &str, is_powerwash_allowed: bool) -> ServiceResult<()> {
        self.service.set_channel(target_channel, is_powerwash_allowed)
    }

    pub fn get_channel(&self, get_current_channel: bool) -> ServiceResult<String> {
        self.service.get_channel(get_current_channel)
    }

    pub fn get_cohort_hint(&self) -> ServiceResult<String> {
        self.service.get_cohort_hint()
    }

    pub fn set_cohort_hint(&self, cohort_hint: &str) -> ServiceResult<()> {
        self.service.set_cohort_hint(cohort_hint)
    }

    pub fn set_p2p_update_permission(&self, enabled: bool) -> ServiceResult<()> {
        self.service.set_p2p_update_permission(enabled)
    }

    pub fn get_p2p_update_permission(&self) -> ServiceResult<bool> {
        self.service.get_p2p_update_permission()
    }

    pub fn set_update_over_cellular_permission(&self, allowed: bool) -> ServiceResult<()> {
        self.service.set_update_over_cellular_permission(allowed)
    }

    pub fn set_update_over_cellular_target(
        &self,
        target_version: &str,
        target_size: i64,
    ) -> ServiceResult<()> {
        self.service
            .set_update_over_cellular_target(target_version, target_size)
    }

    pub fn get_update_over_cellular_permission(&self) -> ServiceResult<bool> {
        self.service.get_update_over_cellular_permission()
    }

    /// Microseconds of wall-clock time since the last update.
    pub fn get_duration_since_update(&self) -> ServiceResult<i64> {
        self.service.get_duration_since_update()
    }

    pub fn get_prev_version(&self) -> ServiceResult<String> {
        self.service.get_prev_version()
    }

    pub fn get_rollback_partition(&self) -> ServiceResult<String> {
        self.service.get_rollback_partition()
    }

    pub fn get_last_attempt_error(&self) -> ServiceResult<i32> {
        self.service.get_last_attempt_error()
    }

    pub fn get_eol_status(&self) -> ServiceResult<i32> {
        self.service.get_eol_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbus::codec::operation_to_name;
    use crate::dbus::types::{ModuleInfo, Operation};
    use crate::engine::ServiceObserver;
    use crate::status::{StatusRecord, UpdateStatus};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Update(String, String, UpdateAttemptFlags),
        Install(String, Vec<String>),
        Rollback(bool),
        SetChannel(String, bool),
        CellularTarget(String, i64),
    }

    /// Records calls and answers with canned values.
    #[derive(Default)]
    struct FakeUpdateService {
        calls: Mutex<Vec<Call>>,
        status: StatusRecord,
        error: Option<ServiceError>,
    }

    impl FakeUpdateService {
        fn failing(error: ServiceError) -> Self {
            Self {
                error: Some(error),
                ..Default::default()
            }
        }

        fn with_status(status: StatusRecord) -> Self {
            Self {
                status,
                ..Default::default()
            }
        }

        fn record(&self, call: Call) -> ServiceResult<()> {
            self.calls.lock().unwrap().push(call);
            self.check()
        }

        fn check(&self) -> ServiceResult<()> {
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl UpdateService for FakeUpdateService {
        fn attempt_update(
            &self,
            app_version: &str,
            omaha_url: &str,
            flags: UpdateAttemptFlags,
        ) -> ServiceResult<bool> {
            self.record(Call::Update(app_version.into(), omaha_url.into(), flags))?;
            Ok(true)
        }

        fn attempt_install(&self, omaha_url: &str, module_ids: &[String]) -> ServiceResult<()> {
            self.record(Call::Install(omaha_url.into(), module_ids.to_vec()))
        }

        fn attempt_rollback(&self, powerwash: bool) -> ServiceResult<()> {
            self.record(Call::Rollback(powerwash))
        }

        fn can_rollback(&self) -> ServiceResult<bool> {
            self.check().map(|_| true)
        }

        fn reset_status(&self) -> ServiceResult<()> {
            self.check()
        }

        fn get_status(&self) -> ServiceResult<StatusRecord> {
            self.check().map(|_| self.status.clone())
        }

        fn reboot_if_needed(&self) -> ServiceResult<()> {
            self.check()
        }

        fn set_channel(&self, target_channel: &str, is_powerwash_allowed: bool) -> ServiceResult<()> {
            self.record(Call::SetChannel(target_channel.into(), is_powerwash_allowed))
        }

        fn get_channel(&self, get_current_channel: bool) -> ServiceResult<String> {
            self.check().map(|_| {
                if get_current_channel {
                    "stable-channel".to_string()
                } else {
                    "beta-channel".to_string()
                }
            })
        }

        fn set_cohort_hint(&self, _cohort_hint: &str) -> ServiceResult<()> {
            self.check()
        }

        fn get_cohort_hint(&self) -> ServiceResult<String> {
            self.check().map(|_| "hint".to_string())
        }

        fn set_p2p_update_permission(&self, _enabled: bool) -> ServiceResult<()> {
            self.check()
        }

        fn get_p2p_update_permission(&self) -> ServiceResult<bool> {
            self.check().map(|_| true)
        }

        fn set_update_over_cellular_permission(&self, _allowed: bool) -> ServiceResult<()> {
            self.check()
        }

        fn set_update_over_cellular_target(
            &self,
            target_version: &str,
            target_size: i64,
        ) -> ServiceResult<()> {
            self.record(Call::CellularTarget(target_version.into(), target_size))
        }

        fn get_update_over_cellular_permission(&self) -> ServiceResult<bool> {
            self.check().map(|_| false)
        }

        fn get_duration_since_update(&self) -> ServiceResult<i64> {
            self.check().map(|_| 3_600_000_000)
        }

        fn get_prev_version(&self) -> ServiceResult<String> {
            self.check().map(|_| "15000.0.0".to_string())
        }

        fn get_rollback_partition(&self) -> ServiceResult<String> {
            self.check().map(|_| "/dev/sda3".to_string())
        }

        fn get_last_attempt_error(&self) -> ServiceResult<i32> {
            self.check().map(|_| 37)
        }

        fn get_eol_status(&self) -> ServiceResult<i32> {
            self.check().map(|_| 2)
        }

        fn add_observer(&self, _observer: Arc<dyn ServiceObserver>) {}
    }

    fn adaptor(service: FakeUpdateService) -> (ServiceAdaptor, Arc<FakeUpdateService>) {
        let service = Arc::new(service);
        (ServiceAdaptor::new(service.clone()), service)
    }

    #[test]
    fn test_decode_attempt_flags() {
        assert_eq!(decode_attempt_flags(0), UpdateAttemptFlags::NONE);
        assert_eq!(decode_attempt_flags(1), UpdateAttemptFlags::NON_INTERACTIVE);
        // Reserved bits never change the outcome.
        assert_eq!(decode_attempt_flags(0b110), UpdateAttemptFlags::NONE);
        assert_eq!(decode_attempt_flags(0b111), UpdateAttemptFlags::NON_INTERACTIVE);
        assert_eq!(decode_attempt_flags(i32::MIN), UpdateAttemptFlags::NONE);
        assert_eq!(decode_attempt_flags(-1), UpdateAttemptFlags::NON_INTERACTIVE);
    }

    #[test]
    fn test_decode_attempt_flags_depends_only_on_bit0() {
        for shift in 1..31 {
            let reserved = 1i32 << shift;
            assert_eq!(decode_attempt_flags(reserved), UpdateAttemptFlags::NONE);
            assert_eq!(
                decode_attempt_flags(reserved | 1),
                UpdateAttemptFlags::NON_INTERACTIVE
            );
        }
    }

    #[test]
    fn test_attempt_update_passes_no_flags() {
        let (adaptor, service) = adaptor(FakeUpdateService::default());
        adaptor.attempt_update("1.0", "http://omaha").unwrap();
        assert_eq!(
            service.calls(),
            vec![Call::Update(
                "1.0".into(),
                "http://omaha".into(),
                UpdateAttemptFlags::NONE
            )]
        );
    }

    #[test]
    fn test_attempt_update_with_non_interactive_flag() {
        let (adaptor, service) = adaptor(FakeUpdateService::default());
        adaptor.attempt_update_with_flags("", "", 1).unwrap();
        adaptor.attempt_update_with_flags("", "", 0x7FFF_FFFE).unwrap();
        assert_eq!(
            service.calls(),
            vec![
                Call::Update("".into(), "".into(), UpdateAttemptFlags::NON_INTERACTIVE),
                Call::Update("".into(), "".into(), UpdateAttemptFlags::NONE),
            ]
        );
    }

    #[test]
    fn test_attempt_install_rejects_empty_id() {
        let (adaptor, service) = adaptor(FakeUpdateService::default());
        let request = ModuleList {
            modules: vec![ModuleInfo::new("a"), ModuleInfo::new(""), ModuleInfo::new("b")],
            omaha_url: "http://x".into(),
        };

        let err = adaptor.attempt_install(&request).unwrap_err();
        assert_eq!(err.domain, "update_engine");
        assert_eq!(err.code, "INTERNAL");
        assert_eq!(err.message, "Empty DLC ID passed.");
        assert!(service.calls().is_empty());
    }

    #[test]
    fn test_attempt_install_preserves_order() {
        let (adaptor, service) = adaptor(FakeUpdateService::default());
        adaptor
            .attempt_install(&ModuleList::new("http://x", ["a", "b"]))
            .unwrap();
        assert_eq!(
            service.calls(),
            vec![Call::Install("http://x".into(), vec!["a".into(), "b".into()])]
        );
    }

    #[test]
    fn test_attempt_install_empty_list_delegates() {
        let (adaptor, service) = adaptor(FakeUpdateService::default());
        adaptor.attempt_install(&ModuleList::default()).unwrap();
        assert_eq!(service.calls(), vec![Call::Install("".into(), vec![])]);
    }

    #[test]
    fn test_service_errors_pass_through_unchanged() {
        let error = ServiceError::new("dbus", "org.chromium.Busy", "busy");
        let (adaptor, _) = adaptor(FakeUpdateService::failing(error.clone()));

        assert_eq!(adaptor.attempt_update("", "").unwrap_err(), error);
        assert_eq!(adaptor.attempt_rollback(true).unwrap_err(), error);
        assert_eq!(adaptor.get_status().unwrap_err(), error);
        assert_eq!(adaptor.get_status_advanced().unwrap_err(), error);
        assert_eq!(adaptor.get_channel(true).unwrap_err(), error);
        assert_eq!(adaptor.get_eol_status().unwrap_err(), error);
        assert_eq!(
            adaptor
                .attempt_install(&ModuleList::new("u", ["a"]))
                .unwrap_err(),
            error
        );
    }

    #[test]
    fn test_get_status_variants_agree() {
        let record = StatusRecord::new(1_650_000_000, 0.75, UpdateStatus::Verifying, "2.0.0", 4096)
            .with_install(true);
        let (adaptor, _) = adaptor(FakeUpdateService::with_status(record));

        let legacy = adaptor.get_status().unwrap();
        let advanced = adaptor.get_status_advanced().unwrap();

        assert_eq!(advanced.current_operation, Operation::Verifying);
        assert_eq!(legacy.current_operation, operation_to_name(advanced.current_operation));
        assert_eq!(legacy.current_operation, "UPDATE_STATUS_VERIFYING");
        assert_eq!(legacy.last_checked_time, advanced.last_checked_time);
        assert_eq!(legacy.progress, advanced.progress);
        assert_eq!(legacy.new_version, advanced.new_version);
        assert_eq!(legacy.new_size, advanced.new_size);
        assert!(advanced.is_install);
    }

    #[test]
    fn test_simple_delegation() {
        let (adaptor, service) = adaptor(FakeUpdateService::default());

        adaptor.attempt_rollback(true).unwrap();
        adaptor.set_channel("beta-channel", true).unwrap();
        adaptor.set_update_over_cellular_target("3.0", 512).unwrap();
        assert_eq!(
            service.calls(),
            vec![
                Call::Rollback(true),
                Call::SetChannel("beta-channel".into(), true),
                Call::CellularTarget("3.0".into(), 512),
            ]
        );

        assert!(adaptor.can_rollback().unwrap());
        assert_eq!(adaptor.get_channel(true).unwrap(), "stable-channel");
        assert_eq!(adaptor.get_channel(false).unwrap(), "beta-channel");
        assert_eq!(adaptor.get_cohort_hint().unwrap(), "hint");
        assert!(adaptor.get_p2p_update_permission().unwrap());
        assert!(!adaptor.get_update_over_cellular_permission().unwrap());
        assert_eq!(adaptor.get_duration_since_update().unwrap(), 3_600_000_000);
        assert_eq!(adaptor.get_prev_version().unwrap(), "15000.0.0");
        assert_eq!(adaptor.get_rollback_partition().unwrap(), "/dev/sda3");
        assert_eq!(adaptor.get_last_attempt_error().unwrap(), 37);
        assert_eq!(adaptor.get_eol_status().unwrap(), 2);
    }
}
