//! Internal update status model.
//!
//! `StatusRecord` is the snapshot the update engine hands out on every query
//! and every status change. It is copied by value; nothing here caches it.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("Unknown update status code: {0}")]
    UnknownCode(i32),

    #[error("Unknown update status name: {0}")]
    UnknownName(String),
}

/// Operation the update engine is currently performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateStatus {
    #[default]
    Idle,
    CheckingForUpdate,
    UpdateAvailable,
    Downloading,
    Verifying,
    Finalizing,
    UpdatedNeedReboot,
    ReportingErrorEvent,
    AttemptingRollback,
    Disabled,
    NeedPermissionToUpdate,
}

impl UpdateStatus {
    /// Every status value, in numeric order.
    pub const ALL: [UpdateStatus; 11] = [
        UpdateStatus::Idle,
        UpdateStatus::CheckingForUpdate,
        UpdateStatus::UpdateAvailable,
        UpdateStatus::Downloading,
        UpdateStatus::Verifying,
        UpdateStatus::Finalizing,
        UpdateStatus::UpdatedNeedReboot,
        UpdateStatus::ReportingErrorEvent,
        UpdateStatus::AttemptingRollback,
        UpdateStatus::Disabled,
        UpdateStatus::NeedPermissionToUpdate,
    ];

    /// Numeric code of this status.
    pub fn code(self) -> i32 {
        match self {
            UpdateStatus::Idle => 0,
            UpdateStatus::CheckingForUpdate => 1,
            UpdateStatus::UpdateAvailable => 2,
            UpdateStatus::Downloading => 3,
            UpdateStatus::Verifying => 4,
            UpdateStatus::Finalizing => 5,
            UpdateStatus::UpdatedNeedReboot => 6,
            UpdateStatus::ReportingErrorEvent => 7,
            UpdateStatus::AttemptingRollback => 8,
            UpdateStatus::Disabled => 9,
            UpdateStatus::NeedPermissionToUpdate => 10,
        }
    }

    /// Canonical string name, as carried by the legacy `StatusUpdate` signal
    /// and the `GetStatus` method.
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateStatus::Idle => "UPDATE_STATUS_IDLE",
            UpdateStatus::CheckingForUpdate => "UPDATE_STATUS_CHECKING_FOR_UPDATE",
            UpdateStatus::UpdateAvailable => "UPDATE_STATUS_UPDATE_AVAILABLE",
            UpdateStatus::Downloading => "UPDATE_STATUS_DOWNLOADING",
            UpdateStatus::Verifying => "UPDATE_STATUS_VERIFYING",
            UpdateStatus::Finalizing => "UPDATE_STATUS_FINALIZING",
            UpdateStatus::UpdatedNeedReboot => "UPDATE_STATUS_UPDATED_NEED_REBOOT",
            UpdateStatus::ReportingErrorEvent => "UPDATE_STATUS_REPORTING_ERROR_EVENT",
            UpdateStatus::AttemptingRollback => "UPDATE_STATUS_ATTEMPTING_ROLLBACK",
            UpdateStatus::Disabled => "UPDATE_STATUS_DISABLED",
            UpdateStatus::NeedPermissionToUpdate => "UPDATE_STATUS_NEED_PERMISSION_TO_UPDATE",
        }
    }
}

/// Map a status to its canonical name.
pub fn update_status_to_string(status: UpdateStatus) -> &'static str {
    status.as_str()
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UpdateStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusError::UnknownName(s.to_string()))
    }
}

impl TryFrom<i32> for UpdateStatus {
    type Error = StatusError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        UpdateStatus::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or(StatusError::UnknownCode(code))
    }
}

/// Snapshot of the update engine state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusRecord {
    /// Seconds since the epoch of the last update check.
    pub last_checked_time: i64,
    /// Always within `[0.0, 1.0]` when built through [`StatusRecord::new`].
    pub progress: f64,
    pub status: UpdateStatus,
    /// Empty when no update is pending.
    pub new_version: String,
    pub new_size_bytes: u64,
    pub is_enterprise_rollback: bool,
    pub is_install: bool,
}

impl StatusRecord {
    /// Build a record, clamping `progress` into `[0.0, 1.0]`.
    pub fn new(
        last_checked_time: i64,
        progress: f64,
        status: UpdateStatus,
        new_version: impl Into<String>,
        new_size_bytes: u64,
    ) -> Self {
        Self {
            last_checked_time,
            progress: clamp_progress(progress),
            status,
            new_version: new_version.into(),
            new_size_bytes,
            is_enterprise_rollback: false,
            is_install: false,
        }
    }

    pub fn with_enterprise_rollback(mut self, is_enterprise_rollback: bool) -> Self {
        self.is_enterprise_rollback = is_enterprise_rollback;
        self
    }

    pub fn with_install(mut self, is_install: bool) -> Self {
        self.is_install = is_install;
        self
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names_are_unique() {
        let mut names: Vec<_> = UpdateStatus::ALL.iter().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), UpdateStatus::ALL.len());
    }

    #[test]
    fn test_status_name_roundtrip() {
        for status in UpdateStatus::ALL {
            let parsed: UpdateStatus = update_status_to_string(status).parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_status_code_roundtrip() {
        for (index, status) in UpdateStatus::ALL.into_iter().enumerate() {
            assert_eq!(status.code(), index as i32);
            assert_eq!(UpdateStatus::try_from(status.code()), Ok(status));
        }
    }

    #[test]
    fn test_known_names() {
        assert_eq!(UpdateStatus::Idle.to_string(), "UPDATE_STATUS_IDLE");
        assert_eq!(
            UpdateStatus::UpdatedNeedReboot.as_str(),
            "UPDATE_STATUS_UPDATED_NEED_REBOOT"
        );
        assert_eq!(
            UpdateStatus::NeedPermissionToUpdate.as_str(),
            "UPDATE_STATUS_NEED_PERMISSION_TO_UPDATE"
        );
    }

    #[test]
    fn test_unknown_inputs_rejected() {
        assert_eq!(
            UpdateStatus::try_from(11),
            Err(StatusError::UnknownCode(11))
        );
        assert_eq!(
            UpdateStatus::try_from(-1),
            Err(StatusError::UnknownCode(-1))
        );
        assert!(matches!(
            "UPDATE_STATUS_BOGUS".parse::<UpdateStatus>(),
            Err(StatusError::UnknownName(_))
        ));
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(StatusRecord::new(0, 1.5, UpdateStatus::Idle, "", 0).progress, 1.0);
        assert_eq!(StatusRecord::new(0, -0.2, UpdateStatus::Idle, "", 0).progress, 0.0);
        assert_eq!(StatusRecord::new(0, f64::NAN, UpdateStatus::Idle, "", 0).progress, 0.0);
        assert!((StatusRecord::new(0, 0.25, UpdateStatus::Idle, "", 0).progress - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_default_record_is_idle() {
        let record = StatusRecord::default();
        assert_eq!(record.status, UpdateStatus::Idle);
        assert!(record.new_version.is_empty());
        assert!(!record.is_install);
    }
}
