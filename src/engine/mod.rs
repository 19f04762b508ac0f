//! Contract with the update engine.
//!
//! The adaptor never performs update, install or rollback work itself. It
//! talks to an [`UpdateService`] implementation and relays whatever that
//! returns, errors included.

use crate::status::StatusRecord;
use std::sync::Arc;
use thiserror::Error;

mod memory;

pub use memory::InMemoryUpdateService;

/// Error domain used for errors raised by the update engine and the adaptor.
pub const ERROR_DOMAIN: &str = "update_engine";

/// Error code for failures that indicate a malformed request or internal fault.
pub const ERROR_CODE_INTERNAL: &str = "INTERNAL";

/// Error returned by the update engine or synthesised by the adaptor.
///
/// Carries a domain tag and code next to the message so callers can tell
/// where the failure came from. The adaptor passes these through unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{domain}/{code}: {message}")]
pub struct ServiceError {
    pub domain: String,
    pub code: String,
    pub message: String,
}

impl ServiceError {
    pub fn new(
        domain: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Internal error in the update engine domain.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ERROR_DOMAIN, ERROR_CODE_INTERNAL, message)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

bitflags::bitflags! {
    /// Flags accepted by [`UpdateService::attempt_update`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct UpdateAttemptFlags: u32 {
        /// The attempt was not started by a user; suppress foreground UX.
        const NON_INTERACTIVE = 1 << 0;
        /// Only check for an update, do not download it.
        const RESTRICT_DOWNLOAD = 1 << 1;
    }
}

impl UpdateAttemptFlags {
    pub const NONE: Self = Self::empty();
}

/// Receives status changes pushed by the update engine.
///
/// May be invoked from any thread, so implementations must not block.
pub trait ServiceObserver: Send + Sync {
    fn send_status_update(&self, status: &StatusRecord);
}

/// Operations the update engine offers to the bus adaptor.
///
/// Calls are synchronous: the adaptor blocks on them and relays the result.
/// Getters return their value directly; failures carry a [`ServiceError`].
pub trait UpdateService: Send + Sync {
    /// Start an update check. Returns whether a new attempt was scheduled.
    fn attempt_update(
        &self,
        app_version: &str,
        omaha_url: &str,
        flags: UpdateAttemptFlags,
    ) -> ServiceResult<bool>;

    /// Install the given modules, in order, from `omaha_url`.
    fn attempt_install(&self, omaha_url: &str, module_ids: &[String]) -> ServiceResult<()>;

    fn attempt_rollback(&self, powerwash: bool) -> ServiceResult<()>;

    fn can_rollback(&self) -> ServiceResult<bool>;

    fn reset_status(&self) -> ServiceResult<()>;

    fn get_status(&self) -> ServiceResult<StatusRecord>;

    fn reboot_if_needed(&self) -> ServiceResult<()>;

    fn set_channel(&self, target_channel: &str, is_powerwash_allowed: bool) -> ServiceResult<()>;

    /// Current channel when `get_current_channel` is set, otherwise the
    /// target channel.
    fn get_channel(&self, get_current_channel: bool) -> ServiceResult<String>;

    fn set_cohort_hint(&self, cohort_hint: &str) -> ServiceResult<()>;

    fn get_cohort_hint(&self) -> ServiceResult<String>;

    fn set_p2p_update_permission(&self, enabled: bool) -> ServiceResult<()>;

    fn get_p2p_update_permission(&self) -> ServiceResult<bool>;

    fn set_update_over_cellular_permission(&self, allowed: bool) -> ServiceResult<()>;

    fn set_update_over_cellular_target(
        &self,
        target_version: &str,
        target_size: i64,
    ) -> ServiceResult<()>;

    fn get_update_over_cellular_permission(&self) -> ServiceResult<bool>;

    /// Wall-clock microseconds since the last successful update.
    fn get_duration_since_update(&self) -> ServiceResult<i64>;

    fn get_prev_version(&self) -> ServiceResult<String>;

    fn get_rollback_partition(&self) -> ServiceResult<String>;

    fn get_last_attempt_error(&self) -> ServiceResult<i32>;

    fn get_eol_status(&self) -> ServiceResult<i32>;

    /// Register an observer for status changes.
    fn add_observer(&self, observer: Arc<dyn ServiceObserver>);
}
