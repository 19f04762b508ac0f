//! Wire types for the `org.chromium.UpdateEngineInterface` interface.
//!
//! These are the shapes external callers see. They are kept apart from the
//! internal status model in [`crate::status`]; [`super::codec`] converts
//! between the two.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use zvariant::{Signature, Type};

/// Well-known bus name owned by the service.
pub const SERVICE_NAME: &str = "org.chromium.UpdateEngine";

/// Object path the interface is exported at.
pub const SERVICE_PATH: &str = "/org/chromium/UpdateEngine";

/// Interface name.
pub const INTERFACE_NAME: &str = "org.chromium.UpdateEngineInterface";

/// Bit 0 of the `AttemptUpdateWithFlags` flags argument: the attempt was not
/// user initiated. All other bits are reserved and ignored.
pub const ATTEMPT_UPDATE_FLAG_NON_INTERACTIVE: i32 = 1 << 0;

/// Current operation as carried by `GetStatusAdvanced` and
/// `StatusUpdateAdvanced`. Encoded as its `i32` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Operation {
    #[default]
    Idle = 0,
    CheckingForUpdate = 1,
    UpdateAvailable = 2,
    Downloading = 3,
    Verifying = 4,
    Finalizing = 5,
    UpdatedNeedReboot = 6,
    ReportingErrorEvent = 7,
    AttemptingRollback = 8,
    Disabled = 9,
    NeedPermissionToUpdate = 10,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::Idle,
        Operation::CheckingForUpdate,
        Operation::UpdateAvailable,
        Operation::Downloading,
        Operation::Verifying,
        Operation::Finalizing,
        Operation::UpdatedNeedReboot,
        Operation::ReportingErrorEvent,
        Operation::AttemptingRollback,
        Operation::Disabled,
        Operation::NeedPermissionToUpdate,
    ];
}

/// Unknown wire operation value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown operation value {0}")]
pub struct UnknownOperation(pub i32);

impl TryFrom<i32> for Operation {
    type Error = UnknownOperation;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Operation::ALL
            .into_iter()
            .find(|op| *op as i32 == value)
            .ok_or(UnknownOperation(value))
    }
}

impl Type for Operation {
    const SIGNATURE: &'static Signature = i32::SIGNATURE;
}

impl Serialize for Operation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(*self as i32)
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = i32::deserialize(deserializer)?;
        Operation::try_from(value).map_err(de::Error::custom)
    }
}

/// Structured status message returned by `GetStatusAdvanced` and carried by
/// the `StatusUpdateAdvanced` signal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Type)]
pub struct StatusResult {
    pub last_checked_time: i64,
    pub progress: f64,
    pub current_operation: Operation,
    pub new_version: String,
    pub new_size: i64,
    pub is_enterprise_rollback: bool,
    pub is_install: bool,
}

impl fmt::Display for StatusResult {
    /// `KEY=value` lines, one per field, with the operation by name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LAST_CHECKED_TIME={}", self.last_checked_time)?;
        writeln!(f, "PROGRESS={}", self.progress)?;
        writeln!(
            f,
            "CURRENT_OP={}",
            super::codec::operation_to_name(self.current_operation)
        )?;
        writeln!(f, "NEW_VERSION={}", self.new_version)?;
        writeln!(f, "NEW_SIZE={}", self.new_size)?;
        writeln!(f, "IS_ENTERPRISE_ROLLBACK={}", self.is_enterprise_rollback)?;
        write!(f, "IS_INSTALL={}", self.is_install)
    }
}

/// A single module to install.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
pub struct ModuleInfo {
    pub id: String,
    /// Install root reported back by the engine; ignored on requests.
    pub root: String,
}

impl ModuleInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            root: String::new(),
        }
    }
}

/// Argument of `AttemptInstall`: modules to install and the server to use.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
pub struct ModuleList {
    pub modules: Vec<ModuleInfo>,
    pub omaha_url: String,
}

impl ModuleList {
    pub fn new<I, S>(omaha_url: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: ids.into_iter().map(ModuleInfo::new).collect(),
            omaha_url: omaha_url.into(),
        }
    }
}
