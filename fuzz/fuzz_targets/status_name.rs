//! Fuzz target for status name and code parsing.
//!
//! Anything that parses must map back to the exact same name and code.

#![no_main]

use libfuzzer_sys::fuzz_target;
use update_engine_dbus::UpdateStatus;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(status) = s.parse::<UpdateStatus>() {
            assert_eq!(status.as_str(), s);
        }
    }

    if data.len() >= 4 {
        let code = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if let Ok(status) = UpdateStatus::try_from(code) {
            assert_eq!(status.code(), code);
        }
    }
});
