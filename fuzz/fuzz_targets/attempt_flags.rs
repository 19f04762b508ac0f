//! Fuzz target for `AttemptUpdateWithFlags` flag decoding.
//!
//! Only bit 0 may influence the decoded engine flags.

#![no_main]

use libfuzzer_sys::fuzz_target;
use update_engine_dbus::dbus::decode_attempt_flags;
use update_engine_dbus::engine::UpdateAttemptFlags;

fuzz_target!(|flags: i32| {
    let decoded = decode_attempt_flags(flags);
    let expected = if flags & 1 == 1 {
        UpdateAttemptFlags::NON_INTERACTIVE
    } else {
        UpdateAttemptFlags::NONE
    };
    assert_eq!(decoded, expected);
    assert_eq!(decode_attempt_flags(flags & 1), decoded);
});
