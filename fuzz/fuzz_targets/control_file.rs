#![no_main]

use eqlink_control::fuzz_open_control_file;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    fuzz_open_control_file(data);
});
