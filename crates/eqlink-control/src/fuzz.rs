use eqlink_unit::testing::MockUnit;

use crate::store::ControlFile;

/// Opens arbitrary bytes as a control file for a ten band stereo equalizer.
/// Must never panic; every malformed input has to end in a `ControlError`.
pub fn fuzz_open_control_file(data: &[u8]) {
    let unit = MockUnit::equalizer(10);
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let path = dir.path().join("fuzz.bin");
    if std::fs::write(&path, data).is_err() {
        return;
    }
    if let Ok(control) = ControlFile::open_or_create(&unit, &path, 2) {
        for slot in 0..control.num_controls() {
            for channel in 0..control.channels() {
                let value = control.read(slot, channel);
                control.write(slot, channel, value);
            }
        }
    }
}
