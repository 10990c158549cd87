use eqlink_control::ControlFile;
use eqlink_mixer::{
    ControlSurface, ElemAttribute, ElemType, IntegerInfo, SurfaceError, SurfaceIdentity,
};
use eqlink_unit::testing::{bounded, MockUnit};
use eqlink_unit::{DefaultHint, PortRole, RangeHint};
use pretty_assertions::assert_eq;

fn tone_unit() -> MockUnit {
    MockUnit::builder("tone")
        .unique_id(303)
        .name("Tone Control")
        .audio_input("Input")
        .audio_output("Output")
        .control_output("Level")
        .control_input("Gain", bounded(DefaultHint::Middle, -20.0, 20.0))
        .control_input("Bass", bounded(DefaultHint::Maximum, 0.0, 12.0))
        .build()
}

fn surface_for(unit: &MockUnit, channels: usize) -> (tempfile::TempDir, ControlSurface) {
    let dir = tempfile::tempdir().expect("tempdir");
    let control = ControlFile::open_or_create(unit, dir.path().join("tone.bin"), channels)
        .expect("control file");
    let surface = ControlSurface::new(unit, control).expect("surface");
    (dir, surface)
}

#[test]
fn only_input_controls_are_listed_in_port_order() {
    let unit = tone_unit();
    let (_dir, surface) = surface_for(&unit, 2);

    let names: Vec<&str> = surface.elem_list().map(|(_, name)| name).collect();
    assert_eq!(names, ["03. Gain Playback Volume", "04. Bass Playback Volume"]);
    assert_eq!(surface.elem_count(), 2);
    assert_eq!(surface.find_elem("02. Level Playback Volume"), None);
    assert_eq!(surface.find_elem("Gain"), None);
    assert_eq!(
        surface.identity(),
        &SurfaceIdentity {
            id: "tone".into(),
            name: "tone".into(),
            longname: "Tone Control".into(),
            driver: "LADSPA Plugin".into(),
            mixername: "alsaequal".into(),
        }
    );
}

#[test]
fn gain_at_fifty_stores_zero_on_every_channel() {
    let unit = tone_unit();
    let (_dir, surface) = surface_for(&unit, 4);
    let key = surface.find_elem("03. Gain Playback Volume").expect("gain element");

    surface.write_integer(key, &[10, 20, 30, 40]).expect("spread");
    surface.write_integer(key, &[50; 4]).expect("write");

    let slot = surface.descriptor(key).expect("descriptor").slot;
    for channel in 0..4 {
        assert_eq!(surface.control_file().read(slot, channel), 0.0);
    }
    assert_eq!(surface.read_integer(key).expect("read"), vec![50; 4]);
}

#[test]
fn elements_are_stereo_integers_on_a_fixed_scale() {
    let unit = tone_unit();
    let (_dir, surface) = surface_for(&unit, 2);
    let bass = surface.find_elem("04. Bass Playback Volume").expect("bass element");

    assert_eq!(
        surface.attribute(bass).expect("attribute"),
        ElemAttribute {
            elem_type: ElemType::Integer,
            readable: true,
            writable: true,
            count: 2,
        }
    );
    assert_eq!(
        surface.integer_info(bass).expect("info"),
        IntegerInfo {
            min: 0,
            max: 100,
            step: 1
        }
    );
    // Defaults: Gain in the middle, Bass at its maximum.
    assert_eq!(surface.read_integer(bass).expect("read"), vec![100, 100]);
    assert_eq!(surface.read_event(), None);
}

#[test]
fn reads_round_down() {
    let unit = tone_unit();
    let (_dir, surface) = surface_for(&unit, 1);
    let bass = surface.find_elem("04. Bass Playback Volume").expect("bass element");
    let slot = surface.descriptor(bass).expect("descriptor").slot;

    surface.control_file().write(slot, 0, 11.99);
    assert_eq!(surface.read_integer(bass).expect("read"), vec![99]);
}

#[test]
fn writes_need_one_value_per_channel() {
    let unit = tone_unit();
    let (_dir, surface) = surface_for(&unit, 2);
    let key = surface.find_elem("03. Gain Playback Volume").expect("gain element");
    let err = surface.write_integer(key, &[50]).expect_err("too few");
    assert!(matches!(err, SurfaceError::ValueCount { expected: 2, found: 1 }));
}

#[test]
fn degenerate_ranges_are_refused() {
    let unit = MockUnit::builder("flat")
        .audio_input("in")
        .audio_output("out")
        .control_input("Fixed", bounded(DefaultHint::Minimum, 3.0, 3.0))
        .build();
    let dir = tempfile::tempdir().expect("tempdir");
    let control =
        ControlFile::open_or_create(&unit, dir.path().join("flat.bin"), 1).expect("control file");
    let err = ControlSurface::new(&unit, control).expect_err("empty range");
    assert!(matches!(err, SurfaceError::DegenerateRange { .. }));
}

#[test]
fn slots_must_still_be_control_inputs() {
    let unit = tone_unit();
    let dir = tempfile::tempdir().expect("tempdir");
    let control =
        ControlFile::open_or_create(&unit, dir.path().join("tone.bin"), 1).expect("control file");

    // Same id and port count, but port 3 turned into a meter.
    let changed = MockUnit::builder("tone")
        .unique_id(303)
        .audio_input("Input")
        .audio_output("Output")
        .control_output("Level")
        .port("Gain", PortRole::CONTROL_OUTPUT, RangeHint::default())
        .control_input("Bass", bounded(DefaultHint::Maximum, 0.0, 12.0))
        .build();
    let err = ControlSurface::new(&changed, control).expect_err("misassigned");
    assert!(matches!(
        err,
        SurfaceError::MisassignedControl {
            slot: 1,
            port_index: 3,
            ..
        }
    ));
}
