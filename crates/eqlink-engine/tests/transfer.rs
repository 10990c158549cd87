use std::sync::Arc;

use eqlink_control::ControlFile;
use eqlink_engine::{EngineError, EngineOptions, EngineState, TransformEngine};
use eqlink_unit::testing::{LifecycleEvent, MockUnit};
use pretty_assertions::assert_eq;

const GAIN: usize = 0;
const PEAK: usize = 1;

fn gain_engine(
    channels: usize,
    options: EngineOptions,
) -> (tempfile::TempDir, Arc<MockUnit>, TransformEngine) {
    let dir = tempfile::tempdir().expect("tempdir");
    let unit = Arc::new(MockUnit::gain());
    let control = ControlFile::open_or_create(unit.as_ref(), dir.path().join("gain.bin"), channels)
        .expect("control file");
    let engine = TransformEngine::new(unit.clone(), control, options).expect("engine");
    (dir, unit, engine)
}

#[test]
fn stereo_block_keeps_channels_apart() {
    let (_dir, _unit, mut engine) = gain_engine(2, EngineOptions::default());
    engine.start(48_000).expect("start");
    let control = engine.control().expect("control file");
    control.write(GAIN, 0, 1.0);
    control.write(GAIN, 1, 2.0);

    let frames = 64;
    let input: Vec<f32> = (0..frames)
        .flat_map(|frame| [frame as f32, 1_000.0 + frame as f32])
        .collect();
    let mut output = vec![0.0f32; frames * 2];

    let done = engine.transfer(&input, &mut output, frames).expect("transfer");
    assert_eq!(done, frames);
    for frame in 0..frames {
        assert_eq!(output[frame * 2], frame as f32, "left frame {frame}");
        assert_eq!(output[frame * 2 + 1], 2.0 * (1_000.0 + frame as f32), "right frame {frame}");
    }

    let control = engine.control().expect("control file");
    assert_eq!(control.read(PEAK, 0), 63.0);
    assert_eq!(control.read(PEAK, 1), 2_126.0);
    // Tunable values are never touched by the engine.
    assert_eq!((control.read(GAIN, 0), control.read(GAIN, 1)), (1.0, 2.0));
}

#[test]
fn control_changes_from_another_mapping_apply_to_the_next_block() {
    let (dir, unit, mut engine) = gain_engine(1, EngineOptions::default());
    engine.start(44_100).expect("start");
    let surface = ControlFile::open_or_create(unit.as_ref(), dir.path().join("gain.bin"), 1)
        .expect("second mapping");

    let input = [0.5f32; 4];
    let mut output = [0.0f32; 4];
    engine.transfer(&input, &mut output, 4).expect("first block");
    assert_eq!(output, [0.5; 4]);

    surface.write(GAIN, 0, 4.0);
    engine.transfer(&input, &mut output, 4).expect("second block");
    assert_eq!(output, [2.0; 4]);
}

#[test]
fn failed_instantiation_rolls_back_every_channel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let unit = MockUnit::builder("flaky")
        .unique_id(31)
        .audio_input("in")
        .audio_output("out")
        .control_output("Level")
        .fail_instantiation_at(1)
        .build();
    let log = unit.event_log();
    let control = ControlFile::open_or_create(&unit, dir.path().join("flaky.bin"), 2)
        .expect("control file");
    let mut engine =
        TransformEngine::new(Arc::new(unit), control, EngineOptions::default()).expect("engine");

    let err = engine.start(44_100).expect_err("second channel fails");
    assert!(matches!(err, EngineError::Instantiate { channel: 1, .. }));
    assert_eq!(engine.state(), EngineState::Uninitialized);
    assert_eq!(
        *log.lock(),
        vec![
            LifecycleEvent::Instantiated {
                instance: 0,
                sample_rate: 44_100
            },
            LifecycleEvent::Activated(0),
            LifecycleEvent::Deactivated(0),
            LifecycleEvent::Dropped(0),
        ]
    );

    // Nothing is left half-running, so a retry starts from scratch.
    log.lock().clear();
    engine.start(44_100).expect("retry");
    assert_eq!(engine.state(), EngineState::Active);
    assert_eq!(log.lock().len(), 4);
}

#[test]
fn shutdown_deactivates_then_releases_without_cleanup() {
    let (_dir, unit, mut engine) = gain_engine(2, EngineOptions::default());
    engine.start(96_000).expect("start");
    unit.event_log().lock().clear();

    engine.close();
    assert_eq!(engine.state(), EngineState::Closed);
    assert!(engine.control().is_none());
    assert!(engine.unit().is_none());
    assert_eq!(
        unit.events(),
        vec![
            LifecycleEvent::Deactivated(0),
            LifecycleEvent::Deactivated(1),
            LifecycleEvent::Dropped(0),
            LifecycleEvent::Dropped(1),
        ]
    );

    engine.close();
    assert_eq!(unit.events().len(), 4);
    let mut buffer = [0.0f32; 2];
    assert!(matches!(
        engine.transfer_in_place(&mut buffer, 1),
        Err(EngineError::NotActive)
    ));
}

#[test]
fn optional_capabilities_are_not_called() {
    let dir = tempfile::tempdir().expect("tempdir");
    let unit = MockUnit::builder("plain")
        .audio_input("in")
        .audio_output("out")
        .control_output("Level")
        .capabilities(Default::default())
        .build();
    let log = unit.event_log();
    let control = ControlFile::open_or_create(&unit, dir.path().join("plain.bin"), 1)
        .expect("control file");
    let mut engine = TransformEngine::new(
        Arc::new(unit),
        control,
        EngineOptions::default().with_cleanup(true),
    )
    .expect("engine");
    engine.start(22_050).expect("start");
    drop(engine);

    assert_eq!(
        *log.lock(),
        vec![
            LifecycleEvent::Instantiated {
                instance: 0,
                sample_rate: 22_050
            },
            LifecycleEvent::Dropped(0),
        ]
    );
}
