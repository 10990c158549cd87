use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use eqlink_control::ControlFile;
use eqlink_engine::{EngineOptions, TransformEngine};
use eqlink_mixer::ControlSurface;
use eqlink_unit::testing::MockUnit;

fn stereo_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer");
    group.measurement_time(Duration::from_secs(10));

    for frames in [64usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("gain_stereo", frames), &frames, |b, &frames| {
            let dir = tempfile::tempdir().expect("tempdir");
            let unit = MockUnit::gain();
            let control = ControlFile::open_or_create(&unit, dir.path().join("bench.bin"), 2)
                .expect("control file");
            let mut engine = TransformEngine::new(Arc::new(unit), control, EngineOptions::default())
                .expect("engine");
            engine.start(48_000).expect("start");

            let input: Vec<f32> = (0..frames * 2).map(|i| (i as f32 * 0.01).sin()).collect();
            let mut output = vec![0.0f32; frames * 2];
            b.iter(|| {
                engine.transfer(&input, &mut output, frames).expect("transfer");
            });
        });
    }

    group.finish();
}

fn surface_writes(c: &mut Criterion) {
    c.bench_function("surface_write_ten_bands", |b| {
        let dir = tempfile::tempdir().expect("tempdir");
        let unit = MockUnit::equalizer(10);
        let control = ControlFile::open_or_create(&unit, dir.path().join("eq.bin"), 2)
            .expect("control file");
        let surface = ControlSurface::new(&unit, control).expect("surface");
        let keys: Vec<_> = surface.elem_list().map(|(key, _)| key).collect();
        let mut value = 0i64;
        b.iter(|| {
            value = (value + 7) % 101;
            for &key in &keys {
                surface.write_integer(key, &[value, 100 - value]).expect("write");
            }
        });
    });
}

criterion_group!(benches, stereo_transfer, surface_writes);
criterion_main!(benches);
