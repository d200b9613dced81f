//! Benchmarks for one full render of each built-in generator.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use voicegrid::{
    engine::VoiceId,
    generators::{Bounce, Click, Generator, Pulse, RenderCtx},
    params::{GeneratorSpec, ParamRecord, ParamValue},
};

const SAMPLE_RATE: f32 = 48_000.0;
const TEMPOS: &[f64] = &[90.0, 120.0, 174.0];

/// Record a freshly allocated voice of `generator` would carry
fn record(generator: &dyn Generator, name: &str, bpm: f64) -> ParamRecord {
    let mut record = ParamRecord::new(GeneratorSpec::new(name), bpm);
    record.values = generator.defaults();
    record.values.insert("seed".into(), ParamValue::Int(1));
    record
}

fn bench_generator(c: &mut Criterion, name: &str, generator: &dyn Generator) {
    let mut group = c.benchmark_group(format!("generators/{name}"));
    let ctx = RenderCtx::new(SAMPLE_RATE, VoiceId(1));

    for &bpm in TEMPOS {
        let params = record(generator, name, bpm);
        group.bench_with_input(BenchmarkId::from_parameter(bpm), &params, |b, params| {
            b.iter(|| generator.render(black_box(params), &ctx))
        });
    }

    group.finish();
}

pub fn bench_click(c: &mut Criterion) {
    bench_generator(c, "click", &Click::default());
}

pub fn bench_pulse(c: &mut Criterion) {
    bench_generator(c, "pulse", &Pulse::default());
}

pub fn bench_bounce(c: &mut Criterion) {
    bench_generator(c, "bounce", &Bounce::default());
}
