//! Benchmarks for the rhythm helpers.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use voicegrid::rhythm::{self, Arrange, OnsetOpts, Window, DEFAULT_BEAT_LENGTH};

use crate::PATTERN_LENGTHS;

pub fn bench_eu(c: &mut Criterion) {
    let mut group = c.benchmark_group("rhythm/eu");

    for &length in PATTERN_LENGTHS {
        let beats = length * 3 / 8;
        group.bench_with_input(BenchmarkId::new("plain", length), &length, |b, &length| {
            b.iter(|| rhythm::eu(black_box(length), black_box(beats), Arrange::default()))
        });

        let arrange = Arrange::offset(3).with_reps(4).reversed();
        group.bench_with_input(
            BenchmarkId::new("arranged", length),
            &length,
            |b, &length| b.iter(|| rhythm::eu(black_box(length), black_box(beats), arrange)),
        );
    }

    group.finish();
}

pub fn bench_onsets(c: &mut Criterion) {
    let mut group = c.benchmark_group("rhythm/onsets");

    for &length in PATTERN_LENGTHS {
        let pattern = rhythm::eu(length, length / 2, Arrange::default());
        let opts = OnsetOpts {
            playhead: 100,
            reverse: true,
        };

        group.bench_with_input(BenchmarkId::from_parameter(length), &pattern, |b, pattern| {
            b.iter(|| rhythm::onsets(black_box(pattern), DEFAULT_BEAT_LENGTH, opts))
        });
    }

    group.finish();
}

pub fn bench_curve(c: &mut Criterion) {
    let mut group = c.benchmark_group("rhythm/curve");
    let length = DEFAULT_BEAT_LENGTH * 16;

    for window in Window::SHAPES {
        group.bench_with_input(
            BenchmarkId::new(window.to_string(), 64),
            &window,
            |b, &window| b.iter(|| rhythm::curve(black_box(64), Some(window), length, false)),
        );
    }

    group.finish();
}
