//! Benchmarks for rhythm construction and generator rendering.
//!
//! Run with: cargo bench
//!
//! A generator renders a whole buffer on every clock pulse, so a render has
//! to finish well inside one pulse period:
//!   - 120 bpm, division 1 = 500ms
//!   - 120 bpm, division 4 = 125ms
//!   - 600 bpm, division 4 = 25ms
//!
//! Benchmark groups:
//!   - rhythm/*      Pattern, onset and curve builders
//!   - generators/*  Full buffer renders of the built-in generators

use criterion::{criterion_group, criterion_main};

mod generators;
mod rhythm;

/// Pattern lengths in steps.
pub const PATTERN_LENGTHS: &[usize] = &[8, 16, 64, 256];

criterion_group!(
    benches,
    rhythm::bench_eu,
    rhythm::bench_onsets,
    rhythm::bench_curve,
    generators::bench_click,
    generators::bench_pulse,
    generators::bench_bounce,
);
criterion_main!(benches);
