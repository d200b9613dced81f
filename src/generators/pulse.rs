//! Euclidean blips: a short sine ping on every onset of `eu(steps, beats)`.
//!
//! Steps are sixteenth notes at the voice's tempo. The buffer is exactly one
//! pass through the (tiled) pattern, so looping it keeps time.

use super::{frame_count, require_tempo, volume_gain, Generator, RenderCtx, MAX_RENDER_FRAMES};
use crate::{
    dsp::{mix, Envelope, Oscillator},
    error::RenderError,
    params::{ParamMap, ParamRecord, ParamValue},
    rhythm::{self, Arrange, OnsetOpts},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Pulse;

impl Generator for Pulse {
    fn defaults(&self) -> ParamMap {
        [
            ("steps", ParamValue::Int(16)),
            ("beats", ParamValue::Int(5)),
            ("offset", ParamValue::Int(0)),
            ("bars", ParamValue::Int(1)),
            ("reverse", ParamValue::Bool(false)),
            ("freq", ParamValue::Float(220.0)),
            ("decay", ParamValue::Float(0.2)),
            ("volume", ParamValue::Int(100)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    fn render(&self, params: &ParamRecord, ctx: &RenderCtx) -> Result<Vec<f32>, RenderError> {
        require_tempo("pulse", params)?;

        let steps = params.get_usize("steps", 16);
        if steps == 0 {
            return Err(RenderError::failed("pulse", "steps must be at least 1"));
        }

        let bars = params.get_usize("bars", 1);
        let step = ctx.beat_frames(params.bpm) / 4;
        frame_count("pulse", &[steps, bars])?;
        let length = frame_count("pulse", &[steps, bars, step])?;

        let mut arrange = Arrange::offset(params.get_i64("offset", 0) as isize).with_reps(bars);
        if params.get_bool("reverse", false) {
            arrange = arrange.reversed();
        }

        let pattern = rhythm::eu(steps, params.get_usize("beats", 5), arrange);

        let blip = blip(
            params.get_f64("freq", 220.0) as f32,
            params.get_f64("decay", 0.2) as f32,
            ctx.sample_rate,
        );

        let mut out = vec![0.0; length];
        for onset in rhythm::onsets(&pattern, step, OnsetOpts::default()) {
            mix::overlay(&mut out, &blip, onset);
        }
        out.truncate(length);
        mix::apply_gain(&mut out, volume_gain(params));

        Ok(out)
    }
}

/// One enveloped sine ping, cut off at `MAX_RENDER_FRAMES`
pub(crate) fn blip(freq: f32, decay: f32, sample_rate: f32) -> Vec<f32> {
    let mut env = Envelope::percussive(0.002, decay);
    let mut out = vec![0.0; env.frames(sample_rate).min(MAX_RENDER_FRAMES)];
    Oscillator::sine().render(&mut out, freq, sample_rate);
    env.apply(&mut out, sample_rate);
    out
}
