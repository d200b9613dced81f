//! Blips spaced along a window curve, like a ball bouncing to rest.
//!
//! `curve(numbeats, window, length)` gives the onsets: a rising shape bunches
//! them at the end, `reverse` flips that. The generator plays buffers back to
//! back instead of waiting on the clock, so the gesture does not stall for a
//! pulse between passes.

use rand::Rng;

use super::{
    frame_count, pulse::blip, render_rng, require_tempo, volume_gain, Generator, RenderCtx,
    SyncMode,
};
use crate::{
    dsp::mix,
    error::RenderError,
    params::{ParamMap, ParamRecord, ParamValue},
    rhythm::{self, Window},
};

const BLIP_DECAY: f32 = 0.03;

#[derive(Debug, Clone, Copy, Default)]
pub struct Bounce;

impl Generator for Bounce {
    fn defaults(&self) -> ParamMap {
        [
            ("numbeats", ParamValue::Int(16)),
            ("window", ParamValue::from("sine")),
            ("reverse", ParamValue::Bool(false)),
            ("freq", ParamValue::Float(880.0)),
            ("volume", ParamValue::Int(100)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    fn sync(&self) -> SyncMode {
        SyncMode::Free
    }

    fn render(&self, params: &ParamRecord, ctx: &RenderCtx) -> Result<Vec<f32>, RenderError> {
        require_tempo("bounce", params)?;

        let window: Window = params
            .get_str("window", "sine")
            .parse()
            .map_err(|err| RenderError::failed("bounce", format!("{err}")))?;

        // Resolve `random` here so a seed fixes the shape too
        let mut rng = render_rng(params);
        let window = window.resolve(&mut rng);

        let bar = ctx.beat_frames(params.bpm) * 4;
        let length = frame_count("bounce", &[params.get_usize("length", bar)])?;
        if length == 0 {
            return Ok(Vec::new());
        }

        // The curve table holds both halves
        let numbeats = params.get_usize("numbeats", 16);
        frame_count("bounce", &[numbeats, 2])?;

        let onsets = rhythm::curve(
            numbeats,
            Some(window),
            length,
            params.get_bool("reverse", false),
        );

        let freq = params.get_f64("freq", 880.0) as f32;
        let ping = blip(freq * rng.gen_range(0.98..1.02), BLIP_DECAY, ctx.sample_rate);

        let mut out = vec![0.0; length];
        for onset in onsets {
            mix::overlay(&mut out, &ping, onset);
        }
        out.truncate(length);
        mix::apply_gain(&mut out, volume_gain(params));

        Ok(out)
    }
}
