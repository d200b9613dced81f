//! Drum machine.
//!
//! Renders `repeats × multiple` sixteenth-note steps for every selected drum
//! and mixes the layers. Each drum has a base pattern and a variation pattern;
//! with `pattern` on, every step has a one-in-four chance of reading the
//! variation instead.
//!
//! # Parameters
//!
//! | key        | default | meaning                                        |
//! | ---------- | ------- | ---------------------------------------------- |
//! | `repeats`  | 8       | steps per measure                              |
//! | `multiple` | 1       | measures                                       |
//! | `width`    | 50      | hit length, percent of a step                  |
//! | `volume`   | 100     | percent                                        |
//! | `drum`     | `khc`   | drums to play: kick, hihat, clap, snare        |
//! | `pattern`  | true    | follow the drum patterns (else hit every step) |
//! | `bend`     | true    | random ±40 % playback speed per hit            |
//! | `skitter`  | false   | random 10-400 ms delay before each hit         |
//! | `glitch`   | false   | shuffle half steps, re-enveloping some         |
//! | `roll`     | false   | shuffle the buffer in sixteenth-of-a-measure slices |
//! | `seed`     | -       | fixes every random choice                      |

use rand::{rngs::StdRng, seq::SliceRandom, Rng};

use super::{frame_count, render_rng, require_tempo, volume_gain, Generator, RenderCtx};
use crate::{
    dsp::{mix, Envelope, Oscillator, SVFilter, Waveform},
    error::RenderError,
    params::{ParamMap, ParamRecord, ParamValue},
    rhythm::Window,
};

/// What one step of a drum pattern plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Rest,
    Hit,
    /// First half of the hit, twice
    Roll,
    /// Half a hit of silence, then the first half of the hit
    Late,
    /// The first half of the hit, then silence
    Early,
}

impl Step {
    /// Render this step from a padded hit `sound`; `beat` is the step length
    pub fn apply(self, sound: &[f32], beat: usize) -> Vec<f32> {
        let half = sound.len() / 2;
        match self {
            Step::Rest => vec![0.0; beat],
            Step::Hit => sound.to_vec(),
            Step::Roll => {
                let mut out = sound[..half].to_vec();
                out.extend_from_slice(&sound[..half]);
                out
            }
            Step::Late => mix::pad(&sound[..half], half, 0),
            Step::Early => mix::pad(&sound[..half], 0, half),
        }
    }
}

use self::Step::{Hit, Rest, Roll};

struct Drum {
    shortname: char,
    pat: &'static [Step],
    vary: &'static [Step],
    /// Latest frame a hit may start reading its source from
    offset: usize,
    source: fn(&mut StdRng, f32) -> Vec<f32>,
}

const DRUMS: [Drum; 4] = [
    Drum {
        shortname: 'c',
        pat: &[Rest, Rest, Hit, Rest],
        vary: &[Rest, Hit, Rest, Rest],
        offset: 0,
        source: clap,
    },
    Drum {
        shortname: 'h',
        pat: &[Roll],
        vary: &[Hit, Roll],
        offset: 400,
        source: hihat,
    },
    Drum {
        shortname: 's',
        pat: &[Hit, Rest, Hit, Rest],
        vary: &[Rest, Rest, Hit, Hit],
        offset: 500,
        source: snare,
    },
    Drum {
        shortname: 'k',
        pat: &[Hit, Rest, Hit, Rest, Rest, Rest, Rest, Rest],
        vary: &[Rest, Rest, Hit, Rest, Rest, Hit, Rest, Rest, Rest, Rest, Hit, Rest],
        offset: 0,
        source: kick,
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Click;

struct Settings {
    steps: usize,
    beat: usize,
    width: usize,
    pattern: bool,
    bend: bool,
    skitter: bool,
    sample_rate: f32,
}

impl Generator for Click {
    fn defaults(&self) -> ParamMap {
        [
            ("repeats", ParamValue::Int(8)),
            ("multiple", ParamValue::Int(1)),
            ("width", ParamValue::Int(50)),
            ("volume", ParamValue::Int(100)),
            ("drum", ParamValue::from("khc")),
            ("pattern", ParamValue::Bool(true)),
            ("bend", ParamValue::Bool(true)),
            ("skitter", ParamValue::Bool(false)),
            ("glitch", ParamValue::Bool(false)),
            ("roll", ParamValue::Bool(false)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    fn render(&self, params: &ParamRecord, ctx: &RenderCtx) -> Result<Vec<f32>, RenderError> {
        require_tempo("click", params)?;

        let beat = ctx.beat_frames(params.bpm) / 4;
        let steps = frame_count(
            "click",
            &[params.get_usize("repeats", 8), params.get_usize("multiple", 1)],
        )?;
        let width = (beat as f64 * params.get_f64("width", 50.0) / 100.0).max(0.0) as usize;

        // Bending stretches a hit by up to 5/3, skitter delays it up to 400 ms
        let longest_hit =
            width.saturating_mul(5) / 3 + ms_frames(MAX_SKITTER_MS, ctx.sample_rate);
        frame_count("click", &[steps, beat.max(longest_hit)])?;

        let settings = Settings {
            steps,
            beat,
            width,
            pattern: params.get_bool("pattern", true),
            bend: params.get_bool("bend", true),
            skitter: params.get_bool("skitter", false),
            sample_rate: ctx.sample_rate,
        };

        let selected = params.get_str("drum", "khc");
        let mut rng = render_rng(params);

        let layers: Vec<Vec<f32>> = DRUMS
            .iter()
            .filter(|drum| selected.contains(drum.shortname))
            .map(|drum| play_drum(drum, &settings, &mut rng))
            .collect();

        let mut out = mix::mix_layers(&layers);

        if params.get_bool("glitch", false) {
            out = glitch(&out, beat / 2, &mut rng);
        }

        if params.get_bool("roll", false) {
            let slices = params.get_usize("multiple", 1).saturating_mul(16).max(1);
            out = shuffle_slices(&out, out.len() / slices, &mut rng);
        }

        mix::apply_gain(&mut out, volume_gain(params));
        Ok(out)
    }
}

/// Cut `sound` into `len`-frame slices and join them in random order
fn shuffle_slices(sound: &[f32], len: usize, rng: &mut StdRng) -> Vec<f32> {
    let mut slices: Vec<&[f32]> = sound.chunks(len.max(1)).collect();
    slices.shuffle(rng);
    slices.concat()
}

/// Every fifth slice has an even chance of a fresh random envelope, then the
/// slices are shuffled
fn glitch(sound: &[f32], len: usize, rng: &mut StdRng) -> Vec<f32> {
    let mut slices: Vec<Vec<f32>> = sound.chunks(len.max(1)).map(<[f32]>::to_vec).collect();

    for slice in slices.iter_mut().step_by(5) {
        if rng.gen_bool(0.5) {
            let shape = Window::SHAPES[rng.gen_range(0..Window::SHAPES.len())];
            let n = slice.len();
            for (sample, level) in slice.iter_mut().zip(shape.table(n)) {
                *sample *= level as f32;
            }
        }
    }

    slices.shuffle(rng);
    slices.concat()
}

fn play_drum(drum: &Drum, settings: &Settings, rng: &mut StdRng) -> Vec<f32> {
    let source = (drum.source)(rng, settings.sample_rate);

    let mut out = Vec::with_capacity(settings.steps * settings.beat);
    for step in 0..settings.steps {
        let mut hit = mix::cut(&source, rng.gen_range(0..=drum.offset), settings.width);

        if settings.bend {
            hit = mix::resample(&hit, rng.gen_range(0.6..1.4));
        }

        let prebeat = if settings.skitter {
            ms_frames(rng.gen_range(10..=MAX_SKITTER_MS), settings.sample_rate)
        } else {
            0
        };
        let hit = mix::pad(&hit, prebeat, settings.beat.saturating_sub(hit.len()));

        let kind = if !settings.pattern {
            Step::Hit
        } else if rng.gen_range(0..4) == 0 {
            drum.vary[step % drum.vary.len()]
        } else {
            drum.pat[step % drum.pat.len()]
        };

        out.extend(kind.apply(&hit, settings.beat));
    }
    out
}

const MAX_SKITTER_MS: u32 = 400;

fn ms_frames(ms: u32, sample_rate: f32) -> usize {
    (f64::from(ms) / 1000.0 * f64::from(sample_rate)) as usize
}

/*
Drum sources. Each is half a second of raw material that hits are cut from.
*/

const SOURCE_SECONDS: f32 = 0.5;

fn source_len(sample_rate: f32) -> usize {
    (SOURCE_SECONDS * sample_rate) as usize
}

/// Sine with a fast downward pitch sweep
fn kick(_: &mut StdRng, sample_rate: f32) -> Vec<f32> {
    let mut osc = Oscillator::sine();
    let sweep = 0.06 * sample_rate;

    let mut out: Vec<f32> = (0..source_len(sample_rate))
        .map(|i| {
            let t = (i as f32 / sweep).min(1.0);
            osc.next_sample(150.0 - 100.0 * t, sample_rate)
        })
        .collect();

    Envelope::percussive(0.001, 0.3).apply(&mut out, sample_rate);
    SVFilter::lowpass(200.0).render(&mut out, sample_rate);
    out
}

fn hihat(rng: &mut StdRng, sample_rate: f32) -> Vec<f32> {
    let mut out = noise(rng, sample_rate);
    Envelope::percussive(0.001, 0.05).apply(&mut out, sample_rate);
    SVFilter::highpass(7000.0).render(&mut out, sample_rate);
    out
}

/// Three quick noise bursts through a band-pass
fn clap(rng: &mut StdRng, sample_rate: f32) -> Vec<f32> {
    let raw = noise(rng, sample_rate);
    let spacing = (0.01 * sample_rate) as usize;

    let mut out = vec![0.0; raw.len()];
    for burst in 0..3 {
        let start = (burst * spacing).min(raw.len());
        let mut layer = raw[start..].to_vec();
        let decay = if burst == 2 { 0.15 } else { 0.008 };
        Envelope::percussive(0.001, decay).apply(&mut layer, sample_rate);
        mix::overlay(&mut out, &layer, start);
    }

    SVFilter::bandpass(1200.0)
        .with_resonance(0.3)
        .render(&mut out, sample_rate);
    out
}

/// Tone body plus noise rattle
fn snare(rng: &mut StdRng, sample_rate: f32) -> Vec<f32> {
    let mut rattle = noise(rng, sample_rate);
    Envelope::percussive(0.001, 0.15).apply(&mut rattle, sample_rate);
    SVFilter::highpass(1500.0).render(&mut rattle, sample_rate);

    let mut body = vec![0.0; rattle.len()];
    Oscillator::sine().render(&mut body, 180.0, sample_rate);
    Envelope::percussive(0.001, 0.08).apply(&mut body, sample_rate);

    mix::sum_in_place(&mut rattle, &body);
    mix::apply_gain(&mut rattle, 0.6);
    rattle
}

fn noise(rng: &mut StdRng, sample_rate: f32) -> Vec<f32> {
    let mut out = vec![0.0; source_len(sample_rate)];
    Oscillator::seeded(Waveform::Noise, rng.gen()).render(&mut out, 0.0, sample_rate);
    out
}
