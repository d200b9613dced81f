use std::f32::consts::TAU;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/*
Oscillator
==========

The raw sound source for the built-in generators. Drums are mostly noise and
short pitched sines; the blip generators use plain sines.

Vocabulary
----------

  phase       Position inside one cycle, kept in [0, 1). Advances by
              `freq / sample_rate` every sample and wraps.

  waveform    The function from phase to amplitude:

                Sine      sin(2π·phase)
                Triangle  1 - 4·|phase - 0.5|  (peaks at ±1)
                Saw       2·phase - 1
                Square    +1 below phase 0.5, -1 above
                Noise     uniform random in [-1, 1], phase ignored

Frequency is passed per render call instead of stored, so a caller can sweep
pitch (a kick's downward chirp) by rendering in short slices.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
    Noise,
}

pub struct Oscillator {
    waveform: Waveform,
    phase: f32,
    rng: StdRng,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self::seeded(waveform, rand::random())
    }

    /// Oscillator with a reproducible noise source
    pub fn seeded(waveform: Waveform, seed: u64) -> Self {
        Self {
            waveform,
            phase: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn sine() -> Self {
        Self::new(Waveform::Sine)
    }

    pub fn noise() -> Self {
        Self::new(Waveform::Noise)
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    pub fn next_sample(&mut self, freq: f32, sample_rate: f32) -> f32 {
        let value = match self.waveform {
            Waveform::Sine => (TAU * self.phase).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
            Waveform::Saw => 2.0 * self.phase - 1.0,
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Noise => return self.rng.gen_range(-1.0..=1.0),
        };

        self.phase += freq / sample_rate;
        self.phase -= self.phase.floor();
        value
    }

    /// Overwrite `buffer` with the waveform at `freq`
    pub fn render(&mut self, buffer: &mut [f32], freq: f32, sample_rate: f32) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(freq, sample_rate);
        }
    }
}
