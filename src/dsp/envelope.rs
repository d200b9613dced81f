/*
Percussive Envelope
===================

Every sound the built-in generators make is a one-shot: it starts, peaks and
dies away with no sustain and no note-off. That makes the envelope a plain
attack/decay ramp.

  Level
    1.0 ┐  ╱╲
        │ ╱  ╲
        │╱    ╲___
    0.0 └──────────────→ Time
         A  D

Ramps are linear. Converting a duration into a per-sample increment:

    increment = 1.0 / (time_seconds * sample_rate)

Attack 2 ms at 44.1 kHz: 88 samples, increment ≈ 0.0113.

Once the decay reaches zero the envelope stays at zero, so applying it to a
buffer longer than attack + decay silences the tail.
*/

use crate::MIN_TIME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Attack,
    Decay,
    Done,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    attack_time: f32, // seconds to ramp 0 → 1
    decay_time: f32,  // seconds to ramp 1 → 0

    stage: Stage,
    level: f32,
}

impl Envelope {
    pub fn percussive(attack: f32, decay: f32) -> Self {
        Self {
            attack_time: attack.max(MIN_TIME),
            decay_time: decay.max(MIN_TIME),
            stage: Stage::Attack,
            level: 0.0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Length of the whole envelope in samples
    pub fn frames(&self, sample_rate: f32) -> usize {
        ((self.attack_time + self.decay_time) * sample_rate).ceil() as usize
    }

    pub fn retrigger(&mut self) {
        self.stage = Stage::Attack;
        self.level = 0.0;
    }

    #[inline]
    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        let current = self.level;

        match self.stage {
            Stage::Attack => {
                self.level += 1.0 / (self.attack_time * sample_rate);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= 1.0 / (self.decay_time * sample_rate);
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Done;
                }
            }
            Stage::Done => {}
        }

        current
    }

    /// Multiply `buffer` by the envelope, sample by sample
    pub fn apply(&mut self, buffer: &mut [f32], sample_rate: f32) {
        for sample in buffer.iter_mut() {
            *sample *= self.next_sample(sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rises_then_falls_to_silence() {
        // 10 samples up, 10 samples down at 1 kHz
        let mut env = Envelope::percussive(0.01, 0.01);
        let levels: Vec<f32> = (0..30).map(|_| env.next_sample(1000.0)).collect();

        assert_eq!(levels[0], 0.0);
        let peak = levels.iter().cloned().fold(0.0f32, f32::max);
        assert!((peak - 1.0).abs() < 1e-4);
        assert_eq!(levels[25], 0.0);
        assert_eq!(env.stage(), Stage::Done);
    }

    #[test]
    fn apply_silences_the_tail() {
        let mut env = Envelope::percussive(0.001, 0.005);
        let mut buffer = vec![1.0f32; 1000];
        env.apply(&mut buffer, 1000.0);

        assert!(buffer[..6].iter().any(|&s| s > 0.0));
        assert!(buffer[10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn retrigger_restarts_attack() {
        let mut env = Envelope::percussive(0.001, 0.001);
        for _ in 0..10 {
            env.next_sample(1000.0);
        }
        env.retrigger();
        assert_eq!(env.stage(), Stage::Attack);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn length_covers_both_ramps() {
        let env = Envelope::percussive(0.002, 0.2);
        assert_eq!(env.frames(44_100.0), 8909);
    }
}
