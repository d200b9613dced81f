//! Signal primitives the built-in generators are made of.
//!
//! Oscillators, one-shot envelopes and a state-variable filter work sample by
//! sample; `mix` works on whole buffers.

/// Attack/decay envelope for one-shot sounds.
pub mod envelope;
/// State-variable filter with low/high/band-pass responses.
pub mod filter;
/// Summing, overlaying, padding and resampling buffers.
pub mod mix;
/// Oscillator waveforms and noise.
pub mod oscillator;

pub use envelope::Envelope;
pub use filter::SVFilter;
pub use oscillator::{Oscillator, Waveform};
