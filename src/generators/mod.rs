//! Generators: named sound sources a voice renders buffers from.
//!
//! A generator turns the current parameter record of a voice into one buffer
//! of mono samples. The supervisor calls `render` once per cycle on a
//! short-lived thread, so a generator holds no per-voice state between calls;
//! anything that should persist lives in the record.
//!
//! Generators are looked up by name in a [`GeneratorTable`] when a voice is
//! allocated. The table stores factories so every voice gets its own instance.

use std::{collections::BTreeMap, fmt, sync::Arc};

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    engine::{allocator::MIN_BPM, VoiceId},
    error::{EngineError, RenderError},
    params::{ParamMap, ParamRecord},
};

pub mod bounce;
pub mod click;
pub mod pulse;

pub use bounce::Bounce;
pub use click::Click;
pub use pulse::Pulse;

/// Longest buffer one render may produce, about six minutes at 44.1 kHz.
pub const MAX_RENDER_FRAMES: usize = 1 << 24;

/// Per-render context handed to a generator alongside the record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCtx {
    pub sample_rate: f32,
    pub voice: VoiceId,
}

impl RenderCtx {
    pub fn new(sample_rate: f32, voice: VoiceId) -> Self {
        Self { sample_rate, voice }
    }

    /// Frames per beat at `bpm`
    pub fn beat_frames(&self, bpm: f64) -> usize {
        (60.0 / bpm * f64::from(self.sample_rate)) as usize
    }
}

/// How a voice lines its buffers up with the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Wait for the next clock pulse before each buffer
    #[default]
    Pulse,
    /// Play buffers back to back
    Free,
}

pub trait Generator: Send + Sync {
    /// Parameters this generator fills in when a command leaves them out
    fn defaults(&self) -> ParamMap {
        ParamMap::new()
    }

    fn sync(&self) -> SyncMode {
        SyncMode::Pulse
    }

    /// Render one buffer for the voice described by `params`
    fn render(&self, params: &ParamRecord, ctx: &RenderCtx) -> Result<Vec<f32>, RenderError>;
}

/// Builds a fresh generator for each voice.
///
/// Implemented for any `Fn() -> G`, so registering a generator is usually
/// `table.register("name", MyGenerator::default)`.
pub trait GeneratorFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Generator>;
}

impl<F, G> GeneratorFactory for F
where
    F: Fn() -> G + Send + Sync,
    G: Generator + 'static,
{
    fn create(&self) -> Arc<dyn Generator> {
        Arc::new(self())
    }
}

/// Name → generator factory, populated at startup.
#[derive(Default)]
pub struct GeneratorTable {
    factories: BTreeMap<String, Arc<dyn GeneratorFactory>>,
}

impl GeneratorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding `click`, `pulse` and `bounce`
    pub fn builtin() -> Self {
        Self::new()
            .with("click", Click::default)
            .with("pulse", Pulse::default)
            .with("bounce", Bounce::default)
    }

    /// Add or replace a generator
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: GeneratorFactory + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: GeneratorFactory + 'static,
    {
        self.register(name, factory);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Generator>, EngineError> {
        self.factories
            .get(name)
            .map(|factory| factory.create())
            .ok_or_else(|| EngineError::InvalidGenerator(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for GeneratorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Random source for one render: seeded from the `seed` parameter when set
pub(crate) fn render_rng(params: &ParamRecord) -> StdRng {
    match params.get("seed").and_then(|v| v.as_i64()) {
        Some(seed) => StdRng::seed_from_u64(seed as u64),
        None => StdRng::from_entropy(),
    }
}

/// Fails unless the record carries a usable tempo
pub(crate) fn require_tempo(generator: &str, params: &ParamRecord) -> Result<(), RenderError> {
    if params.bpm.is_finite() && params.bpm >= MIN_BPM {
        Ok(())
    } else {
        Err(RenderError::failed(
            generator,
            format!("bpm must be at least {MIN_BPM}, got {}", params.bpm),
        ))
    }
}

/// Product of step or frame counts, failing once it passes `MAX_RENDER_FRAMES`
pub(crate) fn frame_count(generator: &str, factors: &[usize]) -> Result<usize, RenderError> {
    factors
        .iter()
        .try_fold(1usize, |total, &factor| total.checked_mul(factor))
        .filter(|&total| total <= MAX_RENDER_FRAMES)
        .ok_or_else(|| {
            RenderError::failed(
                generator,
                format!("buffer would exceed {MAX_RENDER_FRAMES} frames"),
            )
        })
}

/// `volume` parameter (percent) as a linear gain
pub(crate) fn volume_gain(params: &ParamRecord) -> f32 {
    (params.get_f64("volume", 100.0) / 100.0).max(0.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GeneratorSpec;

    struct Silence;

    impl Generator for Silence {
        fn render(&self, _: &ParamRecord, _: &RenderCtx) -> Result<Vec<f32>, RenderError> {
            Ok(vec![0.0; 8])
        }
    }

    #[test]
    fn builtin_table_resolves_known_names() {
        let table = GeneratorTable::builtin();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["bounce", "click", "pulse"]);
        assert!(table.resolve("click").is_ok());
        assert!(matches!(
            table.resolve("nope"),
            Err(EngineError::InvalidGenerator(name)) if name == "nope"
        ));
    }

    #[test]
    fn closures_register_as_factories() {
        let table = GeneratorTable::new().with("silence", || Silence);
        let generator = table.resolve("silence").unwrap();

        let record = ParamRecord::new(GeneratorSpec::new("silence"), 120.0);
        let ctx = RenderCtx::new(44_100.0, VoiceId(1));

        assert_eq!(generator.render(&record, &ctx).unwrap().len(), 8);
        assert_eq!(generator.sync(), SyncMode::Pulse);
        assert!(generator.defaults().is_empty());
    }

    #[test]
    fn frame_counts_are_capped() {
        assert_eq!(frame_count("test", &[16, 5512]).unwrap(), 88_192);
        assert_eq!(frame_count("test", &[]).unwrap(), 1);
        assert!(frame_count("test", &[MAX_RENDER_FRAMES, 2]).is_err());
        assert!(frame_count("test", &[usize::MAX, usize::MAX]).is_err());
    }

    #[test]
    fn tempo_below_the_floor_fails() {
        let mut record = ParamRecord::new(GeneratorSpec::new("test"), 0.001);
        assert!(require_tempo("test", &record).is_err());
        record.bpm = MIN_BPM;
        assert!(require_tempo("test", &record).is_ok());
    }

    #[test]
    fn beat_frames_follow_tempo() {
        let ctx = RenderCtx::new(44_100.0, VoiceId(1));
        assert_eq!(ctx.beat_frames(60.0), 44_100);
        assert_eq!(ctx.beat_frames(120.0), 22_050);
    }
}
