//! Audio sinks: where supervisors send rendered samples.
//!
//! Every voice opens its own [`SinkStream`] when it is allocated and writes
//! mono blocks to it. The sink decides what happens to them: `CpalSink` mixes
//! all streams into the default output device, `MemorySink` keeps them for
//! inspection, `NullSink` drops them.

#[cfg(feature = "rtrb")]
pub mod device;

#[cfg(feature = "rtrb")]
pub use self::device::CpalSink;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{engine::VoiceId, error::SinkError};

/// A destination for voice audio.
pub trait AudioSink: Send + Sync {
    /// Open the stream for a newly allocated voice
    fn open(&self, voice: VoiceId) -> Result<Box<dyn SinkStream>, SinkError>;

    /// Rate generators should render at
    fn sample_rate(&self) -> f32;
}

/// One voice's connection to a sink. Owned by that voice's supervisor.
pub trait SinkStream: Send {
    /// Deliver a block of mono samples, blocking while the sink catches up.
    fn write(&mut self, samples: &[f32]) -> Result<(), SinkError>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy)]
pub struct NullSink {
    sample_rate: f32,
}

impl NullSink {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate }
    }
}

impl AudioSink for NullSink {
    fn open(&self, _voice: VoiceId) -> Result<Box<dyn SinkStream>, SinkError> {
        Ok(Box::new(NullStream))
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

struct NullStream;

impl SinkStream for NullStream {
    fn write(&mut self, _samples: &[f32]) -> Result<(), SinkError> {
        Ok(())
    }
}

type Captured = Arc<Mutex<BTreeMap<VoiceId, Vec<f32>>>>;

/// Records every voice's output in memory.
#[derive(Debug, Clone)]
pub struct MemorySink {
    sample_rate: f32,
    captured: Captured,
    closed: Arc<Mutex<BTreeSet<VoiceId>>>,
}

impl MemorySink {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            captured: Arc::default(),
            closed: Arc::default(),
        }
    }

    /// Make every further write from `voice` fail with `SinkError::Closed`
    pub fn close(&self, voice: VoiceId) {
        lock(&self.closed).insert(voice);
    }

    /// Everything `voice` has written so far
    pub fn samples(&self, voice: VoiceId) -> Vec<f32> {
        lock(&self.captured).get(&voice).cloned().unwrap_or_default()
    }

    /// Number of samples `voice` has written so far
    pub fn written(&self, voice: VoiceId) -> usize {
        lock(&self.captured).get(&voice).map_or(0, Vec::len)
    }

    /// Voices that opened a stream
    pub fn voices(&self) -> Vec<VoiceId> {
        lock(&self.captured).keys().copied().collect()
    }
}

impl AudioSink for MemorySink {
    fn open(&self, voice: VoiceId) -> Result<Box<dyn SinkStream>, SinkError> {
        lock(&self.captured).entry(voice).or_default();
        Ok(Box::new(MemoryStream {
            voice,
            captured: Arc::clone(&self.captured),
            closed: Arc::clone(&self.closed),
        }))
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

struct MemoryStream {
    voice: VoiceId,
    captured: Captured,
    closed: Arc<Mutex<BTreeSet<VoiceId>>>,
}

impl SinkStream for MemoryStream {
    fn write(&mut self, samples: &[f32]) -> Result<(), SinkError> {
        if lock(&self.closed).contains(&self.voice) {
            return Err(SinkError::Closed);
        }
        lock(&self.captured)
            .entry(self.voice)
            .or_default()
            .extend_from_slice(samples);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
