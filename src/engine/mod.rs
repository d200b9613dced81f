//! Voice orchestration: id allocation, the tempo clock, the shared registry,
//! per-voice supervisors, and the `Engine` control plane tying them together.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use voicegrid::{
//!     engine::{Engine, EngineConfig, GeneratorFilter},
//!     generators::GeneratorTable,
//!     io::NullSink,
//!     params::VoiceRequest,
//! };
//!
//! # fn main() -> Result<(), voicegrid::error::EngineError> {
//! let engine = Engine::new(
//!     EngineConfig::default(),
//!     GeneratorTable::builtin(),
//!     Arc::new(NullSink::new(44_100.0)),
//! )?;
//!
//! let id = engine.allocate_voice(VoiceRequest::new("pulse").with("beats", 5i64))?;
//! engine.set_volume(id, 50.0, &GeneratorFilter::Any);
//! engine.stop(id);
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod clock;
pub mod registry;
pub mod supervisor;

use std::{
    fmt,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use serde::{Deserialize, Serialize};

use self::{
    allocator::VoiceIds,
    clock::{Clock, Tick},
    registry::VoiceRegistry,
    supervisor::{SupervisorHandle, VoiceContext, VoiceExit},
};
use crate::{
    error::EngineError,
    generators::{GeneratorTable, RenderCtx},
    io::AudioSink,
    params::{ParamRecord, VoiceRequest},
};

/// Voice identifier. Positive, issued in order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VoiceId(pub u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a voice id")]
pub struct ParseVoiceIdError(pub String);

impl FromStr for VoiceId {
    type Err = ParseVoiceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u64>() {
            Ok(id) if id > 0 => Ok(VoiceId(id)),
            _ => Err(ParseVoiceIdError(s.to_string())),
        }
    }
}

/// Which voices a bulk operation applies to, by generator name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GeneratorFilter {
    /// Every voice (`all` / `any` on the console)
    #[default]
    Any,
    /// Only voices running one of these generators
    Names(Vec<String>),
}

impl GeneratorFilter {
    pub fn named(name: impl Into<String>) -> Self {
        GeneratorFilter::Names(vec![name.into()])
    }

    /// Build from console words. No words, `all`, `any` or `a` mean `Any`.
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Self {
        let names: Vec<String> = words
            .iter()
            .map(|w| w.as_ref().trim())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        match names.first().map(String::as_str) {
            None | Some("all" | "any" | "a") => GeneratorFilter::Any,
            Some(_) => GeneratorFilter::Names(names),
        }
    }

    pub fn matches(&self, generator: &str) -> bool {
        match self {
            GeneratorFilter::Any => true,
            GeneratorFilter::Names(names) => names.iter().any(|name| name == generator),
        }
    }
}

/// One line of `list_active`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSummary {
    pub id: VoiceId,
    pub params: ParamRecord,
}

impl fmt::Display for VoiceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.params)
    }
}

/// Engine-level settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Global tempo, injected into voices that do not set their own
    pub bpm: f64,
    /// Clock pulses per beat
    pub division: u32,
    /// Largest volume change a supervisor applies per cycle
    pub volume_step: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            division: 1,
            volume_step: 0.1,
        }
    }
}

/// The control plane.
///
/// Owns the registry, the clock and the supervision table. All operations take
/// `&self`, so an `Arc<Engine>` can be shared between command sources.
pub struct Engine {
    config: EngineConfig,
    registry: Arc<VoiceRegistry>,
    generators: GeneratorTable,
    sink: Arc<dyn AudioSink>,
    clock: Mutex<Clock>,
    tick: Arc<Tick>,
    ids: VoiceIds,
    supervisors: Mutex<Vec<SupervisorHandle>>,
    shut_down: AtomicBool,
}

impl Engine {
    /// Start the clock and return an engine with no voices.
    pub fn new(
        config: EngineConfig,
        generators: GeneratorTable,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self, EngineError> {
        let clock = Clock::start(config.bpm, config.division)?;
        let tick = clock.tick();

        log::info!(
            "engine ready: {} bpm, {} generator(s), {} Hz",
            config.bpm,
            generators.len(),
            sink.sample_rate()
        );

        Ok(Self {
            config,
            registry: Arc::new(VoiceRegistry::new()),
            generators,
            sink,
            clock: Mutex::new(clock),
            tick,
            ids: VoiceIds::new(),
            supervisors: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bpm(&self) -> f64 {
        self.config.bpm
    }

    pub fn registry(&self) -> &Arc<VoiceRegistry> {
        &self.registry
    }

    pub fn generators(&self) -> &GeneratorTable {
        &self.generators
    }

    /// Highest voice id issued so far (0 before the first allocation)
    pub fn highest_issued(&self) -> u64 {
        self.ids.highest()
    }

    /// Number of supervisors still running
    pub fn live_voices(&self) -> usize {
        self.lock_supervisors()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Register a new voice and start its supervisor.
    ///
    /// The generator is resolved before anything else; an unknown name fails
    /// with `InvalidGenerator` and leaves no trace (no id consumed, nothing
    /// registered, no thread started).
    pub fn allocate_voice(&self, request: VoiceRequest) -> Result<VoiceId, EngineError> {
        let mut supervisors = self.lock_supervisors();
        if self.shut_down.load(Ordering::Acquire) {
            return Err(EngineError::ShutDown);
        }
        reap(&mut supervisors);

        let generator = self.generators.resolve(&request.generator.name)?;
        let record = allocator::finalize(request, &generator.defaults(), self.config.bpm);

        let id = self.ids.next();
        log::info!("{id} {record}");

        // Registry entries exist before the supervisor can look for them
        self.registry.register_buffer(id, Vec::<f32>::new());
        self.registry.register(id, record);

        let spawned = self
            .sink
            .open(id)
            .map_err(EngineError::from)
            .and_then(|output| {
                supervisor::spawn(VoiceContext {
                    id,
                    registry: Arc::clone(&self.registry),
                    generator,
                    tick: Arc::clone(&self.tick),
                    output,
                    ctx: RenderCtx {
                        sample_rate: self.sink.sample_rate(),
                        voice: id,
                    },
                    volume_step: self.config.volume_step,
                })
            });

        match spawned {
            Ok(handle) => {
                supervisors.push(handle);
                Ok(id)
            }
            Err(err) => {
                // No supervisor will ever read the record, so it must not
                // claim to be playing
                self.registry.update(id, |params| params.looping = false);
                log::error!("{id} could not start: {err}");
                Err(err)
            }
        }
    }

    /// Ask a voice to finish its current buffer and exit. Unknown ids are ignored.
    pub fn stop(&self, id: VoiceId) {
        self.registry.update(id, |params| params.looping = false);
    }

    /// Stop every issued voice whose generator matches `filter`
    pub fn stop_by_filter(&self, filter: &GeneratorFilter) {
        for id in self.ids.issued() {
            self.registry.update(id, |params| {
                if filter.matches(params.generator_name()) {
                    params.looping = false;
                }
            });
        }
    }

    /// Set a voice's target volume in percent, if its generator matches `filter`.
    ///
    /// Unknown ids are ignored. The supervisor ramps toward the new level.
    pub fn set_volume(&self, id: VoiceId, percent: f64, filter: &GeneratorFilter) {
        let target = (percent / 100.0).clamp(0.0, 1.0);
        self.registry.update(id, |params| {
            if filter.matches(params.generator_name()) {
                params.target_volume = target;
            }
        });
    }

    /// `set_volume` on every issued voice
    pub fn set_volume_by_filter(&self, percent: f64, filter: &GeneratorFilter) {
        for id in self.ids.issued() {
            self.set_volume(id, percent, filter);
        }
    }

    /// Every registered voice, stopped ones included
    pub fn list_active(&self) -> Vec<VoiceSummary> {
        self.ids
            .issued()
            .filter_map(|id| self.registry.get(id).map(|params| VoiceSummary { id, params }))
            .collect()
    }

    /// Cancel every supervisor, stop the clock and join everything.
    ///
    /// Returns how each voice ended. Calling it again returns an empty list.
    pub fn shutdown(&self) -> Vec<(VoiceId, VoiceExit)> {
        let mut supervisors = self.lock_supervisors();
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }

        for handle in supervisors.iter() {
            handle.cancel();
        }

        self.clock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .stop();

        let exits: Vec<_> = supervisors.drain(..).map(SupervisorHandle::join).collect();
        log::info!("engine shut down, joined {} voice(s)", exits.len());
        exits
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn lock_supervisors(&self) -> MutexGuard<'_, Vec<SupervisorHandle>> {
        self.supervisors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Join supervisors that already exited and drop them from the table
fn reap(supervisors: &mut Vec<SupervisorHandle>) {
    let (finished, running): (Vec<_>, Vec<_>) = supervisors
        .drain(..)
        .partition(SupervisorHandle::is_finished);
    *supervisors = running;

    for handle in finished {
        let (id, exit) = handle.join();
        log::debug!("reaped voice {id} ({exit})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_ids_parse_positive_integers() {
        assert_eq!("3".parse::<VoiceId>(), Ok(VoiceId(3)));
        assert_eq!(" 12 ".parse::<VoiceId>(), Ok(VoiceId(12)));
        assert!("0".parse::<VoiceId>().is_err());
        assert!("-1".parse::<VoiceId>().is_err());
        assert!("x".parse::<VoiceId>().is_err());
        assert_eq!(VoiceId(7).to_string(), "7");
    }

    #[test]
    fn filter_words() {
        assert_eq!(GeneratorFilter::from_words::<&str>(&[]), GeneratorFilter::Any);
        assert_eq!(GeneratorFilter::from_words(&["all"]), GeneratorFilter::Any);
        assert_eq!(GeneratorFilter::from_words(&["", "a"]), GeneratorFilter::Any);
        assert_eq!(
            GeneratorFilter::from_words(&["click", "pulse"]),
            GeneratorFilter::Names(vec!["click".into(), "pulse".into()])
        );
    }

    #[test]
    fn filter_matching() {
        assert!(GeneratorFilter::Any.matches("anything"));
        assert!(GeneratorFilter::named("click").matches("click"));
        assert!(!GeneratorFilter::named("click").matches("pulse"));
    }
}
