/*
Voice Supervisor
================

One thread per voice. It owns the voice's sink stream and loops:

    ┌──────────────────────────────────────────────────────────────┐
    │  cancelled? ──yes──→ exit (Cancelled)                        │
    │  re-read record                                               │
    │  loop == false? ──yes──→ exit (Stopped)                       │
    │  render next buffer on a short-lived renderer thread          │
    │  store it in the registry                                     │
    │  wait for the next clock pulse (Pulse generators only)        │
    │  ramp volume toward target_volume, stream buffer to the sink  │
    └──────────────────────────────────────────────────────────────┘

Stopping is cooperative: `loop` is only looked at between buffers, so a voice
always plays the buffer it already started. Renderer failures (an error or a
panic inside the generator) end this voice only; the clock, the registry and
the other supervisors never see them.

Volume never jumps. Each cycle the playback volume moves at most
`volume_step` toward the target, interpolated linearly across the buffer.
*/

use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use super::{clock::Tick, registry::Buffer, registry::VoiceRegistry, VoiceId};
use crate::{
    error::{EngineError, RenderError},
    generators::{Generator, RenderCtx, SyncMode},
    io::SinkStream,
    params::ParamRecord,
    MAX_BLOCK_SIZE,
};

/// Why a voice's supervisor finished.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceExit {
    /// `loop` was switched off
    Stopped,
    /// Engine shutdown
    Cancelled,
    /// The clock stopped pulsing
    ClockHalted,
    /// The generator failed or panicked
    RenderFailed(String),
    /// The audio sink went away
    SinkClosed,
    /// The registry had no record for the voice
    Missing,
    /// The supervisor itself panicked
    Panicked(String),
}

impl fmt::Display for VoiceExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceExit::Stopped => f.write_str("stopped"),
            VoiceExit::Cancelled => f.write_str("cancelled"),
            VoiceExit::ClockHalted => f.write_str("clock halted"),
            VoiceExit::RenderFailed(reason) => write!(f, "render failed: {reason}"),
            VoiceExit::SinkClosed => f.write_str("audio sink closed"),
            VoiceExit::Missing => f.write_str("no registry entry"),
            VoiceExit::Panicked(reason) => write!(f, "supervisor panicked: {reason}"),
        }
    }
}

/// Supervision table entry kept by the engine.
pub(crate) struct SupervisorHandle {
    id: VoiceId,
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<VoiceExit>,
}

impl SupervisorHandle {
    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> (VoiceId, VoiceExit) {
        let exit = self
            .thread
            .join()
            .unwrap_or_else(|panic| VoiceExit::Panicked(panic_message(panic.as_ref())));
        (self.id, exit)
    }
}

/// Everything a supervisor needs, handed over at spawn time.
pub(crate) struct VoiceContext {
    pub id: VoiceId,
    pub registry: Arc<VoiceRegistry>,
    pub generator: Arc<dyn Generator>,
    pub tick: Arc<Tick>,
    pub output: Box<dyn SinkStream>,
    pub ctx: RenderCtx,
    pub volume_step: f64,
}

pub(crate) fn spawn(voice: VoiceContext) -> Result<SupervisorHandle, EngineError> {
    let id = voice.id;
    let cancel = Arc::new(AtomicBool::new(false));
    let supervisor = Supervisor::new(voice, Arc::clone(&cancel));

    let thread = thread::Builder::new()
        .name(format!("voice-{id}"))
        .spawn(move || supervisor.run())
        .map_err(|source| EngineError::Spawn {
            what: format!("voice {id}"),
            source,
        })?;

    Ok(SupervisorHandle { id, cancel, thread })
}

struct Supervisor {
    id: VoiceId,
    registry: Arc<VoiceRegistry>,
    generator: Arc<dyn Generator>,
    tick: Arc<Tick>,
    output: Box<dyn SinkStream>,
    cancel: Arc<AtomicBool>,
    ctx: RenderCtx,
    /// Current playback volume (0.0-1.0)
    volume: f64,
    volume_step: f64,
    /// Last clock generation observed
    seen: u64,
    block: Vec<f32>,
}

impl Supervisor {
    fn new(voice: VoiceContext, cancel: Arc<AtomicBool>) -> Self {
        let volume = voice
            .registry
            .get(voice.id)
            .map_or(1.0, |params| params.target_volume);
        let seen = voice.tick.generation();

        Self {
            id: voice.id,
            registry: voice.registry,
            generator: voice.generator,
            tick: voice.tick,
            output: voice.output,
            cancel,
            ctx: voice.ctx,
            volume,
            volume_step: voice.volume_step,
            seen,
            block: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    fn run(mut self) -> VoiceExit {
        log::debug!("voice {} supervisor started", self.id);

        let exit = loop {
            if let Err(exit) = self.cycle() {
                break exit;
            }
        };

        log::info!("voice {} finished: {exit}", self.id);
        exit
    }

    fn cycle(&mut self) -> Result<(), VoiceExit> {
        self.check_cancelled()?;

        let params = self.registry.get(self.id).ok_or(VoiceExit::Missing)?;
        if !params.looping {
            return Err(VoiceExit::Stopped);
        }

        let buffer: Buffer = match self.render(&params) {
            Ok(samples) => samples.into(),
            Err(err) => {
                log::error!("voice {} ({}): {err}", self.id, params.generator_name());
                return Err(VoiceExit::RenderFailed(err.to_string()));
            }
        };
        self.registry.register_buffer(self.id, Arc::clone(&buffer));

        // Free-running generators still wait on the clock when they have
        // nothing to play, or they would spin.
        if self.generator.sync() == SyncMode::Pulse || buffer.is_empty() {
            self.seen = match self.tick.wait_after(self.seen) {
                Some(generation) => generation,
                None => {
                    // Shutdown halts the clock after cancelling
                    self.check_cancelled()?;
                    return Err(VoiceExit::ClockHalted);
                }
            };
        }

        self.check_cancelled()?;

        let target = self
            .registry
            .get(self.id)
            .map_or(params.target_volume, |latest| latest.target_volume);
        self.play(&buffer, target)
    }

    fn check_cancelled(&self) -> Result<(), VoiceExit> {
        if self.cancel.load(Ordering::Acquire) {
            Err(VoiceExit::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run the generator on a transient renderer thread and wait for it
    fn render(&self, params: &ParamRecord) -> Result<Vec<f32>, RenderError> {
        let generator = Arc::clone(&self.generator);
        let params = params.clone();
        let ctx = self.ctx;

        let renderer = thread::Builder::new()
            .name(format!("render-{}", self.id))
            .spawn(move || generator.render(&params, &ctx))
            .map_err(RenderError::Spawn)?;

        renderer
            .join()
            .unwrap_or_else(|panic| Err(RenderError::Panicked(panic_message(panic.as_ref()))))
    }

    /// Stream `buffer` to the sink, ramping toward `target`
    fn play(&mut self, buffer: &[f32], target: f64) -> Result<(), VoiceExit> {
        let from = self.volume;
        let to = step_toward(from, target, self.volume_step);
        self.volume = to;

        for (index, chunk) in buffer.chunks(MAX_BLOCK_SIZE).enumerate() {
            let offset = index * MAX_BLOCK_SIZE;
            let block = &mut self.block[..chunk.len()];

            for (i, (out, &sample)) in block.iter_mut().zip(chunk).enumerate() {
                *out = sample * ramp_gain(from, to, offset + i, buffer.len()) as f32;
            }

            self.output
                .write(block)
                .map_err(|_| VoiceExit::SinkClosed)?;
        }

        Ok(())
    }
}

/// Move `current` toward `target` by at most `step`.
pub(crate) fn step_toward(current: f64, target: f64, step: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= step {
        target
    } else {
        current + step.copysign(delta)
    }
}

/// Linear gain at `index` of a `len`-sample ramp from `from` to `to`.
fn ramp_gain(from: f64, to: f64, index: usize, len: usize) -> f64 {
    if len <= 1 {
        return to;
    }
    from + (to - from) * index as f64 / (len - 1) as f64
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
