/*
Tempo Clock
===========

One thread turns a tempo into a steady pulse that every voice supervisor waits
on before it starts playing its next buffer.

  period = 60 / bpm / division   (seconds)

Wake times are computed from a fixed start instant:

  wake(n) = start + n * period

rather than by sleeping `period` after every pulse. Sleep overshoot and the
time spent waking waiters would otherwise add up into audible drift after a
few minutes. If the thread ever falls more than a period behind it skips the
missed pulses instead of firing them back to back.

Pulses carry no payload. `Tick` keeps a generation counter; a waiter passes in
the last generation it saw and gets back the current one, so a slow waiter
observes at most one pulse per wait no matter how many it missed.
*/

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::error::EngineError;

/// Longest uninterrupted sleep, so `stop` is noticed promptly at slow tempos.
const MAX_SLEEP: Duration = Duration::from_millis(50);

/// Shortest and longest pulse period a tempo may produce.
const MIN_PERIOD: Duration = Duration::from_millis(1);
const MAX_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct TickState {
    generation: u64,
    halted: bool,
}

/// Shared pulse signal observed by all supervisors.
#[derive(Debug, Default)]
pub struct Tick {
    state: Mutex<TickState>,
    pulsed: Condvar,
}

impl Tick {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TickState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of pulses emitted so far
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    /// Emit one pulse and wake every waiter
    pub fn pulse(&self) {
        let mut state = self.lock();
        state.generation += 1;
        self.pulsed.notify_all();
    }

    /// Stop pulsing for good; current and future waiters return `None`
    pub fn halt(&self) {
        let mut state = self.lock();
        state.halted = true;
        self.pulsed.notify_all();
    }

    /// Block until a pulse newer than `seen` arrives.
    ///
    /// Returns the new generation, or `None` once the tick is halted.
    pub fn wait_after(&self, seen: u64) -> Option<u64> {
        let state = self.lock();
        let state = self
            .pulsed
            .wait_while(state, |s| !s.halted && s.generation <= seen)
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if state.halted {
            None
        } else {
            Some(state.generation)
        }
    }
}

/// The pulse thread.
pub struct Clock {
    tick: Arc<Tick>,
    running: Arc<AtomicBool>,
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Clock {
    /// Start pulsing `division` times per beat at `bpm`.
    pub fn start(bpm: f64, division: u32) -> Result<Self, EngineError> {
        let period = Self::period_for(bpm, division)?;
        let tick = Arc::new(Tick::new());
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let tick = Arc::clone(&tick);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("clock".into())
                .spawn(move || run(&tick, &running, period))
                .map_err(|source| EngineError::Spawn {
                    what: "clock".into(),
                    source,
                })?
        };

        log::debug!("clock started: {bpm} bpm, period {period:?}");

        Ok(Self {
            tick,
            running,
            period,
            handle: Some(handle),
        })
    }

    /// Pulse period for a tempo
    pub fn period_for(bpm: f64, division: u32) -> Result<Duration, EngineError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(EngineError::InvalidTempo(bpm));
        }

        // beats per second = bpm / 60, pulses per second = that * division
        let seconds = 60.0 / bpm / f64::from(division.max(1));
        Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|period| (MIN_PERIOD..=MAX_PERIOD).contains(period))
            .ok_or(EngineError::InvalidTempo(bpm))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn tick(&self) -> Arc<Tick> {
        Arc::clone(&self.tick)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Halt the pulse and join the thread. Safe to call more than once.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.tick.halt();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("clock thread panicked");
            }
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(tick: &Tick, running: &AtomicBool, period: Duration) {
    let start = Instant::now();
    let mut pulse: u32 = 0;

    while running.load(Ordering::Acquire) {
        pulse = pulse.saturating_add(1);
        let mut wake = start + period * pulse;

        let now = Instant::now();
        if now > wake + period {
            // Fell behind: jump to the next slot in the future
            let behind = (now - start).as_secs_f64() / period.as_secs_f64();
            let skipped = behind as u32 + 1 - pulse;
            log::warn!("clock overran, skipping {skipped} pulse(s)");
            pulse = behind as u32 + 1;
            wake = start + period * pulse;
        }

        if !sleep_until(wake, running) {
            break;
        }

        tick.pulse();
    }

    log::debug!("clock stopped after {pulse} pulse(s)");
}

/// Sleep in short slices until `wake`. Returns `false` if stopped meanwhile.
fn sleep_until(wake: Instant, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }

        let now = Instant::now();
        if now >= wake {
            return true;
        }

        thread::sleep((wake - now).min(MAX_SLEEP));
    }
}
