/*
Device Output
=============

Voices render on their own threads; the audio device pulls samples on the
driver's callback thread. Each voice gets a lock-free SPSC ring between the two:

    supervisor ──write──→ [ rtrb ring ] ──pop──→ callback ──→ device
    supervisor ──write──→ [ rtrb ring ] ──pop──┘   (summed, copied to
    supervisor ──write──→ [ rtrb ring ] ──pop──┘    every channel)

New rings reach the callback through a bounded crossbeam channel it drains
with `try_recv` at the top of every callback, so the callback never blocks.
The callback keeps at most `MAX_MIX_VOICES` rings in a vector sized up front;
extra rings wait in the channel until a slot frees.

A supervisor that outruns the device finds its ring full and backs off until
there is room. A ring leaves the mix once its producer is gone and everything
it holds has been played. The callback never frees it: it goes back over a
second channel and is dropped on the "audio-out" thread.

`cpal::Stream` cannot leave the thread that built it, so that "audio-out"
thread builds it, reports the device format back, and then holds it, freeing
retired rings, until the sink is dropped.
*/

use std::{
    thread::{self, JoinHandle},
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use rtrb::{Consumer, Producer, RingBuffer};

use super::{AudioSink, SinkStream};
use crate::{engine::VoiceId, error::SinkError, MAX_BLOCK_SIZE};

/// Samples buffered per voice between its supervisor and the device.
const RING_CAPACITY: usize = MAX_BLOCK_SIZE * 4;

/// Rings the callback mixes at once; also the depth of the hand-off channels.
pub const MAX_MIX_VOICES: usize = 64;

/// How long a writer waits for ring space before trying again.
const BACKOFF: Duration = Duration::from_millis(2);

/// Plays every voice through the default output device.
pub struct CpalSink {
    sample_rate: f32,
    channels: usize,
    rings: Sender<Consumer<f32>>,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open the default output device of the default host
    pub fn open_default() -> Result<Self, SinkError> {
        let (rings_tx, rings_rx) = crossbeam_channel::bounded(MAX_MIX_VOICES);
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(MAX_MIX_VOICES);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("audio-out".into())
            .spawn(move || match build_stream(Mixer::new(rings_rx, retired_tx)) {
                Ok((stream, format)) => {
                    let _ = ready_tx.send(Ok(format));
                    free_retired(&retired_rx, &shutdown_rx);
                    drop(stream);
                    log::debug!("audio stream closed");
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .map_err(|err| SinkError::Device(format!("failed to spawn audio thread: {err}")))?;

        let (sample_rate, channels) = ready_rx
            .recv()
            .map_err(|_| SinkError::Device("audio thread exited during setup".into()))??;

        log::info!("audio output: {sample_rate} Hz, {channels} channel(s)");

        Ok(Self {
            sample_rate,
            channels,
            rings: rings_tx,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl AudioSink for CpalSink {
    fn open(&self, voice: VoiceId) -> Result<Box<dyn SinkStream>, SinkError> {
        let (producer, consumer) = RingBuffer::new(RING_CAPACITY);
        self.rings.try_send(consumer).map_err(|err| match err {
            TrySendError::Full(_) => {
                SinkError::Device(format!("more than {MAX_MIX_VOICES} voices waiting to play"))
            }
            TrySendError::Disconnected(_) => SinkError::Closed,
        })?;
        log::debug!("voice {voice} connected to audio output");
        Ok(Box::new(RingStream { producer }))
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("audio thread panicked");
            }
        }
    }
}

/// Writer half of one voice's ring.
struct RingStream {
    producer: Producer<f32>,
}

impl SinkStream for RingStream {
    fn write(&mut self, samples: &[f32]) -> Result<(), SinkError> {
        let mut rest = samples;

        while !rest.is_empty() {
            if self.producer.is_abandoned() {
                return Err(SinkError::Closed);
            }

            let room = self.producer.slots().min(rest.len());
            if room == 0 {
                thread::sleep(BACKOFF);
                continue;
            }

            for &sample in &rest[..room] {
                // Cannot fail: `room` slots were free and only we push
                let _ = self.producer.push(sample);
            }
            rest = &rest[room..];
        }

        Ok(())
    }
}

/// Drop rings the callback hands back until the sink drops its shutdown sender
fn free_retired(retired: &Receiver<Consumer<f32>>, shutdown: &Receiver<()>) {
    loop {
        crossbeam_channel::select! {
            recv(shutdown) -> _ => return,
            recv(retired) -> ring => match ring {
                Ok(ring) => drop(ring),
                // The callback is gone; only shutdown is left to wait for
                Err(_) => {
                    let _ = shutdown.recv();
                    return;
                }
            },
        }
    }
}

type Format = (f32, usize);

fn build_stream(mut mixer: Mixer) -> Result<(cpal::Stream, Format), SinkError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(SinkError::NoDevice)?;
    let config = device
        .default_output_config()
        .map_err(|err| SinkError::Device(format!("failed to fetch default output config: {err}")))?;

    let sample_rate = config.sample_rate().0 as f32;
    let channels = usize::from(config.channels()).max(1);

    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| mixer.fill(data, channels),
            |err| log::error!("audio stream error: {err}"),
            None,
        )
        .map_err(|err| SinkError::Device(err.to_string()))?;

    stream
        .play()
        .map_err(|err| SinkError::Device(err.to_string()))?;

    Ok((stream, (sample_rate, channels)))
}

/// Callback-side state: the live rings. Never allocates or frees.
struct Mixer {
    incoming: Receiver<Consumer<f32>>,
    retired: Sender<Consumer<f32>>,
    rings: Vec<Consumer<f32>>,
}

impl Mixer {
    fn new(incoming: Receiver<Consumer<f32>>, retired: Sender<Consumer<f32>>) -> Self {
        Self {
            incoming,
            retired,
            rings: Vec::with_capacity(MAX_MIX_VOICES),
        }
    }

    /// Sum one sample from every ring into each interleaved frame of `data`
    fn fill(&mut self, data: &mut [f32], channels: usize) {
        while self.rings.len() < MAX_MIX_VOICES {
            match self.incoming.try_recv() {
                Ok(ring) => self.rings.push(ring),
                Err(_) => break,
            }
        }

        for frame in data.chunks_mut(channels) {
            let mut sample = 0.0f32;
            for ring in self.rings.iter_mut() {
                if let Ok(value) = ring.pop() {
                    sample += value;
                }
            }
            frame.fill(sample.clamp(-1.0, 1.0));
        }

        self.retire_finished();
    }

    /// Hand drained rings whose producer is gone back to the audio-out thread.
    ///
    /// A ring stays in the mix while the retired channel is full; it is empty,
    /// so it only costs a failed pop until the next callback.
    fn retire_finished(&mut self) {
        let mut index = 0;
        while index < self.rings.len() {
            let ring = &self.rings[index];
            if !(ring.is_abandoned() && ring.is_empty()) {
                index += 1;
                continue;
            }

            let ring = self.rings.swap_remove(index);
            if let Err(full) = self.retired.try_send(ring) {
                self.rings.push(full.into_inner());
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixer_sums_rings_into_every_channel() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (retired, _freed) = crossbeam_channel::unbounded();
        let mut mixer = Mixer::new(rx, retired);

        let (mut a, ring_a) = RingBuffer::new(8);
        let (mut b, ring_b) = RingBuffer::new(8);
        tx.send(ring_a).unwrap();
        tx.send(ring_b).unwrap();

        for s in [0.25f32, 0.5] {
            a.push(s).unwrap();
        }
        b.push(0.25f32).unwrap();

        let mut data = [9.0f32; 6];
        mixer.fill(&mut data, 2);

        assert_eq!(data, [0.5, 0.5, 0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn finished_rings_leave_the_mix() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (retired, freed) = crossbeam_channel::unbounded();
        let mut mixer = Mixer::new(rx, retired);

        let (mut producer, ring) = RingBuffer::new(4);
        tx.send(ring).unwrap();
        producer.push(0.1f32).unwrap();
        drop(producer);

        let mut data = [0.0f32; 2];
        mixer.fill(&mut data, 1);

        assert_eq!(data, [0.1, 0.0]);
        assert!(mixer.rings.is_empty());
        assert!(freed.try_recv().is_ok());
    }

    #[test]
    fn finished_rings_wait_while_the_retired_channel_is_full() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (retired, freed) = crossbeam_channel::bounded(1);
        let mut mixer = Mixer::new(rx, retired);

        for _ in 0..2 {
            let (producer, ring) = RingBuffer::<f32>::new(4);
            drop(producer);
            tx.send(ring).unwrap();
        }

        let mut data = [0.0f32; 1];
        mixer.fill(&mut data, 1);
        assert_eq!(mixer.rings.len(), 1);

        freed.try_recv().unwrap();
        mixer.fill(&mut data, 1);
        assert!(mixer.rings.is_empty());
    }

    #[test]
    fn ring_slots_are_bounded() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (retired, _freed) = crossbeam_channel::unbounded();
        let mut mixer = Mixer::new(rx, retired);

        let mut producers = Vec::new();
        for _ in 0..=MAX_MIX_VOICES {
            let (producer, ring) = RingBuffer::<f32>::new(4);
            tx.send(ring).unwrap();
            producers.push(producer);
        }

        let capacity = mixer.rings.capacity();
        let mut data = [0.0f32; 1];
        mixer.fill(&mut data, 1);
        assert_eq!(mixer.rings.len(), MAX_MIX_VOICES);
        assert_eq!(mixer.rings.capacity(), capacity);
        assert_eq!(tx.len(), 1);

        // A finished voice frees a slot for the waiting ring
        producers.remove(0);
        mixer.fill(&mut data, 1);
        mixer.fill(&mut data, 1);
        assert_eq!(mixer.rings.len(), MAX_MIX_VOICES);
        assert!(tx.is_empty());
    }

    #[test]
    fn mix_is_clamped() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (retired, _freed) = crossbeam_channel::unbounded();
        let mut mixer = Mixer::new(rx, retired);

        let mut producers = Vec::new();
        for _ in 0..3 {
            let (mut producer, ring) = RingBuffer::new(4);
            producer.push(0.9f32).unwrap();
            tx.send(ring).unwrap();
            producers.push(producer);
        }

        let mut data = [0.0f32; 1];
        mixer.fill(&mut data, 1);
        assert_eq!(data, [1.0]);
    }

    #[test]
    fn ring_stream_reports_closed_reader() {
        let (producer, consumer) = RingBuffer::new(4);
        let mut stream = RingStream { producer };
        drop(consumer);

        assert!(matches!(stream.write(&[0.1]), Err(SinkError::Closed)));
    }
}
