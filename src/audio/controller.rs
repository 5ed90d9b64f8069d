// Playback state machine
// One background worker per active playback drives a wall-clock position
// and feeds the output device; the UI thread polls position or subscribes
// to the tick channel

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, warn};
use parking_lot::Mutex;

use super::buffer::AudioBuffer;
use super::output::{AudioSink, CpalOutput, PlaybackError};

/// Default interval between position updates.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// Ticks beyond this are dropped; position remains pollable
const TICK_CHANNEL_CAPACITY: usize = 64;

// Mono source samples scaled and offered to the sink per pass
const FEED_CHUNK: usize = 4096;

/// Position snapshot published on every worker tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackTick {
    pub position_secs: f64,
    pub playing: bool,
}

type SinkFactory =
    Arc<dyn Fn(u32) -> Result<Box<dyn AudioSink>, PlaybackError> + Send + Sync>;

// Playback fields shared between the worker and the UI thread.
// Position lives in an AtomicU64 (microseconds) so UI polls never see a
// torn value. The worker is the only writer while it runs; the UI thread
// writes only through seek(), which stops the worker first.
struct Shared {
    position_us: AtomicU64,
    playing: AtomicBool,
    cancel: AtomicBool,
    volume: Mutex<f32>,
}

impl Shared {
    fn position_secs(&self) -> f64 {
        self.position_us.load(Ordering::Acquire) as f64 / 1e6
    }

    fn set_position_secs(&self, secs: f64) {
        let us = (secs.max(0.0) * 1e6) as u64;
        self.position_us.store(us, Ordering::Release);
    }
}

/// Owns playback state and the background worker.
///
/// States are `Stopped` and `Playing`; at most one worker thread is alive
/// at any time. A new `play()` or `seek()` implicitly stops the previous
/// worker first.
pub struct PlaybackController {
    shared: Arc<Shared>,
    buffer: Option<Arc<AudioBuffer>>,
    worker: Option<JoinHandle<()>>,
    ticks_tx: Sender<PlaybackTick>,
    ticks_rx: Receiver<PlaybackTick>,
    sink_factory: SinkFactory,
    poll_interval: Duration,
}

impl PlaybackController {
    /// Controller playing through the default cpal output device.
    pub fn new(poll_interval: Duration) -> Self {
        Self::with_sink_factory(
            poll_interval,
            Arc::new(|src_rate| {
                CpalOutput::open(src_rate).map(|o| Box::new(o) as Box<dyn AudioSink>)
            }),
        )
    }

    /// Controller with a custom output; used by tests to run without a device.
    pub fn with_sink_factory(poll_interval: Duration, sink_factory: SinkFactory) -> Self {
        let (ticks_tx, ticks_rx) = channel::bounded(TICK_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                position_us: AtomicU64::new(0),
                playing: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
                volume: Mutex::new(1.0),
            }),
            buffer: None,
            worker: None,
            ticks_tx,
            ticks_rx,
            sink_factory,
            poll_interval,
        }
    }

    /// Replace the loaded waveform. Stops playback and rewinds to zero.
    pub fn set_buffer(&mut self, buffer: Option<Arc<AudioBuffer>>) {
        self.stop();
        self.buffer = buffer;
        self.shared.set_position_secs(0.0);
    }

    /// Start playing from the current position.
    ///
    /// No-op when nothing is loaded or already playing. Device errors from
    /// opening the output surface here, before the state changes.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        let Some(buffer) = self.buffer.clone() else {
            debug!("play ignored: no audio loaded");
            return Ok(());
        };
        if self.shared.playing.load(Ordering::Acquire) {
            return Ok(());
        }
        self.reap_worker();

        self.shared.cancel.store(false, Ordering::Release);
        self.shared.playing.store(true, Ordering::Release);

        let shared = self.shared.clone();
        let factory = self.sink_factory.clone();
        let ticks = self.ticks_tx.clone();
        let poll = self.poll_interval;
        let (ready_tx, ready_rx) = channel::bounded(1);

        let handle = thread::spawn(move || {
            worker_run(shared, buffer, factory, ready_tx, ticks, poll);
        });

        // The sink is opened on the worker thread (cpal streams stay on the
        // thread that made them); wait for the open result so device errors
        // come back from this call.
        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                self.shared.playing.store(false, Ordering::Release);
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                self.shared.playing.store(false, Ordering::Release);
                Err(PlaybackError::Stream(
                    "playback worker exited before starting".into(),
                ))
            }
        }
    }

    /// Stop playback, freezing the position at its last value.
    ///
    /// Flag-and-join: the worker observes the flag within one poll interval
    /// and exits, releasing the output device. Safe to call while the worker
    /// is mid-loop; no-op when already stopped.
    pub fn stop(&mut self) {
        self.shared.cancel.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("playback worker panicked");
            }
        }
        self.shared.playing.store(false, Ordering::Release);
        self.shared.cancel.store(false, Ordering::Release);
    }

    /// Move the position to `target_secs`, clamped to the buffer bounds.
    ///
    /// Seeking while playing restarts playback from the new position
    /// rather than splicing the running stream, so a pending volume change
    /// is picked up as well.
    pub fn seek(&mut self, target_secs: f64) -> Result<(), PlaybackError> {
        let clamped = target_secs.clamp(0.0, self.duration_secs());
        let was_playing = self.is_playing();
        if was_playing {
            self.stop();
        }
        self.shared.set_position_secs(clamped);
        if was_playing {
            self.play()?;
        }
        Ok(())
    }

    /// Set the playback volume, clamped to [0, 1].
    ///
    /// Takes effect on the next `play()`; the worker captures volume once
    /// at start.
    pub fn set_volume(&self, volume: f32) {
        *self.shared.volume.lock() = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        *self.shared.volume.lock()
    }

    pub fn position_secs(&self) -> f64 {
        self.shared.position_secs()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    /// Duration of the loaded buffer, 0.0 when nothing is loaded.
    pub fn duration_secs(&self) -> f64 {
        self.buffer.as_ref().map(|b| b.duration_secs()).unwrap_or(0.0)
    }

    /// Subscribe to position updates.
    ///
    /// Ticks are advisory and lossy (the channel is bounded); poll
    /// `position_secs()` for the authoritative value. Intended for a single
    /// consumer refreshing a progress indicator.
    pub fn subscribe(&self) -> Receiver<PlaybackTick> {
        self.ticks_rx.clone()
    }

    // Join a worker that already finished on its own, so at most one worker
    // handle is ever held
    fn reap_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("playback worker panicked");
            }
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_run(
    shared: Arc<Shared>,
    buffer: Arc<AudioBuffer>,
    factory: SinkFactory,
    ready: Sender<Result<(), PlaybackError>>,
    ticks: Sender<PlaybackTick>,
    poll: Duration,
) {
    let mut sink = match factory(buffer.sample_rate()) {
        Ok(sink) => {
            let _ = ready.send(Ok(()));
            sink
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let duration = buffer.duration_secs();
    let volume = *shared.volume.lock();
    let start_offset = shared.position_secs().min(duration);
    let samples = buffer.samples();
    let mut cursor =
        ((start_offset * buffer.sample_rate() as f64) as usize).min(samples.len());
    let mut scaled = Vec::with_capacity(FEED_CHUNK);
    let started = Instant::now();
    debug!("playback worker: {:.2}s -> {:.2}s", start_offset, duration);

    loop {
        if shared.cancel.load(Ordering::Acquire) {
            break;
        }

        // Top up the device buffer with volume-scaled samples
        while cursor < samples.len() {
            let end = (cursor + FEED_CHUNK).min(samples.len());
            scaled.clear();
            scaled.extend(samples[cursor..end].iter().map(|s| s * volume));
            let written = sink.write(&scaled);
            cursor += written;
            if written < scaled.len() {
                break; // device buffer full
            }
        }

        // Wall-clock position, robust to audio-callback jitter
        let position = (start_offset + started.elapsed().as_secs_f64()).min(duration);
        shared.set_position_secs(position);
        let _ = ticks.try_send(PlaybackTick {
            position_secs: position,
            playing: true,
        });

        if position >= duration {
            break; // end of buffer; transition to Stopped on our own
        }

        thread::sleep(poll);
    }

    let position = shared.position_secs();
    shared.playing.store(false, Ordering::Release);
    let _ = ticks.try_send(PlaybackTick {
        position_secs: position,
        playing: false,
    });
    debug!("playback worker exit at {:.2}s", position);
}
