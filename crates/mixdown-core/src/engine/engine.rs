//! Mixer engine - the application-facing side of playback
//!
//! [`MixerEngine`] opens one backend stream whose callback owns a [`Mixer`].
//! Sounds reach the callback only through the playback queue, so `play()` can
//! be called from any thread (through a [`PlayHandle`]) while the stream runs.
//!
//! ```ignore
//! let mut engine = MixerEngine::with_default_backend(&MixerConfig::default())?;
//! let sound = load_wav("kick.wav")?.buffer.into_shared();
//! let done = CompletionFlag::new();
//!
//! engine.play(&sound, Some(&done))?;
//! engine.begin()?;
//! while done.is_playing() {
//!     std::thread::sleep(Duration::from_millis(10));
//! }
//! engine.destroy()?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::audio::{AudioBackend, AudioStream, MixCallback, MixerConfig};
use crate::error::{MixerError, MixerResult};
use crate::sound::SharedSound;
use crate::types::SampleFormat;

use super::mixer::Mixer;
use super::queue::{playback_queue, CompletionFlag, InsertError, QueueEntry, QueueProducer, QueueStats};

/// Where in a sound playback starts
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum StartPosition {
    /// First sample
    #[default]
    Beginning,
    /// Interleaved sample index (not a frame index)
    Sample(usize),
    /// Time offset, resolved against the engine's rate and channel count
    Seconds(f32),
}

impl StartPosition {
    /// Interleaved sample index to start the cursor at
    ///
    /// Seconds resolve to `(sample_rate × channels) × seconds`, truncated.
    /// Negative or NaN times start at the beginning.
    pub fn to_sample_offset(self, sample_rate: u32, channels: u16) -> usize {
        match self {
            StartPosition::Beginning => 0,
            StartPosition::Sample(index) => index,
            StartPosition::Seconds(seconds) => {
                let samples_per_second = (sample_rate as u64 * channels as u64) as f32;
                (samples_per_second * seconds) as usize
            }
        }
    }
}

/// Cloneable, `Send` handle for queueing sounds from any thread
///
/// Insertion holds the producer mutex only for the ring push; the audio
/// callback never takes it. The producer is `None` once the engine has been
/// destroyed, which also releases anything left in the ring.
#[derive(Clone)]
pub struct PlayHandle {
    producer: Arc<Mutex<Option<QueueProducer>>>,
    stats: Arc<QueueStats>,
    format: SampleFormat,
    sample_rate: u32,
    channels: u16,
    capacity: usize,
}

impl PlayHandle {
    fn producer(&self) -> MutexGuard<'_, Option<QueueProducer>> {
        // The guarded section is a single push; poisoning leaves nothing torn
        self.producer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `sound` for playback from the start
    pub fn play(&self, sound: &SharedSound, completion: Option<&CompletionFlag>) -> MixerResult<()> {
        self.play_from(sound, completion, StartPosition::Beginning)
    }

    /// Queue `sound` for playback starting at `start`
    ///
    /// The sound must already be in the engine's output format. If a
    /// completion flag is given it reads `true` once this returns `Ok` and
    /// drops to `false` on the period that mixes this entry's last sample.
    /// Give each call its own flag to track sounds individually.
    /// A start position past the end still queues the sound; it is pruned on
    /// the next pass.
    pub fn play_from(
        &self,
        sound: &SharedSound,
        completion: Option<&CompletionFlag>,
        start: StartPosition,
    ) -> MixerResult<()> {
        if sound.format() != Some(self.format) {
            return Err(MixerError::invalid(format!(
                "cannot play a {} sound through a {} mixer",
                sound.format().map_or("uninitialized", |f| f.name()),
                self.format
            )));
        }

        let cursor = start.to_sample_offset(self.sample_rate, self.channels);
        let completion = completion.cloned();

        // Raised before publishing: the callback may prune the entry before
        // push() even returns.
        if let Some(flag) = &completion {
            flag.set(true);
        }

        let entry = QueueEntry::new(sound.clone(), cursor, completion.clone());
        let result = match self.producer().as_mut() {
            Some(producer) => producer.insert(entry),
            None => Err(InsertError::Closed),
        };

        let Err(reason) = result else {
            return Ok(());
        };
        if let Some(flag) = &completion {
            flag.set(false);
        }
        match reason {
            InsertError::Full(_) => Err(MixerError::QueueFull {
                capacity: self.capacity,
            }),
            InsertError::Closed => Err(MixerError::invalid("mixer has been destroyed")),
        }
    }

    pub fn stats(&self) -> &Arc<QueueStats> {
        &self.stats
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }
}

/// Playback engine bound to one output stream
///
/// Not `Send`: hardware streams must be started and closed on the thread that
/// opened them. Use [`MixerEngine::play_handle`] to queue sounds from other
/// threads.
pub struct MixerEngine {
    handle: PlayHandle,
    stream: Option<Box<dyn AudioStream>>,
    started: bool,
}

impl MixerEngine {
    /// Open a stream on `backend` and bind it to a fresh, empty queue
    ///
    /// On failure nothing is left behind: the queue and the callback are
    /// dropped before the error is returned.
    pub fn create<B>(backend: &B, config: &MixerConfig) -> MixerResult<Self>
    where
        B: AudioBackend + ?Sized,
    {
        config.validate()?;

        let (producer, queue) = playback_queue(config.queue_capacity);
        let stats = producer.stats().clone();

        let mut mixer = Mixer::new(queue, config.format);
        let callback: MixCallback = Box::new(move |out| mixer.process(out));

        let stream_config = config.stream_config();
        let stream = backend.open_stream(&stream_config, callback)?;

        log::info!(
            "Mixer created: {} {}Hz {}ch, {} frames/period (~{:.1}ms), queue capacity {}",
            config.format,
            config.sample_rate,
            config.channels,
            config.frames_per_period,
            stream.latency_ms(),
            config.queue_capacity
        );

        Ok(Self {
            handle: PlayHandle {
                producer: Arc::new(Mutex::new(Some(producer))),
                stats,
                format: config.format,
                sample_rate: config.sample_rate,
                channels: config.channels,
                capacity: config.queue_capacity,
            },
            stream: Some(stream),
            started: false,
        })
    }

    /// Create an engine on the configured (or default) hardware device
    #[cfg(feature = "cpal-backend")]
    pub fn with_default_backend(config: &MixerConfig) -> MixerResult<Self> {
        let backend = crate::audio::CpalBackend::new(config.device.clone());
        Self::create(&backend, config)
    }

    /// See [`PlayHandle::play`]
    pub fn play(&self, sound: &SharedSound, completion: Option<&CompletionFlag>) -> MixerResult<()> {
        self.play_from(sound, completion, StartPosition::Beginning)
    }

    /// See [`PlayHandle::play_from`]
    pub fn play_from(
        &self,
        sound: &SharedSound,
        completion: Option<&CompletionFlag>,
        start: StartPosition,
    ) -> MixerResult<()> {
        if self.stream.is_none() {
            return Err(MixerError::invalid("mixer has been destroyed"));
        }
        self.handle.play_from(sound, completion, start)
    }

    /// Start the stream; later calls are no-ops
    pub fn begin(&mut self) -> MixerResult<()> {
        if self.started {
            return Ok(());
        }
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| MixerError::invalid("mixer has been destroyed"))?;
        stream.start()?;
        self.started = true;
        log::info!("Mixer started");
        Ok(())
    }

    /// Stop and close the stream, abandoning every sound still in flight
    ///
    /// Completion flags of abandoned sounds are left as they are. Every queue
    /// reference to a sound is released, including sounds that were queued
    /// but never reached the callback, even when the backend fails to stop.
    /// Calling this again (or dropping the engine afterwards) does nothing.
    pub fn destroy(&mut self) -> MixerResult<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let in_flight = self.handle.stats.live();
        self.started = false;

        // Closing drops the callback and its half of the queue; dropping the
        // producer frees the ring along with any entries still pending in it
        let closed = stream.stop_and_close();
        drop(stream);
        self.handle.producer().take();

        closed?;
        log::info!("Mixer destroyed ({} sounds abandoned)", in_flight);
        Ok(())
    }

    /// Handle for queueing sounds from other threads
    pub fn play_handle(&self) -> PlayHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> &Arc<QueueStats> {
        &self.handle.stats
    }

    pub fn format(&self) -> SampleFormat {
        self.handle.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.handle.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.handle.channels
    }

    /// Started and not yet destroyed
    pub fn is_running(&self) -> bool {
        self.started && self.stream.is_some()
    }
}

impl Drop for MixerEngine {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::warn!("Error closing mixer stream: {}", e);
        }
    }
}
