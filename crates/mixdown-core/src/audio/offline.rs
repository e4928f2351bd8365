//! Offline backend: renders periods on demand instead of on a hardware clock
//!
//! The stream's callback is parked in shared state; an [`OfflineDriver`]
//! invokes it one period at a time on the calling thread. Used to render a mix
//! to a file and to drive the engine deterministically in tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::sound::SoundBuffer;
use crate::types::{CallbackStatus, OutputBuffer, SampleFormat};

use super::backend::{AudioBackend, AudioStream, MixCallback};
use super::config::StreamConfig;
use super::error::{AudioError, AudioResult};

#[derive(Default)]
struct OfflineState {
    callback: Option<MixCallback>,
    config: Option<StreamConfig>,
    running: bool,
    completed: bool,
    periods: u64,
}

fn lock(state: &Mutex<OfflineState>) -> MutexGuard<'_, OfflineState> {
    // A panic inside the callback leaves nothing half-updated worth refusing
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend without hardware; pair it with [`OfflineBackend::driver`]
///
/// Holds at most one open stream at a time.
#[derive(Clone, Default)]
pub struct OfflineBackend {
    state: Arc<Mutex<OfflineState>>,
    fail_open: bool,
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose `open_stream` always fails, for exercising error paths
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Handle that renders periods for the stream this backend opens
    pub fn driver(&self) -> OfflineDriver {
        OfflineDriver {
            state: self.state.clone(),
        }
    }
}

impl AudioBackend for OfflineBackend {
    fn open_stream(
        &self,
        config: &StreamConfig,
        callback: MixCallback,
    ) -> AudioResult<Box<dyn AudioStream>> {
        if self.fail_open {
            return Err(AudioError::StreamOpen(
                "offline backend configured to fail".to_string(),
            ));
        }

        let mut state = lock(&self.state);
        if state.callback.is_some() {
            return Err(AudioError::StreamOpen(
                "offline backend already has an open stream".to_string(),
            ));
        }

        log::debug!(
            "Offline stream opened: {} channels, {}Hz, {} frames, {}",
            config.channels,
            config.sample_rate,
            config.frames_per_period,
            config.format
        );

        *state = OfflineState {
            callback: Some(callback),
            config: Some(*config),
            ..OfflineState::default()
        };

        Ok(Box::new(OfflineStream {
            state: self.state.clone(),
            sample_rate: config.sample_rate,
            buffer_size: config.frames_per_period,
            closed: false,
        }))
    }
}

/// Stream handle returned by [`OfflineBackend`]
pub struct OfflineStream {
    state: Arc<Mutex<OfflineState>>,
    sample_rate: u32,
    buffer_size: u32,
    closed: bool,
}

impl AudioStream for OfflineStream {
    fn start(&mut self) -> AudioResult<()> {
        if self.closed {
            return Err(AudioError::StreamStart("stream is closed".to_string()));
        }
        lock(&self.state).running = true;
        Ok(())
    }

    fn stop_and_close(&mut self) -> AudioResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Take the callback out first so it is dropped without the lock held
        let callback = {
            let mut state = lock(&self.state);
            state.running = false;
            state.config = None;
            state.callback.take()
        };
        drop(callback);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> u32 {
        self.buffer_size
    }
}

impl Drop for OfflineStream {
    fn drop(&mut self) {
        let _ = self.stop_and_close();
    }
}

/// One period of rendered output
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedPeriod {
    Int16(Vec<i16>),
    Float32(Vec<f32>),
}

impl RenderedPeriod {
    fn silence(format: SampleFormat, len: usize) -> Self {
        match format {
            SampleFormat::Int16 => RenderedPeriod::Int16(vec![0; len]),
            SampleFormat::Float32 => RenderedPeriod::Float32(vec![0.0; len]),
        }
    }

    fn as_output(&mut self) -> OutputBuffer<'_> {
        match self {
            RenderedPeriod::Int16(data) => OutputBuffer::Int16(data),
            RenderedPeriod::Float32(data) => OutputBuffer::Float32(data),
        }
    }

    pub fn as_i16(&self) -> Option<&[i16]> {
        match self {
            RenderedPeriod::Int16(data) => Some(data),
            RenderedPeriod::Float32(_) => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            RenderedPeriod::Float32(data) => Some(data),
            RenderedPeriod::Int16(_) => None,
        }
    }

    pub fn into_sound_buffer(self) -> SoundBuffer {
        match self {
            RenderedPeriod::Int16(data) => SoundBuffer::from_i16(data),
            RenderedPeriod::Float32(data) => SoundBuffer::from_f32(data),
        }
    }
}

/// Renders periods for the stream opened on an [`OfflineBackend`]
#[derive(Clone)]
pub struct OfflineDriver {
    state: Arc<Mutex<OfflineState>>,
}

impl OfflineDriver {
    /// Run one mixing pass into a freshly allocated period buffer
    ///
    /// Returns `None` when no stream is open, it hasn't been started, or the
    /// callback has asked to stop.
    pub fn render_period(&self) -> Option<RenderedPeriod> {
        let mut state = lock(&self.state);
        let config = state.config?;
        let mut period = RenderedPeriod::silence(config.format, config.samples_per_period());
        Self::run(&mut state, period.as_output())?;
        Some(period)
    }

    /// Run one mixing pass into a caller-provided buffer
    pub fn render_into(&self, out: OutputBuffer<'_>) -> Option<CallbackStatus> {
        let mut state = lock(&self.state);
        Self::run(&mut state, out)
    }

    fn run(state: &mut OfflineState, out: OutputBuffer<'_>) -> Option<CallbackStatus> {
        if !state.running || state.completed {
            return None;
        }
        let callback = state.callback.as_mut()?;
        let status = callback(out);
        state.periods += 1;
        if status == CallbackStatus::Complete {
            state.completed = true;
        }
        Some(status)
    }

    /// Whether a started, open stream is waiting for periods
    pub fn is_running(&self) -> bool {
        let state = lock(&self.state);
        state.running && !state.completed && state.callback.is_some()
    }

    /// Periods rendered since the stream was opened
    pub fn periods_rendered(&self) -> u64 {
        lock(&self.state).periods
    }
}
