//! CPAL audio backend implementation
//!
//! Opens one output stream in the engine's native sample type. cpal owns the
//! real-time thread; the mixing callback runs there once per period.
//!
//! ```text
//! ┌──────────────────┐   insert   ┌─────────────────────┐
//! │  Control thread  │───────────►│   Playback queue    │
//! │  (play, begin)   │            │ (ring + RT arena)   │
//! └──────────────────┘            └──────────┬──────────┘
//!                                            │ mixing pass
//!                                            ▼
//!                                 ┌─────────────────────┐
//!                                 │  CPAL Audio Thread  │
//!                                 │ (owns MixCallback)  │
//!                                 └─────────────────────┘
//! ```

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SizedSample, Stream};

use crate::types::{CallbackStatus, OutputBuffer, SampleFormat};

use super::backend::{AudioBackend, AudioStream, MixCallback};
use super::config::{DeviceId, StreamConfig};
use super::device::{check_stream_support, find_device_by_id, get_default_device};
use super::error::{AudioError, AudioResult};

/// A cpal sample type the mixer can write natively
trait NativeSample: SizedSample + Send + 'static {
    fn wrap(buf: &mut [Self]) -> OutputBuffer<'_>;

    fn silence(buf: &mut [Self]);
}

impl NativeSample for i16 {
    #[inline]
    fn wrap(buf: &mut [i16]) -> OutputBuffer<'_> {
        OutputBuffer::Int16(buf)
    }

    #[inline]
    fn silence(buf: &mut [i16]) {
        buf.fill(0);
    }
}

impl NativeSample for f32 {
    #[inline]
    fn wrap(buf: &mut [f32]) -> OutputBuffer<'_> {
        OutputBuffer::Float32(buf)
    }

    #[inline]
    fn silence(buf: &mut [f32]) {
        buf.fill(0.0);
    }
}

/// Hardware output through cpal
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    /// Output device (None = default device of the default host)
    device: Option<DeviceId>,
}

impl CpalBackend {
    pub fn new(device: Option<DeviceId>) -> Self {
        Self { device }
    }
}

impl AudioBackend for CpalBackend {
    fn open_stream(
        &self,
        config: &StreamConfig,
        callback: MixCallback,
    ) -> AudioResult<Box<dyn AudioStream>> {
        let device = match &self.device {
            Some(id) => find_device_by_id(id)?,
            None => get_default_device()?,
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using audio device: {}", device_name);

        check_stream_support(&device, config)?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: CpalBufferSize::Fixed(config.frames_per_period),
        };

        log::debug!(
            "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency), {}",
            stream_config.channels,
            config.sample_rate,
            config.frames_per_period,
            config.latency_ms(),
            config.format
        );

        let stream = match config.format {
            SampleFormat::Int16 => build_output_stream::<i16>(&device, &stream_config, callback)?,
            SampleFormat::Float32 => build_output_stream::<f32>(&device, &stream_config, callback)?,
        };

        Ok(Box::new(CpalStream {
            stream: Some(stream),
            sample_rate: config.sample_rate,
            buffer_size: config.frames_per_period,
        }))
    }
}

/// Build the output stream around the mixing callback
///
/// cpal has no way to end a stream from inside the callback, so once the
/// callback reports `Complete` every later period is filled with silence.
fn build_output_stream<T: NativeSample>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: MixCallback,
) -> AudioResult<Stream> {
    let mut completed = false;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                if completed {
                    T::silence(data);
                    return;
                }
                if callback(T::wrap(data)) == CallbackStatus::Complete {
                    completed = true;
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None, // No timeout (blocking)
        )
        .map_err(|e| AudioError::StreamOpen(e.to_string()))
}

/// Stream handle for [`CpalBackend`]
///
/// Dropping the inner `cpal::Stream` closes it and drops the callback.
pub struct CpalStream {
    stream: Option<Stream>,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioStream for CpalStream {
    fn start(&mut self) -> AudioResult<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| AudioError::StreamStart("stream is closed".to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::StreamStart(e.to_string()))
    }

    fn stop_and_close(&mut self) -> AudioResult<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        let paused = stream
            .pause()
            .map_err(|e| AudioError::StreamStop(e.to_string()));
        // Closed even if pausing failed
        drop(stream);
        paused
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> u32 {
        self.buffer_size
    }
}
