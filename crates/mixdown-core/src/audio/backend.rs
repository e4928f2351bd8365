//! Backend trait for output streams
//!
//! The engine only needs three things from an audio backend: open a stream
//! bound to a mixing callback, start it, and stop/close it. Implementations:
//! - **CPAL**: hardware output on every desktop platform (`cpal-backend` feature)
//! - **Offline**: no hardware, periods rendered on demand by the caller

use crate::types::{CallbackStatus, OutputBuffer};

use super::config::StreamConfig;
use super::error::AudioResult;

/// Mixing callback invoked once per period on the backend's audio thread
pub type MixCallback = Box<dyn FnMut(OutputBuffer<'_>) -> CallbackStatus + Send + 'static>;

/// Something that can open an output stream
pub trait AudioBackend {
    /// Open (but don't start) a stream that calls `callback` once per period
    ///
    /// The callback is owned by the stream from here on. If opening fails the
    /// callback is dropped before this returns.
    fn open_stream(
        &self,
        config: &StreamConfig,
        callback: MixCallback,
    ) -> AudioResult<Box<dyn AudioStream>>;
}

/// An open output stream
///
/// Dropping the stream closes it; `stop_and_close` does so explicitly and
/// reports failures.
pub trait AudioStream {
    /// Start requesting periods
    fn start(&mut self) -> AudioResult<()>;

    /// Stop the stream and release it. The callback never runs again after
    /// this returns. Calling it twice is a no-op.
    fn stop_and_close(&mut self) -> AudioResult<()>;

    /// Sample rate the stream was opened with
    fn sample_rate(&self) -> u32;

    /// Buffer size in frames
    fn buffer_size(&self) -> u32;

    /// Audio latency in milliseconds (one-way, output only)
    fn latency_ms(&self) -> f32 {
        (self.buffer_size() as f32 / self.sample_rate() as f32) * 1000.0
    }
}
