//! Common types for mixdown
//!
//! Sample formats, the output buffer handed to the mixing callback, and the
//! status the callback reports back to the audio backend.

use serde::{Deserialize, Serialize};

/// Default sample rate for new engines (CD rate)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default channel count (interleaved stereo)
pub const DEFAULT_CHANNELS: u16 = 2;

/// Default number of frames the backend requests per period
pub const DEFAULT_FRAMES_PER_PERIOD: u32 = 512;

/// Default number of in-flight sounds (pending + active)
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Scale applied when converting 16-bit samples to float (magnitude of `i16::MIN`)
pub const INT_TO_FLOAT_SCALE: f32 = 32768.0;

/// Scale applied when converting float samples to 16-bit (`i16::MAX`)
pub const FLOAT_TO_INT_SCALE: f32 = 32767.0;

/// Numeric encoding of a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleFormat {
    /// 16-bit signed integer
    Int16,
    /// 32-bit IEEE float
    #[default]
    Float32,
}

impl SampleFormat {
    /// Size of one sample in bytes
    #[inline]
    pub const fn sample_bytes(self) -> usize {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Float32 => 4,
        }
    }

    /// Bits per sample as written in a WAV `fmt ` chunk
    #[inline]
    pub const fn bits_per_sample(self) -> u16 {
        (self.sample_bytes() * 8) as u16
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::Int16 => "int16",
            SampleFormat::Float32 => "float32",
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Interleaved output buffer for one period, in the stream's native format
///
/// Length is `frames × channels` samples.
#[derive(Debug)]
pub enum OutputBuffer<'a> {
    Int16(&'a mut [i16]),
    Float32(&'a mut [f32]),
}

impl OutputBuffer<'_> {
    /// Number of samples (not frames) in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            OutputBuffer::Int16(buf) => buf.len(),
            OutputBuffer::Float32(buf) => buf.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn format(&self) -> SampleFormat {
        match self {
            OutputBuffer::Int16(_) => SampleFormat::Int16,
            OutputBuffer::Float32(_) => SampleFormat::Float32,
        }
    }

    /// Fill the buffer with silence (real-time safe)
    #[inline]
    pub fn fill_silence(&mut self) {
        match self {
            OutputBuffer::Int16(buf) => buf.fill(0),
            OutputBuffer::Float32(buf) => buf.fill(0.0),
        }
    }
}

/// What the mixing callback asks the backend to do after a period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    /// Keep requesting periods
    Continue,
    /// Stop the stream after this period
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_format_sizes() {
        assert_eq!(SampleFormat::Int16.sample_bytes(), 2);
        assert_eq!(SampleFormat::Float32.sample_bytes(), 4);
        assert_eq!(SampleFormat::Int16.bits_per_sample(), 16);
        assert_eq!(SampleFormat::Float32.bits_per_sample(), 32);
    }

    #[test]
    fn test_output_buffer_silence() {
        let mut data = [3i16, -7, 12];
        let mut out = OutputBuffer::Int16(&mut data);
        assert_eq!(out.len(), 3);
        assert_eq!(out.format(), SampleFormat::Int16);
        out.fill_silence();
        assert_eq!(data, [0, 0, 0]);

        let mut data = [0.25f32; 4];
        OutputBuffer::Float32(&mut data).fill_silence();
        assert_eq!(data, [0.0; 4]);
    }
}
