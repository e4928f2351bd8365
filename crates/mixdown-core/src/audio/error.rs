//! Errors from opening and driving output streams

use thiserror::Error;

use crate::types::SampleFormat;

/// Failure reported by an [`AudioBackend`](super::AudioBackend) or its stream
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output devices found")]
    NoDevices,

    #[error("No default audio output device")]
    NoDefaultDevice,

    /// Carries the device's display label
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// The host refused to list devices or their configurations
    #[error("Failed to query audio device: {0}")]
    DeviceQuery(String),

    /// The device has no native output in the mixer's sample format
    #[error("Audio device has no native {0} output")]
    UnsupportedFormat(SampleFormat),

    /// The format is available, but not with this channel count and rate
    #[error("Audio device can't play {channels} channels of {format} at {sample_rate}Hz")]
    UnsupportedStream {
        format: SampleFormat,
        channels: u16,
        sample_rate: u32,
    },

    #[error("Failed to open output stream: {0}")]
    StreamOpen(String),

    #[error("Failed to start output stream: {0}")]
    StreamStart(String),

    #[error("Failed to stop output stream: {0}")]
    StreamStop(String),
}

impl AudioError {
    /// The failure is about which device or format was asked for, not a
    /// broken stream; picking another device or config may help
    pub fn is_config_problem(&self) -> bool {
        matches!(
            self,
            AudioError::NoDevices
                | AudioError::NoDefaultDevice
                | AudioError::DeviceNotFound(_)
                | AudioError::UnsupportedFormat(_)
                | AudioError::UnsupportedStream { .. }
        )
    }
}

/// Result type for backend operations
pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_stream_message() {
        let err = AudioError::UnsupportedStream {
            format: SampleFormat::Int16,
            channels: 6,
            sample_rate: 96000,
        };
        assert_eq!(
            err.to_string(),
            "Audio device can't play 6 channels of int16 at 96000Hz"
        );
        assert!(err.is_config_problem());
    }

    #[test]
    fn test_stream_failures_are_not_config_problems() {
        assert!(!AudioError::StreamStart("device unplugged".into()).is_config_problem());
        assert!(AudioError::UnsupportedFormat(SampleFormat::Float32)
            .to_string()
            .contains("float32"));
    }
}
