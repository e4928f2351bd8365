//! Crate-level error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::audio::AudioError;

/// Errors returned by mixer, sound buffer, and WAV operations
#[derive(Error, Debug)]
pub enum MixerError {
    /// Stream open/start/stop failure in the audio backend
    #[error(transparent)]
    Backend(#[from] AudioError),

    /// Operation not valid for the current state (format mismatch, redundant conversion)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Sample storage could not be obtained
    #[error("Failed to allocate storage for {samples} samples")]
    Allocation { samples: usize },

    /// The insertion ring is full; the sound was not queued
    #[error("Playback queue is full ({capacity} sounds in flight)")]
    QueueFull { capacity: usize },

    /// A file could not be opened or created
    #[error("Failed to open '{}': {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file had an incorrect or unsupported header value
    #[error("Unsupported file type: {0}")]
    FileType(String),

    /// Error reading from a file
    #[error("Read error: {0}")]
    Read(#[source] io::Error),

    /// Error writing to a file
    #[error("Write error: {0}")]
    Write(#[source] io::Error),
}

impl MixerError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        MixerError::InvalidOperation(msg.into())
    }
}

/// Result type for mixer operations
pub type MixerResult<T> = Result<T, MixerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_converts() {
        let err: MixerError = AudioError::NoDevices.into();
        assert!(matches!(err, MixerError::Backend(AudioError::NoDevices)));
        assert_eq!(err.to_string(), "No audio output devices found");
    }

    #[test]
    fn test_file_open_message_includes_path() {
        let err = MixerError::FileOpen {
            path: PathBuf::from("/tmp/missing.wav"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/tmp/missing.wav"));
    }
}
