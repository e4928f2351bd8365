//! Mixer and stream configuration
//!
//! `MixerConfig` is what applications persist (YAML via [`crate::config`]);
//! `StreamConfig` is the subset a backend needs to open a stream.

use serde::{Deserialize, Serialize};

use crate::error::{MixerError, MixerResult};
use crate::types::{
    SampleFormat, DEFAULT_CHANNELS, DEFAULT_FRAMES_PER_PERIOD, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SAMPLE_RATE,
};

/// Audio device identifier
///
/// Includes both the device name and the host backend (JACK, ALSA, etc.)
/// so devices with the same name on different hosts can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "ALSA", "JACK", "CoreAudio")
    /// If None, every available host is searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }

    /// Inverse of [`display_label`](Self::display_label)
    ///
    /// `"[ALSA] hw:0,0"` pins the host; a bare name searches every host.
    pub fn parse_label(label: &str) -> Self {
        let label = label.trim();
        if let Some((host, name)) = label
            .strip_prefix('[')
            .and_then(|rest| rest.split_once("] "))
        {
            if !host.is_empty() && !name.is_empty() {
                return Self::with_host(name, host);
            }
        }
        Self::new(label)
    }
}

/// Parameters a backend needs to open an output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames_per_period: u32,
}

impl StreamConfig {
    /// Samples (all channels) in one period
    #[inline]
    pub fn samples_per_period(&self) -> usize {
        self.frames_per_period as usize * self.channels as usize
    }

    /// One-way output latency of a single period
    pub fn latency_ms(&self) -> f32 {
        (self.frames_per_period as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Configuration for a mixer engine
///
/// Format, rate and channel count are fixed for the engine's lifetime and
/// shared by every sound played through it (no resampling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Output sample format
    pub format: SampleFormat,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved output channels
    pub channels: u16,
    /// Frames requested from the backend per period
    pub frames_per_period: u32,
    /// Sounds that may be in flight at once (pending + active)
    pub queue_capacity: usize,
    /// Output device (None = system default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceId>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            format: SampleFormat::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            frames_per_period: DEFAULT_FRAMES_PER_PERIOD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            device: None,
        }
    }
}

impl MixerConfig {
    pub fn with_format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_frames_per_period(mut self, frames: u32) -> Self {
        self.frames_per_period = frames;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Reject configurations no backend could open
    pub fn validate(&self) -> MixerResult<()> {
        if self.sample_rate == 0 {
            return Err(MixerError::invalid("sample rate must be non-zero"));
        }
        if self.channels == 0 {
            return Err(MixerError::invalid("channel count must be non-zero"));
        }
        if self.frames_per_period == 0 {
            return Err(MixerError::invalid("frames per period must be non-zero"));
        }
        if self.queue_capacity == 0 {
            return Err(MixerError::invalid("queue capacity must be non-zero"));
        }
        Ok(())
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            format: self.format,
            sample_rate: self.sample_rate,
            channels: self.channels,
            frames_per_period: self.frames_per_period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MixerConfig::default();
        assert_eq!(config.format, SampleFormat::Float32);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channels, 2);
        assert!(config.validate().is_ok());
        assert_eq!(config.stream_config().samples_per_period(), 1024);
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        assert!(MixerConfig::default().with_channels(0).validate().is_err());
        assert!(MixerConfig::default().with_sample_rate(0).validate().is_err());
        assert!(MixerConfig::default().with_frames_per_period(0).validate().is_err());
        assert!(MixerConfig::default().with_queue_capacity(0).validate().is_err());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: MixerConfig = serde_yaml::from_str("format: Int16\nchannels: 1\n").unwrap();
        assert_eq!(config.format, SampleFormat::Int16);
        assert_eq!(config.channels, 1);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.device, None);
    }

    #[test]
    fn test_device_label() {
        assert_eq!(DeviceId::with_host("hw:0,0", "ALSA").display_label(), "[ALSA] hw:0,0");
        assert_eq!(DeviceId::new("default").display_label(), "default");
    }

    #[test]
    fn test_parse_device_label() {
        for id in [
            DeviceId::with_host("hw:0,0", "ALSA"),
            DeviceId::with_host("Speakers (Realtek [HD] Audio)", "WASAPI"),
            DeviceId::new("pulse"),
        ] {
            assert_eq!(DeviceId::parse_label(&id.display_label()), id);
        }
        assert_eq!(DeviceId::parse_label("[ALSA]"), DeviceId::new("[ALSA]"));
        assert_eq!(DeviceId::parse_label(" default \n"), DeviceId::new("default"));
    }
}
