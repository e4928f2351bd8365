//! Output device discovery and capability checks
//!
//! Devices are listed across every available cpal host, so a [`DeviceId`] can
//! pin both the device and the host. The mixer never converts or resamples,
//! so a device is only usable if it natively offers the engine's exact sample
//! format, channel count and rate.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use crate::types::SampleFormat;

use super::config::{DeviceId, StreamConfig};
use super::error::{AudioError, AudioResult};

/// Label used for a host in `DeviceId::host`
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

fn host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|&host_id| host_name(host_id) == name)
        .and_then(|host_id| cpal::host_from_id(host_id).ok())
}

fn mixer_format(format: cpal::SampleFormat) -> Option<SampleFormat> {
    match format {
        cpal::SampleFormat::I16 => Some(SampleFormat::Int16),
        cpal::SampleFormat::F32 => Some(SampleFormat::Float32),
        _ => None,
    }
}

/// One native output configuration range the mixer could drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedStream {
    pub format: SampleFormat,
    pub channels: u16,
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
}

impl SupportedStream {
    fn from_cpal(range: &cpal::SupportedStreamConfigRange) -> Option<Self> {
        Some(Self {
            format: mixer_format(range.sample_format())?,
            channels: range.channels(),
            min_sample_rate: range.min_sample_rate().0,
            max_sample_rate: range.max_sample_rate().0,
        })
    }

    pub fn matches(&self, config: &StreamConfig) -> bool {
        self.format == config.format
            && self.channels == config.channels
            && (self.min_sample_rate..=self.max_sample_rate).contains(&config.sample_rate)
    }
}

/// Check `config` against a device's native configurations
///
/// Reports a missing format separately from a channel/rate mismatch so the
/// user knows which setting to change.
pub fn check_support(supported: &[SupportedStream], config: &StreamConfig) -> AudioResult<()> {
    if !supported.iter().any(|s| s.format == config.format) {
        return Err(AudioError::UnsupportedFormat(config.format));
    }
    if !supported.iter().any(|s| s.matches(config)) {
        return Err(AudioError::UnsupportedStream {
            format: config.format,
            channels: config.channels,
            sample_rate: config.sample_rate,
        });
    }
    Ok(())
}

fn supported_streams(device: &cpal::Device) -> AudioResult<Vec<SupportedStream>> {
    Ok(device
        .supported_output_configs()
        .map_err(|e| AudioError::DeviceQuery(e.to_string()))?
        .filter_map(|range| SupportedStream::from_cpal(&range))
        .collect())
}

/// An output device and what the mixer can play on it
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Pass this as `MixerConfig::device` to select the device
    pub id: DeviceId,
    /// Default device of its host
    pub is_default: bool,
    pub supported: Vec<SupportedStream>,
}

impl AudioDevice {
    pub fn supports(&self, config: &StreamConfig) -> bool {
        check_support(&self.supported, config).is_ok()
    }

    /// Native formats the mixer can use, in `SampleFormat` order
    pub fn formats(&self) -> Vec<SampleFormat> {
        let mut formats: Vec<_> = self.supported.iter().map(|s| s.format).collect();
        formats.sort_by_key(|f| f.sample_bytes());
        formats.dedup();
        formats
    }

    pub fn max_channels(&self) -> u16 {
        self.supported.iter().map(|s| s.channels).max().unwrap_or(0)
    }
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id.display_label())?;
        if self.is_default {
            f.write_str(" (default)")?;
        }
        Ok(())
    }
}

/// Every output device, on every host, that offers an int16 or float32 stream
///
/// Defaults sort first, then by host and name.
pub fn get_output_devices() -> AudioResult<Vec<AudioDevice>> {
    let mut devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Skipping host {:?}: {}", host_id, e);
                continue;
            }
        };
        let host_label = host_name(host_id);
        let default_name = host
            .default_output_device()
            .and_then(|d: cpal::Device| d.name().ok());

        let outputs = match host.output_devices() {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Could not list {} devices: {}", host_label, e);
                continue;
            }
        };

        for device in outputs {
            let Ok(name) = device.name() else {
                continue;
            };
            let supported = match supported_streams(&device) {
                Ok(s) if !s.is_empty() => s,
                _ => continue,
            };
            devices.push(AudioDevice {
                is_default: default_name.as_ref() == Some(&name),
                id: DeviceId::with_host(&name, &host_label),
                supported,
            });
        }
    }

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.id.host.cmp(&b.id.host))
            .then_with(|| a.id.name.cmp(&b.id.name))
    });
    log::debug!("Found {} usable output devices", devices.len());
    Ok(devices)
}

fn named(id: &DeviceId) -> impl Fn(&cpal::Device) -> bool + '_ {
    move |d| d.name().ok().as_deref() == Some(id.name.as_str())
}

/// Open the device `id` names
///
/// Searches only the named host when `id.host` is set, otherwise every host.
pub fn find_device_by_id(id: &DeviceId) -> AudioResult<cpal::Device> {
    if let Some(host) = id.host.as_deref().and_then(host_by_name) {
        return host
            .output_devices()
            .map_err(|e| AudioError::DeviceQuery(e.to_string()))?
            .find(named(id))
            .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
    }

    cpal::available_hosts()
        .into_iter()
        .filter_map(|host_id| cpal::host_from_id(host_id).ok())
        .find_map(|host| host.output_devices().ok()?.find(named(id)))
        .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()))
}

/// The default output device of the default host
pub fn get_default_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::NoDefaultDevice)
}

/// Check that `device` can run `config` natively
pub fn check_stream_support(device: &cpal::Device, config: &StreamConfig) -> AudioResult<()> {
    check_support(&supported_streams(device)?, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(format: SampleFormat, channels: u16, min: u32, max: u32) -> SupportedStream {
        SupportedStream {
            format,
            channels,
            min_sample_rate: min,
            max_sample_rate: max,
        }
    }

    fn request(format: SampleFormat, channels: u16, sample_rate: u32) -> StreamConfig {
        StreamConfig {
            format,
            sample_rate,
            channels,
            frames_per_period: 512,
        }
    }

    fn device(supported: Vec<SupportedStream>) -> AudioDevice {
        AudioDevice {
            id: DeviceId::with_host("hw:0,0", "ALSA"),
            is_default: true,
            supported,
        }
    }

    #[test]
    fn test_check_support_distinguishes_format_from_layout() {
        let supported = [
            stream(SampleFormat::Float32, 2, 44100, 48000),
            stream(SampleFormat::Int16, 8, 8000, 192000),
        ];

        assert!(check_support(&supported, &request(SampleFormat::Float32, 2, 48000)).is_ok());
        assert!(check_support(&supported, &request(SampleFormat::Int16, 8, 96000)).is_ok());
        assert!(matches!(
            check_support(&supported, &request(SampleFormat::Float32, 2, 96000)),
            Err(AudioError::UnsupportedStream { sample_rate: 96000, .. })
        ));
        assert!(matches!(
            check_support(&supported, &request(SampleFormat::Int16, 2, 44100)),
            Err(AudioError::UnsupportedStream { channels: 2, .. })
        ));
        assert!(matches!(
            check_support(&supported[..1], &request(SampleFormat::Int16, 2, 44100)),
            Err(AudioError::UnsupportedFormat(SampleFormat::Int16))
        ));
    }

    #[test]
    fn test_device_summary() {
        let dev = device(vec![
            stream(SampleFormat::Float32, 2, 44100, 48000),
            stream(SampleFormat::Int16, 6, 44100, 48000),
            stream(SampleFormat::Float32, 6, 44100, 48000),
        ]);
        assert_eq!(dev.formats(), vec![SampleFormat::Int16, SampleFormat::Float32]);
        assert_eq!(dev.max_channels(), 6);
        assert!(dev.supports(&request(SampleFormat::Int16, 6, 44100)));
        assert!(!dev.supports(&request(SampleFormat::Int16, 2, 44100)));
        assert_eq!(dev.to_string(), "[ALSA] hw:0,0 (default)");
    }

    #[test]
    fn test_listed_devices_are_selectable() {
        // Machines without audio report NoDevices instead of panicking
        let devices = match get_output_devices() {
            Ok(devices) => devices,
            Err(AudioError::NoDevices) => return,
            Err(e) => panic!("enumeration failed: {}", e),
        };
        for dev in &devices {
            assert!(!dev.supported.is_empty());
            assert_eq!(DeviceId::parse_label(&dev.id.display_label()), dev.id);
        }
    }

    #[test]
    fn test_unknown_device_not_found() {
        let id = DeviceId::with_host("definitely-not-a-device", "NoSuchHost");
        assert!(matches!(
            find_device_by_id(&id),
            Err(AudioError::DeviceNotFound(_))
        ));
    }
}
