//! Command line parsing

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use mixdown_core::audio::DeviceId;
use mixdown_core::MixerConfig;

pub const USAGE: &str = "usage: mixdown-player [--config PATH] [--device LABEL] [--render OUT.wav] FILE.wav...
       mixdown-player [--config PATH] --list-devices";

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// Config file (default: `<config dir>/mixdown/config.yaml`)
    pub config: Option<PathBuf>,
    /// Mix offline into this WAV file instead of playing
    pub render: Option<PathBuf>,
    /// Output device, overriding the config file
    pub device: Option<DeviceId>,
    /// Print the output devices and exit
    pub list_devices: bool,
    pub inputs: Vec<PathBuf>,
}

impl Args {
    /// Parse arguments, excluding the program name
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = None;
        let mut render = None;
        let mut device = None;
        let mut list_devices = false;
        let mut inputs = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    config = Some(PathBuf::from(path));
                }
                "--render" => {
                    let path = args.next().context("--render needs an output path")?;
                    render = Some(PathBuf::from(path));
                }
                "--device" => {
                    let label = args.next().context("--device needs a device label")?;
                    device = Some(DeviceId::parse_label(&label));
                }
                "--list-devices" => list_devices = true,
                flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
                _ => inputs.push(PathBuf::from(arg)),
            }
        }

        if inputs.is_empty() && !list_devices {
            bail!("no input files\n{}", USAGE);
        }

        Ok(Self {
            config,
            render,
            device,
            list_devices,
            inputs,
        })
    }

    /// Apply command line overrides on top of the loaded config
    pub fn apply(&self, mut config: MixerConfig) -> MixerConfig {
        if let Some(device) = &self.device {
            config.device = Some(device.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_inputs_only() {
        let args = parse(&["a.wav", "b.wav"]).unwrap();
        assert_eq!(args.inputs, vec![PathBuf::from("a.wav"), PathBuf::from("b.wav")]);
        assert_eq!(args.config, None);
        assert_eq!(args.render, None);
        assert_eq!(args.device, None);
        assert!(!args.list_devices);
    }

    #[test]
    fn test_options_anywhere() {
        let args = parse(&["a.wav", "--render", "out.wav", "--config", "c.yaml", "b.wav"]).unwrap();
        assert_eq!(args.render, Some(PathBuf::from("out.wav")));
        assert_eq!(args.config, Some(PathBuf::from("c.yaml")));
        assert_eq!(args.inputs.len(), 2);
    }

    #[test]
    fn test_list_devices_needs_no_inputs() {
        let args = parse(&["--list-devices"]).unwrap();
        assert!(args.list_devices);
        assert!(args.inputs.is_empty());
    }

    #[test]
    fn test_device_overrides_config() {
        let args = parse(&["--device", "[ALSA] hw:1,0", "a.wav"]).unwrap();
        assert_eq!(args.device, Some(DeviceId::with_host("hw:1,0", "ALSA")));

        let from_file = MixerConfig::default().with_device(DeviceId::new("pulse"));
        assert_eq!(
            args.apply(from_file).device,
            Some(DeviceId::with_host("hw:1,0", "ALSA"))
        );

        // Without --device the config file's choice stands
        let args = parse(&["a.wav"]).unwrap();
        let from_file = MixerConfig::default().with_device(DeviceId::new("pulse"));
        assert_eq!(args.apply(from_file).device, Some(DeviceId::new("pulse")));
    }

    #[test]
    fn test_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--render"]).is_err());
        assert!(parse(&["--device"]).is_err());
        assert!(parse(&["--loop", "a.wav"]).is_err());
    }
}
