//! Mixdown Player - plays several WAV files at once
//!
//! Every input starts at the same time and the program exits when the longest
//! one has finished.
//!
//! ## Command line
//!
//! - `--config PATH`: mixer config (default `<config dir>/mixdown/config.yaml`)
//! - `--render OUT.wav`: mix offline into a file instead of playing
//! - `--device LABEL`: output device, as printed by `--list-devices`
//! - `--list-devices`: print output devices and exit

mod cli;
mod session;

use anyhow::Result;

use cli::Args;
use mixdown_core::config::{default_config_path, load_mixer_config};
use mixdown_core::MixerError;

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = args.apply(load_mixer_config(&config_path));

    if args.list_devices {
        return session::list_devices(&config);
    }

    log::info!(
        "mixdown-player: {} input(s), {} {}Hz {}ch",
        args.inputs.len(),
        config.format,
        config.sample_rate,
        config.channels
    );

    let tracks = session::load_tracks(&args.inputs, &config)?;

    let result = match &args.render {
        Some(out) => session::render(&tracks, &config, out).map(|samples| {
            log::info!("Rendered {} samples to {:?}", samples, out);
        }),
        None => session::play(&tracks, &config),
    };

    if let Err(e) = &result {
        let device_problem = e.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<MixerError>(),
                Some(MixerError::Backend(audio)) if audio.is_config_problem()
            )
        });
        if device_problem {
            log::error!("Run with --list-devices to see which devices fit the config");
        }
    }

    // Free sounds released on the audio thread before exiting
    drop(tracks);
    mixdown_core::gc::flush();
    result
}
