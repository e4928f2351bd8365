//! Loading inputs and driving the engine until they finish

use std::path::{Path, PathBuf};
#[cfg(feature = "cpal-backend")]
use std::thread;
#[cfg(feature = "cpal-backend")]
use std::time::Duration;

use anyhow::{Context, Result};
#[cfg(feature = "cpal-backend")]
use mixdown_core::audio::{get_output_devices, AudioDevice, StreamConfig};
use mixdown_core::audio::{OfflineBackend, OfflineDriver};
use mixdown_core::{
    load_wav, save_wav, CompletionFlag, MixerConfig, MixerEngine, OutputBuffer, SampleFormat,
    SharedSound, SoundBuffer,
};

/// How often playback mode checks the completion flags
#[cfg(feature = "cpal-backend")]
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One input file ready for the engine
pub struct Track {
    pub path: PathBuf,
    pub sound: SharedSound,
    pub done: CompletionFlag,
}

/// Load every input and convert it to the engine's sample format
///
/// Rate and channel mismatches are only warned about: sounds are mixed as raw
/// interleaved samples, so they will play at the wrong speed or with the
/// channels shuffled.
pub fn load_tracks(paths: &[PathBuf], config: &MixerConfig) -> Result<Vec<Track>> {
    paths
        .iter()
        .map(|path| {
            let wav = load_wav(path).with_context(|| format!("Failed to load {:?}", path))?;
            let mut buffer = wav.buffer;

            if wav.info.format != config.format {
                log::info!(
                    "Converting {:?} from {} to {}",
                    path,
                    wav.info.format,
                    config.format
                );
                buffer
                    .ensure_format(config.format)
                    .with_context(|| format!("Failed to convert {:?}", path))?;
            }
            if wav.info.sample_rate != config.sample_rate {
                log::warn!(
                    "{:?} is {}Hz but the mixer runs at {}Hz (no resampling)",
                    path,
                    wav.info.sample_rate,
                    config.sample_rate
                );
            }
            if wav.info.channels != config.channels {
                log::warn!(
                    "{:?} has {} channels but the mixer has {}",
                    path,
                    wav.info.channels,
                    config.channels
                );
            }

            Ok(Track {
                path: path.clone(),
                sound: buffer.into_shared(),
                done: CompletionFlag::new(),
            })
        })
        .collect()
}

fn queue_all(engine: &MixerEngine, tracks: &[Track]) -> Result<()> {
    for track in tracks {
        engine
            .play(&track.sound, Some(&track.done))
            .with_context(|| format!("Failed to queue {:?}", track.path))?;
    }
    Ok(())
}

/// Play every track at once on the audio device and wait for all of them
#[cfg(feature = "cpal-backend")]
pub fn play(tracks: &[Track], config: &MixerConfig) -> Result<()> {
    let mut engine =
        MixerEngine::with_default_backend(config).context("Failed to open audio output")?;
    queue_all(&engine, tracks)?;
    engine.begin().context("Failed to start audio output")?;

    while tracks.iter().any(|track| track.done.is_playing()) {
        thread::sleep(POLL_INTERVAL);
    }
    // Let the device drain the last period before closing
    thread::sleep(POLL_INTERVAL);

    engine.destroy().context("Failed to close audio output")?;
    Ok(())
}

#[cfg(not(feature = "cpal-backend"))]
pub fn play(_tracks: &[Track], _config: &MixerConfig) -> Result<()> {
    anyhow::bail!("built without audio output; use --render OUT.wav")
}

/// One line per device, plus whether it can run `wanted` as-is
#[cfg(feature = "cpal-backend")]
pub fn describe_device(device: &AudioDevice, wanted: &StreamConfig) -> String {
    let formats: Vec<&str> = device.formats().iter().map(|f| f.name()).collect();
    format!(
        "{}\n    {} | up to {} channels | {}",
        device,
        formats.join(", "),
        device.max_channels(),
        if device.supports(wanted) {
            "usable with the current config"
        } else {
            "NOT usable with the current config"
        }
    )
}

/// Print every output device and whether it fits `config`
#[cfg(feature = "cpal-backend")]
pub fn list_devices(config: &MixerConfig) -> Result<()> {
    let devices = get_output_devices().context("Failed to list audio output devices")?;
    let wanted = config.stream_config();
    println!(
        "Output devices (config: {} {}Hz {}ch):",
        wanted.format, wanted.sample_rate, wanted.channels
    );
    for device in &devices {
        println!("{}", describe_device(device, &wanted));
    }
    println!("Select one with --device \"<label>\" or the `device` config key.");
    Ok(())
}

#[cfg(not(feature = "cpal-backend"))]
pub fn list_devices(_config: &MixerConfig) -> Result<()> {
    anyhow::bail!("built without audio output; no devices to list")
}

/// Mix every track offline and write the result to `out`
///
/// Returns the number of samples written.
pub fn render(tracks: &[Track], config: &MixerConfig, out: &Path) -> Result<usize> {
    let backend = OfflineBackend::new();
    let driver = backend.driver();
    let mut engine = MixerEngine::create(&backend, config).context("Failed to open offline stream")?;
    queue_all(&engine, tracks)?;
    engine.begin()?;

    let period_len = config.stream_config().samples_per_period();
    let buffer = match config.format {
        SampleFormat::Int16 => SoundBuffer::from_i16(render_until_done(
            &engine,
            &driver,
            period_len,
            |period: &mut [i16]| OutputBuffer::Int16(period),
        )?),
        SampleFormat::Float32 => SoundBuffer::from_f32(render_until_done(
            &engine,
            &driver,
            period_len,
            |period: &mut [f32]| OutputBuffer::Float32(period),
        )?),
    };
    engine.destroy()?;

    save_wav(out, &buffer, config.sample_rate, config.channels)
        .with_context(|| format!("Failed to write {:?}", out))?;
    Ok(buffer.len())
}

/// Render periods into one reused buffer until nothing is left in flight
fn render_until_done<T: Copy + Default>(
    engine: &MixerEngine,
    driver: &OfflineDriver,
    period_len: usize,
    wrap: impl Fn(&mut [T]) -> OutputBuffer<'_>,
) -> Result<Vec<T>> {
    let mut period = vec![T::default(); period_len];
    let mut mixed = Vec::new();

    while engine.stats().live() > 0 {
        driver
            .render_into(wrap(&mut period))
            .context("Offline stream stopped while sounds were still queued")?;
        mixed.extend_from_slice(&period);
    }
    Ok(mixed)
}
