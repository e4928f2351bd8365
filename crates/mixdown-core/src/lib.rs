//! Mixdown Core - real-time additive mixing of independently timed sounds
//!
//! Sounds are queued from any thread with [`MixerEngine::play`] and summed,
//! sample by sample, into the period buffer the audio backend requests. The
//! callback never blocks, allocates or frees; finished sounds are pruned on
//! the audio thread and reclaimed by a background collector.
//!
//! - [`sound`]: owned sample buffers and format conversion
//! - [`engine`]: playback queue, sample adder, mixing pass, engine lifecycle
//! - [`audio`]: backend trait, CPAL and offline backends, stream config
//! - [`wav`]: WAV codec
//! - [`config`]: YAML config files

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod gc;
pub mod sound;
pub mod types;
pub mod wav;

pub use audio::{AudioBackend, AudioError, MixerConfig, OfflineBackend};
pub use engine::{CompletionFlag, MixerEngine, PlayHandle, QueueStats, StartPosition};
pub use error::{MixerError, MixerResult};
pub use sound::{Samples, SharedSound, SoundBuffer};
pub use types::*;
pub use wav::{load_wav, read_wav_info, save_wav, WavInfo, WavSound};
