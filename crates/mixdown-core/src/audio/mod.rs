//! Audio backends for mixdown
//!
//! The engine talks to audio output through the [`AudioBackend`] /
//! [`AudioStream`] traits:
//! - **CPAL** (`cpal-backend` feature): hardware output on Linux, Windows, macOS
//! - **Offline**: renders periods on demand, for files and tests
//!
//! # Real-time contract
//!
//! The backend calls the mixing callback on its own audio thread, once per
//! period, with an interleaved buffer of `frames × channels` samples in the
//! stream's native format. The callback must not block, allocate or log.

mod backend;
mod config;
mod error;
mod offline;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;
#[cfg(feature = "cpal-backend")]
mod device;

pub use backend::{AudioBackend, AudioStream, MixCallback};
pub use config::{DeviceId, MixerConfig, StreamConfig};
pub use error::{AudioError, AudioResult};
pub use offline::{OfflineBackend, OfflineDriver, OfflineStream, RenderedPeriod};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::{CpalBackend, CpalStream};
#[cfg(feature = "cpal-backend")]
pub use device::{
    check_support, find_device_by_id, get_default_device, get_output_devices, AudioDevice,
    SupportedStream,
};
