//! Playback engine - queue, adder, mixing pass
//!
//! - PlaybackQueue: sounds in flight, shared between control threads and the
//!   audio callback
//! - SampleAdder: per-format additive mixing
//! - Mixer: one mixing pass per audio period
//! - MixerEngine: stream lifecycle and the `play()` API

mod adder;
mod engine;
mod mixer;
mod queue;

pub use adder::*;
pub use engine::*;
pub use mixer::*;
pub use queue::*;
