//! The per-period mixing pass
//!
//! [`Mixer`] is everything the audio callback owns: the callback side of the
//! playback queue and the adder selected for the output format. One call to
//! [`Mixer::process`] is one period.

use crate::types::{CallbackStatus, OutputBuffer, SampleFormat};

use super::adder::SampleAdder;
use super::queue::PlaybackQueue;

/// Callback-side mixing state
pub struct Mixer {
    queue: PlaybackQueue,
    adder: SampleAdder,
}

impl Mixer {
    pub fn new(queue: PlaybackQueue, format: SampleFormat) -> Self {
        Self {
            queue,
            adder: SampleAdder::for_format(format),
        }
    }

    /// Mix one period into `out`
    ///
    /// Zeroes the buffer, adds every active entry, then prunes the ones that
    /// reached their end. Each entry's cursor advances by the full period even
    /// when fewer samples were left, so an entry finishes on the pass that
    /// mixes its last sample. Never fails and never asks the backend to stop.
    pub fn process(&mut self, mut out: OutputBuffer<'_>) -> CallbackStatus {
        out.fill_silence();

        let requested = out.len();
        let adder = self.adder;
        self.queue.for_each_active(|samples, cursor| {
            adder.add(samples, cursor, &mut out, requested);
            requested
        });

        self.queue.prune_finished();
        CallbackStatus::Continue
    }

    pub fn format(&self) -> SampleFormat {
        self.adder.format()
    }

    /// Entries mixed on the last pass that are still unfinished
    pub fn active_len(&self) -> usize {
        self.queue.len()
    }
}
