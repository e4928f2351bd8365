//! Per-format additive mixing of a source range into an output buffer
//!
//! No clamping is applied in either format: 16-bit addition wraps on
//! overflow and float addition follows IEEE semantics.

use crate::sound::Samples;
use crate::types::{OutputBuffer, SampleFormat};

/// A sample type that can be summed into an output buffer
pub trait MixSample: Copy {
    fn mix(self, other: Self) -> Self;
}

impl MixSample for i16 {
    #[inline(always)]
    fn mix(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
}

impl MixSample for f32 {
    #[inline(always)]
    fn mix(self, other: Self) -> Self {
        self + other
    }
}

/// Add `source[cursor..]` into `dest`, at most `requested` samples
///
/// Returns the number of samples actually summed:
/// `min(requested, source.len() - cursor)`, or 0 when the cursor is already
/// past the end of the source.
#[inline]
pub fn add_samples<T: MixSample>(
    source: &[T],
    cursor: usize,
    dest: &mut [T],
    requested: usize,
) -> usize {
    debug_assert!(requested <= dest.len(), "requested more samples than the period holds");
    let requested = requested.min(dest.len());
    let consumed = requested.min(source.len().saturating_sub(cursor));

    if consumed == 0 {
        return 0;
    }

    for (out, &sample) in dest[..consumed]
        .iter_mut()
        .zip(&source[cursor..cursor + consumed])
    {
        *out = out.mix(sample);
    }

    consumed
}

/// Sample adder selected once from the engine's output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleAdder {
    Int16,
    Float32,
}

impl SampleAdder {
    pub fn for_format(format: SampleFormat) -> Self {
        match format {
            SampleFormat::Int16 => SampleAdder::Int16,
            SampleFormat::Float32 => SampleAdder::Float32,
        }
    }

    pub fn format(self) -> SampleFormat {
        match self {
            SampleAdder::Int16 => SampleFormat::Int16,
            SampleAdder::Float32 => SampleFormat::Float32,
        }
    }

    /// Mix one entry's samples into the period buffer
    ///
    /// Source and destination formats always match this adder; `play()`
    /// rejects anything else before it reaches the queue. A mismatch here is a
    /// programming error: it asserts in debug builds and mixes nothing in
    /// release builds so the audio thread never panics.
    #[inline]
    pub fn add(
        self,
        source: &Samples,
        cursor: usize,
        dest: &mut OutputBuffer<'_>,
        requested: usize,
    ) -> usize {
        match (self, source, dest) {
            (SampleAdder::Int16, Samples::Int16(src), OutputBuffer::Int16(dst)) => {
                add_samples(src.as_slice(), cursor, &mut dst[..], requested)
            }
            (SampleAdder::Float32, Samples::Float32(src), OutputBuffer::Float32(dst)) => {
                add_samples(src.as_slice(), cursor, &mut dst[..], requested)
            }
            _ => {
                debug_assert!(false, "sample adder format mismatch");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumed_is_min_of_requested_and_remaining() {
        let source = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let mut dest = [0.0f32; 4];

        assert_eq!(add_samples(&source, 0, &mut dest, 4), 4);
        assert_eq!(dest, [1.0, 2.0, 3.0, 4.0]);

        let mut dest = [0.0f32; 4];
        assert_eq!(add_samples(&source, 3, &mut dest, 4), 2);
        assert_eq!(dest, [4.0, 5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cursor_at_or_past_end_adds_nothing() {
        let source = [1i16, 2];
        let mut dest = [7i16; 3];

        assert_eq!(add_samples(&source, 2, &mut dest, 3), 0);
        assert_eq!(add_samples(&source, 10, &mut dest, 3), 0);
        assert_eq!(dest, [7, 7, 7]);
    }

    #[test]
    fn test_int16_wraps_instead_of_clamping() {
        let source = [30000i16, -30000];
        let mut dest = [10000i16, -10000];

        add_samples(&source, 0, &mut dest, 2);
        assert_eq!(dest, [30000i16.wrapping_add(10000), (-30000i16).wrapping_add(-10000)]);
        assert_eq!(dest, [-25536, 25536]);
    }

    #[test]
    fn test_float_is_unclamped() {
        let source = [0.8f32, -0.9];
        let mut dest = [0.8f32, -0.9];

        add_samples(&source, 0, &mut dest, 2);
        assert_eq!(dest, [1.6, -1.8]);
    }

    #[test]
    fn test_adder_dispatch() {
        let adder = SampleAdder::for_format(SampleFormat::Int16);
        assert_eq!(adder.format(), SampleFormat::Int16);

        let source = Samples::Int16(vec![5, 6, 7]);
        let mut data = [1i16; 4];
        let mut out = OutputBuffer::Int16(&mut data);

        assert_eq!(adder.add(&source, 1, &mut out, 4), 2);
        assert_eq!(data, [7, 8, 1, 1]);
    }
}
