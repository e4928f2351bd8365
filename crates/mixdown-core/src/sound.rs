//! Owned sound buffers
//!
//! A [`SoundBuffer`] is a fixed-size block of interleaved samples in one of
//! the two supported formats. The application owns it; to play it, the buffer
//! is frozen into a [`SharedSound`] whose clones the playback queue holds.

use basedrop::Shared;

use crate::error::{MixerError, MixerResult};
use crate::gc::gc_handle;
use crate::types::{SampleFormat, FLOAT_TO_INT_SCALE, INT_TO_FLOAT_SCALE};

/// Immutable, reference-counted sound shared with the playback queue
///
/// Dropping the last clone on the audio thread defers deallocation to the
/// collector thread (see [`crate::gc`]).
pub type SharedSound = Shared<SoundBuffer>;

/// Sample storage tagged with its format
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Samples {
    /// Uninitialized buffer (no format yet)
    #[default]
    Empty,
    Int16(Vec<i16>),
    Float32(Vec<f32>),
}

impl Samples {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Samples::Empty => 0,
            Samples::Int16(data) => data.len(),
            Samples::Float32(data) => data.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn format(&self) -> Option<SampleFormat> {
        match self {
            Samples::Empty => None,
            Samples::Int16(_) => Some(SampleFormat::Int16),
            Samples::Float32(_) => Some(SampleFormat::Float32),
        }
    }
}

/// Reserve exactly `len` slots, reporting failure instead of aborting
fn try_with_capacity<T>(len: usize) -> MixerResult<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| MixerError::Allocation { samples: len })?;
    Ok(data)
}

/// An owned buffer of interleaved audio samples
#[derive(Debug, Default, PartialEq)]
pub struct SoundBuffer {
    samples: Samples,
}

impl SoundBuffer {
    /// Create a zero-filled buffer of `num_samples` samples
    pub fn new(num_samples: usize, format: SampleFormat) -> MixerResult<Self> {
        let samples = match format {
            SampleFormat::Int16 => {
                let mut data = try_with_capacity(num_samples)?;
                data.resize(num_samples, 0i16);
                Samples::Int16(data)
            }
            SampleFormat::Float32 => {
                let mut data = try_with_capacity(num_samples)?;
                data.resize(num_samples, 0.0f32);
                Samples::Float32(data)
            }
        };
        Ok(Self { samples })
    }

    /// Wrap existing 16-bit samples
    pub fn from_i16(data: Vec<i16>) -> Self {
        Self { samples: Samples::Int16(data) }
    }

    /// Wrap existing float samples
    pub fn from_f32(data: Vec<f32>) -> Self {
        Self { samples: Samples::Float32(data) }
    }

    /// Number of samples (all channels)
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample format, or `None` for an uninitialized buffer
    #[inline]
    pub fn format(&self) -> Option<SampleFormat> {
        self.samples.format()
    }

    /// Size of the sample storage in bytes
    pub fn size_bytes(&self) -> usize {
        self.format()
            .map_or(0, |format| self.len() * format.sample_bytes())
    }

    /// Playback length when interpreted at the given rate and channel count
    pub fn duration_seconds(&self, sample_rate: u32, channels: u16) -> f64 {
        let per_second = sample_rate as f64 * channels as f64;
        if per_second == 0.0 {
            return 0.0;
        }
        self.len() as f64 / per_second
    }

    #[inline]
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Mutable sample storage. The format can't be changed through this.
    pub fn as_i16_mut(&mut self) -> Option<&mut [i16]> {
        match &mut self.samples {
            Samples::Int16(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.samples {
            Samples::Float32(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<&[i16]> {
        match &self.samples {
            Samples::Int16(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.samples {
            Samples::Float32(data) => Some(data),
            _ => None,
        }
    }

    /// Convert 16-bit samples to float in place (reallocates)
    ///
    /// Each sample is divided by 32768, giving values in [-1.0, 1.0).
    pub fn convert_to_float(&mut self) -> MixerResult<()> {
        let Samples::Int16(src) = &self.samples else {
            return Err(MixerError::invalid(format!(
                "convert_to_float requires an int16 buffer, found {}",
                self.format_label()
            )));
        };

        let mut data = try_with_capacity(src.len())?;
        data.extend(src.iter().map(|&s| s as f32 / INT_TO_FLOAT_SCALE));
        self.samples = Samples::Float32(data);
        Ok(())
    }

    /// Convert float samples to 16-bit in place (reallocates)
    ///
    /// Each sample is multiplied by 32767 and truncated toward zero; values
    /// outside [-1.0, 1.0] saturate. Because the two directions use different
    /// scales, int16 -> float -> int16 may move a sample one step toward zero.
    pub fn convert_to_integer(&mut self) -> MixerResult<()> {
        let Samples::Float32(src) = &self.samples else {
            return Err(MixerError::invalid(format!(
                "convert_to_integer requires a float32 buffer, found {}",
                self.format_label()
            )));
        };

        let mut data = try_with_capacity(src.len())?;
        data.extend(src.iter().map(|&s| (s * FLOAT_TO_INT_SCALE) as i16));
        self.samples = Samples::Int16(data);
        Ok(())
    }

    /// Convert to `format` unless the buffer is already in it
    pub fn ensure_format(&mut self, format: SampleFormat) -> MixerResult<()> {
        match (self.format(), format) {
            (Some(current), wanted) if current == wanted => Ok(()),
            (Some(SampleFormat::Int16), SampleFormat::Float32) => self.convert_to_float(),
            (Some(SampleFormat::Float32), SampleFormat::Int16) => self.convert_to_integer(),
            _ => Err(MixerError::invalid("cannot convert an uninitialized buffer")),
        }
    }

    /// Independent copy with identical contents and format
    pub fn copy(&self) -> MixerResult<Self> {
        let samples = match &self.samples {
            Samples::Empty => Samples::Empty,
            Samples::Int16(src) => {
                let mut data = try_with_capacity(src.len())?;
                data.extend_from_slice(src);
                Samples::Int16(data)
            }
            Samples::Float32(src) => {
                let mut data = try_with_capacity(src.len())?;
                data.extend_from_slice(src);
                Samples::Float32(data)
            }
        };
        Ok(Self { samples })
    }

    /// Freeze the buffer so it can be handed to a mixer
    pub fn into_shared(self) -> SharedSound {
        Shared::new(&gc_handle(), self)
    }

    fn format_label(&self) -> &'static str {
        self.format().map_or("uninitialized", |f| f.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zero_filled() {
        let buffer = SoundBuffer::new(8, SampleFormat::Int16).unwrap();
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.format(), Some(SampleFormat::Int16));
        assert_eq!(buffer.as_i16().unwrap(), &[0; 8]);
        assert_eq!(buffer.size_bytes(), 16);

        let buffer = SoundBuffer::new(3, SampleFormat::Float32).unwrap();
        assert_eq!(buffer.as_f32().unwrap(), &[0.0; 3]);
        assert_eq!(buffer.size_bytes(), 12);
    }

    #[test]
    fn test_default_is_uninitialized() {
        let mut buffer = SoundBuffer::default();
        assert_eq!(buffer.format(), None);
        assert_eq!(buffer.size_bytes(), 0);
        assert!(matches!(
            buffer.convert_to_float(),
            Err(MixerError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_huge_allocation_fails_cleanly() {
        let result = SoundBuffer::new(usize::MAX / 2, SampleFormat::Float32);
        assert!(matches!(result, Err(MixerError::Allocation { .. })));
    }

    #[test]
    fn test_int_to_float_scale() {
        let mut buffer = SoundBuffer::from_i16(vec![0, 16384, -16384, i16::MIN, i16::MAX]);
        buffer.convert_to_float().unwrap();

        let data = buffer.as_f32().unwrap();
        assert_eq!(data[0], 0.0);
        assert_eq!(data[1], 0.5);
        assert_eq!(data[2], -0.5);
        assert_eq!(data[3], -1.0);
        assert_eq!(data[4], 32767.0 / 32768.0);
    }

    #[test]
    fn test_float_to_int_truncates_and_saturates() {
        let mut buffer = SoundBuffer::from_f32(vec![1.0, -1.0, 0.5, 0.99999, 2.0, -3.0]);
        buffer.convert_to_integer().unwrap();

        // 0.5 * 32767 = 16383.5 -> 16383, 0.99999 * 32767 = 32766.67 -> 32766
        assert_eq!(
            buffer.as_i16().unwrap(),
            &[32767, -32767, 16383, 32766, i16::MAX, i16::MIN]
        );
    }

    #[test]
    fn test_convert_to_same_format_is_invalid() {
        let mut ints = SoundBuffer::from_i16(vec![1, 2]);
        assert!(matches!(
            ints.convert_to_integer(),
            Err(MixerError::InvalidOperation(_))
        ));
        assert_eq!(ints.as_i16().unwrap(), &[1, 2]);

        let mut floats = SoundBuffer::from_f32(vec![0.1]);
        assert!(matches!(
            floats.convert_to_float(),
            Err(MixerError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_round_trip_within_one_lsb() {
        let original: Vec<i16> = (i16::MIN..=i16::MAX).collect();
        let mut buffer = SoundBuffer::from_i16(original.clone());
        buffer.convert_to_float().unwrap();
        buffer.convert_to_integer().unwrap();

        for (&before, &after) in original.iter().zip(buffer.as_i16().unwrap()) {
            let diff = (before as i32 - after as i32).abs();
            assert!(diff <= 1, "{} came back as {}", before, after);
            // Truncation only ever moves toward zero
            assert!((after as i32).abs() <= (before as i32).abs());
        }
    }

    #[test]
    fn test_ensure_format() {
        let mut buffer = SoundBuffer::from_i16(vec![16384]);
        buffer.ensure_format(SampleFormat::Int16).unwrap();
        assert_eq!(buffer.format(), Some(SampleFormat::Int16));

        buffer.ensure_format(SampleFormat::Float32).unwrap();
        assert_eq!(buffer.as_f32().unwrap(), &[0.5]);
    }

    #[test]
    fn test_copy_is_independent() {
        let original = SoundBuffer::from_f32(vec![0.25, -0.25]);
        let mut copy = original.copy().unwrap();
        assert_eq!(copy, original);

        copy.as_f32_mut().unwrap()[0] = 1.0;
        assert_eq!(original.as_f32().unwrap(), &[0.25, -0.25]);
        assert_ne!(
            copy.as_f32().unwrap().as_ptr(),
            original.as_f32().unwrap().as_ptr()
        );
    }

    #[test]
    fn test_duration_seconds() {
        let buffer = SoundBuffer::new(88200, SampleFormat::Int16).unwrap();
        assert_eq!(buffer.duration_seconds(44100, 2), 1.0);
        assert_eq!(buffer.duration_seconds(0, 2), 0.0);
    }
}
