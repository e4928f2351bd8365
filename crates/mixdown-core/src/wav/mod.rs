//! WAV file reading and writing
//!
//! Supports the two sample formats the mixer plays natively:
//! - format tag 1 (PCM) with 16 bits per sample → [`SampleFormat::Int16`]
//! - format tag 3 (IEEE float) with 32 bits per sample → [`SampleFormat::Float32`]
//!
//! Reading scans the RIFF chunk list: the `fmt ` chunk may carry an extension
//! (including WAVE_FORMAT_EXTENSIBLE), and chunks other than `fmt ` and `data`
//! are skipped. Writing produces the canonical 44-byte header followed by a
//! single `data` chunk.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{MixerError, MixerResult};
use crate::sound::{Samples, SoundBuffer};
use crate::types::SampleFormat;

/// PCM integer samples
const FORMAT_PCM: u16 = 1;
/// IEEE float samples
const FORMAT_IEEE_FLOAT: u16 = 3;
/// Real format tag lives in the first two bytes of the sub-format GUID
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Size of the basic `fmt ` chunk body
const FMT_CHUNK_SIZE: u32 = 16;
/// Offset of the sub-format GUID inside an extensible `fmt ` chunk
const EXTENSIBLE_SUBFORMAT_OFFSET: usize = 24;

/// Bytes of the canonical header before the sample payload
pub const WAV_HEADER_SIZE: usize = 44;

/// Bytes decoded per read while filling sample storage
const READ_BLOCK_BYTES: usize = 16 * 1024;

/// Stream parameters from a WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    /// Taken from the header's channel field
    pub channels: u16,
    pub format: SampleFormat,
    /// Whole samples in the `data` chunk (all channels)
    pub num_samples: usize,
}

impl WavInfo {
    pub fn duration_seconds(&self) -> f64 {
        let per_second = self.sample_rate as f64 * self.channels as f64;
        if per_second == 0.0 {
            return 0.0;
        }
        self.num_samples as f64 / per_second
    }
}

/// A decoded WAV file
#[derive(Debug)]
pub struct WavSound {
    pub buffer: SoundBuffer,
    pub info: WavInfo,
}

fn read_err(e: io::Error) -> MixerError {
    MixerError::Read(e)
}

fn write_err(e: io::Error) -> MixerError {
    MixerError::Write(e)
}

fn open(path: &Path) -> MixerResult<BufReader<File>> {
    let file = File::open(path).map_err(|source| MixerError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Read only the header of a WAV file
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> MixerResult<WavInfo> {
    let mut reader = open(path.as_ref())?;
    read_header(&mut reader)
}

/// Decode a WAV file into a sound buffer
pub fn load_wav<P: AsRef<Path>>(path: P) -> MixerResult<WavSound> {
    let path = path.as_ref();
    let mut reader = open(path)?;
    let sound = decode_wav(&mut reader)?;

    log::info!(
        "Loaded {}: {} samples, {}Hz, {}ch, {} ({:.2}s)",
        path.display(),
        sound.info.num_samples,
        sound.info.sample_rate,
        sound.info.channels,
        sound.info.format,
        sound.info.duration_seconds()
    );
    Ok(sound)
}

/// Encode `buffer` into a WAV file, replacing any existing file
pub fn save_wav<P: AsRef<Path>>(
    path: P,
    buffer: &SoundBuffer,
    sample_rate: u32,
    channels: u16,
) -> MixerResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| MixerError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    encode_wav(&mut writer, buffer, sample_rate, channels)?;
    writer.flush().map_err(write_err)?;

    log::info!(
        "Saved {}: {} samples, {}Hz, {}ch, {}",
        path.display(),
        buffer.len(),
        sample_rate,
        channels,
        buffer.format().map_or("uninitialized", |f| f.name())
    );
    Ok(())
}

/// Decode a WAV stream
///
/// Leaves the reader just past the samples that were read.
pub fn decode_wav<R: Read + Seek>(reader: &mut R) -> MixerResult<WavSound> {
    let info = read_header(reader)?;

    // Don't trust the declared size with an allocation the stream can't fill
    let declared = info.num_samples as u64 * info.format.sample_bytes() as u64;
    let available = bytes_remaining(reader)?;
    if declared > available {
        return Err(read_err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "data chunk declares {} bytes but only {} follow",
                declared, available
            ),
        )));
    }

    let mut buffer = SoundBuffer::new(info.num_samples, info.format)?;

    match buffer.format() {
        Some(SampleFormat::Int16) => {
            if let Some(dest) = buffer.as_i16_mut() {
                read_samples(reader, dest, |b| i16::from_le_bytes([b[0], b[1]]))?;
            }
        }
        Some(SampleFormat::Float32) => {
            if let Some(dest) = buffer.as_f32_mut() {
                read_samples(reader, dest, |b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))?;
            }
        }
        None => {}
    }

    Ok(WavSound { buffer, info })
}

/// Fill `dest` from the payload, decoding `size_of::<T>()` bytes per sample
fn read_samples<R: Read, T>(reader: &mut R, dest: &mut [T], decode: impl Fn(&[u8]) -> T) -> MixerResult<()> {
    let sample_bytes = std::mem::size_of::<T>();
    let per_block = READ_BLOCK_BYTES / sample_bytes;
    let mut bytes = vec![0u8; per_block * sample_bytes];

    for chunk in dest.chunks_mut(per_block) {
        let raw = &mut bytes[..chunk.len() * sample_bytes];
        reader.read_exact(raw).map_err(read_err)?;
        for (sample, raw) in chunk.iter_mut().zip(raw.chunks_exact(sample_bytes)) {
            *sample = decode(raw);
        }
    }
    Ok(())
}

fn read_tag<R: Read>(reader: &mut R) -> MixerResult<[u8; 4]> {
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag).map_err(read_err)?;
    Ok(tag)
}

fn read_u32<R: Read>(reader: &mut R) -> MixerResult<u32> {
    Ok(u32::from_le_bytes(read_tag(reader)?))
}

fn bytes_remaining<R: Seek>(reader: &mut R) -> MixerResult<u64> {
    let here = reader.stream_position().map_err(read_err)?;
    let end = reader.seek(SeekFrom::End(0)).map_err(read_err)?;
    reader.seek(SeekFrom::Start(here)).map_err(read_err)?;
    Ok(end.saturating_sub(here))
}

fn skip<R: Seek>(reader: &mut R, bytes: u64) -> MixerResult<()> {
    if bytes > 0 {
        reader
            .seek(SeekFrom::Current(bytes as i64))
            .map_err(read_err)?;
    }
    Ok(())
}

/// Parsed `fmt ` fields we care about
struct FmtChunk {
    format: SampleFormat,
    channels: u16,
    sample_rate: u32,
}

/// Parse the RIFF header and chunk list up to the start of the `data` payload
fn read_header<R: Read + Seek>(reader: &mut R) -> MixerResult<WavInfo> {
    if &read_tag(reader)? != b"RIFF" {
        return Err(MixerError::FileType("not a RIFF file".into()));
    }
    let _riff_size = read_u32(reader)?;
    if &read_tag(reader)? != b"WAVE" {
        return Err(MixerError::FileType("not a WAVE file".into()));
    }

    let mut fmt: Option<FmtChunk> = None;

    // A missing data chunk surfaces as an EOF while reading the next tag
    loop {
        let chunk_id = read_tag(reader)?;
        let chunk_size = read_u32(reader)?;

        match &chunk_id {
            b"fmt " => {
                fmt = Some(read_fmt_chunk(reader, chunk_size)?);
            }
            b"data" => {
                let fmt = fmt.ok_or_else(|| {
                    MixerError::FileType("data chunk before fmt chunk".into())
                })?;
                return Ok(WavInfo {
                    sample_rate: fmt.sample_rate,
                    channels: fmt.channels,
                    format: fmt.format,
                    num_samples: chunk_size as usize / fmt.format.sample_bytes(),
                });
            }
            _ => {
                log::debug!(
                    "Skipping WAV chunk {:?} ({} bytes)",
                    String::from_utf8_lossy(&chunk_id),
                    chunk_size
                );
                skip(reader, chunk_size as u64)?;
            }
        }

        // Chunks are word aligned
        if chunk_size % 2 != 0 {
            skip(reader, 1)?;
        }
    }
}

fn read_fmt_chunk<R: Read + Seek>(reader: &mut R, size: u32) -> MixerResult<FmtChunk> {
    if size < FMT_CHUNK_SIZE {
        return Err(MixerError::FileType(format!("fmt chunk too small ({} bytes)", size)));
    }

    let mut fmt_data = [0u8; FMT_CHUNK_SIZE as usize];
    reader.read_exact(&mut fmt_data).map_err(read_err)?;

    let mut format_tag = u16::from_le_bytes([fmt_data[0], fmt_data[1]]);
    let channels = u16::from_le_bytes([fmt_data[2], fmt_data[3]]);
    let sample_rate = u32::from_le_bytes([fmt_data[4], fmt_data[5], fmt_data[6], fmt_data[7]]);
    let bits_per_sample = u16::from_le_bytes([fmt_data[14], fmt_data[15]]);

    let mut extension_left = (size - FMT_CHUNK_SIZE) as u64;
    let subformat_end = EXTENSIBLE_SUBFORMAT_OFFSET + 2;
    if format_tag == FORMAT_EXTENSIBLE && size as usize >= subformat_end {
        let mut ext = [0u8; EXTENSIBLE_SUBFORMAT_OFFSET + 2 - FMT_CHUNK_SIZE as usize];
        reader.read_exact(&mut ext).map_err(read_err)?;
        format_tag = u16::from_le_bytes([ext[ext.len() - 2], ext[ext.len() - 1]]);
        extension_left -= ext.len() as u64;
    }
    skip(reader, extension_left)?;

    let format = match (format_tag, bits_per_sample) {
        (FORMAT_PCM, 16) => SampleFormat::Int16,
        (FORMAT_IEEE_FLOAT, 32) => SampleFormat::Float32,
        (tag, bits) => {
            return Err(MixerError::FileType(format!(
                "unsupported format tag {} with {} bits per sample",
                tag, bits
            )))
        }
    };

    if channels == 0 {
        return Err(MixerError::FileType("channel count is zero".into()));
    }

    Ok(FmtChunk {
        format,
        channels,
        sample_rate,
    })
}

/// Encode `buffer` as a canonical WAV stream
pub fn encode_wav<W: Write>(
    writer: &mut W,
    buffer: &SoundBuffer,
    sample_rate: u32,
    channels: u16,
) -> MixerResult<()> {
    let format = buffer
        .format()
        .ok_or_else(|| MixerError::invalid("cannot encode an uninitialized buffer"))?;

    let data_size = u32::try_from(buffer.size_bytes())
        .ok()
        .filter(|size| *size <= u32::MAX - (WAV_HEADER_SIZE as u32 - 8))
        .ok_or_else(|| MixerError::invalid("sound is too large for a WAV file"))?;

    if channels == 0 {
        return Err(MixerError::invalid("cannot encode a WAV file with zero channels"));
    }
    let block_align = channels
        .checked_mul(format.sample_bytes() as u16)
        .ok_or_else(|| {
            MixerError::invalid(format!("{} channels of {} overflow a WAV frame", channels, format))
        })?;
    let byte_rate = sample_rate
        .checked_mul(block_align as u32)
        .ok_or_else(|| {
            MixerError::invalid(format!(
                "{}Hz at {} bytes per frame overflows the WAV byte rate",
                sample_rate, block_align
            ))
        })?;
    let format_tag = match format {
        SampleFormat::Int16 => FORMAT_PCM,
        SampleFormat::Float32 => FORMAT_IEEE_FLOAT,
    };

    let mut header = Vec::with_capacity(WAV_HEADER_SIZE);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(WAV_HEADER_SIZE as u32 - 8 + data_size).to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
    header.extend_from_slice(&format_tag.to_le_bytes());
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&format.bits_per_sample().to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());
    writer.write_all(&header).map_err(write_err)?;

    match buffer.samples() {
        Samples::Int16(data) => write_samples(writer, data.as_slice(), |s: i16| s.to_le_bytes()),
        Samples::Float32(data) => write_samples(writer, data.as_slice(), |s: f32| s.to_le_bytes()),
        Samples::Empty => Ok(()),
    }
}

fn write_samples<W: Write, T: Copy, const N: usize>(
    writer: &mut W,
    samples: &[T],
    encode: impl Fn(T) -> [u8; N],
) -> MixerResult<()> {
    let per_block = READ_BLOCK_BYTES / N;
    let mut bytes = Vec::with_capacity(per_block * N);

    for block in samples.chunks(per_block) {
        bytes.clear();
        for &sample in block {
            bytes.extend_from_slice(&encode(sample));
        }
        writer.write_all(&bytes).map_err(write_err)?;
    }
    Ok(())
}
