//! Canonical 44-byte WAV header codec
//!
//! Only the plain PCM layout is understood: `RIFF` chunk, a 16-byte `fmt `
//! subchunk, then the `data` subchunk whose payload starts at byte 44.
//! Chunk identifiers are read as-is and not validated.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Result, SoundError};

/// Size of the canonical header; payload begins at this offset
pub const HEADER_LEN: usize = 44;

/// PCM `audioFormat` tag
pub const FORMAT_PCM: u16 = 1;

/// Fixed-layout WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_id: [u8; 4],
    pub chunk_size: u32,
    pub format: [u8; 4],
    pub subchunk1_id: [u8; 4],
    pub subchunk1_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub subchunk2_id: [u8; 4],
    pub subchunk2_size: u32,
}

impl WavHeader {
    /// Build the header for a recording of `seconds` seconds
    ///
    /// Fails when the frame width or payload size cannot be represented in
    /// the header's fields.
    pub fn for_recording(
        sample_rate: u32,
        num_channels: u16,
        bits_per_sample: u16,
        seconds: u32,
    ) -> Result<Self> {
        let block_align = (bits_per_sample / 8)
            .checked_mul(num_channels)
            .ok_or_else(|| too_large("block align"))?;
        let byte_rate = sample_rate
            .checked_mul(u32::from(block_align))
            .ok_or_else(|| too_large("byte rate"))?;
        let subchunk2_size = seconds
            .checked_mul(byte_rate)
            .ok_or_else(|| too_large("data size"))?;
        let chunk_size = subchunk2_size
            .checked_add((HEADER_LEN - 8) as u32)
            .ok_or_else(|| too_large("chunk size"))?;

        Ok(Self {
            chunk_id: *b"RIFF",
            chunk_size,
            format: *b"WAVE",
            subchunk1_id: *b"fmt ",
            subchunk1_size: 16,
            audio_format: FORMAT_PCM,
            num_channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            subchunk2_id: *b"data",
            subchunk2_size,
        })
    }

    /// Length of the payload in seconds, according to the header
    pub fn duration_seconds(&self) -> f64 {
        if self.byte_rate == 0 {
            return 0.0;
        }
        f64::from(self.subchunk2_size) / f64::from(self.byte_rate)
    }

    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.chunk_id);
        out[4..8].copy_from_slice(&self.chunk_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.format);
        out[12..16].copy_from_slice(&self.subchunk1_id);
        out[16..20].copy_from_slice(&self.subchunk1_size.to_le_bytes());
        out[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        out[22..24].copy_from_slice(&self.num_channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(&self.subchunk2_id);
        out[40..44].copy_from_slice(&self.subchunk2_size.to_le_bytes());
        out
    }

    fn from_bytes(raw: &[u8; HEADER_LEN]) -> Self {
        let tag = |at: usize| [raw[at], raw[at + 1], raw[at + 2], raw[at + 3]];
        let u32_at = |at: usize| u32::from_le_bytes(tag(at));
        let u16_at = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);

        Self {
            chunk_id: tag(0),
            chunk_size: u32_at(4),
            format: tag(8),
            subchunk1_id: tag(12),
            subchunk1_size: u32_at(16),
            audio_format: u16_at(20),
            num_channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            subchunk2_id: tag(36),
            subchunk2_size: u32_at(40),
        }
    }
}

fn too_large(field: &str) -> SoundError {
    SoundError::MalformedContainer(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{} does not fit in a WAV header", field),
    ))
}

/// Read the header from the start of `stream`
///
/// The stream is rewound first and left positioned at the payload.
pub fn parse_header<R: Read + Seek + ?Sized>(stream: &mut R) -> Result<WavHeader> {
    let mut raw = [0u8; HEADER_LEN];
    stream
        .seek(SeekFrom::Start(0))
        .and_then(|_| stream.read_exact(&mut raw))
        .map_err(SoundError::MalformedContainer)?;
    Ok(WavHeader::from_bytes(&raw))
}

/// Write `header` at the start of `stream`, leaving it positioned at the payload
pub fn write_header<W: Write + Seek + ?Sized>(stream: &mut W, header: &WavHeader) -> Result<()> {
    stream
        .seek(SeekFrom::Start(0))
        .and_then(|_| stream.write_all(&header.to_bytes()))
        .map_err(SoundError::MalformedContainer)
}
