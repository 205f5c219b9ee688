// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For storing RIFF WAVE headers in Shorten streams
//!
//! Shorten decoders rebuild the input file by writing
//! VERBATIM chunks as-is, so a stream intended to decode
//! to a `.wav` file carries its RIFF WAVE header as the
//! first VERBATIM chunk, followed by the audio,
//! followed by any trailing chunks.

use crate::Error;
use crate::encode::VerbatimChunk;
use bitstream_io::{ByteWrite, ByteWriter, LittleEndian, ToByteStream};
use std::num::NonZero;

/// The parameters of a canonical RIFF WAVE file
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WaveHeader {
    /// Channel count
    pub channels: NonZero<u16>,
    /// Sample rate, in Hz
    pub sample_rate: u32,
    /// Bits-per-sample, either 8 or 16
    pub bits_per_sample: u16,
    /// Total number of PCM frames
    pub total_frames: u32,
}

impl WaveHeader {
    /// Returns size of the "data" chunk's contents, in bytes
    pub fn data_size(&self) -> Option<u32> {
        self.total_frames
            .checked_mul(u32::from(self.bits_per_sample.div_ceil(8)))?
            .checked_mul(self.channels.get().into())
    }

    fn fmt(&self) -> Result<Fmt, Error> {
        let data_block_size = self
            .bits_per_sample
            .div_ceil(8)
            .checked_mul(self.channels.get())
            .ok_or(Error::ExcessiveWaveSize)?;

        let data_rate = self
            .sample_rate
            .checked_mul(data_block_size.into())
            .ok_or(Error::ExcessiveWaveSize)?;

        Ok(if self.channels.get() <= 2 {
            Fmt::Standard {
                channels: self.channels.get(),
                sample_rate: self.sample_rate,
                data_rate,
                data_block_size,
                bits_per_sample: self.bits_per_sample,
            }
        } else {
            Fmt::Extensible {
                channels: self.channels.get(),
                sample_rate: self.sample_rate,
                data_rate,
                data_block_size,
                bits_per_sample: self.bits_per_sample,
                valid_bits: self.bits_per_sample,
                // unspecified speaker layout
                channel_mask: 0,
            }
        })
    }

    /// Returns the file's header bytes
    ///
    /// This is everything in the file prior to
    /// the "data" chunk's contents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExcessiveWaveSize`] if the file
    /// would be too large for a RIFF WAVE container.
    pub fn bytes(&self) -> Result<Vec<u8>, Error> {
        let fmt = self.fmt()?;
        let data_size = self.data_size().ok_or(Error::ExcessiveWaveSize)?;

        // "WAVE" + fmt chunk + data chunk header + data + any pad byte
        let whole_size = (4 + fmt.len() + 8 + data_size % 2)
            .checked_add(data_size)
            .ok_or(Error::ExcessiveWaveSize)?;

        let mut w = ByteWriter::endian(Vec::with_capacity(44), LittleEndian);
        w.write_bytes(b"RIFF")?;
        w.write(whole_size)?;
        w.write_bytes(b"WAVE")?;
        w.build(&fmt)?;
        w.write_bytes(b"data")?;
        w.write(data_size)?;
        Ok(w.into_writer())
    }

    /// Returns chunks for encoding a whole RIFF WAVE file
    ///
    /// These are the file's header, the audio marker
    /// and, if the audio data is an odd number of bytes,
    /// the "data" chunk's trailing pad byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExcessiveWaveSize`] if the file
    /// would be too large for a RIFF WAVE container.
    pub fn chunks(&self) -> Result<Vec<VerbatimChunk>, Error> {
        let mut chunks = vec![VerbatimChunk::Bytes(self.bytes()?), VerbatimChunk::Audio];

        if self.data_size().is_some_and(|size| size % 2 == 1) {
            chunks.push(VerbatimChunk::Bytes(vec![0]));
        }

        Ok(chunks)
    }
}

enum Fmt {
    Standard {
        channels: u16,
        sample_rate: u32,
        data_rate: u32,
        data_block_size: u16,
        bits_per_sample: u16,
    },
    Extensible {
        channels: u16,
        sample_rate: u32,
        data_rate: u32,
        data_block_size: u16,
        bits_per_sample: u16,
        valid_bits: u16,
        channel_mask: u32,
    },
}

impl Fmt {
    const PCM_SUB_FORMAT: [u8; 16] = [
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B,
        0x71,
    ];

    // whole chunk size, header included
    fn len(&self) -> u32 {
        match self {
            Self::Standard { .. } => 8 + 16,
            Self::Extensible { .. } => 8 + 40,
        }
    }
}

impl ToByteStream for Fmt {
    type Error = std::io::Error;

    // yields entire fmt chunk, header included
    fn to_writer<W>(&self, w: &mut W) -> std::io::Result<()>
    where
        W: ByteWrite + ?Sized,
    {
        match self {
            Self::Standard {
                channels,
                sample_rate,
                data_rate,
                data_block_size,
                bits_per_sample,
            } => {
                w.write_bytes(b"fmt ")?; // chunk ID
                w.write::<u32>(16)?; // chunk size
                w.write::<u16>(0x0001)?; // WAVE_FORMAT_PCM
                w.write(*channels)?;
                w.write(*sample_rate)?;
                w.write(*data_rate)?;
                w.write(*data_block_size)?;
                w.write(*bits_per_sample)?;
                Ok(())
            }
            Self::Extensible {
                channels,
                sample_rate,
                data_rate,
                data_block_size,
                bits_per_sample,
                valid_bits,
                channel_mask,
            } => {
                w.write_bytes(b"fmt ")?; // chunk ID
                w.write::<u32>(40)?; // chunk size
                w.write::<u16>(0xFFFE)?; // WAVE_FORMAT_EXTENSIBLE
                w.write(*channels)?;
                w.write(*sample_rate)?;
                w.write(*data_rate)?;
                w.write(*data_block_size)?;
                w.write(*bits_per_sample)?;
                w.write::<u16>(22)?; // size of extension
                w.write(*valid_bits)?;
                w.write(*channel_mask)?;
                w.write_bytes(&Self::PCM_SUB_FORMAT)?;
                Ok(())
            }
        }
    }
}

#[test]
fn test_wave_header() {
    let header = WaveHeader {
        channels: NonZero::new(2).unwrap(),
        sample_rate: 44100,
        bits_per_sample: 16,
        total_frames: 10,
    };

    let bytes = header.bytes().unwrap();
    assert_eq!(bytes.len(), 44);
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[4..8], &(36u32 + 40).to_le_bytes());
    assert_eq!(&bytes[8..16], b"WAVEfmt ");
    assert_eq!(&bytes[16..20], &16u32.to_le_bytes());
    assert_eq!(&bytes[20..22], &1u16.to_le_bytes());
    assert_eq!(&bytes[22..24], &2u16.to_le_bytes());
    assert_eq!(&bytes[24..28], &44100u32.to_le_bytes());
    assert_eq!(&bytes[28..32], &(44100u32 * 4).to_le_bytes());
    assert_eq!(&bytes[32..34], &4u16.to_le_bytes());
    assert_eq!(&bytes[34..36], &16u16.to_le_bytes());
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(&bytes[40..44], &40u32.to_le_bytes());

    assert_eq!(
        header.chunks().unwrap(),
        vec![VerbatimChunk::Bytes(bytes), VerbatimChunk::Audio]
    );
}

#[test]
fn test_wave_odd_data() {
    let header = WaveHeader {
        channels: NonZero::new(1).unwrap(),
        sample_rate: 8000,
        bits_per_sample: 8,
        total_frames: 3,
    };

    let bytes = header.bytes().unwrap();
    // RIFF size counts the data chunk's pad byte
    assert_eq!(&bytes[4..8], &(36u32 + 3 + 1).to_le_bytes());

    assert_eq!(
        header.chunks().unwrap(),
        vec![
            VerbatimChunk::Bytes(bytes),
            VerbatimChunk::Audio,
            VerbatimChunk::Bytes(vec![0])
        ]
    );

    // multichannel files use the extensible format
    let header = WaveHeader {
        channels: NonZero::new(6).unwrap(),
        sample_rate: 48000,
        bits_per_sample: 16,
        total_frames: 1,
    };
    assert_eq!(header.bytes().unwrap().len(), 68);

    let header = WaveHeader {
        channels: NonZero::new(2).unwrap(),
        sample_rate: 48000,
        bits_per_sample: 16,
        total_frames: u32::MAX,
    };
    assert!(matches!(header.bytes(), Err(Error::ExcessiveWaveSize)));
}

#[test]
fn test_wave_overflow() {
    // block alignment too large for its 16-bit field
    let header = WaveHeader {
        channels: NonZero::new(40000).unwrap(),
        sample_rate: 44100,
        bits_per_sample: 16,
        total_frames: 1,
    };
    assert!(matches!(header.bytes(), Err(Error::ExcessiveWaveSize)));
    assert!(matches!(header.chunks(), Err(Error::ExcessiveWaveSize)));

    // byte rate too large for its 32-bit field
    let header = WaveHeader {
        channels: NonZero::new(8).unwrap(),
        sample_rate: 384_000_000,
        bits_per_sample: 16,
        total_frames: 1,
    };
    assert!(matches!(header.bytes(), Err(Error::ExcessiveWaveSize)));
    assert!(matches!(header.chunks(), Err(Error::ExcessiveWaveSize)));
}
