// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For storing AIFF headers in Shorten streams
//!
//! The AIFF counterpart of [`crate::wave`].
//! The header VERBATIM chunk runs through the SSND chunk's
//! offset and block size fields, so the audio that follows
//! is exactly the SSND chunk's sample data.
//!
//! AIFF samples are big-endian and 8-bit samples are signed,
//! so they are read with a [`crate::source::PcmReader`]
//! using [`crate::byteorder::BigEndian`] and [`crate::byteorder::ByteSign::Signed`].

use crate::Error;
use crate::encode::VerbatimChunk;
use bitstream_io::{BigEndian, ByteWrite, ByteWriter, ToByteStream};
use std::num::NonZero;

/// The parameters of a canonical AIFF file
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AiffHeader {
    /// Channel count
    pub channels: NonZero<u16>,
    /// Sample rate, in Hz
    pub sample_rate: u32,
    /// Bits-per-sample, either 8 or 16
    pub bits_per_sample: u16,
    /// Total number of PCM frames
    pub total_frames: u32,
}

impl AiffHeader {
    /// Returns size of the SSND chunk's sample data, in bytes
    pub fn data_size(&self) -> Option<u32> {
        self.total_frames
            .checked_mul(u32::from(self.bits_per_sample.div_ceil(8)))?
            .checked_mul(self.channels.get().into())
    }

    /// Returns the file's header bytes
    ///
    /// This is everything in the file prior to
    /// the SSND chunk's sample data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExcessiveAiffSize`] if the file
    /// would be too large for an AIFF container.
    pub fn bytes(&self) -> Result<Vec<u8>, Error> {
        let data_size = self.data_size().ok_or(Error::ExcessiveAiffSize)?;

        let ssnd_size = data_size
            .checked_add(Ssnd::LEN)
            .ok_or(Error::ExcessiveAiffSize)?;

        // "AIFF" + COMM chunk + SSND chunk + any pad byte
        let form_size = (4 + 8 + Comm::LEN + 8 + data_size % 2)
            .checked_add(ssnd_size)
            .ok_or(Error::ExcessiveAiffSize)?;

        let mut w = ByteWriter::endian(Vec::with_capacity(54), BigEndian);
        w.write_bytes(b"FORM")?;
        w.write(form_size)?;
        w.write_bytes(b"AIFF")?;
        w.build(&Comm {
            channels: self.channels.get(),
            total_frames: self.total_frames,
            bits_per_sample: self.bits_per_sample,
            sample_rate: self.sample_rate,
        })?;
        w.write_bytes(b"SSND")?;
        w.write(ssnd_size)?;
        w.build(&Ssnd::default())?;
        Ok(w.into_writer())
    }

    /// Returns chunks for encoding a whole AIFF file
    ///
    /// These are the file's header, the audio marker
    /// and, if the sample data is an odd number of bytes,
    /// the SSND chunk's trailing pad byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExcessiveAiffSize`] if the file
    /// would be too large for an AIFF container.
    pub fn chunks(&self) -> Result<Vec<VerbatimChunk>, Error> {
        let mut chunks = vec![VerbatimChunk::Bytes(self.bytes()?), VerbatimChunk::Audio];

        if self.data_size().is_some_and(|size| size % 2 == 1) {
            chunks.push(VerbatimChunk::Bytes(vec![0]));
        }

        Ok(chunks)
    }
}

struct Comm {
    channels: u16,
    total_frames: u32,
    bits_per_sample: u16,
    sample_rate: u32,
}

impl Comm {
    // chunk contents, header excluded
    const LEN: u32 = 18;
}

impl ToByteStream for Comm {
    type Error = std::io::Error;

    // yields entire COMM chunk, header included
    fn to_writer<W>(&self, w: &mut W) -> std::io::Result<()>
    where
        W: ByteWrite + ?Sized,
    {
        w.write_bytes(b"COMM")?; // chunk ID
        w.write(Self::LEN)?; // chunk size
        w.write(self.channels)?;
        w.write(self.total_frames)?;
        w.write(self.bits_per_sample)?;

        // sample rate as an 80-bit IEEE 754 extended float
        // with an explicit integer bit
        match self.sample_rate.leading_zeros() {
            32 => w.write_bytes(&[0; 10]),
            shift => {
                w.write::<u16>((16383 + 31 - shift) as u16)?;
                w.write::<u64>(u64::from(self.sample_rate << shift) << 32)
            }
        }
    }
}

// the fields between the SSND chunk header and its sample data
#[derive(Default)]
struct Ssnd {
    offset: u32,
    block_size: u32,
}

impl Ssnd {
    const LEN: u32 = 8;
}

impl ToByteStream for Ssnd {
    type Error = std::io::Error;

    fn to_writer<W>(&self, w: &mut W) -> std::io::Result<()>
    where
        W: ByteWrite + ?Sized,
    {
        w.write(self.offset)?;
        w.write(self.block_size)
    }
}

#[test]
fn test_aiff_header() {
    let header = AiffHeader {
        channels: NonZero::new(2).unwrap(),
        sample_rate: 44100,
        bits_per_sample: 16,
        total_frames: 10,
    };

    let bytes = header.bytes().unwrap();
    assert_eq!(bytes.len(), 54);
    assert_eq!(&bytes[0..4], b"FORM");
    assert_eq!(&bytes[4..8], &(46u32 + 40).to_be_bytes());
    assert_eq!(&bytes[8..16], b"AIFFCOMM");
    assert_eq!(&bytes[16..20], &18u32.to_be_bytes());
    assert_eq!(&bytes[20..22], &2u16.to_be_bytes());
    assert_eq!(&bytes[22..26], &10u32.to_be_bytes());
    assert_eq!(&bytes[26..28], &16u16.to_be_bytes());
    assert_eq!(
        &bytes[28..38],
        &[0x40u8, 0x0E, 0xAC, 0x44, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
    assert_eq!(&bytes[38..42], b"SSND");
    assert_eq!(&bytes[42..46], &(8u32 + 40).to_be_bytes());
    assert_eq!(&bytes[46..54], &[0u8; 8]);

    assert_eq!(
        header.chunks().unwrap(),
        vec![VerbatimChunk::Bytes(bytes), VerbatimChunk::Audio]
    );
}

#[test]
fn test_aiff_odd_data() {
    let header = AiffHeader {
        channels: NonZero::new(1).unwrap(),
        sample_rate: 8000,
        bits_per_sample: 8,
        total_frames: 3,
    };

    let bytes = header.bytes().unwrap();
    // FORM size counts the SSND chunk's pad byte
    assert_eq!(&bytes[4..8], &(46u32 + 3 + 1).to_be_bytes());
    assert_eq!(
        &bytes[28..38],
        &[0x40u8, 0x0B, 0xFA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    );

    assert_eq!(
        header.chunks().unwrap(),
        vec![
            VerbatimChunk::Bytes(bytes),
            VerbatimChunk::Audio,
            VerbatimChunk::Bytes(vec![0])
        ]
    );

    // a zero sample rate is all zero bits
    let header = AiffHeader {
        sample_rate: 0,
        ..header
    };
    assert_eq!(&header.bytes().unwrap()[28..38], &[0u8; 10]);
}

#[test]
fn test_aiff_overflow() {
    let header = AiffHeader {
        channels: NonZero::new(2).unwrap(),
        sample_rate: 48000,
        bits_per_sample: 16,
        total_frames: u32::MAX,
    };
    assert!(matches!(header.bytes(), Err(Error::ExcessiveAiffSize)));
    assert!(matches!(header.chunks(), Err(Error::ExcessiveAiffSize)));

    // sample data fits, but not with the SSND chunk's fields
    let header = AiffHeader {
        channels: NonZero::new(1).unwrap(),
        sample_rate: 48000,
        bits_per_sample: 8,
        total_frames: u32::MAX - 4,
    };
    assert!(matches!(header.bytes(), Err(Error::ExcessiveAiffSize)));
}
