// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling common Shorten stream items

use crate::Error;
use crate::residual::Residuals;
use crate::vlc::{LongWidth, ShortenWrite};
use bitstream_io::{BitWrite, ToBitStreamWith};
use std::num::NonZero;

/// Width of the `uvar` holding each command's function code
pub const FUNCTION_SIZE: u32 = 2;

/// Width of the `uvar` holding a VERBATIM chunk's length
pub const VERBATIM_CHUNK_SIZE: u32 = 5;

/// Width of the `uvar` holding each VERBATIM byte
pub const VERBATIM_BYTE_SIZE: u32 = 8;

/// The stream's sample format
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SampleFormat {
    /// Unsigned 8-bit samples
    ///
    /// Samples are handed to the encoder in signed form,
    /// with the usual 128 offset already removed.
    Unsigned8,
    /// Signed, little-endian 16-bit samples
    Signed16Le,
}

impl SampleFormat {
    /// Returns Shorten's file type code for this format
    pub fn file_type(self) -> u32 {
        match self {
            Self::Unsigned8 => 2,
            Self::Signed16Le => 5,
        }
    }

    /// Returns format's bits-per-sample
    pub fn bits_per_sample(self) -> u32 {
        match self {
            Self::Unsigned8 => 8,
            Self::Signed16Le => 16,
        }
    }

    /// Returns the range of valid samples for this format
    pub fn range(self) -> std::ops::RangeInclusive<i32> {
        match self {
            Self::Unsigned8 => i8::MIN.into()..=i8::MAX.into(),
            Self::Signed16Le => i16::MIN.into()..=i16::MAX.into(),
        }
    }
}

impl TryFrom<u32> for SampleFormat {
    type Error = Error;

    fn try_from(bits_per_sample: u32) -> Result<Self, Error> {
        match bits_per_sample {
            8 => Ok(Self::Unsigned8),
            16 => Ok(Self::Signed16Le),
            _ => Err(Error::InvalidBitsPerSample),
        }
    }
}

/// The fields which follow a stream's preamble
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Header {
    /// The stream's sample format
    pub format: SampleFormat,
    /// The stream's channel count
    pub channels: NonZero<u16>,
    /// The stream's initial block size
    pub block_size: NonZero<u32>,
}

impl ToBitStreamWith<'_> for Header {
    type Error = std::io::Error;
    type Context = LongWidth;

    fn to_writer<W: BitWrite + ?Sized>(
        &self,
        w: &mut W,
        width: &LongWidth,
    ) -> Result<(), Self::Error> {
        w.write_long(*width, self.format.file_type())?;
        w.write_long(*width, self.channels.get().into())?;
        w.write_long(*width, self.block_size.get())?;
        w.write_long(*width, 0)?; // maximum LPC order
        w.write_long(*width, 0)?; // number of means
        w.write_long(*width, 0) // bytes to skip
    }
}

/// A single Shorten command
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command<'r> {
    /// A channel's block coded with the DIFF1 predictor
    Diff1(&'r Residuals),
    /// A channel's block coded with the DIFF2 predictor
    Diff2(&'r Residuals),
    /// A channel's block coded with the DIFF3 predictor
    Diff3(&'r Residuals),
    /// End of stream
    Quit,
    /// A new block size for all subsequent blocks
    BlockSize(u32),
    /// A channel's block of all zero samples
    Zero,
    /// A chunk of non-audio data
    Verbatim(&'r [u8]),
}

impl Command<'_> {
    /// Returns command's function code
    pub fn function(&self) -> u32 {
        match self {
            Self::Diff1(_) => 1,
            Self::Diff2(_) => 2,
            Self::Diff3(_) => 3,
            Self::Quit => 4,
            Self::BlockSize(_) => 5,
            Self::Zero => 8,
            Self::Verbatim(_) => 9,
        }
    }
}

impl ToBitStreamWith<'_> for Command<'_> {
    type Error = Error;
    type Context = LongWidth;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W, width: &LongWidth) -> Result<(), Error> {
        // check chunk size before writing anything
        let verbatim_len: Option<u32> = match self {
            Self::Verbatim(bytes) => Some(
                bytes
                    .len()
                    .try_into()
                    .map_err(|_| Error::ExcessiveVerbatimSize)?,
            ),
            _ => None,
        };

        w.write_uvar(FUNCTION_SIZE, self.function())?;

        match self {
            Self::Diff1(residuals) | Self::Diff2(residuals) | Self::Diff3(residuals) => {
                w.build(*residuals)?;
            }
            Self::Quit | Self::Zero => { /* no arguments */ }
            Self::BlockSize(block_size) => {
                w.write_long(*width, *block_size)?;
            }
            Self::Verbatim(bytes) => {
                w.write_uvar(VERBATIM_CHUNK_SIZE, verbatim_len.unwrap_or_default())?;
                bytes
                    .iter()
                    .try_for_each(|b| w.write_uvar(VERBATIM_BYTE_SIZE, (*b).into()))?;
            }
        }

        Ok(())
    }
}

#[test]
fn test_header() {
    use bitstream_io::{BigEndian, BitWriter};

    let mut buf = vec![];
    let mut w = BitWriter::endian(&mut buf, BigEndian);
    w.build_with(
        &Header {
            format: SampleFormat::Signed16Le,
            channels: NonZero::new(2).unwrap(),
            block_size: NonZero::new(256).unwrap(),
        },
        &LongWidth::HISTORICAL,
    )
    .unwrap();
    w.byte_align().unwrap();
    drop(w);

    // each field is 0b1_11 for the width, then the value as uvar(3)
    // 5   = 0b1_101
    // 2   = 0b1_010
    // 256 = 32 zeros, 0b1_000
    // 0   = 0b1_000 (x3)
    let mut expected = String::new();
    expected.push_str("1111101");
    expected.push_str("1111010");
    expected.push_str("111");
    expected.push_str(&"0".repeat(32));
    expected.push_str("1000");
    expected.push_str(&"1111000".repeat(3));
    while expected.len() % 8 != 0 {
        expected.push('0');
    }

    let expected = expected
        .as_bytes()
        .chunks(8)
        .map(|bits| {
            bits.iter()
                .fold(0u8, |acc, bit| (acc << 1) | u8::from(*bit == b'1'))
        })
        .collect::<Vec<_>>();

    assert_eq!(buf, expected);
}

#[test]
fn test_sample_format() {
    assert_eq!(SampleFormat::try_from(8u32).unwrap(), SampleFormat::Unsigned8);
    assert_eq!(SampleFormat::try_from(16u32).unwrap(), SampleFormat::Signed16Le);
    assert!(matches!(
        SampleFormat::try_from(24u32),
        Err(Error::InvalidBitsPerSample)
    ));
    assert_eq!(SampleFormat::Unsigned8.file_type(), 2);
    assert_eq!(SampleFormat::Signed16Le.file_type(), 5);
}

#[test]
fn test_verbatim() {
    use bitstream_io::{BigEndian, BitWriter};

    let mut buf = vec![];
    let mut w = BitWriter::endian(&mut buf, BigEndian);
    w.build_with(&Command::Verbatim(b"\xff"), &LongWidth::HISTORICAL)
        .unwrap();
    w.byte_align().unwrap();
    drop(w);

    // function 9 as uvar(2) is 0b001_01,
    // length 1 as uvar(5) is 0b1_00001,
    // byte 0xFF as uvar(8) is 0b1_11111111
    assert_eq!(
        buf,
        vec![0b00101_100, 0b001_1_1111, 0b1111_0000]
    );
}
