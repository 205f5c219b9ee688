// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Byte order for PCM samples
//!
//! Shorten streams hold 8-bit unsigned or 16-bit signed samples,
//! and only the latter has a byte order.
//! 8-bit PCM bytes are unsigned with a 128 offset
//! in RIFF WAVE files and signed in AIFF files.

/// Sample byte order
pub trait Endianness {
    /// Converts bytes to 16-bit samples in this byte order
    fn bytes_to_i16(bytes: [u8; 2]) -> i16;
}

/// Little-endian byte order
pub struct LittleEndian;

impl Endianness for LittleEndian {
    #[inline]
    fn bytes_to_i16(bytes: [u8; 2]) -> i16 {
        i16::from_le_bytes(bytes)
    }
}

/// Big-endian byte order
pub struct BigEndian;

impl Endianness for BigEndian {
    #[inline]
    fn bytes_to_i16(bytes: [u8; 2]) -> i16 {
        i16::from_be_bytes(bytes)
    }
}

/// Converts an unsigned 8-bit PCM byte to a signed sample
#[inline]
pub fn byte_to_i8(byte: u8) -> i8 {
    byte.wrapping_sub(0x80) as i8
}

/// How 8-bit PCM bytes are stored
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ByteSign {
    /// Unsigned with a 128 offset, as in RIFF WAVE files
    #[default]
    Unsigned,
    /// Two's complement, as in AIFF files
    Signed,
}

impl ByteSign {
    /// Converts an 8-bit PCM byte to a signed sample
    #[inline]
    pub fn to_i8(self, byte: u8) -> i8 {
        match self {
            Self::Unsigned => byte_to_i8(byte),
            Self::Signed => byte as i8,
        }
    }
}

#[allow(unused)]
fn test_endianness<F: bitstream_io::Endianness, E: Endianness>() {
    use bitstream_io::{BitWrite, BitWriter};

    // bytes to 16 bits-per-sample
    for i in i16::MIN..=i16::MAX {
        let mut buf = [0; 2];
        let mut w: BitWriter<_, F> = BitWriter::new(buf.as_mut_slice());
        w.write::<16, i16>(i).unwrap();

        assert_eq!(E::bytes_to_i16(buf), i);
    }
}

#[test]
fn test_samples_le() {
    test_endianness::<bitstream_io::LittleEndian, LittleEndian>()
}

#[test]
fn test_samples_be() {
    test_endianness::<bitstream_io::BigEndian, BigEndian>()
}

#[test]
fn test_unsigned_bytes() {
    assert_eq!(byte_to_i8(0x80), 0);
    assert_eq!(byte_to_i8(0x00), -128);
    assert_eq!(byte_to_i8(0xFF), 127);

    for byte in u8::MIN..=u8::MAX {
        assert_eq!(i32::from(byte_to_i8(byte)), i32::from(byte) - 128);
        assert_eq!(ByteSign::Unsigned.to_i8(byte), byte_to_i8(byte));
        assert_eq!(ByteSign::Signed.to_i8(byte), i8::from_be_bytes([byte]));
    }
}
