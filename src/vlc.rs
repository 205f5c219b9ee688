// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shorten's variable-length integer codes
//!
//! Every integer in a Shorten stream (other than the preamble)
//! is written with one of three related codes:
//!
//! | Code | Layout |
//! |-----:|--------|
//! | `uvar(n)` | `value >> n` in unary, then the low `n` bits |
//! | `var(n)` | a sign-folded value written as `uvar(n + 1)` |
//! | `long` | a `uvar(2)` width, then the value as `uvar(width)` |
//!
//! Unary values are written as a run of 0 bits
//! terminated by a single 1 bit.

use crate::Error;
use bitstream_io::BitWrite;

/// Width of the `uvar` which precedes each `long`'s value
pub const LONG_WIDTH_SIZE: u32 = 2;

/// The largest width a `long` may use
pub const MAX_LONG_WIDTH: u32 = 32;

/// Folds a signed value into the unsigned domain
///
/// Non-negative values become even, negative values become odd.
#[inline]
pub fn fold(value: i32) -> u32 {
    if value >= 0 {
        (value as u32) << 1
    } else {
        // !value is -value - 1, which is always non-negative
        ((!value as u32) << 1) | 1
    }
}

/// Reverses [`fold`]
#[inline]
pub fn unfold(value: u32) -> i32 {
    if value & 1 == 0 {
        (value >> 1) as i32
    } else {
        !((value >> 1) as i32)
    }
}

/// Returns the exact size of `uvar(size)` for `value`, in bits
#[inline]
pub fn uvar_bits(size: u32, value: u32) -> u64 {
    u64::from(value.checked_shr(size).unwrap_or(0)) + 1 + u64::from(size)
}

/// Returns the exact size of `var(size)` for `value`, in bits
#[inline]
pub fn svar_bits(size: u32, value: i32) -> u64 {
    uvar_bits(size + 1, fold(value))
}

/// How the width of `long` values is chosen
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LongWidth {
    /// Always use the same width, regardless of value
    ///
    /// The historical encoder always used 3.
    Fixed(u32),
    /// Pick whichever width yields the fewest bits for each value
    #[default]
    Adaptive,
}

impl LongWidth {
    /// Width used by the historical encoder
    pub const HISTORICAL: Self = Self::Fixed(3);

    /// Ensures a fixed width is usable
    pub(crate) fn validate(self) -> Result<Self, Error> {
        match self {
            Self::Fixed(width) if width > MAX_LONG_WIDTH => Err(Error::InvalidLongWidth),
            width => Ok(width),
        }
    }

    /// Returns the width to use for the given value
    pub fn width(self, value: u32) -> u32 {
        match self {
            Self::Fixed(width) => width,
            // ties go to the smaller width
            Self::Adaptive => (0..=MAX_LONG_WIDTH)
                .min_by_key(|width| long_bits(*width, value))
                .unwrap_or(MAX_LONG_WIDTH),
        }
    }
}

/// Returns the exact size of a `long` of the given width, in bits
#[inline]
pub fn long_bits(width: u32, value: u32) -> u64 {
    uvar_bits(LONG_WIDTH_SIZE, width) + uvar_bits(width, value)
}

/// An extension trait for writing Shorten's integer codes
pub trait ShortenWrite: BitWrite {
    /// Writes `value` as `uvar(size)`
    ///
    /// There's no limit on the unary-coded portion,
    /// so large values yield long runs of bits.
    fn write_uvar(&mut self, size: u32, value: u32) -> std::io::Result<()> {
        let msb = value.checked_shr(size).unwrap_or(0);
        self.write_unary::<1>(msb)?;
        match size {
            0 => Ok(()),
            32.. => self.write_var(32, value),
            size => self.write_var(size, value & ((1 << size) - 1)),
        }
    }

    /// Writes signed `value` as `var(size)`
    fn write_svar(&mut self, size: u32, value: i32) -> std::io::Result<()> {
        self.write_uvar(size + 1, fold(value))
    }

    /// Writes `value` as a `long` whose width is chosen by `width`
    fn write_long(&mut self, width: LongWidth, value: u32) -> std::io::Result<()> {
        let width = width.width(value);
        self.write_uvar(LONG_WIDTH_SIZE, width)?;
        self.write_uvar(width, value)
    }
}

impl<W: BitWrite + ?Sized> ShortenWrite for W {}

#[cfg(test)]
fn read_uvar<R: bitstream_io::BitRead>(r: &mut R, size: u32) -> std::io::Result<u32> {
    let msb = r.read_unary::<1>()?;
    let lsb = match size {
        0 => 0,
        size => r.read_var::<u32>(size)?,
    };
    Ok(msb.checked_shl(size).unwrap_or(0) | lsb)
}

#[cfg(test)]
fn encoded<F: FnOnce(&mut bitstream_io::BitWriter<&mut Vec<u8>, bitstream_io::BigEndian>)>(
    f: F,
) -> Vec<u8> {
    use bitstream_io::{BigEndian, BitWriter};

    let mut buf = vec![];
    let mut w = BitWriter::endian(&mut buf, BigEndian);
    f(&mut w);
    w.byte_align().unwrap();
    drop(w);
    buf
}

#[test]
fn test_uvar_layout() {
    // 13 = 0b1101, so with a 2 bit remainder the quotient is 3
    // which is 0b0001 in unary, then the remainder 0b01
    assert_eq!(
        encoded(|w| w.write_uvar(2, 13).unwrap()),
        vec![0b0001_01_00]
    );

    // a zero width yields a bare unary value
    assert_eq!(encoded(|w| w.write_uvar(0, 2).unwrap()), vec![0b001_00000]);

    // quotient of 0 is a lone stop bit
    assert_eq!(
        encoded(|w| w.write_uvar(8, 0xA5).unwrap()),
        vec![0b1_1010010, 0b1_0000000]
    );
}

#[test]
fn test_uvar_roundtrip() {
    use bitstream_io::{BigEndian, BitReader};

    for size in 0..=12 {
        for value in (0u32..2000).chain([65535, 1 << 20]) {
            if u64::from(value.checked_shr(size).unwrap_or(0)) > 5000 {
                continue;
            }

            let buf = encoded(|w| w.write_uvar(size, value).unwrap());

            assert_eq!(
                buf.len() as u64,
                uvar_bits(size, value).div_ceil(8),
                "size {size}, value {value}"
            );

            let mut r = BitReader::endian(buf.as_slice(), BigEndian);
            assert_eq!(read_uvar(&mut r, size).unwrap(), value);
        }
    }

    // the full 32 bit width never needs a unary portion
    let buf = encoded(|w| w.write_uvar(32, u32::MAX).unwrap());
    let mut r = BitReader::endian(buf.as_slice(), BigEndian);
    assert_eq!(read_uvar(&mut r, 32).unwrap(), u32::MAX);
}

#[test]
fn test_fold() {
    assert_eq!(fold(0), 0);
    assert_eq!(fold(-1), 1);
    assert_eq!(fold(1), 2);
    assert_eq!(fold(-2), 3);
    assert_eq!(fold(i32::MAX), u32::MAX - 1);
    assert_eq!(fold(i32::MIN), u32::MAX);

    for value in (-70000..70000).chain([i32::MIN, i32::MIN + 1, i32::MAX - 1, i32::MAX]) {
        assert_eq!(unfold(fold(value)), value);
    }
}

#[test]
fn test_svar_roundtrip() {
    use bitstream_io::{BigEndian, BitReader};

    for size in 0..=10 {
        for value in -1000..=1000 {
            let buf = encoded(|w| w.write_svar(size, value).unwrap());
            let mut r = BitReader::endian(buf.as_slice(), BigEndian);
            assert_eq!(unfold(read_uvar(&mut r, size + 1).unwrap()), value);
        }
    }
}

#[test]
fn test_long() {
    use bitstream_io::{BigEndian, BitReader};

    // the historical fixed width of 3
    // 0b011 as uvar(2) is 0b1_11, then 5 as uvar(3) is 0b1_101
    assert_eq!(
        encoded(|w| w.write_long(LongWidth::HISTORICAL, 5).unwrap()),
        vec![0b1_11_1_101_0]
    );

    for value in [0, 1, 2, 5, 255, 256, 4095, 65535, 1 << 24, u32::MAX] {
        let width = LongWidth::Adaptive.width(value);

        // adaptive widths are never worse than any fixed width
        for fixed in 0..=MAX_LONG_WIDTH {
            assert!(long_bits(width, value) <= long_bits(fixed, value));
        }

        let buf = encoded(|w| w.write_long(LongWidth::Adaptive, value).unwrap());
        let mut r = BitReader::endian(buf.as_slice(), BigEndian);
        let width = read_uvar(&mut r, LONG_WIDTH_SIZE).unwrap();
        assert_eq!(read_uvar(&mut r, width).unwrap(), value);
    }

    assert!(LongWidth::Fixed(33).validate().is_err());
    assert!(LongWidth::Fixed(32).validate().is_ok());
}
