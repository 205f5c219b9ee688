// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For coding a block's prediction residuals
//!
//! A block of residuals is preceded by its "energy",
//! the width of each residual's fixed-size portion.
//! Small energies suit quiet signals, large ones loud signals.

use crate::Error;
use crate::vlc::{ShortenWrite, svar_bits, uvar_bits};
use bitstream_io::{BitWrite, ToBitStream};

/// Width of the `uvar` which precedes each block's energy
pub const ENERGY_SIZE: u32 = 3;

/// The largest energy which may be used
pub const MAX_ENERGY: u32 = 30;

/// The largest energy checked by adaptive search
pub const MAX_ADAPTIVE_ENERGY: u32 = 20;

/// How each block's energy is chosen
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Energy {
    /// Always use the same energy
    ///
    /// This is conformant but seldom optimal.
    Fixed(u32),
    /// Use whichever energy yields the smallest block
    #[default]
    Adaptive,
}

impl Energy {
    /// Energy used by the historical encoder
    pub const HISTORICAL: Self = Self::Fixed(2);

    /// Ensures a fixed energy is usable
    pub(crate) fn validate(self) -> Result<Self, Error> {
        match self {
            Self::Fixed(energy) if energy > MAX_ENERGY => Err(Error::InvalidEnergy),
            energy => Ok(energy),
        }
    }

    /// Returns energy to use for the given residuals, and its size in bits
    pub fn select(self, residuals: &[i32]) -> (u32, u64) {
        match self {
            Self::Fixed(energy) => (energy, block_bits(energy, residuals)),
            // ties go to the smaller energy
            Self::Adaptive => (0..=MAX_ADAPTIVE_ENERGY)
                .map(|energy| (energy, block_bits(energy, residuals)))
                .min_by_key(|(_, bits)| *bits)
                .unwrap_or((0, block_bits(0, residuals))),
        }
    }
}

/// Returns exact size of residuals coded with the given energy, in bits
///
/// The size includes the energy itself.
pub fn block_bits(energy: u32, residuals: &[i32]) -> u64 {
    uvar_bits(ENERGY_SIZE, energy)
        + residuals
            .iter()
            .map(|r| svar_bits(energy, *r))
            .sum::<u64>()
}

/// A block of residuals along with its energy
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Residuals {
    /// Width of each residual's fixed-size portion
    pub energy: u32,
    /// The residuals themselves
    pub residuals: Vec<i32>,
}

impl Residuals {
    /// Builds residuals, choosing energy as directed
    pub fn new(energy: Energy, residuals: Vec<i32>) -> Self {
        Self {
            energy: energy.select(&residuals).0,
            residuals,
        }
    }

    /// Returns exact size when written, in bits
    pub fn bits(&self) -> u64 {
        block_bits(self.energy, &self.residuals)
    }
}

impl ToBitStream for Residuals {
    type Error = std::io::Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_uvar(ENERGY_SIZE, self.energy)?;
        self.residuals
            .iter()
            .try_for_each(|r| w.write_svar(self.energy, *r))
    }
}

#[test]
fn test_adaptive_energy() {
    // silence needs no fixed-size bits at all
    assert_eq!(Energy::Adaptive.select(&[0; 64]).0, 0);

    // loud residuals need wide ones
    let loud = [30000, -29000, 31000, -32000];
    let (energy, bits) = Energy::Adaptive.select(&loud);
    assert!(energy >= 12);
    assert_eq!(bits, block_bits(energy, &loud));

    // and adaptive selection is never worse than any fixed energy
    for _ in 0..50 {
        let residuals = std::iter::repeat_with(|| fastrand::i32(-5000..5000))
            .take(fastrand::usize(1..300))
            .collect::<Vec<_>>();

        let (_, adaptive) = Energy::Adaptive.select(&residuals);
        for energy in 0..=MAX_ADAPTIVE_ENERGY {
            assert!(adaptive <= block_bits(energy, &residuals));
        }
    }
}

#[test]
fn test_residuals_size() {
    use bitstream_io::{BigEndian, BitWriter};

    let residuals = Residuals::new(Energy::HISTORICAL, vec![10, 2, -3, 0]);
    assert_eq!(residuals.energy, 2);

    let mut buf = vec![];
    let mut w = BitWriter::endian(&mut buf, BigEndian);
    w.build(&residuals).unwrap();
    w.byte_align().unwrap();
    drop(w);

    // energy 2 as uvar(3) is 0b1_010,
    // 10 folds to 20 = 0b001_100, 2 folds to 4 = 0b1_100,
    // -3 folds to 5 = 0b1_101 and 0 folds to 0 = 0b1_000
    assert_eq!(residuals.bits(), 4 + 6 + 4 + 4 + 4);
    assert_eq!(buf, vec![0b1010_0011, 0b0011_0011, 0b0110_0000]);

    assert!(Energy::Fixed(31).validate().is_err());
}
