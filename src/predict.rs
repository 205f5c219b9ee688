// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shorten's fixed polynomial predictors
//!
//! Each channel carries the final few samples of its
//! previous block forward as its [`Wrap`], so that prediction
//! continues seamlessly across block boundaries.
//! Arithmetic is performed modulo 2³², just as a decoder's would be.

/// Number of samples carried between blocks
pub const WRAP: usize = 3;

/// A fixed polynomial predictor
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Predictor {
    /// Predicts each sample as the previous one
    Diff1,
    /// Predicts along the line of the two previous samples
    Diff2,
    /// Predicts along the curve of the three previous samples
    Diff3,
}

impl Predictor {
    /// All predictors, from lowest order to highest
    pub const ALL: [Self; 3] = [Self::Diff1, Self::Diff2, Self::Diff3];

    // history is oldest sample to newest
    #[inline]
    fn predict(self, [s3, s2, s1]: [i32; WRAP]) -> i32 {
        match self {
            Self::Diff1 => s1,
            Self::Diff2 => s1.wrapping_mul(2).wrapping_sub(s2),
            Self::Diff3 => s1
                .wrapping_sub(s2)
                .wrapping_mul(3)
                .wrapping_add(s3),
        }
    }
}

/// How predictors are chosen for each channel's block
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Prediction {
    /// Always use DIFF1
    Diff1,
    /// Use ZERO for silent blocks, and otherwise
    /// whichever predictor codes smallest
    #[default]
    Adaptive,
}

/// The trailing samples of a channel's previous block
///
/// A new channel starts with all samples at zero.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Wrap([i32; WRAP]);

impl Wrap {
    /// Returns wrapped samples, oldest to newest
    #[inline]
    pub fn samples(&self) -> &[i32; WRAP] {
        &self.0
    }

    /// Transforms block of samples into residuals
    ///
    /// Residuals are calculated over our samples
    /// followed by the block, and one residual
    /// is returned per sample in the block.
    pub fn residuals(&self, predictor: Predictor, block: &[i32]) -> Vec<i32> {
        let mut history = self.0;

        block
            .iter()
            .map(|sample| {
                let residual = sample.wrapping_sub(predictor.predict(history));
                history = [history[1], history[2], *sample];
                residual
            })
            .collect()
    }

    /// Transforms residuals back into a block of samples
    ///
    /// This reverses [`Wrap::residuals`] when given the same
    /// predictor and wrapped samples.
    pub fn restore(&self, predictor: Predictor, residuals: &[i32]) -> Vec<i32> {
        let mut history = self.0;

        residuals
            .iter()
            .map(|residual| {
                let sample = residual.wrapping_add(predictor.predict(history));
                history = [history[1], history[2], sample];
                sample
            })
            .collect()
    }

    /// Carries the end of the given block forward
    ///
    /// Blocks shorter than the wrap keep some of
    /// our existing samples.
    pub fn update(&mut self, block: &[i32]) {
        match block.len() {
            len @ ..WRAP => {
                self.0.rotate_left(len);
                self.0[WRAP - len..].copy_from_slice(block);
            }
            len => {
                self.0.copy_from_slice(&block[len - WRAP..]);
            }
        }
    }
}

impl From<[i32; WRAP]> for Wrap {
    #[inline]
    fn from(samples: [i32; WRAP]) -> Self {
        Self(samples)
    }
}

#[test]
fn test_diff1() {
    let mut wrap = Wrap::default();

    assert_eq!(
        wrap.residuals(Predictor::Diff1, &[10, 12, 9, 9]),
        vec![10, 2, -3, 0]
    );
    wrap.update(&[10, 12, 9, 9]);
    assert_eq!(wrap.samples(), &[12, 9, 9]);

    assert_eq!(wrap.residuals(Predictor::Diff1, &[11]), vec![2]);
    wrap.update(&[11]);
    assert_eq!(wrap.samples(), &[9, 9, 11]);

    wrap.update(&[]);
    assert_eq!(wrap.samples(), &[9, 9, 11]);
}

#[test]
fn test_higher_orders() {
    let wrap = Wrap::from([1, 2, 4]);

    // a straight line is perfectly predicted by DIFF2
    assert_eq!(
        wrap.residuals(Predictor::Diff2, &[6, 8, 10]),
        vec![0, 0, 0]
    );

    // and a parabola by DIFF3
    let wrap = Wrap::from([0, 1, 4]);
    assert_eq!(
        wrap.residuals(Predictor::Diff3, &[9, 16, 25, 36]),
        vec![0, 0, 0, 0]
    );
}

#[test]
fn test_restore() {
    for predictor in Predictor::ALL {
        for len in [0, 1, 2, 3, 4, 255, 256] {
            let wrap = Wrap::from([
                fastrand::i32(-32768..32768),
                fastrand::i32(-32768..32768),
                fastrand::i32(-32768..32768),
            ]);

            let block = std::iter::repeat_with(|| fastrand::i32(-32768..32768))
                .take(len)
                .collect::<Vec<_>>();

            let residuals = wrap.residuals(predictor, &block);
            assert_eq!(residuals.len(), block.len());
            assert_eq!(wrap.restore(predictor, &residuals), block);
        }
    }

    // extreme values wrap around rather than overflowing
    let wrap = Wrap::from([i32::MIN, i32::MAX, i32::MIN]);
    let block = [i32::MAX, i32::MIN, 0, i32::MAX];
    for predictor in Predictor::ALL {
        let residuals = wrap.residuals(predictor, &block);
        assert_eq!(wrap.restore(predictor, &residuals), block);
    }
}

#[test]
fn test_update() {
    let mut wrap = Wrap::default();
    wrap.update(&[1, 2, 3, 4, 5]);
    assert_eq!(wrap.samples(), &[3, 4, 5]);
    wrap.update(&[6, 7]);
    assert_eq!(wrap.samples(), &[5, 6, 7]);
    wrap.update(&[8, 9, 10]);
    assert_eq!(wrap.samples(), &[8, 9, 10]);
}
