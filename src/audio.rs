// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Blocks of PCM samples

use crate::byteorder::{ByteSign, Endianness};

/// A block of PCM samples, stored channel by channel
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Frame {
    // all samples, stacked by channel
    samples: Vec<i32>,

    // total number of channels
    channels: usize,

    // total length of each channel in samples
    channel_len: usize,

    // bits-per-sample
    bits_per_sample: u32,
}

impl Frame {
    /// Returns empty Frame which can be filled as needed
    #[inline]
    pub fn empty(channels: usize, bits_per_sample: u32) -> Self {
        Self {
            samples: Vec::new(),
            channels,
            channel_len: 0,
            bits_per_sample,
        }
    }

    /// Builds frame from per-channel sample vectors
    ///
    /// Returns `None` if the channels differ in length.
    pub fn from_channels<C: AsRef<[i32]>>(bits_per_sample: u32, channels: &[C]) -> Option<Self> {
        let channel_len = channels.first().map(|c| c.as_ref().len()).unwrap_or(0);

        channels
            .iter()
            .all(|c| c.as_ref().len() == channel_len)
            .then(|| Self {
                samples: channels
                    .iter()
                    .flat_map(|c| c.as_ref().iter().copied())
                    .collect(),
                channels: channels.len(),
                channel_len,
                bits_per_sample,
            })
    }

    /// Returns PCM frame count
    #[inline]
    pub fn pcm_frames(&self) -> usize {
        self.channel_len
    }

    /// Returns channel count
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Returns bits-per-sample
    #[inline]
    pub fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    /// Returns true if the frame contains no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channel_len == 0
    }

    /// Resizes our frame with the given parameters and returns channel iterator
    pub fn resized_channels(
        &mut self,
        bits_per_sample: u32,
        channels: usize,
        block_size: usize,
    ) -> impl Iterator<Item = &mut [i32]> {
        self.bits_per_sample = bits_per_sample;
        self.channels = channels;
        self.channel_len = block_size;
        self.samples.resize(channels * block_size, 0);
        self.samples.chunks_exact_mut(block_size.max(1))
    }

    /// Returns bytes-per-sample
    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample.div_ceil(8) as usize
    }

    /// Returns the given channel's samples, if present
    #[inline]
    pub fn channel(&self, channel: usize) -> Option<&[i32]> {
        (channel < self.channels)
            .then(|| &self.samples[channel * self.channel_len..(channel + 1) * self.channel_len])
    }

    /// Iterates over all channels
    #[inline]
    pub fn channels(&self) -> impl Iterator<Item = &[i32]> {
        (0..self.channels).filter_map(|c| self.channel(c))
    }

    /// Fills frame samples from bytes of the given endianness
    ///
    /// 8-bit samples are read according to `sign`.
    /// Any trailing partial PCM frame is ignored.
    pub fn fill_from_buf<E: Endianness>(&mut self, buf: &[u8], sign: ByteSign) -> &Self {
        let bytes_per_frame = self.bytes_per_sample() * self.channels;
        let channel_len = buf.len().checked_div(bytes_per_frame).unwrap_or(0);
        let channels = self.channels;

        match self.bytes_per_sample() {
            1 => {
                for (channel, c) in self
                    .resized_channels(8, channels, channel_len)
                    .zip(0..)
                {
                    for (s, sample) in channel.iter_mut().enumerate() {
                        *sample = sign.to_i8(buf[s * channels + c]).into();
                    }
                }
            }
            2 => {
                for (channel, c) in self
                    .resized_channels(16, channels, channel_len)
                    .zip(0..)
                {
                    for (s, sample) in channel.iter_mut().enumerate() {
                        let offset = (s * channels + c) * 2;
                        *sample = E::bytes_to_i16([buf[offset], buf[offset + 1]]).into();
                    }
                }
            }
            _ => panic!("unsupported number of bytes per sample"),
        }

        self
    }
}

#[test]
fn test_channels() {
    let frame = Frame::from_channels(16, &[vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
    assert_eq!(frame.pcm_frames(), 3);
    assert_eq!(frame.channel_count(), 2);
    assert_eq!(frame.channel(0), Some([1, 2, 3].as_slice()));
    assert_eq!(frame.channel(1), Some([4, 5, 6].as_slice()));
    assert_eq!(frame.channel(2), None);

    assert!(Frame::from_channels(16, &[vec![1, 2, 3], vec![4, 5]]).is_none());

    // empty frames still know their channel count
    let empty = Frame::empty(2, 16);
    assert!(empty.is_empty());
    assert_eq!(empty.channels().count(), 2);
    assert!(empty.channels().all(|c| c.is_empty()));
}

#[test]
fn test_fill_from_buf() {
    use crate::byteorder::{BigEndian, LittleEndian};

    let le = [0x00, 0x80, 0xFF, 0x7F, 0x00, 0x00, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0x01];

    let mut frame = Frame::empty(2, 16);
    frame.fill_from_buf::<LittleEndian>(&le, ByteSign::Unsigned);
    assert_eq!(frame.pcm_frames(), 3);
    assert_eq!(frame.channel(0), Some([-32768, 0, 1].as_slice()));
    assert_eq!(frame.channel(1), Some([32767, -1, 256].as_slice()));

    let be = le
        .chunks_exact(2)
        .flat_map(|pair| [pair[1], pair[0]])
        .collect::<Vec<_>>();

    let mut frame2 = Frame::empty(2, 16);
    assert_eq!(frame2.fill_from_buf::<BigEndian>(&be, ByteSign::Unsigned), &frame);

    // a trailing partial PCM frame is ignored
    let mut frame2 = Frame::empty(2, 16);
    frame2.fill_from_buf::<LittleEndian>(&le[0..7], ByteSign::Unsigned);
    assert_eq!(frame2.channel(0), Some([-32768].as_slice()));
    assert_eq!(frame2.channel(1), Some([32767].as_slice()));

    // 8-bit bytes are unsigned or signed, in either byte order
    let mut frame = Frame::empty(1, 8);
    frame.fill_from_buf::<LittleEndian>(&[0x00, 0x80, 0xFF], ByteSign::Unsigned);
    assert_eq!(frame.channel(0), Some([-128, 0, 127].as_slice()));

    frame.fill_from_buf::<BigEndian>(&[0x00, 0x80, 0xFF], ByteSign::Signed);
    assert_eq!(frame.channel(0), Some([0, -128, -1].as_slice()));
}
