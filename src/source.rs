// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Sources of PCM samples to be encoded

use crate::Error;
use crate::audio::Frame;
use crate::byteorder::{ByteSign, Endianness};
use crate::stream::SampleFormat;
use std::marker::PhantomData;
use std::num::NonZero;

/// A source of PCM sample blocks
///
/// Any resources held by the source are released when it is dropped.
pub trait PcmSource {
    /// Reads up to `pcm_frames` frames of samples
    ///
    /// An empty frame indicates the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`] if the underlying source fails.
    fn read(&mut self, pcm_frames: usize) -> Result<Frame, Error>;

    /// Returns source's channel count
    fn channel_count(&self) -> NonZero<u16>;

    /// Returns source's bits-per-sample
    fn bits_per_sample(&self) -> u32;
}

impl<S: PcmSource + ?Sized> PcmSource for &mut S {
    #[inline]
    fn read(&mut self, pcm_frames: usize) -> Result<Frame, Error> {
        (**self).read(pcm_frames)
    }

    #[inline]
    fn channel_count(&self) -> NonZero<u16> {
        (**self).channel_count()
    }

    #[inline]
    fn bits_per_sample(&self) -> u32 {
        (**self).bits_per_sample()
    }
}

/// A source of interleaved PCM bytes from some reader
///
/// 8-bit bytes are unsigned unless set otherwise,
/// 16-bit samples are signed in the given byte order.
pub struct PcmReader<R, E> {
    reader: R,
    channels: NonZero<u16>,
    bits_per_sample: u32,
    sign: ByteSign,
    buf: Vec<u8>,
    endianness: PhantomData<E>,
}

impl<R: std::io::Read, E: Endianness> PcmReader<R, E> {
    /// Wraps reader of raw PCM bytes
    pub fn new(reader: R, channels: NonZero<u16>, bits_per_sample: u32) -> Self {
        Self {
            reader,
            channels,
            bits_per_sample,
            sign: ByteSign::default(),
            buf: Vec::new(),
            endianness: PhantomData,
        }
    }

    /// Wraps reader of raw PCM bytes in the given byte order
    pub fn endian(reader: R, _endianness: E, channels: NonZero<u16>, bits_per_sample: u32) -> Self {
        Self::new(reader, channels, bits_per_sample)
    }

    /// Sets how 8-bit PCM bytes are signed
    ///
    /// They are unsigned by default.
    pub fn byte_sign(self, sign: ByteSign) -> Self {
        Self { sign, ..self }
    }
}

impl<R: std::io::Read, E: Endianness> PcmSource for PcmReader<R, E> {
    fn read(&mut self, pcm_frames: usize) -> Result<Frame, Error> {
        let bytes_per_frame = match SampleFormat::try_from(self.bits_per_sample)? {
            SampleFormat::Unsigned8 => 1,
            SampleFormat::Signed16Le => 2,
        } * usize::from(self.channels.get());

        self.buf.resize(pcm_frames * bytes_per_frame, 0);

        // fill as much of the buffer as possible,
        // so short reads don't yield short blocks
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(amt) => filled += amt,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::Source(err)),
            }
        }

        if filled % bytes_per_frame != 0 {
            return Err(Error::Source(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "partial PCM frame at end of stream",
            )));
        }

        let mut frame = Frame::empty(self.channels.get().into(), self.bits_per_sample);
        frame.fill_from_buf::<E>(&self.buf[0..filled], self.sign);
        Ok(frame)
    }

    #[inline]
    fn channel_count(&self) -> NonZero<u16> {
        self.channels
    }

    #[inline]
    fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }
}

/// A source of samples held in memory
#[derive(Clone, Debug)]
pub struct MemorySource {
    channels: Vec<Vec<i32>>,
    channel_count: NonZero<u16>,
    bits_per_sample: u32,
    position: usize,
}

impl MemorySource {
    /// Builds source from per-channel samples
    ///
    /// Returns `None` if there are no channels,
    /// too many channels, or if the channels differ in length.
    pub fn new(bits_per_sample: u32, channels: Vec<Vec<i32>>) -> Option<Self> {
        let channel_count = NonZero::new(u16::try_from(channels.len()).ok()?)?;
        let len = channels[0].len();

        channels.iter().all(|c| c.len() == len).then(|| Self {
            channels,
            channel_count,
            bits_per_sample,
            position: 0,
        })
    }
}

impl PcmSource for MemorySource {
    fn read(&mut self, pcm_frames: usize) -> Result<Frame, Error> {
        let remaining = self.channels[0].len() - self.position;
        let range = self.position..self.position + pcm_frames.min(remaining);
        self.position = range.end;

        let mut frame = Frame::default();

        for (o, i) in frame
            .resized_channels(self.bits_per_sample, self.channels.len(), range.len())
            .zip(self.channels.iter())
        {
            o.copy_from_slice(&i[range.clone()]);
        }

        Ok(frame)
    }

    #[inline]
    fn channel_count(&self) -> NonZero<u16> {
        self.channel_count
    }

    #[inline]
    fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }
}

#[test]
fn test_memory_source() {
    let mut source =
        MemorySource::new(16, vec![vec![10, 12, 9, 9, 11], vec![1, 2, 3, 4, 5]]).unwrap();

    let block = source.read(4).unwrap();
    assert_eq!(block.pcm_frames(), 4);
    assert_eq!(block.channel(0), Some([10, 12, 9, 9].as_slice()));
    assert_eq!(block.channel(1), Some([1, 2, 3, 4].as_slice()));

    let block = source.read(4).unwrap();
    assert_eq!(block.channel(0), Some([11].as_slice()));
    assert_eq!(block.channel(1), Some([5].as_slice()));

    let block = source.read(4).unwrap();
    assert!(block.is_empty());
    assert_eq!(block.channel_count(), 2);

    assert!(MemorySource::new(16, vec![]).is_none());
    assert!(MemorySource::new(16, vec![vec![1], vec![]]).is_none());
}

#[test]
fn test_pcm_reader() {
    use crate::byteorder::{BigEndian, LittleEndian};

    let bytes: &[u8] = &[0x01, 0x00, 0xFF, 0xFF, 0x02, 0x00, 0xFE, 0xFF, 0x03, 0x00, 0xFD, 0xFF];
    let mut source = PcmReader::endian(bytes, LittleEndian, NonZero::new(2).unwrap(), 16);

    let block = source.read(2).unwrap();
    assert_eq!(block.channel(0), Some([1, 2].as_slice()));
    assert_eq!(block.channel(1), Some([-1, -2].as_slice()));

    let block = source.read(2).unwrap();
    assert_eq!(block.channel(0), Some([3].as_slice()));
    assert_eq!(block.channel(1), Some([-3].as_slice()));

    assert!(source.read(2).unwrap().is_empty());

    // a partial PCM frame is a source error
    let bytes: &[u8] = &[0x01, 0x00, 0xFF];
    let mut source = PcmReader::endian(bytes, LittleEndian, NonZero::new(2).unwrap(), 16);
    assert!(matches!(source.read(2), Err(Error::Source(_))));

    // signed 8-bit bytes, as AIFF files store them
    let bytes: &[u8] = &[0x00, 0x80, 0x7F, 0xFF];
    let mut source = PcmReader::endian(bytes, BigEndian, NonZero::new(1).unwrap(), 8)
        .byte_sign(ByteSign::Signed);
    let block = source.read(4).unwrap();
    assert_eq!(block.channel(0), Some([0, -128, 127, -1].as_slice()));
}
