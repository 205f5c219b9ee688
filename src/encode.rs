// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For encoding PCM samples to Shorten files

use crate::audio::Frame;
use crate::predict::{Prediction, Predictor, Wrap};
use crate::residual::{Energy, Residuals};
use crate::source::PcmSource;
use crate::stream::{Command, Header, SampleFormat};
use crate::vlc::LongWidth;
use crate::{Counter, Error, MAGIC, VERSION};
use arrayvec::ArrayVec;
use bitstream_io::{BigEndian, BitWrite, BitWriter};
use log::{debug, trace, warn};
use std::io::Write;
use std::num::NonZero;
use std::path::Path;

/// How the end of the stream is padded
///
/// Shorten's reference decoder reads its input in 4 byte words,
/// so the stream following the 5 byte preamble should be
/// a multiple of 4 bytes long.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Padding {
    /// Pad the stream to a multiple of 4 bytes
    #[default]
    Aligned,
    /// Pad the stream the way the historical encoder did
    ///
    /// This adds as many bytes as the stream is
    /// over a multiple of 4, which does not generally
    /// align the stream at all.
    Historical,
}

impl Padding {
    /// Returns padding bytes needed for a stream of the given size
    ///
    /// The size excludes the 5 byte preamble.
    pub fn bytes(self, stream_len: u64) -> u64 {
        match self {
            Self::Aligned => (4 - stream_len % 4) % 4,
            Self::Historical => stream_len % 4,
        }
    }
}

/// Shorten encoding options
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EncodingOptions {
    block_size: NonZero<u32>,
    energy: Energy,
    long_width: LongWidth,
    prediction: Prediction,
    padding: Padding,
}

impl EncodingOptions {
    /// The default block size, in PCM frames
    pub const DEFAULT_BLOCK_SIZE: NonZero<u32> = NonZero::new(256).unwrap();

    /// Options which reproduce the historical encoder's output exactly
    ///
    /// This uses a fixed residual energy of 2, fixed long widths of 3,
    /// only the DIFF1 predictor and the historical padding.
    pub fn historical() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            energy: Energy::HISTORICAL,
            long_width: LongWidth::HISTORICAL,
            prediction: Prediction::Diff1,
            padding: Padding::Historical,
        }
    }

    /// Assigns new block size to options
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlockSize`] if the block size is 0.
    pub fn block_size(self, block_size: u32) -> Result<Self, Error> {
        Ok(Self {
            block_size: NonZero::new(block_size).ok_or(Error::InvalidBlockSize)?,
            ..self
        })
    }

    /// Assigns new residual energy selection to options
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEnergy`] if a fixed energy is too large.
    pub fn energy(self, energy: Energy) -> Result<Self, Error> {
        Ok(Self {
            energy: energy.validate()?,
            ..self
        })
    }

    /// Assigns new long width selection to options
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLongWidth`] if a fixed width is too large.
    pub fn long_width(self, long_width: LongWidth) -> Result<Self, Error> {
        Ok(Self {
            long_width: long_width.validate()?,
            ..self
        })
    }

    /// Assigns new predictor selection to options
    pub fn prediction(self, prediction: Prediction) -> Self {
        Self { prediction, ..self }
    }

    /// Assigns new end-of-stream padding to options
    pub fn padding(self, padding: Padding) -> Self {
        Self { padding, ..self }
    }
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            energy: Energy::default(),
            long_width: LongWidth::default(),
            prediction: Prediction::default(),
            padding: Padding::default(),
        }
    }
}

/// An item to be written to the Shorten stream, in order
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerbatimChunk {
    /// Raw bytes, such as a RIFF WAVE header
    Bytes(Vec<u8>),
    /// The position at which the PCM source's audio is encoded
    ///
    /// Only the first of these has any effect.
    Audio,
}

impl From<Vec<u8>> for VerbatimChunk {
    #[inline]
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for VerbatimChunk {
    #[inline]
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

/// A Shorten encoder
///
/// The encoder writes the stream's preamble and header
/// when created, and each method adds commands to the stream.
/// The stream must be closed with [`Encoder::finalize`].
/// Dropping the encoder without finalizing it leaves
/// the stream incomplete.
pub struct Encoder<W: std::io::Write> {
    writer: BitWriter<Counter<W>, BigEndian>,
    options: EncodingOptions,
    format: SampleFormat,
    wraps: Box<[Wrap]>,
    block_size: NonZero<u32>,
}

impl<W: std::io::Write> Encoder<W> {
    /// Creates new encoder with the given parameters
    ///
    /// # Errors
    ///
    /// Returns I/O error if unable to write the
    /// stream's preamble and header.
    pub fn new(
        mut writer: W,
        options: EncodingOptions,
        format: SampleFormat,
        channels: NonZero<u16>,
    ) -> Result<Self, Error> {
        // the preamble isn't included in the stream's length
        writer.write_all(MAGIC)?;
        writer.write_all(&[VERSION])?;

        let mut writer = BitWriter::endian(Counter::new(writer), BigEndian);

        writer.build_with(
            &Header {
                format,
                channels,
                block_size: options.block_size,
            },
            &options.long_width,
        )?;

        debug!(
            "encoding {format:?} stream with {channels} channel(s) and block size {}",
            options.block_size
        );

        Ok(Self {
            writer,
            options,
            format,
            wraps: vec![Wrap::default(); channels.get().into()].into_boxed_slice(),
            block_size: options.block_size,
        })
    }

    fn command(&mut self, command: Command<'_>) -> Result<(), Error> {
        self.writer.build_with(&command, &self.options.long_width)
    }

    /// Writes chunk of raw bytes to the stream
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the underlying stream,
    /// or [`Error::ExcessiveVerbatimSize`] if the chunk
    /// is too large to encode.
    pub fn verbatim(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.command(Command::Verbatim(bytes))
    }

    /// Encodes a block of samples, one command per channel
    ///
    /// Blocks whose length differs from the previous block
    /// are preceded by a BLOCKSIZE command.
    /// Empty blocks are ignored.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the underlying stream,
    /// [`Error::ExcessiveBlockSize`] if the frame is longer
    /// than the header's block size,
    /// or an error if the frame's channel count or samples
    /// don't match the stream's.
    pub fn encode_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        if frame.channel_count() != self.wraps.len() {
            return Err(Error::ChannelCountMismatch);
        }

        let block_size = match u32::try_from(frame.pcm_frames()).map(NonZero::new) {
            Ok(Some(block_size)) => block_size,
            Ok(None) => return Ok(()),
            Err(_) => return Err(Error::ExcessiveBlockSize),
        };

        // the header's block size is the largest a block may be
        if block_size > self.options.block_size {
            return Err(Error::ExcessiveBlockSize);
        }

        let range = self.format.range();
        if !frame.channels().flatten().all(|s| range.contains(s)) {
            return Err(Error::SampleOutOfRange);
        }

        if block_size != self.block_size {
            debug!("block size changed from {} to {block_size}", self.block_size);
            self.command(Command::BlockSize(block_size.get()))?;
            self.block_size = block_size;
        }

        for ((samples, wrap), channel) in frame.channels().zip(self.wraps.iter_mut()).zip(0..) {
            encode_channel(
                &mut self.writer,
                &self.options,
                channel,
                samples,
                wrap,
            )?;
        }

        Ok(())
    }

    /// Encodes all the blocks from the given source
    ///
    /// Blocks are read until the source returns an empty one.
    ///
    /// # Errors
    ///
    /// Returns any error from the source or underlying stream,
    /// or an error if the source's blocks are larger than
    /// requested or don't match the stream's parameters.
    pub fn encode_source<S: PcmSource + ?Sized>(&mut self, source: &mut S) -> Result<(), Error> {
        let requested = self.options.block_size.get() as usize;
        let mut pcm_frames = 0;

        loop {
            let frame = source.read(requested)?;
            if frame.is_empty() {
                break;
            }
            pcm_frames += frame.pcm_frames() as u64;
            self.encode_frame(&frame)?;
        }

        debug!("encoded {pcm_frames} PCM frames");

        Ok(())
    }

    /// Finishes the stream and returns its size in bytes
    ///
    /// This writes the QUIT command and the stream's
    /// trailing padding, then flushes the underlying writer.
    /// The size excludes the 5 byte preamble.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the underlying stream.
    pub fn finalize(mut self) -> Result<u64, Error> {
        self.command(Command::Quit)?;
        self.writer.byte_align()?;

        let mut counter = self.writer.into_writer();
        let padding = self.options.padding.bytes(counter.count);
        counter.write_all(&[0; 4][0..padding as usize])?;
        counter.flush()?;

        debug!(
            "wrote {} bytes after preamble, including {padding} bytes of padding",
            counter.count
        );

        Ok(counter.count)
    }
}

fn encode_channel<W: BitWrite>(
    w: &mut W,
    options: &EncodingOptions,
    channel: usize,
    samples: &[i32],
    wrap: &mut Wrap,
) -> Result<(), Error> {
    match options.prediction {
        Prediction::Diff1 => {
            let residuals =
                Residuals::new(options.energy, wrap.residuals(Predictor::Diff1, samples));
            trace!("channel {channel}: DIFF1, energy {}", residuals.energy);
            w.build_with(&Command::Diff1(&residuals), &options.long_width)?;
        }
        Prediction::Adaptive if samples.iter().all(|s| *s == 0) => {
            trace!("channel {channel}: ZERO");
            w.build_with(&Command::Zero, &options.long_width)?;
        }
        Prediction::Adaptive => {
            let candidates = Predictor::ALL
                .into_iter()
                .map(|predictor| {
                    (
                        predictor,
                        Residuals::new(options.energy, wrap.residuals(predictor, samples)),
                    )
                })
                .collect::<ArrayVec<_, 3>>();

            // ties go to the lower order
            if let Some((predictor, residuals)) =
                candidates.iter().min_by_key(|(_, residuals)| residuals.bits())
            {
                trace!(
                    "channel {channel}: {predictor:?}, energy {}",
                    residuals.energy
                );
                w.build_with(
                    &match predictor {
                        Predictor::Diff1 => Command::Diff1(residuals),
                        Predictor::Diff2 => Command::Diff2(residuals),
                        Predictor::Diff3 => Command::Diff3(residuals),
                    },
                    &options.long_width,
                )?;
            }
        }
    }

    wrap.update(samples);

    Ok(())
}

/// Encodes a whole Shorten stream to the given writer
///
/// Chunks are written to the stream in order,
/// and the source's audio is encoded at the first
/// [`VerbatimChunk::Audio`] marker.
/// Any later markers are ignored, and if there are
/// no markers at all the source's audio is not encoded.
///
/// Returns the stream's size in bytes, excluding the 5 byte preamble.
///
/// # Errors
///
/// Returns [`Error::InvalidBitsPerSample`] before writing anything
/// if the source is not 8 or 16 bits-per-sample.
/// Returns any error from the source or writer.
/// The stream is left incomplete in that case.
pub fn encode<W, S, I>(
    writer: W,
    mut source: S,
    options: EncodingOptions,
    chunks: I,
) -> Result<u64, Error>
where
    W: std::io::Write,
    S: PcmSource,
    I: IntoIterator<Item = VerbatimChunk>,
{
    let format = SampleFormat::try_from(source.bits_per_sample())?;

    let mut encoder = Encoder::new(writer, options, format, source.channel_count())?;
    let mut audio_encoded = false;

    for chunk in chunks {
        match chunk {
            VerbatimChunk::Bytes(bytes) => encoder.verbatim(&bytes)?,
            VerbatimChunk::Audio if !audio_encoded => {
                encoder.encode_source(&mut source)?;
                audio_encoded = true;
            }
            VerbatimChunk::Audio => warn!("ignoring repeated audio marker"),
        }
    }

    encoder.finalize()
}

/// Encodes a whole Shorten stream to a new file at the given path
///
/// The file is not created if the source's
/// parameters are invalid.
/// See [`encode`] for more details.
///
/// # Errors
///
/// Returns [`Error::InvalidBitsPerSample`] if the source is not
/// 8 or 16 bits-per-sample, an I/O error if the file
/// cannot be created or written, or any error from the source.
pub fn encode_file<P, S, I>(
    path: P,
    source: S,
    options: EncodingOptions,
    chunks: I,
) -> Result<u64, Error>
where
    P: AsRef<Path>,
    S: PcmSource,
    I: IntoIterator<Item = VerbatimChunk>,
{
    use std::fs::File;
    use std::io::BufWriter;

    SampleFormat::try_from(source.bits_per_sample())?;

    encode(
        BufWriter::new(File::create(path.as_ref())?),
        source,
        options,
        chunks,
    )
}

#[test]
fn test_padding() {
    assert_eq!(Padding::Aligned.bytes(0), 0);
    assert_eq!(Padding::Aligned.bytes(1), 3);
    assert_eq!(Padding::Aligned.bytes(2), 2);
    assert_eq!(Padding::Aligned.bytes(3), 1);
    assert_eq!(Padding::Aligned.bytes(4), 0);

    assert_eq!(Padding::Historical.bytes(0), 0);
    assert_eq!(Padding::Historical.bytes(1), 1);
    assert_eq!(Padding::Historical.bytes(2), 2);
    assert_eq!(Padding::Historical.bytes(3), 3);
    assert_eq!(Padding::Historical.bytes(4), 0);
}

#[test]
fn test_options() {
    assert!(matches!(
        EncodingOptions::default().block_size(0),
        Err(Error::InvalidBlockSize)
    ));
    assert!(matches!(
        EncodingOptions::default().energy(Energy::Fixed(31)),
        Err(Error::InvalidEnergy)
    ));
    assert!(matches!(
        EncodingOptions::default().long_width(LongWidth::Fixed(33)),
        Err(Error::InvalidLongWidth)
    ));
    assert_eq!(
        EncodingOptions::default()
            .block_size(4096)
            .unwrap()
            .block_size,
        NonZero::new(4096).unwrap()
    );
}
