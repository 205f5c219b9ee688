// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A library for encoding Shorten (SHN) lossless audio files
//!
//! A Shorten file is a 5 byte preamble (the `ajkg` magic number
//! and a version byte) followed by a stream of commands.
//! Each command is a small function code followed by
//! variable-length coded integers, and the stream is
//! terminated by a QUIT command and some padding.
//!
//! | Command | Purpose |
//! |--------:|---------|
//! | DIFF1, DIFF2, DIFF3 | a channel's block of samples as predicted residuals |
//! | QUIT | end of stream |
//! | BLOCKSIZE | a new block size for subsequent blocks |
//! | ZERO | a channel's block of silence |
//! | VERBATIM | a chunk of raw bytes, typically from a RIFF WAVE or AIFF header |
//!
//! # Example
//!
//! ```
//! use shorten_codec::encode::{EncodingOptions, VerbatimChunk, encode};
//! use shorten_codec::source::MemorySource;
//!
//! let source = MemorySource::new(16, vec![vec![10, 12, 9, 9, 11]]).unwrap();
//!
//! let mut shn = vec![];
//!
//! encode(
//!     &mut shn,
//!     source,
//!     EncodingOptions::default().block_size(4).unwrap(),
//!     [VerbatimChunk::Audio],
//! )
//! .unwrap();
//!
//! assert_eq!(&shn[0..5], b"ajkg\x02");
//! ```

#![warn(missing_docs)]

pub mod aiff;
pub mod audio;
pub mod byteorder;
pub mod encode;
pub mod predict;
pub mod residual;
pub mod source;
pub mod stream;
pub mod vlc;
pub mod wave;

/// Shorten's magic number, the ASCII string `ajkg`
pub const MAGIC: &[u8; 4] = b"ajkg";

/// The Shorten format version written by this encoder
pub const VERSION: u8 = 2;

/// A Shorten encoding error
#[derive(Debug)]
pub enum Error {
    /// An I/O error writing the destination
    Io(std::io::Error),
    /// An error reading from the PCM source
    Source(std::io::Error),
    /// The requested block size is zero or too large
    InvalidBlockSize,
    /// The source's bits-per-sample is not 8 or 16
    InvalidBitsPerSample,
    /// A fixed residual energy is too large
    InvalidEnergy,
    /// A fixed long width is too large
    InvalidLongWidth,
    /// A block's channel count doesn't match the stream's
    ChannelCountMismatch,
    /// A block is longer than the stream's block size
    ExcessiveBlockSize,
    /// A sample doesn't fit the stream's sample format
    SampleOutOfRange,
    /// A verbatim chunk is too large to encode
    ExcessiveVerbatimSize,
    /// A RIFF WAVE header's file is too large for its size fields
    ExcessiveWaveSize,
    /// An AIFF header's file is too large for its size fields
    ExcessiveAiffSize,
}

/// The broad category of an [`Error`]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Invalid encoding parameters, detected before any output
    Configuration,
    /// Failure writing the destination
    Io,
    /// Failure reading the PCM source
    Source,
    /// Input which cannot be represented in the stream
    Encoding,
}

impl Error {
    /// Returns the broad category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Source(_) => ErrorKind::Source,
            Self::InvalidBlockSize
            | Self::InvalidBitsPerSample
            | Self::InvalidEnergy
            | Self::InvalidLongWidth => ErrorKind::Configuration,
            Self::ChannelCountMismatch
            | Self::ExcessiveBlockSize
            | Self::SampleOutOfRange
            | Self::ExcessiveVerbatimSize
            | Self::ExcessiveWaveSize
            | Self::ExcessiveAiffSize => ErrorKind::Encoding,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::Source(e) => write!(f, "error reading PCM source: {e}"),
            Self::InvalidBlockSize => "block size must be positive".fmt(f),
            Self::InvalidBitsPerSample => "bits-per-sample must be 8 or 16".fmt(f),
            Self::InvalidEnergy => "residual energy too large".fmt(f),
            Self::InvalidLongWidth => "long width too large".fmt(f),
            Self::ChannelCountMismatch => "block channel count mismatch".fmt(f),
            Self::ExcessiveBlockSize => "block larger than stream's block size".fmt(f),
            Self::SampleOutOfRange => "sample out of range for sample format".fmt(f),
            Self::ExcessiveVerbatimSize => "verbatim chunk too large".fmt(f),
            Self::ExcessiveWaveSize => "RIFF WAVE file too large".fmt(f),
            Self::ExcessiveAiffSize => "AIFF file too large".fmt(f),
        }
    }
}

/// A writer which counts the bytes passing through it
pub struct Counter<W> {
    stream: W,
    /// Total bytes written so far
    pub count: u64,
}

impl<W> Counter<W> {
    /// Wraps writer with a zeroed counter
    pub fn new(stream: W) -> Self {
        Self { stream, count: 0 }
    }

    /// Returns the wrapped writer
    pub fn into_writer(self) -> W {
        self.stream
    }
}

impl<W: std::io::Write> std::io::Write for Counter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf).inspect(|amt| {
            self.count += *amt as u64;
        })
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}
