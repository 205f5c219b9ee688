// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::ffi::OsString;
use std::path::Path;

fn main() {
    match std::env::args_os().skip(1).collect::<Vec<_>>().as_slice() {
        [] => eprintln!("* Usage: wav2shn [file 1.wav] [file 2.wav] ..."),
        wavs => {
            if let Err(err) = wav2shn(wavs) {
                eprintln!("* Error: {err}");
            }
        }
    }
}

#[cfg(not(feature = "rayon"))]
fn wav2shn(wavs: &[OsString]) -> Result<(), Error> {
    for wav in wavs {
        convert_wav(wav.as_ref())?;
    }
    Ok(())
}

#[cfg(feature = "rayon")]
fn wav2shn(wavs: &[OsString]) -> Result<(), Error> {
    use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

    wavs.par_iter()
        .try_for_each(|wav| convert_wav(wav.as_ref()))
}

fn convert_wav(wav: &Path) -> Result<(), Error> {
    use bitstream_io::{ByteRead, ByteReader, ByteWrite, ByteWriter, LittleEndian};
    use shorten_codec::encode::{EncodingOptions, VerbatimChunk, encode_file};
    use shorten_codec::source::PcmReader;
    use std::fs::File;
    use std::io::{BufReader, Read, Seek, SeekFrom};

    let shn_path = wav.with_extension("shn");
    if shn_path.exists() {
        eprintln!("{} already exists, skipping...", shn_path.display());
        return Ok(());
    }

    let mut wav = ByteReader::endian(BufReader::new(File::open(wav)?), LittleEndian);

    // everything up to the start of the PCM data
    // is stored as-is in the leading VERBATIM chunk,
    // and everything after it in the trailing one
    let mut head = ByteWriter::endian(vec![], LittleEndian);
    let mut tail = ByteWriter::endian(vec![], LittleEndian);

    let mut fmt_chunk = None;
    let mut data = None;

    let file_header = wav.parse::<FileHeader>()?;
    head.build(&file_header)?;

    let mut remaining_bytes = file_header
        .file_size
        .checked_sub(4)
        .ok_or(Error::InvalidWave)?;

    while remaining_bytes > 0 {
        let chunk_header = wav.parse::<Header>()?;
        remaining_bytes = remaining_bytes.checked_sub(8).ok_or(Error::InvalidWave)?;

        let output = if data.is_none() { &mut head } else { &mut tail };
        output.build(&chunk_header)?;

        match chunk_header.id {
            // "data" chunk
            [0x64, 0x61, 0x74, 0x61] => {
                if fmt_chunk.is_none() || data.is_some() {
                    // multiple "data" chunks is invalid
                    return Err(Error::InvalidWave);
                }

                data = Some((wav.reader().stream_position()?, chunk_header.size));

                // the data chunk could potentially be very large,
                // so seek over it instead of using a skip
                wav.reader()
                    .seek(SeekFrom::Current(chunk_header.size.into()))?;
            }
            id => {
                let mut chunk_data =
                    vec![0; usize::try_from(chunk_header.size).map_err(|_| Error::InvalidWave)?];
                wav.read_bytes(&mut chunk_data)?;
                output.write_bytes(&chunk_data)?;

                // "fmt " chunk
                if id == [0x66, 0x6d, 0x74, 0x20] {
                    if fmt_chunk.is_some() {
                        // multiple "fmt " chunks is invalid
                        return Err(Error::InvalidWave);
                    }
                    fmt_chunk = Some(
                        ByteReader::endian(chunk_data.as_slice(), LittleEndian).parse::<Fmt>()?,
                    );
                }
            }
        }

        remaining_bytes = remaining_bytes
            .checked_sub(chunk_header.size)
            .ok_or(Error::InvalidWave)?;

        if chunk_header.size % 2 == 1 {
            let pad = wav.read::<u8>()?;
            // the data chunk's pad byte is the start of the tail
            if data.is_some() {
                tail.write(pad)?;
            } else {
                head.write(pad)?;
            }
            remaining_bytes = remaining_bytes.checked_sub(1).ok_or(Error::InvalidWave)?;
        }
    }

    // these must be present in a valid RIFF WAVE file
    let fmt_chunk = fmt_chunk.ok_or(Error::InvalidWave)?;
    let (data_offset, data_size) = data.ok_or(Error::InvalidWave)?;

    let channels = std::num::NonZero::new(fmt_chunk.channels).ok_or(Error::InvalidWave)?;

    wav.reader().seek(SeekFrom::Start(data_offset))?;

    let mut chunks = vec![VerbatimChunk::Bytes(head.into_writer()), VerbatimChunk::Audio];
    let tail = tail.into_writer();
    if !tail.is_empty() {
        chunks.push(VerbatimChunk::Bytes(tail));
    }

    encode_file(
        &shn_path,
        PcmReader::endian(
            wav.reader().take(data_size.into()),
            shorten_codec::byteorder::LittleEndian,
            channels,
            fmt_chunk.bits_per_sample.into(),
        ),
        EncodingOptions::default(),
        chunks,
    )
    .map_err(Error::Shorten)
    .map(|_| {
        println!("* Wrote: {}", shn_path.display());
    })
}

#[derive(Copy, Clone, Debug)]
struct Header {
    id: [u8; 4],
    size: u32,
}

impl bitstream_io::FromByteStream for Header {
    type Error = std::io::Error;

    fn from_reader<R>(r: &mut R) -> Result<Self, Self::Error>
    where
        R: bitstream_io::ByteRead + ?Sized,
    {
        Ok(Self {
            id: r.read()?,
            size: r.read()?,
        })
    }
}

impl bitstream_io::ToByteStream for Header {
    type Error = std::io::Error;

    fn to_writer<W>(&self, w: &mut W) -> Result<(), Self::Error>
    where
        W: bitstream_io::ByteWrite + ?Sized,
    {
        w.write(self.id)?;
        w.write(self.size)?;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
struct FileHeader {
    file_size: u32,
}

impl bitstream_io::FromByteStream for FileHeader {
    type Error = Error;

    fn from_reader<R>(r: &mut R) -> Result<Self, Self::Error>
    where
        R: bitstream_io::ByteRead + ?Sized,
    {
        let file_size = match r.parse::<Header>()? {
            Header {
                // RIFF identifier
                id: [0x52, 0x49, 0x46, 0x46],
                size,
            } => Ok(size),
            _ => Err(Error::InvalidWave),
        }?;

        // WAVE identifier
        if r.read::<[u8; 4]>()? == [0x57, 0x41, 0x56, 0x45] {
            Ok(Self { file_size })
        } else {
            Err(Error::InvalidWave)
        }
    }
}

impl bitstream_io::ToByteStream for FileHeader {
    type Error = std::io::Error;

    fn to_writer<W>(&self, w: &mut W) -> Result<(), Self::Error>
    where
        W: bitstream_io::ByteWrite + ?Sized,
    {
        w.build(&Header {
            id: [0x52, 0x49, 0x46, 0x46],
            size: self.file_size,
        })?;
        w.write([0x57, 0x41, 0x56, 0x45])?;
        Ok(())
    }
}

// the only fmt fields Shorten needs
#[derive(Copy, Clone, Debug)]
struct Fmt {
    channels: u16,
    bits_per_sample: u16,
}

impl bitstream_io::FromByteStream for Fmt {
    type Error = Error;

    fn from_reader<R>(r: &mut R) -> Result<Self, Self::Error>
    where
        R: bitstream_io::ByteRead + ?Sized,
    {
        match r.read::<u16>()? {
            // WAVE_FORMAT_PCM or WAVE_FORMAT_EXTENSIBLE
            0x0001 | 0xFFFE => {
                let channels = r.read()?;
                r.skip(4 + 4 + 2)?; // sample rate, data rate, block size
                Ok(Self {
                    channels,
                    bits_per_sample: r.read()?,
                })
            }
            _ => Err(Error::UnsupportedFormat),
        }
    }
}

#[derive(Debug)]
enum Error {
    Shorten(shorten_codec::Error),
    InvalidWave,
    UnsupportedFormat,
}

impl From<shorten_codec::Error> for Error {
    fn from(err: shorten_codec::Error) -> Error {
        Error::Shorten(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Shorten(shorten_codec::Error::Io(err))
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Shorten(err) => err.fmt(f),
            Self::InvalidWave => "invalid RIFF WAVE file".fmt(f),
            Self::UnsupportedFormat => "unsupported fmt chunk".fmt(f),
        }
    }
}
