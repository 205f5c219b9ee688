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
        [] => eprintln!("* Usage: aiff2shn [file 1.aiff] [file 2.aiff] ..."),
        aiffs => {
            if let Err(err) = aiff2shn(aiffs) {
                eprintln!("* Error: {err}");
            }
        }
    }
}

#[cfg(not(feature = "rayon"))]
fn aiff2shn(aiffs: &[OsString]) -> Result<(), Error> {
    for aiff in aiffs {
        convert_aiff(aiff.as_ref())?;
    }
    Ok(())
}

#[cfg(feature = "rayon")]
fn aiff2shn(aiffs: &[OsString]) -> Result<(), Error> {
    use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

    aiffs
        .par_iter()
        .try_for_each(|aiff| convert_aiff(aiff.as_ref()))
}

fn convert_aiff(aiff: &Path) -> Result<(), Error> {
    use bitstream_io::{BigEndian, ByteRead, ByteReader, ByteWrite, ByteWriter};
    use shorten_codec::byteorder::ByteSign;
    use shorten_codec::encode::{EncodingOptions, VerbatimChunk, encode_file};
    use shorten_codec::source::PcmReader;
    use std::fs::File;
    use std::io::{BufReader, Read, Seek, SeekFrom};

    let shn_path = aiff.with_extension("shn");
    if shn_path.exists() {
        eprintln!("{} already exists, skipping...", shn_path.display());
        return Ok(());
    }

    let mut aiff = ByteReader::endian(BufReader::new(File::open(aiff)?), BigEndian);

    // everything up to the start of the sample data,
    // SSND's offset and block size included,
    // is stored as-is in the leading VERBATIM chunk
    // and everything after it in the trailing one
    let mut head = ByteWriter::endian(vec![], BigEndian);
    let mut tail = ByteWriter::endian(vec![], BigEndian);

    let mut comm = None;
    let mut ssnd = None;

    let file_header = aiff.parse::<FileHeader>()?;
    head.build(&file_header)?;

    let mut remaining_bytes = file_header
        .form_size
        .checked_sub(4)
        .ok_or(Error::InvalidAiff)?;

    while remaining_bytes > 0 {
        let chunk_header = aiff.parse::<Header>()?;
        remaining_bytes = remaining_bytes.checked_sub(8).ok_or(Error::InvalidAiff)?;

        let output = if ssnd.is_none() { &mut head } else { &mut tail };
        output.build(&chunk_header)?;

        match chunk_header.id {
            // "SSND" chunk
            [0x53, 0x53, 0x4E, 0x44] => {
                if comm.is_none() || ssnd.is_some() {
                    // multiple "SSND" chunks is invalid
                    return Err(Error::InvalidAiff);
                }

                let offset = aiff.read::<u32>()?;
                let block_size = aiff.read::<u32>()?;
                if offset != 0 {
                    return Err(Error::UnsupportedFormat);
                }
                output.write(offset)?;
                output.write(block_size)?;

                let data_size = chunk_header.size.checked_sub(8).ok_or(Error::InvalidAiff)?;
                ssnd = Some((aiff.reader().stream_position()?, data_size));

                // the sample data could potentially be very large,
                // so seek over it instead of using a skip
                aiff.reader().seek(SeekFrom::Current(data_size.into()))?;
            }
            id => {
                let mut chunk_data =
                    vec![0; usize::try_from(chunk_header.size).map_err(|_| Error::InvalidAiff)?];
                aiff.read_bytes(&mut chunk_data)?;
                output.write_bytes(&chunk_data)?;

                // "COMM" chunk
                if id == [0x43, 0x4F, 0x4D, 0x4D] {
                    if comm.is_some() {
                        // multiple "COMM" chunks is invalid
                        return Err(Error::InvalidAiff);
                    }
                    comm = Some(
                        ByteReader::endian(chunk_data.as_slice(), BigEndian).parse::<Comm>()?,
                    );
                }
            }
        }

        remaining_bytes = remaining_bytes
            .checked_sub(chunk_header.size)
            .ok_or(Error::InvalidAiff)?;

        if chunk_header.size % 2 == 1 {
            let pad = aiff.read::<u8>()?;
            // the SSND chunk's pad byte is the start of the tail
            if ssnd.is_some() {
                tail.write(pad)?;
            } else {
                head.write(pad)?;
            }
            remaining_bytes = remaining_bytes.checked_sub(1).ok_or(Error::InvalidAiff)?;
        }
    }

    // these must be present in a valid AIFF file
    let comm = comm.ok_or(Error::InvalidAiff)?;
    let (data_offset, data_size) = ssnd.ok_or(Error::InvalidAiff)?;

    let channels = std::num::NonZero::new(comm.channels).ok_or(Error::InvalidAiff)?;

    aiff.reader().seek(SeekFrom::Start(data_offset))?;

    let mut chunks = vec![VerbatimChunk::Bytes(head.into_writer()), VerbatimChunk::Audio];
    let tail = tail.into_writer();
    if !tail.is_empty() {
        chunks.push(VerbatimChunk::Bytes(tail));
    }

    encode_file(
        &shn_path,
        PcmReader::endian(
            aiff.reader().take(data_size.into()),
            shorten_codec::byteorder::BigEndian,
            channels,
            comm.bits_per_sample.into(),
        )
        .byte_sign(ByteSign::Signed),
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
    form_size: u32,
}

impl bitstream_io::FromByteStream for FileHeader {
    type Error = Error;

    fn from_reader<R>(r: &mut R) -> Result<Self, Self::Error>
    where
        R: bitstream_io::ByteRead + ?Sized,
    {
        let form_size = match r.parse::<Header>()? {
            Header {
                // FORM identifier
                id: [0x46, 0x4F, 0x52, 0x4D],
                size,
            } => Ok(size),
            _ => Err(Error::InvalidAiff),
        }?;

        // AIFF identifier
        if r.read::<[u8; 4]>()? == [0x41, 0x49, 0x46, 0x46] {
            Ok(Self { form_size })
        } else {
            Err(Error::InvalidAiff)
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
            id: [0x46, 0x4F, 0x52, 0x4D],
            size: self.form_size,
        })?;
        w.write([0x41, 0x49, 0x46, 0x46])?;
        Ok(())
    }
}

// the only COMM fields Shorten needs
#[derive(Copy, Clone, Debug)]
struct Comm {
    channels: u16,
    bits_per_sample: u16,
}

impl bitstream_io::FromByteStream for Comm {
    type Error = std::io::Error;

    fn from_reader<R>(r: &mut R) -> Result<Self, Self::Error>
    where
        R: bitstream_io::ByteRead + ?Sized,
    {
        let channels = r.read()?;
        r.skip(4)?; // total frames
        Ok(Self {
            channels,
            bits_per_sample: r.read()?,
        })
    }
}

#[derive(Debug)]
enum Error {
    Shorten(shorten_codec::Error),
    InvalidAiff,
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
            Self::InvalidAiff => "invalid AIFF file".fmt(f),
            Self::UnsupportedFormat => "unsupported SSND sample offset".fmt(f),
        }
    }
}
