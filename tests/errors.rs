// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use shorten_codec::encode::{EncodingOptions, VerbatimChunk, encode, encode_file};
use shorten_codec::source::MemorySource;
use shorten_codec::{Error, ErrorKind};

#[test]
fn test_invalid_bits_per_sample() {
    let path = std::env::temp_dir().join(format!("shorten-codec-{}.shn", fastrand::u64(..)));

    let result = encode_file(
        &path,
        MemorySource::new(24, vec![vec![1, 2, 3]]).unwrap(),
        EncodingOptions::default(),
        [VerbatimChunk::Audio],
    );

    assert!(matches!(result, Err(Error::InvalidBitsPerSample)));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);

    // nothing is created for an unencodable source
    assert!(!path.exists());

    // nor written to a plain writer
    let mut shn = vec![];
    assert!(
        encode(
            &mut shn,
            MemorySource::new(12, vec![vec![1, 2, 3]]).unwrap(),
            EncodingOptions::default(),
            [VerbatimChunk::Audio],
        )
        .is_err()
    );
    assert!(shn.is_empty());
}

#[test]
fn test_encode_file() {
    let path = std::env::temp_dir().join(format!("shorten-codec-{}.shn", fastrand::u64(..)));

    let mut expected = vec![];
    let len = encode(
        &mut expected,
        MemorySource::new(16, vec![vec![1, -1, 2, -2], vec![5, 6, 7, 8]]).unwrap(),
        EncodingOptions::default(),
        [VerbatimChunk::from(b"header".as_slice()), VerbatimChunk::Audio],
    )
    .unwrap();

    assert_eq!(
        encode_file(
            &path,
            MemorySource::new(16, vec![vec![1, -1, 2, -2], vec![5, 6, 7, 8]]).unwrap(),
            EncodingOptions::default(),
            [VerbatimChunk::from(b"header".as_slice()), VerbatimChunk::Audio],
        )
        .unwrap(),
        len
    );

    let written = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(written, expected);
}

#[test]
fn test_options() {
    assert_eq!(
        EncodingOptions::default().block_size(0).unwrap_err().kind(),
        ErrorKind::Configuration
    );
    assert_eq!(
        EncodingOptions::default()
            .energy(shorten_codec::residual::Energy::Fixed(31))
            .unwrap_err()
            .kind(),
        ErrorKind::Configuration
    );
    assert_eq!(
        EncodingOptions::default()
            .long_width(shorten_codec::vlc::LongWidth::Fixed(33))
            .unwrap_err()
            .kind(),
        ErrorKind::Configuration
    );
}

#[test]
fn test_sample_out_of_range() {
    for (bits, sample) in [(8, 128), (8, -129), (16, 32768), (16, -32769)] {
        let result = encode(
            std::io::sink(),
            MemorySource::new(bits, vec![vec![0, sample]]).unwrap(),
            EncodingOptions::default(),
            [VerbatimChunk::Audio],
        );
        assert!(matches!(result, Err(Error::SampleOutOfRange)));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Encoding);
    }
}

#[test]
fn test_channel_mismatch() {
    use shorten_codec::audio::Frame;
    use shorten_codec::encode::Encoder;
    use shorten_codec::stream::SampleFormat;
    use std::num::NonZero;

    let mut encoder = Encoder::new(
        std::io::sink(),
        EncodingOptions::default(),
        SampleFormat::Signed16Le,
        NonZero::new(2).unwrap(),
    )
    .unwrap();

    let result = encoder.encode_frame(&Frame::from_channels(16, &[vec![1, 2, 3]]).unwrap());
    assert!(matches!(result, Err(Error::ChannelCountMismatch)));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Encoding);

    // a matching frame is still fine afterward
    assert!(
        encoder
            .encode_frame(&Frame::from_channels(16, &[vec![1, 2, 3], vec![4, 5, 6]]).unwrap())
            .is_ok()
    );
    assert!(encoder.finalize().is_ok());
}

#[test]
fn test_oversized_frame() {
    use shorten_codec::audio::Frame;
    use shorten_codec::encode::Encoder;
    use shorten_codec::stream::SampleFormat;
    use std::num::NonZero;

    let mut shn = vec![];
    let mut encoder = Encoder::new(
        &mut shn,
        EncodingOptions::default().block_size(4).unwrap(),
        SampleFormat::Signed16Le,
        NonZero::new(1).unwrap(),
    )
    .unwrap();

    // longer than the header's block size
    let result = encoder.encode_frame(&Frame::from_channels(16, &[vec![1, 2, 3, 4, 5]]).unwrap());
    assert!(matches!(result, Err(Error::ExcessiveBlockSize)));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Encoding);

    // blocks up to the header's size are fine
    assert!(
        encoder
            .encode_frame(&Frame::from_channels(16, &[vec![1, 2, 3, 4]]).unwrap())
            .is_ok()
    );
    assert!(
        encoder
            .encode_frame(&Frame::from_channels(16, &[vec![1, 2]]).unwrap())
            .is_ok()
    );
    assert!(encoder.finalize().is_ok());
}

#[test]
fn test_source_errors() {
    use shorten_codec::byteorder::LittleEndian;
    use shorten_codec::source::PcmReader;
    use std::num::NonZero;

    // a partial PCM frame at the end of the source
    let pcm: &[u8] = &[0x01, 0x00, 0x02, 0x00, 0x03];

    let result = encode(
        std::io::sink(),
        PcmReader::endian(pcm, LittleEndian, NonZero::new(2).unwrap(), 16),
        EncodingOptions::default(),
        [VerbatimChunk::Audio],
    );
    assert!(matches!(result, Err(Error::Source(_))));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Source);

    // a source whose reader fails outright
    struct Failing;

    impl std::io::Read for Failing {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("read failure"))
        }
    }

    let result = encode(
        std::io::sink(),
        PcmReader::endian(Failing, LittleEndian, NonZero::new(1).unwrap(), 8),
        EncodingOptions::default(),
        [VerbatimChunk::Audio],
    );
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Source);
}

#[test]
fn test_writer_errors() {
    // a writer which accepts only so many bytes
    struct Limited(usize);

    impl std::io::Write for Limited {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match self.0.checked_sub(buf.len()) {
                Some(remaining) => {
                    self.0 = remaining;
                    Ok(buf.len())
                }
                None => Err(std::io::Error::other("writer full")),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    for limit in [0, 4, 10, 100] {
        let result = encode(
            Limited(limit),
            MemorySource::new(16, vec![std::iter::repeat_with(|| fastrand::i32(-32768..32768))
                .take(1000)
                .collect()])
            .unwrap(),
            EncodingOptions::default(),
            [VerbatimChunk::Audio],
        );
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Io);
    }
}
