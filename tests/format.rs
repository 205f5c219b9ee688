use bitstream_io::{BigEndian, BitRead, BitReader};
use shorten_codec::encode::{EncodingOptions, Padding, VerbatimChunk, encode};
use shorten_codec::predict::{Prediction, Predictor, Wrap};
use shorten_codec::residual::Energy;
use shorten_codec::source::MemorySource;
use shorten_codec::vlc::{LongWidth, unfold};

// a minimal Shorten decoder, for checking the encoder's output
#[derive(Debug, Default)]
struct Decoded {
    file_type: u32,
    channels: usize,
    block_size: u32,
    functions: Vec<u32>,
    verbatim: Vec<Vec<u8>>,
    samples: Vec<Vec<i32>>,
    padding: Vec<u8>,
}

fn read_uvar<R: BitRead>(r: &mut R, size: u32) -> u32 {
    let msb = r.read_unary::<1>().unwrap();
    let lsb = match size {
        0 => 0,
        size => r.read_var::<u32>(size).unwrap(),
    };
    msb.checked_shl(size).unwrap_or(0) | lsb
}

fn read_long<R: BitRead>(r: &mut R) -> u32 {
    let width = read_uvar(r, 2);
    read_uvar(r, width)
}

fn decode(shn: &[u8]) -> Decoded {
    assert_eq!(&shn[0..5], b"ajkg\x02");

    let mut r = BitReader::endian(&shn[5..], BigEndian);

    let mut decoded = Decoded {
        file_type: read_long(&mut r),
        channels: read_long(&mut r) as usize,
        block_size: read_long(&mut r),
        ..Decoded::default()
    };

    // LPC order, mean count, bytes to skip
    assert_eq!(read_long(&mut r), 0);
    assert_eq!(read_long(&mut r), 0);
    assert_eq!(read_long(&mut r), 0);

    decoded.samples = vec![vec![]; decoded.channels];
    let mut wraps = vec![Wrap::default(); decoded.channels];
    let mut channel = 0;

    loop {
        let function = read_uvar(&mut r, 2);
        decoded.functions.push(function);

        match function {
            1..=3 => {
                let predictor = Predictor::ALL[function as usize - 1];
                let energy = read_uvar(&mut r, 3);
                let residuals = (0..decoded.block_size)
                    .map(|_| unfold(read_uvar(&mut r, energy + 1)))
                    .collect::<Vec<_>>();
                let block = wraps[channel].restore(predictor, &residuals);
                wraps[channel].update(&block);
                decoded.samples[channel].extend(block);
                channel = (channel + 1) % decoded.channels;
            }
            4 => break,
            5 => {
                decoded.block_size = read_long(&mut r);
            }
            8 => {
                let block = vec![0; decoded.block_size as usize];
                wraps[channel].update(&block);
                decoded.samples[channel].extend(block);
                channel = (channel + 1) % decoded.channels;
            }
            9 => {
                let len = read_uvar(&mut r, 5);
                decoded
                    .verbatim
                    .push((0..len).map(|_| read_uvar(&mut r, 8) as u8).collect());
            }
            function => panic!("unexpected function {function}"),
        }
    }

    // commands always cover every channel
    assert_eq!(channel, 0);

    r.byte_align();
    decoded.padding = r.into_reader().to_vec();
    decoded
}

fn random_channels(channels: usize, len: usize, bits: u32) -> Vec<Vec<i32>> {
    let max = (1 << (bits - 1)) - 1;
    let min = -(1 << (bits - 1));

    (0..channels)
        .map(|_| {
            // a mix of noise, smooth ramps and silence
            let mut channel = Vec::with_capacity(len);
            while channel.len() < len {
                let run = fastrand::usize(1..300).min(len - channel.len());
                match fastrand::u8(0..3) {
                    0 => channel
                        .extend(std::iter::repeat_with(|| fastrand::i32(min..=max)).take(run)),
                    1 => {
                        let start = fastrand::i32(min / 2..=max / 2);
                        let step = fastrand::i32(-3..=3);
                        channel.extend(
                            (0..run as i32).map(|i| (start + i * step).clamp(min, max)),
                        );
                    }
                    _ => channel.extend(std::iter::repeat_n(0, run)),
                }
            }
            channel
        })
        .collect()
}

#[test]
fn test_empty_audio() {
    let mut shn = vec![];

    let len = encode(
        &mut shn,
        MemorySource::new(16, vec![vec![]]).unwrap(),
        EncodingOptions::default(),
        [VerbatimChunk::Bytes(b"payload".to_vec()), VerbatimChunk::Audio],
    )
    .unwrap();

    assert_eq!(len as usize, shn.len() - 5);
    assert_eq!((shn.len() - 5) % 4, 0);

    let decoded = decode(&shn);
    assert_eq!(decoded.file_type, 5);
    assert_eq!(decoded.channels, 1);
    assert_eq!(decoded.block_size, 256);
    assert_eq!(decoded.functions, vec![9, 4]);
    assert_eq!(decoded.verbatim, vec![b"payload".to_vec()]);
    assert!(decoded.samples[0].is_empty());
    assert!(decoded.padding.iter().all(|b| *b == 0));
}

#[test]
fn test_historical() {
    let mut shn = vec![];

    let len = encode(
        &mut shn,
        MemorySource::new(16, vec![vec![10, 12, 9, 9, 11]]).unwrap(),
        EncodingOptions::historical().block_size(4).unwrap(),
        [VerbatimChunk::Audio],
    )
    .unwrap();

    assert_eq!(len, 12);
    assert_eq!(
        shn,
        vec![
            b'a', b'j', b'k', b'g', 2, 0xFB, 0xE7, 0xE7, 0x8F, 0x1E, 0x2D, 0x19, 0x9B, 0x0B, 0xE6,
            0xD6, 0x20
        ]
    );

    let decoded = decode(&shn);
    assert_eq!(decoded.block_size, 1);
    // DIFF1, BLOCKSIZE, DIFF1, QUIT
    assert_eq!(decoded.functions, vec![1, 5, 1, 4]);
    assert_eq!(decoded.samples, vec![vec![10, 12, 9, 9, 11]]);
}

#[test]
fn test_no_blocksize_when_even() {
    let mut shn = vec![];

    encode(
        &mut shn,
        MemorySource::new(16, vec![vec![1, 2, 3, 4, 5, 6, 7, 8]]).unwrap(),
        EncodingOptions::historical().block_size(4).unwrap(),
        [VerbatimChunk::Audio],
    )
    .unwrap();

    assert_eq!(decode(&shn).functions, vec![1, 1, 4]);
}

#[test]
fn test_padding() {
    fn stream(padding: Padding, len: usize) -> Vec<u8> {
        let mut shn = vec![];

        let written = encode(
            &mut shn,
            MemorySource::new(16, random_channels(2, len, 16)).unwrap(),
            EncodingOptions::default().padding(padding),
            [VerbatimChunk::Audio],
        )
        .unwrap();

        assert_eq!(written as usize, shn.len() - 5);
        shn
    }

    for len in 0..40 {
        let aligned = stream(Padding::Aligned, len);
        assert_eq!((aligned.len() - 5) % 4, 0);

        let decoded = decode(&aligned);
        let unpadded = aligned.len() - 5 - decoded.padding.len();
        assert_eq!(decoded.padding.len(), (4 - unpadded % 4) % 4);

        // historical padding repeats the stream's misalignment
        let historical = stream(Padding::Historical, len);
        let decoded = decode(&historical);
        let unpadded = historical.len() - 5 - decoded.padding.len();
        assert_eq!(decoded.padding.len(), unpadded % 4);
        assert!(decoded.padding.iter().all(|b| *b == 0));
    }
}

#[test]
fn test_roundtrip() {
    for _ in 0..100 {
        let bits = if fastrand::bool() { 16 } else { 8 };
        let channels = random_channels(fastrand::usize(1..=4), fastrand::usize(0..3000), bits);

        let options = EncodingOptions::default()
            .block_size(fastrand::u32(1..=600))
            .unwrap()
            .energy(if fastrand::bool() {
                Energy::Adaptive
            } else {
                Energy::Fixed(fastrand::u32(6..=12))
            })
            .unwrap()
            .long_width(if fastrand::bool() {
                LongWidth::Adaptive
            } else {
                LongWidth::Fixed(fastrand::u32(0..=32))
            })
            .unwrap()
            .prediction(if fastrand::bool() {
                Prediction::Adaptive
            } else {
                Prediction::Diff1
            })
            .padding(if fastrand::bool() {
                Padding::Aligned
            } else {
                Padding::Historical
            });

        let mut shn = vec![];
        encode(
            &mut shn,
            MemorySource::new(bits, channels.clone()).unwrap(),
            options,
            [VerbatimChunk::Audio],
        )
        .unwrap();

        let decoded = decode(&shn);
        assert_eq!(decoded.file_type, if bits == 8 { 2 } else { 5 });
        assert_eq!(decoded.channels, channels.len());
        assert_eq!(decoded.samples, channels);
    }
}

#[test]
fn test_predictor_selection() {
    let mut shn = vec![];

    // silence, then a ramp, then a parabola
    let samples = std::iter::repeat_n(0, 16)
        .chain((1..=16).map(|i| i * 100))
        .chain((1..=16).map(|i| 1600 + 100 * i + 5 * i * i))
        .collect::<Vec<_>>();

    encode(
        &mut shn,
        MemorySource::new(16, vec![samples.clone()]).unwrap(),
        EncodingOptions::default().block_size(16).unwrap(),
        [VerbatimChunk::Audio],
    )
    .unwrap();

    let decoded = decode(&shn);
    assert_eq!(decoded.functions, vec![8, 2, 3, 4]);
    assert_eq!(decoded.samples, vec![samples.clone()]);

    // which the historical settings code entirely with DIFF1
    let mut shn = vec![];
    encode(
        &mut shn,
        MemorySource::new(16, vec![samples.clone()]).unwrap(),
        EncodingOptions::historical().block_size(16).unwrap(),
        [VerbatimChunk::Audio],
    )
    .unwrap();

    let decoded = decode(&shn);
    assert_eq!(decoded.functions, vec![1, 1, 1, 4]);
    assert_eq!(decoded.samples, vec![samples]);
}

#[test]
fn test_audio_markers() {
    let samples = random_channels(2, 1000, 16);

    // only the first marker encodes audio
    let mut shn = vec![];
    encode(
        &mut shn,
        MemorySource::new(16, samples.clone()).unwrap(),
        EncodingOptions::default(),
        [
            VerbatimChunk::Audio,
            VerbatimChunk::from(b"trailer".as_slice()),
            VerbatimChunk::Audio,
        ],
    )
    .unwrap();

    let decoded = decode(&shn);
    assert_eq!(decoded.samples, samples);
    assert_eq!(decoded.verbatim, vec![b"trailer".to_vec()]);
    assert_eq!(decoded.functions.iter().filter(|f| **f == 9).count(), 1);
    assert_eq!(decoded.functions.last(), Some(&4));
    assert_eq!(decoded.functions[decoded.functions.len() - 2], 9);

    // and no marker encodes no audio at all
    let mut shn = vec![];
    encode(
        &mut shn,
        MemorySource::new(16, samples).unwrap(),
        EncodingOptions::default(),
        [VerbatimChunk::from(vec![1, 2, 3])],
    )
    .unwrap();

    let decoded = decode(&shn);
    assert_eq!(decoded.functions, vec![9, 4]);
    assert!(decoded.samples.iter().all(|c| c.is_empty()));
}

#[test]
fn test_wave() {
    use shorten_codec::byteorder::LittleEndian;
    use shorten_codec::source::PcmReader;
    use shorten_codec::wave::WaveHeader;
    use std::num::NonZero;

    // 8-bit data is unsigned on disk
    let pcm: Vec<u8> = (0..=254).collect();

    let header = WaveHeader {
        channels: NonZero::new(1).unwrap(),
        sample_rate: 8000,
        bits_per_sample: 8,
        total_frames: pcm.len() as u32,
    };

    let mut shn = vec![];
    encode(
        &mut shn,
        PcmReader::endian(pcm.as_slice(), LittleEndian, header.channels, 8),
        EncodingOptions::default().block_size(100).unwrap(),
        header.chunks().unwrap(),
    )
    .unwrap();

    let decoded = decode(&shn);
    assert_eq!(decoded.file_type, 2);
    assert_eq!(
        decoded.verbatim,
        vec![header.bytes().unwrap(), vec![0]]
    );
    assert_eq!(
        decoded.samples,
        vec![pcm.iter().map(|b| i32::from(*b) - 128).collect::<Vec<_>>()]
    );
}

#[test]
fn test_aiff() {
    use shorten_codec::aiff::AiffHeader;
    use shorten_codec::byteorder::{BigEndian, ByteSign};
    use shorten_codec::source::PcmReader;
    use std::num::NonZero;

    // 16-bit data is big-endian on disk
    let channels = random_channels(2, 333, 16);
    let pcm = (0..333)
        .flat_map(|i| channels.iter().map(move |c| c[i] as i16))
        .flat_map(i16::to_be_bytes)
        .collect::<Vec<u8>>();

    let header = AiffHeader {
        channels: NonZero::new(2).unwrap(),
        sample_rate: 44100,
        bits_per_sample: 16,
        total_frames: 333,
    };

    let mut shn = vec![];
    encode(
        &mut shn,
        PcmReader::endian(pcm.as_slice(), BigEndian, header.channels, 16),
        EncodingOptions::default(),
        header.chunks().unwrap(),
    )
    .unwrap();

    let decoded = decode(&shn);
    assert_eq!(decoded.file_type, 5);
    // the header runs through SSND's offset and block size
    assert_eq!(decoded.verbatim, vec![header.bytes().unwrap()]);
    assert_eq!(&decoded.verbatim[0][38..42], b"SSND");
    assert_eq!(decoded.verbatim[0].len(), 54);
    assert_eq!(decoded.samples, channels);

    // 8-bit data is signed on disk
    let pcm: Vec<u8> = (0..=254).collect();

    let header = AiffHeader {
        channels: NonZero::new(1).unwrap(),
        sample_rate: 8000,
        bits_per_sample: 8,
        total_frames: pcm.len() as u32,
    };

    let mut shn = vec![];
    encode(
        &mut shn,
        PcmReader::endian(pcm.as_slice(), BigEndian, header.channels, 8)
            .byte_sign(ByteSign::Signed),
        EncodingOptions::default().block_size(100).unwrap(),
        header.chunks().unwrap(),
    )
    .unwrap();

    let decoded = decode(&shn);
    assert_eq!(decoded.file_type, 2);
    assert_eq!(decoded.verbatim, vec![header.bytes().unwrap(), vec![0]]);
    assert_eq!(
        decoded.samples,
        vec![pcm.iter().map(|b| i32::from(*b as i8)).collect::<Vec<_>>()]
    );
}

#[test]
fn test_uneven_source() {
    use shorten_codec::Error;
    use shorten_codec::audio::Frame;
    use shorten_codec::source::PcmSource;
    use std::num::NonZero;

    // a source which returns fewer frames than requested
    struct Uneven {
        blocks: std::vec::IntoIter<Vec<i32>>,
    }

    impl PcmSource for Uneven {
        fn read(&mut self, pcm_frames: usize) -> Result<Frame, Error> {
            match self.blocks.next() {
                Some(block) => {
                    assert!(block.len() <= pcm_frames);
                    Ok(Frame::from_channels(16, &[block]).unwrap())
                }
                None => Ok(Frame::empty(1, 16)),
            }
        }

        fn channel_count(&self) -> NonZero<u16> {
            NonZero::new(1).unwrap()
        }

        fn bits_per_sample(&self) -> u32 {
            16
        }
    }

    let blocks = vec![
        vec![10, 12, 9, 9],
        vec![11, 14],
        vec![-3, 7],
        vec![100, 200, 300, 400],
        vec![-1],
    ];

    let mut shn = vec![];
    encode(
        &mut shn,
        Uneven {
            blocks: blocks.clone().into_iter(),
        },
        EncodingOptions::historical().block_size(4).unwrap(),
        [VerbatimChunk::Audio],
    )
    .unwrap();

    let decoded = decode(&shn);
    assert_eq!(decoded.block_size, 1);
    // BLOCKSIZE only where the length changes
    assert_eq!(decoded.functions, vec![1, 5, 1, 1, 5, 1, 5, 1, 4]);
    assert_eq!(decoded.samples, vec![blocks.concat()]);
}
