//! Test fixture: writes small but genuine Ogg Vorbis streams.
//!
//! The streams carry real identification, comment and setup headers, CRC-checked Ogg pages and
//! granule positions, so they go through the full Symphonia demux/decode path. The audio is
//! silence: every audio packet is a short block whose floors are all unused, which decodes to
//! 128 zero frames per packet (the first packet primes the overlap and yields none).

#![allow(dead_code)]

const FRAMES_PER_PACKET: u64 = 128;
const PACKETS_PER_PAGE: usize = 255;

const FLAG_BOS: u8 = 0x02;
const FLAG_EOS: u8 = 0x04;

/// Describes the stream to generate.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub channels: u8,
    pub sample_rate: u32,
    pub frames: u64,
    pub comments: Vec<(String, String)>,
}

impl Fixture {
    pub fn new(channels: u8, sample_rate: u32, frames: u64) -> Self {
        Self {
            channels,
            sample_rate,
            frames,
            comments: Vec::new(),
        }
    }

    pub fn comment(mut self, key: &str, value: &str) -> Self {
        self.comments.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Encode to a complete Ogg Vorbis file.
    pub fn encode(&self) -> Vec<u8> {
        let serial = 0x5eed_0001;
        let mut out = Vec::new();
        let mut sequence = 0u32;

        let mut page = |out: &mut Vec<u8>, packets: &[Vec<u8>], granule: i64, flags: u8| {
            write_page(out, serial, sequence, granule, flags, packets);
            sequence += 1;
        };

        page(&mut out, &[ident_header(self.channels, self.sample_rate)], 0, FLAG_BOS);
        page(&mut out, &[comment_header(&self.comments), setup_header()], 0, 0);

        // Enough packets to cover every frame; the last page's granule trims the excess.
        let packets = self.frames.div_ceil(FRAMES_PER_PACKET) as usize + 1;
        let audio_packet = vec![0u8; 4];

        let mut first = 0;
        while first < packets {
            let last = (first + PACKETS_PER_PAGE).min(packets);
            let batch = vec![audio_packet.clone(); last - first];

            let (granule, flags) = if last == packets {
                (self.frames as i64, FLAG_EOS)
            } else {
                (((last - 1) as u64 * FRAMES_PER_PACKET) as i64, 0)
            };
            page(&mut out, &batch, granule, flags);
            first = last;
        }

        out
    }
}

fn ident_header(channels: u8, sample_rate: u32) -> Vec<u8> {
    let mut p = Vec::with_capacity(30);
    p.push(1);
    p.extend_from_slice(b"vorbis");
    p.extend_from_slice(&0u32.to_le_bytes());
    p.push(channels);
    p.extend_from_slice(&sample_rate.to_le_bytes());
    p.extend_from_slice(&0i32.to_le_bytes()); // bitrate maximum
    p.extend_from_slice(&64_000i32.to_le_bytes()); // bitrate nominal
    p.extend_from_slice(&0i32.to_le_bytes()); // bitrate minimum
    p.push((11 << 4) | 8); // blocksizes 2048 / 256
    p.push(1); // framing
    p
}

fn comment_header(comments: &[(String, String)]) -> Vec<u8> {
    let vendor = b"fixture writer";

    let mut p = Vec::new();
    p.push(3);
    p.extend_from_slice(b"vorbis");
    p.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    p.extend_from_slice(vendor);
    p.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for (key, value) in comments {
        let entry = format!("{key}={value}");
        p.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        p.extend_from_slice(entry.as_bytes());
    }
    p.push(1); // framing
    p
}

/// The smallest useful setup: one two-entry codebook, one floor 1, one residue, one mapping
/// and one short-block mode.
fn setup_header() -> Vec<u8> {
    let mut w = BitWriter::default();
    w.bytes(&[5]);
    w.bytes(b"vorbis");

    // Codebooks.
    w.bits(0, 8); // count - 1
    w.bits(0x56_4342, 24); // sync
    w.bits(1, 16); // dimensions
    w.bits(2, 24); // entries
    w.bits(0, 1); // ordered
    w.bits(0, 1); // sparse
    w.bits(0, 5); // entry 0: length - 1
    w.bits(0, 5); // entry 1: length - 1
    w.bits(0, 4); // lookup type

    // Time domain transforms (placeholders).
    w.bits(0, 6);
    w.bits(0, 16);

    // Floors: a single floor 1 with one one-dimensional partition.
    w.bits(0, 6);
    w.bits(1, 16); // floor type
    w.bits(1, 5); // partitions
    w.bits(0, 4); // partition 0 class
    w.bits(0, 3); // class 0 dimensions - 1
    w.bits(0, 2); // class 0 subclasses
    w.bits(0, 8); // class 0 subclass book + 1 (unused)
    w.bits(0, 2); // multiplier - 1
    w.bits(8, 4); // rangebits
    w.bits(128, 8); // X list

    // Residues.
    w.bits(0, 6);
    w.bits(1, 16); // residue type
    w.bits(0, 24); // begin
    w.bits(128, 24); // end
    w.bits(31, 24); // partition size - 1
    w.bits(0, 6); // classifications - 1
    w.bits(0, 8); // classbook
    w.bits(0, 3); // cascade low bits
    w.bits(0, 1); // no high bits

    // Mappings.
    w.bits(0, 6);
    w.bits(0, 16); // mapping type
    w.bits(0, 1); // single submap
    w.bits(0, 1); // no coupling
    w.bits(0, 2); // reserved
    w.bits(0, 8); // submap 0 time config
    w.bits(0, 8); // submap 0 floor
    w.bits(0, 8); // submap 0 residue

    // Modes.
    w.bits(0, 6);
    w.bits(0, 1); // short blocks
    w.bits(0, 16); // window type
    w.bits(0, 16); // transform type
    w.bits(0, 8); // mapping

    w.bits(1, 1); // framing
    w.finish()
}

/// LSB-first bit packer, as Vorbis headers are packed.
#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    bit: u32,
}

impl BitWriter {
    fn bits(&mut self, value: u32, count: u32) {
        for i in 0..count {
            if self.bit == 0 {
                self.out.push(0);
            }
            if (value >> i) & 1 == 1 {
                if let Some(byte) = self.out.last_mut() {
                    *byte |= 1 << self.bit;
                }
            }
            self.bit = (self.bit + 1) % 8;
        }
    }

    fn bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.bits(u32::from(b), 8);
        }
    }

    fn finish(self) -> Vec<u8> {
        self.out
    }
}

fn write_page(
    out: &mut Vec<u8>,
    serial: u32,
    sequence: u32,
    granule: i64,
    flags: u8,
    packets: &[Vec<u8>],
) {
    let mut lacing = Vec::new();
    for packet in packets {
        lacing.extend(std::iter::repeat_n(255u8, packet.len() / 255));
        lacing.push((packet.len() % 255) as u8);
    }
    assert!(lacing.len() <= 255, "too many segments for one page");

    let start = out.len();
    out.extend_from_slice(b"OggS");
    out.push(0); // version
    out.push(flags);
    out.extend_from_slice(&granule.to_le_bytes());
    out.extend_from_slice(&serial.to_le_bytes());
    out.extend_from_slice(&sequence.to_le_bytes());
    out.extend_from_slice(&[0; 4]); // crc, filled below
    out.push(lacing.len() as u8);
    out.extend_from_slice(&lacing);
    for packet in packets {
        out.extend_from_slice(packet);
    }

    let crc = ogg_crc(&out[start..]);
    out[start + 22..start + 26].copy_from_slice(&crc.to_le_bytes());
}

/// CRC-32 as used by Ogg: polynomial 0x04c11db7, zero initial value, no reflection.
fn ogg_crc(data: &[u8]) -> u32 {
    let mut crc = 0u32;
    for &byte in data {
        crc ^= u32::from(byte) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04c1_1db7
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[test]
fn crc_matches_the_reference_value() {
    // CRC of "OggS" under Ogg's parameters.
    assert_eq!(ogg_crc(b"OggS"), 0x5fb0_a94f);
}
