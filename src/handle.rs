//! The open decode handle: one Ogg demuxer plus one Vorbis decoder bound to a byte stream.
//!
//! The session talks to the handle through [`DecodeHandle`] so that read-cursor bookkeeping,
//! fault absorption and conversion stay independent of Symphonia.

use std::sync::Arc;

use symphonia::core::audio::{AudioBufferRef, SampleBuffer, SignalSpec};
use symphonia::core::codecs::Decoder;
use symphonia::core::errors::{Error as SymphoniaError, SeekErrorKind};
use symphonia::core::formats::{FormatReader, SeekMode, SeekTo};
use tracing::{debug, trace};

use crate::callbacks::{CallbackSource, SEEK_SET, StreamAdapter, StreamCallbacks};
use crate::decode::{decode_packet_and_then, make_decoder_for_track};
use crate::demux::{Demuxed, next_packet, probe_vorbis_track};
use crate::error::{Error, Result};
use crate::metadata::{self, Comments};

/// Pre-roll used when the container does not report its longest packet.
const DEFAULT_SEEK_PREROLL: u64 = 8192;

/// Facts established from the stream headers. Immutable for the life of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StreamProperties {
    pub channels: usize,
    pub sample_rate: u32,
    /// Total decodable frames, when the container lets us know up front.
    pub num_frames: Option<u64>,
}

/// A block of decoded frames written by [`DecodeHandle::next_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
    pub frames: usize,
    /// Native frame position of the first frame, when the container reports one.
    pub start: Option<u64>,
}

pub(crate) trait DecodeHandle: Send {
    fn properties(&self) -> StreamProperties;

    fn comments(&self) -> &Comments;

    /// Decode the next block into `out` as planar samples (`frames` per channel, channel-major).
    ///
    /// `Ok(None)` is end of stream. `Error::Decode` is a skippable corrupt packet; `Error::Io`
    /// is a byte source failure.
    fn next_block(&mut self, out: &mut Vec<f32>) -> Result<Option<Block>>;

    /// Position the handle so the next block starts at (or just after) `frame`.
    ///
    /// Returns the position of the next frame that will be delivered.
    fn seek(&mut self, frame: u64) -> Result<u64>;

    /// Return to the first frame in a state identical to a freshly opened handle.
    fn rewind(&mut self) -> Result<()>;
}

/// Symphonia-backed decode handle.
pub(crate) struct VorbisHandle {
    adapter: Arc<StreamAdapter>,
    hint: Option<String>,
    start_offset: i64,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    properties: StreamProperties,
    comments: Comments,
    sample_buf: Option<SampleBuffer<f32>>,
    sample_spec: Option<SignalSpec>,
    sample_capacity: usize,
    // Decoded frames before this position are dropped (set by seeks).
    skip_until: Option<u64>,
    // How far before a seek target decoding restarts.
    seek_preroll: u64,
}

impl VorbisHandle {
    /// Open a handle reading from the adapter's current position.
    ///
    /// If the byte source faulted while the headers were read, that fault is returned as
    /// `Error::Io` in place of the format error it caused.
    pub(crate) fn open(adapter: Arc<StreamAdapter>, hint: Option<&str>) -> Result<Self> {
        let start_offset = adapter.tell().max(0);
        let opened = Self::open_at(Arc::clone(&adapter), hint, start_offset);

        match (opened, adapter.take_fault()) {
            (Ok(handle), _) => Ok(handle),
            (Err(_), Some(fault)) => Err(Error::Io(fault)),
            (Err(err), None) => Err(err),
        }
    }

    fn open_at(adapter: Arc<StreamAdapter>, hint: Option<&str>, start_offset: i64) -> Result<Self> {
        let source = CallbackSource::new(Arc::clone(&adapter));

        let Demuxed {
            mut format,
            track,
            mut probed_metadata,
        } = probe_vorbis_track(Box::new(source), hint)?;

        let decoder = make_decoder_for_track(&track)?;

        let params = &track.codec_params;
        let channels = params
            .channels
            .map(|c| c.count())
            .filter(|&c| c > 0)
            .ok_or_else(|| Error::format("vorbis track has no channel layout"))?;
        let sample_rate = params
            .sample_rate
            .filter(|&r| r > 0)
            .ok_or_else(|| Error::format("vorbis track has no sample rate"))?;

        // The packet holding the target only decodes after a previous packet has primed the
        // overlap, so seeks restart at least two of the longest packets early.
        let seek_preroll = params
            .max_frames_per_packet
            .map_or(DEFAULT_SEEK_PREROLL, |n| n.saturating_mul(2).max(1));

        let properties = StreamProperties {
            channels,
            sample_rate,
            num_frames: params.n_frames,
        };

        let comments = metadata::collect(&mut probed_metadata, format.as_mut());

        debug!(
            channels,
            sample_rate,
            num_frames = ?properties.num_frames,
            comments = comments.len(),
            "opened vorbis stream"
        );

        Ok(Self {
            adapter,
            hint: hint.map(str::to_owned),
            start_offset,
            format,
            decoder,
            track_id: track.id,
            properties,
            comments,
            sample_buf: None,
            sample_spec: None,
            sample_capacity: 0,
            skip_until: None,
            seek_preroll,
        })
    }
}

impl DecodeHandle for VorbisHandle {
    fn properties(&self) -> StreamProperties {
        self.properties
    }

    fn comments(&self) -> &Comments {
        &self.comments
    }

    fn next_block(&mut self, out: &mut Vec<f32>) -> Result<Option<Block>> {
        loop {
            let Some(packet) = next_packet(self.format.as_mut())? else {
                // The adapter turns source faults into end of data; tell them apart here.
                if let Some(fault) = self.adapter.take_fault() {
                    return Err(Error::Io(fault));
                }
                return Ok(None);
            };

            // Ignore packets from other logical streams.
            if packet.track_id() != self.track_id {
                continue;
            }

            let sample_buf = &mut self.sample_buf;
            let sample_spec = &mut self.sample_spec;
            let sample_capacity = &mut self.sample_capacity;
            let copied = decode_packet_and_then(self.decoder.as_mut(), &packet, |decoded| {
                copy_planar(&decoded, sample_buf, sample_spec, sample_capacity, out)
            })?;

            let Some(frames) = copied else {
                continue;
            };

            let start = packet.ts();
            let mut skip = 0;
            if let Some(target) = self.skip_until {
                // Still before the seek target: discard the whole block.
                if start + frames as u64 <= target {
                    trace!(start, frames, target, "discarding pre-roll block");
                    continue;
                }
                skip = target.saturating_sub(start) as usize;
                self.skip_until = None;
            }

            if frames == skip {
                continue;
            }
            if skip > 0 {
                drop_leading(out, frames, skip);
            }

            return Ok(Some(Block {
                frames: frames - skip,
                start: Some(start + skip as u64),
            }));
        }
    }

    fn seek(&mut self, frame: u64) -> Result<u64> {
        if let Some(len) = self.properties.num_frames.filter(|&len| frame >= len) {
            return Err(Error::SeekOutOfRange {
                requested: frame,
                len,
            });
        }

        // Close to the start there is nothing to seek over: decode from the top.
        if frame < self.seek_preroll {
            self.rewind()?;
            self.skip_until = Some(frame);
            debug!(requested = frame, "seeked by rewinding");
            return Ok(frame);
        }

        let to = SeekTo::TimeStamp {
            ts: frame - self.seek_preroll,
            track_id: self.track_id,
        };

        let seeked = match self.format.seek(SeekMode::Accurate, to) {
            Ok(seeked) => seeked,
            Err(SymphoniaError::SeekError(SeekErrorKind::OutOfRange)) => {
                return Err(Error::SeekOutOfRange {
                    requested: frame,
                    len: self.properties.num_frames.unwrap_or(0),
                });
            }
            Err(SymphoniaError::IoError(e)) => return Err(Error::Io(e)),
            Err(e) => return Err(Error::msg(format!("seek failed: {e}"))),
        };

        self.decoder.reset();
        self.skip_until = Some(frame);

        debug!(
            requested = frame,
            preroll = self.seek_preroll,
            required_ts = seeked.required_ts,
            actual_ts = seeked.actual_ts,
            "seeked"
        );
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<()> {
        if self.adapter.seek(self.start_offset, SEEK_SET) != 0 {
            return Err(self
                .adapter
                .take_fault()
                .map(Error::Io)
                .unwrap_or_else(|| Error::msg("byte source cannot rewind")));
        }

        let fresh = Self::open(Arc::clone(&self.adapter), self.hint.as_deref())?;
        *self = fresh;
        Ok(())
    }
}

/// Copy a decoded buffer into `out` as planar `f32`. Returns the frame count.
fn copy_planar(
    decoded: &AudioBufferRef<'_>,
    sample_buf: &mut Option<SampleBuffer<f32>>,
    sample_spec: &mut Option<SignalSpec>,
    sample_capacity: &mut usize,
    out: &mut Vec<f32>,
) -> usize {
    out.clear();

    let frames = decoded.frames();
    if frames == 0 {
        return 0;
    }

    let spec = *decoded.spec();
    if sample_buf.is_none() || *sample_spec != Some(spec) || *sample_capacity < frames {
        let capacity = decoded.capacity().max(frames);
        *sample_buf = Some(SampleBuffer::<f32>::new(capacity as u64, spec));
        *sample_spec = Some(spec);
        *sample_capacity = capacity;
    }

    let Some(buf) = sample_buf.as_mut() else {
        return 0;
    };

    buf.copy_planar_ref(decoded.clone());
    out.extend_from_slice(buf.samples());
    frames
}

/// Drop the first `skip` frames of every channel of a planar block.
fn drop_leading(planar: &mut Vec<f32>, frames: usize, skip: usize) {
    let channels = planar.len() / frames;
    let kept = frames - skip;

    for ch in 0..channels {
        planar.copy_within(ch * frames + skip..(ch + 1) * frames, ch * kept);
    }
    planar.truncate(channels * kept);
}
