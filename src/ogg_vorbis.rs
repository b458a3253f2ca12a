//! The Ogg Vorbis decoder session.
//!
//! An [`OggVorbisSource`] owns one decode handle bound to a caller's byte stream and turns it
//! into frame-granular planar reads at the requested output format, plus random-access seeking
//! in native-rate frames.
//!
//! Fault model: once a session is open nothing it does returns an error. Corrupt packets are
//! skipped, source faults shorten the current read, conversion failures drop one read, and bad
//! seeks clamp or leave the cursor where it was. Each of these is logged and counted in
//! [`DecodeDiagnostics`].

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::buffer::Buffer;
use crate::byte_source::{DataSourceRef, StreamRef, share};
use crate::callbacks::StreamAdapter;
use crate::converter::{Converter, converted_len};
use crate::error::{Error, Result};
use crate::handle::{DecodeHandle, StreamProperties, VorbisHandle};
use crate::metadata::Comments;
use crate::opts::SourceOptions;
use crate::source::AudioSource;

/// Consecutive corrupt packets after which the stream is treated as ended.
pub const MAX_CONSECUTIVE_DECODE_ERRORS: usize = 64;

/// Counters of faults absorbed since the session was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DecodeDiagnostics {
    /// Corrupt packets skipped.
    pub decode_errors: u64,
    /// Byte source faults that cut a read short.
    pub io_errors: u64,
    /// Reads dropped because resampling failed.
    pub conversion_errors: u64,
    /// Seeks past the end, clamped to the end.
    pub seek_clamps: u64,
    /// Seeks that failed and left the cursor unchanged.
    pub seek_failures: u64,
}

/// A serialisable summary of an open session.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StreamInfo {
    pub channels: usize,
    pub sample_rate_native: u32,
    pub output_channels: usize,
    pub sample_rate: u32,
    pub num_frames_native: Option<u64>,
    pub num_frames: Option<u64>,
    pub duration_seconds: Option<f64>,
    pub comments: Comments,
}

/// Outcome of trying to load the next decoded block.
enum Fill {
    Ready,
    End,
    Fault,
}

/// Native-rate read cursor over a decode handle.
struct NativeReader {
    handle: Box<dyn DecodeHandle>,
    channels: usize,
    num_frames: Option<u64>,

    // Current decoded block, planar, and how much of it has been handed out.
    block: Vec<f32>,
    block_frames: usize,
    block_pos: usize,

    position: u64,
    // Take the position from the next block (set after a seek).
    realign: bool,
    eof: bool,
    consecutive_errors: usize,
    diagnostics: DecodeDiagnostics,
}

impl NativeReader {
    fn new(handle: Box<dyn DecodeHandle>) -> Self {
        let properties = handle.properties();
        Self {
            handle,
            channels: properties.channels,
            num_frames: properties.num_frames,
            block: Vec::new(),
            block_frames: 0,
            block_pos: 0,
            position: 0,
            realign: false,
            eof: false,
            consecutive_errors: 0,
            diagnostics: DecodeDiagnostics::default(),
        }
    }

    fn is_drained(&self) -> bool {
        self.eof && self.block_pos >= self.block_frames
    }

    /// Copy up to `frames` native frames into `out` at `frame_offset`.
    ///
    /// Writes the native channels only; `out` must have at least that many.
    fn read_into(&mut self, out: &mut Buffer, frame_offset: usize, frames: usize) -> usize {
        let mut written = 0;

        while written < frames {
            if self.block_pos >= self.block_frames {
                if self.eof {
                    break;
                }
                match self.fill() {
                    Fill::Ready => {}
                    Fill::End => {
                        self.eof = true;
                        break;
                    }
                    Fill::Fault => break,
                }
            }

            let n = (frames - written).min(self.block_frames - self.block_pos);
            let dst = frame_offset + written;
            for ch in 0..self.channels {
                let src = ch * self.block_frames + self.block_pos;
                out.channel_mut(ch)[dst..dst + n].copy_from_slice(&self.block[src..src + n]);
            }

            self.block_pos += n;
            self.position += n as u64;
            written += n;
        }

        written
    }

    fn fill(&mut self) -> Fill {
        loop {
            match self.handle.next_block(&mut self.block) {
                Ok(Some(block)) => {
                    self.consecutive_errors = 0;
                    if self.realign {
                        if let Some(start) = block.start {
                            self.position = start;
                        }
                        self.realign = false;
                    }
                    trace!(frames = block.frames, position = self.position, "decoded block");
                    self.block_frames = block.frames;
                    self.block_pos = 0;
                    return Fill::Ready;
                }
                Ok(None) => {
                    debug!(position = self.position, "end of stream");
                    return Fill::End;
                }
                Err(Error::Decode(msg)) => {
                    self.diagnostics.decode_errors += 1;
                    self.consecutive_errors += 1;
                    warn!(error = %msg, position = self.position, "skipping corrupt packet");

                    if self.consecutive_errors >= MAX_CONSECUTIVE_DECODE_ERRORS {
                        warn!(
                            count = self.consecutive_errors,
                            "too many consecutive corrupt packets; treating as end of stream"
                        );
                        return Fill::End;
                    }
                }
                Err(Error::Io(e)) => {
                    self.diagnostics.io_errors += 1;
                    warn!(error = %e, position = self.position, "byte source fault during read");
                    return Fill::Fault;
                }
                Err(e) => {
                    warn!(error = %e, position = self.position, "decode stopped");
                    return Fill::End;
                }
            }
        }
    }

    fn seek(&mut self, frame: u64) {
        self.block_frames = 0;
        self.block_pos = 0;
        self.consecutive_errors = 0;
        self.realign = false;

        if let Some(len) = self.num_frames.filter(|&len| frame >= len) {
            if frame > len {
                self.diagnostics.seek_clamps += 1;
                debug!(requested = frame, len, "seek clamped to end of stream");
            }
            self.position = len;
            self.eof = true;
            return;
        }

        if frame == 0 {
            match self.handle.rewind() {
                Ok(()) => {
                    self.position = 0;
                    self.eof = false;
                }
                Err(e) => {
                    self.diagnostics.seek_failures += 1;
                    warn!(error = %e, "rewind failed");
                }
            }
            return;
        }

        match self.handle.seek(frame) {
            Ok(position) => {
                self.position = position;
                self.realign = true;
                self.eof = false;
            }
            Err(Error::SeekOutOfRange { requested, len }) => {
                self.diagnostics.seek_clamps += 1;
                debug!(requested, len, "seek clamped to end of stream");
                self.position = self.num_frames.unwrap_or(len);
                self.eof = true;
            }
            Err(e) => {
                self.diagnostics.seek_failures += 1;
                warn!(error = %e, target = frame, "seek failed");
            }
        }
    }
}

/// A decoder session over one Ogg Vorbis stream.
pub struct OggVorbisSource {
    origin: Option<DataSourceRef>,
    options: SourceOptions,
    properties: StreamProperties,
    comments: Comments,
    reader: NativeReader,
    converter: Option<Converter>,
}

impl OggVorbisSource {
    /// Open a session at the stream's native format.
    pub fn open(origin: DataSourceRef) -> Result<Self> {
        Self::with_options(origin, SourceOptions::default())
    }

    /// Open a session producing output at `sample_rate`.
    pub fn with_sample_rate(origin: DataSourceRef, sample_rate: u32) -> Result<Self> {
        Self::with_options(origin, SourceOptions::with_sample_rate(sample_rate))
    }

    pub fn with_options(origin: DataSourceRef, options: SourceOptions) -> Result<Self> {
        let stream = share(origin.create_stream()?);
        let hint = origin.extension_hint().map(str::to_owned);
        Self::build(Some(origin), stream, hint.as_deref(), options)
    }

    /// Open a session over a caller-owned stream, starting at its current position.
    ///
    /// Such a session has no origin and cannot be cloned.
    pub fn from_stream(stream: StreamRef, options: SourceOptions) -> Result<Self> {
        Self::build(None, stream, None, options)
    }

    fn build(
        origin: Option<DataSourceRef>,
        stream: StreamRef,
        hint: Option<&str>,
        options: SourceOptions,
    ) -> Result<Self> {
        let adapter = Arc::new(StreamAdapter::new(stream));
        let handle = VorbisHandle::open(adapter, hint)?;
        Self::from_handle(origin, Box::new(handle), options)
    }

    pub(crate) fn from_handle(
        origin: Option<DataSourceRef>,
        handle: Box<dyn DecodeHandle>,
        options: SourceOptions,
    ) -> Result<Self> {
        let properties = handle.properties();
        let comments = handle.comments().clone();

        let out_rate = options.sample_rate.unwrap_or(properties.sample_rate);
        let out_channels = options.channels.unwrap_or(properties.channels);

        let converter = if out_rate != properties.sample_rate || out_channels != properties.channels
        {
            Some(Converter::new(
                properties.sample_rate,
                properties.channels,
                out_rate,
                out_channels,
                options.quality,
                options.chunk_frames,
            )?)
        } else {
            None
        };

        debug!(
            channels = properties.channels,
            sample_rate = properties.sample_rate,
            out_channels,
            out_rate,
            converting = converter.is_some(),
            "session ready"
        );

        Ok(Self {
            origin,
            options,
            properties,
            comments,
            reader: NativeReader::new(handle),
            converter,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.properties.channels
    }

    pub fn sample_rate_native(&self) -> u32 {
        self.properties.sample_rate
    }

    pub fn sample_rate(&self) -> u32 {
        self.converter
            .as_ref()
            .map_or(self.properties.sample_rate, Converter::output_rate)
    }

    pub fn output_channels(&self) -> usize {
        self.converter
            .as_ref()
            .map_or(self.properties.channels, Converter::output_channels)
    }

    /// Total decodable frames at the native rate, if the container reports it.
    pub fn num_frames_native(&self) -> Option<u64> {
        self.properties.num_frames
    }

    /// Total frames at the output rate.
    pub fn num_frames(&self) -> Option<u64> {
        self.properties
            .num_frames
            .map(|n| converted_len(n, self.properties.sample_rate, self.sample_rate()))
    }

    /// Native-rate frame position of the decoder.
    ///
    /// When converting this runs ahead of what has been handed out, by the converter's buffering.
    pub fn position_native(&self) -> u64 {
        self.reader.position
    }

    /// Whether every frame has been handed out.
    pub fn is_eof(&self) -> bool {
        match &self.converter {
            Some(conv) => conv.is_finished() && conv.available() == 0,
            None => self.reader.is_drained(),
        }
    }

    pub fn diagnostics(&self) -> DecodeDiagnostics {
        self.reader.diagnostics
    }

    pub fn comments(&self) -> &Comments {
        &self.comments
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            channels: self.num_channels(),
            sample_rate_native: self.sample_rate_native(),
            output_channels: self.output_channels(),
            sample_rate: self.sample_rate(),
            num_frames_native: self.num_frames_native(),
            num_frames: self.num_frames(),
            duration_seconds: self
                .num_frames_native()
                .map(|n| n as f64 / self.sample_rate_native() as f64),
            comments: self.comments.clone(),
        }
    }

    /// Fill `buffer` from its first frame. Returns frames written.
    pub fn read(&mut self, buffer: &mut Buffer) -> usize {
        let frames = buffer.num_frames();
        self.perform_read(buffer, 0, frames)
    }

    /// Seek to `frame` in output-rate frames.
    pub fn seek(&mut self, frame: u64) {
        let native = converted_len(frame, self.sample_rate(), self.properties.sample_rate);
        self.perform_seek(native);
    }

    pub fn perform_read(&mut self, buffer: &mut Buffer, frame_offset: usize, frames: usize) -> usize {
        let room = buffer.num_frames().saturating_sub(frame_offset);
        let frames = if frames > room {
            warn!(
                frame_offset,
                frames,
                buffer_frames = buffer.num_frames(),
                "read window exceeds buffer; clamping"
            );
            room
        } else {
            frames
        };

        if frames == 0 {
            return 0;
        }

        if buffer.num_channels() < self.output_channels() {
            warn!(
                buffer_channels = buffer.num_channels(),
                needed = self.output_channels(),
                "buffer has too few channels"
            );
            return 0;
        }

        match self.converter.as_mut() {
            None => self.reader.read_into(buffer, frame_offset, frames),
            Some(conv) => read_converted(&mut self.reader, conv, buffer, frame_offset, frames),
        }
    }

    pub fn perform_seek(&mut self, frame: u64) {
        if let Some(conv) = self.converter.as_mut() {
            conv.reset();
        }
        self.reader.seek(frame);

        debug!(
            target = frame,
            position = self.reader.position,
            eof = self.reader.eof,
            "seek complete"
        );
    }

    pub fn metadata(&self) -> String {
        self.comments.to_string()
    }

    /// An independent session over the same origin, at `sample_rate`.
    pub fn clone_with_sample_rate(&self, sample_rate: u32) -> Result<Self> {
        let Some(origin) = &self.origin else {
            return Err(Error::msg(
                "session was opened from a bare stream and has no origin to clone from",
            ));
        };

        let options = SourceOptions {
            sample_rate: Some(sample_rate),
            ..self.options.clone()
        };
        Self::with_options(Arc::clone(origin), options)
    }
}

/// Read through the converter until `frames` output frames are written or the stream ends.
fn read_converted(
    reader: &mut NativeReader,
    conv: &mut Converter,
    buffer: &mut Buffer,
    frame_offset: usize,
    frames: usize,
) -> usize {
    let mut written = 0;

    loop {
        written += conv.pull(buffer, frame_offset + written, frames - written);
        if written == frames || conv.is_finished() {
            return written;
        }

        let want = conv.native_frames_for(frames - written);
        let got = reader.read_into(conv.staging_mut(want), 0, want);

        let step = if got > 0 {
            conv.push_staged(got)
        } else if reader.eof {
            conv.finish()
        } else {
            // Source fault: hand out what we have.
            return written;
        };

        if let Err(e) = step {
            reader.diagnostics.conversion_errors += 1;
            warn!(error = %e, "sample conversion failed; dropping read");
            conv.reset();
            return 0;
        }
    }
}

impl AudioSource for OggVorbisSource {
    fn num_channels(&self) -> usize {
        OggVorbisSource::num_channels(self)
    }

    fn sample_rate_native(&self) -> u32 {
        OggVorbisSource::sample_rate_native(self)
    }

    fn sample_rate(&self) -> u32 {
        OggVorbisSource::sample_rate(self)
    }

    fn output_channels(&self) -> usize {
        OggVorbisSource::output_channels(self)
    }

    fn num_frames(&self) -> Option<u64> {
        OggVorbisSource::num_frames(self)
    }

    fn perform_read(&mut self, buffer: &mut Buffer, frame_offset: usize, frames: usize) -> usize {
        OggVorbisSource::perform_read(self, buffer, frame_offset, frames)
    }

    fn perform_seek(&mut self, frame: u64) {
        OggVorbisSource::perform_seek(self, frame)
    }

    fn metadata(&self) -> String {
        OggVorbisSource::metadata(self)
    }

    fn clone_with_sample_rate(&self, sample_rate: u32) -> Result<Box<dyn AudioSource>> {
        Ok(Box::new(OggVorbisSource::clone_with_sample_rate(
            self,
            sample_rate,
        )?))
    }
}
