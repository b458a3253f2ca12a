//! Rate/channel conversion bridge between the decoder and the caller.
//!
//! Responsibilities:
//! - Stage native-rate frames decoded on the caller's behalf
//! - Map channels (copy / downmix / upmix)
//! - Resample to the requested rate with `rubato`, in fixed-size blocks
//! - Hand out exactly as many converted frames as the caller asks for
//!
//! Continuity: converted frames the caller did not take yet stay in an output FIFO, and native
//! frames short of a full resampler block stay in an input accumulator, so successive reads join
//! without discontinuities. `reset()` discards both (used after a seek).
//!
//! Length: the resampler's leading delay is dropped, and at end of stream the filter tail is
//! flushed with silence and trimmed, so `n` native frames become `round(n * dst / src)` frames.

use rubato::{
    FastFixedIn, PolynomialDegree, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::opts::ResamplerQuality;

/// Extra native frames decoded per staging pass, on top of the proportional estimate.
pub const STAGING_SLACK_FRAMES: usize = 64;

/// Number of output frames `frames` native frames convert to.
pub fn converted_len(frames: u64, src_rate: u32, dst_rate: u32) -> u64 {
    if src_rate == dst_rate || src_rate == 0 {
        return frames;
    }
    let src = u128::from(src_rate);
    ((u128::from(frames) * u128::from(dst_rate) + src / 2) / src) as u64
}

/// Enum wrapper for rubato resamplers (the trait is not object-safe).
enum ResamplerKind {
    Poly(FastFixedIn<f32>),
    Sinc(SincFixedIn<f32>),
}

impl ResamplerKind {
    fn new(
        quality: ResamplerQuality,
        ratio: f64,
        chunk_frames: usize,
        channels: usize,
    ) -> std::result::Result<Self, rubato::ResamplerConstructionError> {
        match quality {
            ResamplerQuality::Fast => Ok(Self::Poly(FastFixedIn::new(
                ratio,
                1.0,
                PolynomialDegree::Cubic,
                chunk_frames,
                channels,
            )?)),
            ResamplerQuality::Normal | ResamplerQuality::High => Ok(Self::Sinc(SincFixedIn::new(
                ratio,
                1.0,
                sinc_params(quality),
                chunk_frames,
                channels,
            )?)),
        }
    }

    fn process(
        &mut self,
        input: &[&[f32]],
    ) -> std::result::Result<Vec<Vec<f32>>, rubato::ResampleError> {
        match self {
            Self::Poly(r) => r.process(input, None),
            Self::Sinc(r) => r.process(input, None),
        }
    }

    fn input_frames_next(&self) -> usize {
        match self {
            Self::Poly(r) => r.input_frames_next(),
            Self::Sinc(r) => r.input_frames_next(),
        }
    }

    fn output_delay(&self) -> usize {
        match self {
            Self::Poly(r) => r.output_delay(),
            Self::Sinc(r) => r.output_delay(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Poly(r) => r.reset(),
            Self::Sinc(r) => r.reset(),
        }
    }
}

fn sinc_params(quality: ResamplerQuality) -> SincInterpolationParameters {
    match quality {
        ResamplerQuality::Normal => SincInterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        },
        // Fast never reaches here.
        _ => SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        },
    }
}

/// Converts native-rate, native-layout frames into the caller's requested format.
pub struct Converter {
    src_rate: u32,
    dst_rate: u32,
    src_channels: usize,
    dst_channels: usize,

    // Only present when the rates differ.
    resampler: Option<ResamplerKind>,

    // Native frames decoded by the session for the current read.
    staging: Buffer,

    // Channel-mapped frames waiting for a full resampler block.
    input: Vec<Vec<f32>>,

    // Converted frames not yet handed to the caller.
    output: Vec<Vec<f32>>,

    // Leading resampler output still to be discarded.
    delay_remaining: usize,

    frames_in: u64,
    frames_out: u64,
    finished: bool,
}

impl Converter {
    pub fn new(
        src_rate: u32,
        src_channels: usize,
        dst_rate: u32,
        dst_channels: usize,
        quality: ResamplerQuality,
        chunk_frames: usize,
    ) -> Result<Self> {
        if src_rate == 0 || dst_rate == 0 {
            return Err(Error::Conversion(format!(
                "invalid sample rates {src_rate} -> {dst_rate}"
            )));
        }
        if src_channels == 0 || dst_channels == 0 {
            return Err(Error::Conversion(format!(
                "invalid channel counts {src_channels} -> {dst_channels}"
            )));
        }
        if chunk_frames == 0 {
            return Err(Error::Conversion("resampler chunk size must be non-zero".into()));
        }

        let resampler = if src_rate != dst_rate {
            let ratio = dst_rate as f64 / src_rate as f64;
            Some(ResamplerKind::new(quality, ratio, chunk_frames, dst_channels)?)
        } else {
            None
        };

        let delay_remaining = resampler.as_ref().map_or(0, ResamplerKind::output_delay);

        debug!(
            src_rate,
            dst_rate,
            src_channels,
            dst_channels,
            resampling = resampler.is_some(),
            quality = ?quality,
            delay = delay_remaining,
            "converter initialized"
        );

        Ok(Self {
            src_rate,
            dst_rate,
            src_channels,
            dst_channels,
            resampler,
            staging: Buffer::default(),
            input: vec![Vec::new(); dst_channels],
            output: vec![Vec::new(); dst_channels],
            delay_remaining,
            frames_in: 0,
            frames_out: 0,
            finished: false,
        })
    }

    pub fn output_rate(&self) -> u32 {
        self.dst_rate
    }

    pub fn output_channels(&self) -> usize {
        self.dst_channels
    }

    pub fn is_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    /// Converted frames ready to be pulled.
    pub fn available(&self) -> usize {
        self.output.first().map_or(0, Vec::len)
    }

    /// Whether end of stream has been flushed through.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Native frames to decode so that `output_frames` more converted frames can be produced.
    pub fn native_frames_for(&self, output_frames: usize) -> usize {
        let src = self.src_rate as usize;
        let dst = self.dst_rate as usize;
        output_frames.saturating_mul(src).div_ceil(dst) + STAGING_SLACK_FRAMES
    }

    /// The staging buffer, sized for `frames` native frames.
    pub fn staging_mut(&mut self, frames: usize) -> &mut Buffer {
        if self.staging.num_frames() < frames || self.staging.num_channels() != self.src_channels {
            self.staging.set_size(frames, self.src_channels);
        }
        &mut self.staging
    }

    /// Convert the first `frames` frames of the staging buffer.
    pub fn push_staged(&mut self, frames: usize) -> Result<()> {
        if frames == 0 {
            return Ok(());
        }

        let frames = frames.min(self.staging.num_frames());
        self.frames_in += frames as u64;

        if self.resampler.is_none() {
            append_mapped(&self.staging, frames, &mut self.output);
            self.frames_out += frames as u64;
            return Ok(());
        }

        append_mapped(&self.staging, frames, &mut self.input);
        self.drain_full_blocks()
    }

    /// Flush the filter tail at end of stream.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let Some(rs) = self.resampler.as_mut() else {
            return Ok(());
        };

        let expected = converted_len(self.frames_in, self.src_rate, self.dst_rate);
        let need = rs.input_frames_next();

        // rubato expects exact block sizes; pad the remainder with zeros.
        let rem = self.input[0].len() % need;
        if rem != 0 {
            for chan in &mut self.input {
                chan.resize(chan.len() + (need - rem), 0.0);
            }
        }

        let silence = vec![0.0f32; need];
        while self.frames_out < expected {
            let produced = if self.input[0].is_empty() {
                let block: Vec<&[f32]> = (0..self.dst_channels).map(|_| &silence[..]).collect();
                rs.process(&block)?
            } else {
                let block: Vec<&[f32]> = self.input.iter().map(|c| &c[..need]).collect();
                let produced = rs.process(&block)?;
                for chan in &mut self.input {
                    chan.drain(..need);
                }
                produced
            };

            if produced.first().is_none_or(Vec::is_empty) {
                break;
            }

            append_output(
                &mut self.output,
                &mut self.delay_remaining,
                &mut self.frames_out,
                &produced,
                Some(expected),
            );
        }

        for chan in &mut self.input {
            chan.clear();
        }

        debug!(frames_in = self.frames_in, frames_out = self.frames_out, "converter flushed");
        Ok(())
    }

    /// Move up to `frames` converted frames into `out` at `frame_offset`. Returns frames moved.
    ///
    /// `out` must have at least `output_channels()` channels and room for the window.
    pub fn pull(&mut self, out: &mut Buffer, frame_offset: usize, frames: usize) -> usize {
        let room = out.num_frames().saturating_sub(frame_offset);
        let n = frames.min(self.available()).min(room);
        if n == 0 {
            return 0;
        }

        for (ch, fifo) in self.output.iter_mut().enumerate() {
            out.channel_mut(ch)[frame_offset..frame_offset + n].copy_from_slice(&fifo[..n]);
            fifo.drain(..n);
        }
        n
    }

    /// Discard all buffered state, as after a seek.
    pub fn reset(&mut self) {
        if let Some(rs) = self.resampler.as_mut() {
            rs.reset();
        }
        for chan in self.input.iter_mut().chain(self.output.iter_mut()) {
            chan.clear();
        }
        self.delay_remaining = self.resampler.as_ref().map_or(0, ResamplerKind::output_delay);
        self.frames_in = 0;
        self.frames_out = 0;
        self.finished = false;
    }

    fn drain_full_blocks(&mut self) -> Result<()> {
        let Some(rs) = self.resampler.as_mut() else {
            return Ok(());
        };

        loop {
            let need = rs.input_frames_next();
            if self.input[0].len() < need {
                return Ok(());
            }

            let produced = {
                let block: Vec<&[f32]> = self.input.iter().map(|c| &c[..need]).collect();
                rs.process(&block)?
            };
            for chan in &mut self.input {
                chan.drain(..need);
            }

            append_output(
                &mut self.output,
                &mut self.delay_remaining,
                &mut self.frames_out,
                &produced,
                None,
            );
        }
    }
}

/// Append resampler output, dropping leading delay and stopping at `limit` total frames.
fn append_output(
    output: &mut [Vec<f32>],
    delay_remaining: &mut usize,
    frames_out: &mut u64,
    produced: &[Vec<f32>],
    limit: Option<u64>,
) {
    let n = produced.first().map_or(0, Vec::len);
    let skip = (*delay_remaining).min(n);
    *delay_remaining -= skip;

    let mut take = n - skip;
    if let Some(limit) = limit {
        take = take.min(limit.saturating_sub(*frames_out) as usize);
    }

    for (fifo, chan) in output.iter_mut().zip(produced) {
        fifo.extend_from_slice(&chan[skip..skip + take]);
    }
    *frames_out += take as u64;
}

/// Append `frames` frames of `src`, mapped onto `dst.len()` channels.
///
/// Policy:
/// - same count: copy
/// - to mono: equal-weight average across channels
/// - from mono: duplicate into every channel
/// - otherwise: copy shared channels, silence the rest
fn append_mapped(src: &Buffer, frames: usize, dst: &mut [Vec<f32>]) {
    let src_channels = src.num_channels();

    if dst.len() == 1 && src_channels > 1 {
        let mono = &mut dst[0];
        let base = mono.len();
        mono.resize(base + frames, 0.0);

        for ch in 0..src_channels {
            for (acc, s) in mono[base..].iter_mut().zip(&src.channel(ch)[..frames]) {
                *acc += *s;
            }
        }

        let scale = 1.0 / src_channels as f32;
        for acc in &mut mono[base..] {
            *acc *= scale;
        }
        return;
    }

    for (ch, chan) in dst.iter_mut().enumerate() {
        if src_channels == 1 {
            chan.extend_from_slice(&src.channel(0)[..frames]);
        } else if ch < src_channels {
            chan.extend_from_slice(&src.channel(ch)[..frames]);
        } else {
            chan.resize(chan.len() + frames, 0.0);
        }
    }
}
