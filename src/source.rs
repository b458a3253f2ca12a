//! The audio-source capability set.
//!
//! Any decoder that can feed the playback pipeline implements [`AudioSource`]. The pipeline only
//! ever talks to sources through this trait, so codecs are interchangeable.

use crate::buffer::Buffer;
use crate::error::Result;

pub trait AudioSource: Send {
    /// Channel count of the encoded stream. Constant for the life of the source.
    fn num_channels(&self) -> usize;

    /// Sample rate the stream was encoded at. Constant for the life of the source.
    fn sample_rate_native(&self) -> u32;

    /// Sample rate of the frames handed out by `perform_read`.
    fn sample_rate(&self) -> u32 {
        self.sample_rate_native()
    }

    /// Channel count of the frames handed out by `perform_read`.
    fn output_channels(&self) -> usize {
        self.num_channels()
    }

    /// Total length in output frames, if known.
    fn num_frames(&self) -> Option<u64> {
        None
    }

    /// Decode up to `frames` frames into `buffer` starting at `frame_offset`.
    ///
    /// Only `[frame_offset, frame_offset + frames)` of each channel is written. Returns the number
    /// of frames written; fewer than requested only at end of stream or after a source fault.
    fn perform_read(&mut self, buffer: &mut Buffer, frame_offset: usize, frames: usize) -> usize;

    /// Move the read cursor to `frame`, in native-rate frames. Never fails: targets past the end
    /// clamp to the end.
    fn perform_seek(&mut self, frame: u64);

    /// Human-readable metadata, one `KEY=value` entry per line.
    fn metadata(&self) -> String;

    /// An independent source over the same data, producing output at `sample_rate`.
    fn clone_with_sample_rate(&self, sample_rate: u32) -> Result<Box<dyn AudioSource>>;
}
