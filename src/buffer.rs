//! Planar multi-channel sample storage.

/// A planar `f32` buffer: each channel's frames are stored contiguously.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Buffer {
    data: Vec<f32>,
    num_frames: usize,
    num_channels: usize,
}

impl Buffer {
    /// Create a zeroed buffer.
    pub fn new(num_frames: usize, num_channels: usize) -> Self {
        Self {
            data: vec![0.0; num_frames * num_channels],
            num_frames,
            num_channels,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Samples of one channel.
    ///
    /// Panics if `ch >= num_channels()`.
    pub fn channel(&self, ch: usize) -> &[f32] {
        assert!(ch < self.num_channels, "channel {ch} out of range");
        &self.data[ch * self.num_frames..(ch + 1) * self.num_frames]
    }

    /// Mutable samples of one channel.
    ///
    /// Panics if `ch >= num_channels()`.
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        assert!(ch < self.num_channels, "channel {ch} out of range");
        &mut self.data[ch * self.num_frames..(ch + 1) * self.num_frames]
    }

    /// All samples, channel-major.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn zero(&mut self) {
        self.data.fill(0.0);
    }

    /// Reshape in place, zeroing the contents. Reuses the allocation where possible.
    pub fn set_size(&mut self, num_frames: usize, num_channels: usize) {
        self.num_frames = num_frames;
        self.num_channels = num_channels;
        self.data.clear();
        self.data.resize(num_frames * num_channels, 0.0);
    }

    /// Interleave `frames` frames starting at `frame_offset` into `out` (cleared first).
    pub fn interleave_into(&self, frame_offset: usize, frames: usize, out: &mut Vec<f32>) {
        out.clear();
        let end = (frame_offset + frames).min(self.num_frames);
        out.reserve(end.saturating_sub(frame_offset) * self.num_channels);

        for frame in frame_offset..end {
            for ch in 0..self.num_channels {
                out.push(self.data[ch * self.num_frames + frame]);
            }
        }
    }
}
