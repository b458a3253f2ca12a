//! Deterministic in-memory decode handle for session tests.
//!
//! Sample values form a ramp: frame `f` of channel `c` holds `f + c / 4`, so any sample tells
//! you exactly which frame it came from.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::handle::{Block, DecodeHandle, StreamProperties};
use crate::metadata::{Comment, Comments};

/// Value of `frame` on channel `ch`.
pub(crate) fn ramp(frame: u64, ch: usize) -> f32 {
    frame as f32 + ch as f32 * 0.25
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    Decode,
    Io,
}

pub(crate) struct MockHandle {
    properties: StreamProperties,
    total: u64,
    block_frames: usize,
    position: u64,
    comments: Comments,
    // (position, fault), fired in order once the cursor reaches the position.
    faults: VecDeque<(u64, Fault)>,
}

impl MockHandle {
    pub(crate) fn new(channels: usize, sample_rate: u32, total: u64) -> Self {
        Self {
            properties: StreamProperties {
                channels,
                sample_rate,
                num_frames: Some(total),
            },
            total,
            block_frames: 256,
            position: 0,
            comments: Comments::new(vec![
                Comment {
                    key: "TITLE".into(),
                    value: "Ramp".into(),
                },
                Comment {
                    key: "ENCODER".into(),
                    value: "mock".into(),
                },
            ]),
            faults: VecDeque::new(),
        }
    }

    pub(crate) fn block_frames(mut self, frames: usize) -> Self {
        self.block_frames = frames;
        self
    }

    /// Hide the total length, as for a stream without a final granule position.
    pub(crate) fn unknown_length(mut self) -> Self {
        self.properties.num_frames = None;
        self
    }

    pub(crate) fn fault_at(mut self, position: u64, fault: Fault, times: usize) -> Self {
        self.faults.extend(std::iter::repeat_n((position, fault), times));
        self
    }
}

impl DecodeHandle for MockHandle {
    fn properties(&self) -> StreamProperties {
        self.properties
    }

    fn comments(&self) -> &Comments {
        &self.comments
    }

    fn next_block(&mut self, out: &mut Vec<f32>) -> Result<Option<Block>> {
        if let Some(&(at, fault)) = self.faults.front() {
            if self.position >= at {
                self.faults.pop_front();
                return Err(match fault {
                    Fault::Decode => Error::Decode("mock corrupt packet".into()),
                    Fault::Io => Error::Io(std::io::Error::other("mock source fault")),
                });
            }
        }

        if self.position >= self.total {
            return Ok(None);
        }

        let start = self.position;
        let frames = (self.total - start).min(self.block_frames as u64) as usize;

        out.clear();
        for ch in 0..self.properties.channels {
            out.extend((0..frames as u64).map(|i| ramp(start + i, ch)));
        }

        self.position += frames as u64;
        Ok(Some(Block {
            frames,
            start: Some(start),
        }))
    }

    fn seek(&mut self, frame: u64) -> Result<u64> {
        if frame >= self.total {
            return Err(Error::SeekOutOfRange {
                requested: frame,
                len: self.total,
            });
        }
        self.position = frame;
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}
