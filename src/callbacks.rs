//! The byte-stream adapter between a caller's [`ByteSource`] and the decoder's I/O model.
//!
//! The decoder pulls bytes through a four-entry callback table (read, seek, tell, close), in the
//! same shape C decoders such as libvorbisfile expect. [`StreamCallbacks`] is that table;
//! [`StreamAdapter`] implements it over a shared [`StreamRef`]; [`CallbackSource`] presents any
//! callback table to Symphonia as a `MediaSource`, using nothing but the four primitives.
//!
//! Error policy:
//! - `read` never fails. A fault becomes a short/zero read and is recorded on the adapter, so the
//!   session can tell "the bytes ran out" from "the source broke" after the fact.
//! - `seek` and `tell` report failure through their return values only.
//! - `close` is a no-op: the byte source belongs to the caller.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

use symphonia::core::io::MediaSource;
use tracing::{trace, warn};

use crate::byte_source::{ByteSource, StreamRef};

/// Absolute positioning.
pub const SEEK_SET: i32 = 0;
/// Relative to the current position.
pub const SEEK_CUR: i32 = 1;
/// Relative to the end of the stream.
pub const SEEK_END: i32 = 2;

/// A decoder-facing I/O callback table.
pub trait StreamCallbacks: Send + Sync {
    /// Read up to `size * count` bytes into `buf` (bounded by `buf.len()`); returns bytes read.
    fn read(&self, buf: &mut [u8], size: usize, count: usize) -> usize;

    /// Reposition the stream. Returns 0 on success, non-zero on failure.
    fn seek(&self, offset: i64, whence: i32) -> i32;

    /// Current byte offset, or -1 if it cannot be determined.
    fn tell(&self) -> i64;

    /// Called when the decoder releases the stream. Returns 0.
    fn close(&self) -> i32;
}

impl<T: StreamCallbacks + ?Sized> StreamCallbacks for Arc<T> {
    fn read(&self, buf: &mut [u8], size: usize, count: usize) -> usize {
        (**self).read(buf, size, count)
    }

    fn seek(&self, offset: i64, whence: i32) -> i32 {
        (**self).seek(offset, whence)
    }

    fn tell(&self) -> i64 {
        (**self).tell()
    }

    fn close(&self) -> i32 {
        (**self).close()
    }
}

/// Callback table bound to one caller-owned byte stream.
pub struct StreamAdapter {
    stream: StreamRef,
    fault: Mutex<Option<io::Error>>,
}

impl StreamAdapter {
    pub fn new(stream: StreamRef) -> Self {
        Self {
            stream,
            fault: Mutex::new(None),
        }
    }

    /// The bound stream.
    pub fn stream(&self) -> &StreamRef {
        &self.stream
    }

    /// Take the most recent I/O fault swallowed by `read` or `seek`, if any.
    pub fn take_fault(&self) -> Option<io::Error> {
        self.fault.lock().ok().and_then(|mut slot| slot.take())
    }

    fn record_fault(&self, err: io::Error) {
        warn!(error = %err, "byte source fault");
        if let Ok(mut slot) = self.fault.lock() {
            *slot = Some(err);
        }
    }

    fn with_stream<T>(
        &self,
        f: impl FnOnce(&mut dyn ByteSource) -> io::Result<T>,
    ) -> io::Result<T> {
        let mut guard = self
            .stream
            .lock()
            .map_err(|_| io::Error::other("byte source mutex poisoned"))?;
        f(&mut *guard)
    }
}

impl StreamCallbacks for StreamAdapter {
    fn read(&self, buf: &mut [u8], size: usize, count: usize) -> usize {
        let wanted = size.saturating_mul(count).min(buf.len());
        if wanted == 0 {
            return 0;
        }

        let res = self.with_stream(|s| {
            loop {
                match s.read(&mut buf[..wanted]) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            }
        });

        match res {
            Ok(n) => n,
            Err(e) => {
                self.record_fault(e);
                0
            }
        }
    }

    fn seek(&self, offset: i64, whence: i32) -> i32 {
        let pos = match whence {
            SEEK_SET => match u64::try_from(offset) {
                Ok(offset) => SeekFrom::Start(offset),
                Err(_) => return -1,
            },
            SEEK_CUR => SeekFrom::Current(offset),
            SEEK_END => SeekFrom::End(offset),
            _ => {
                trace!(whence, "rejecting unknown whence");
                return -1;
            }
        };

        let res = self.with_stream(|s| {
            if !s.is_seekable() {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "byte source is not seekable",
                ));
            }
            s.seek(pos)
        });

        match res {
            Ok(_) => 0,
            // Unsupported and out-of-range seeks are contract failures, not source faults.
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Unsupported | io::ErrorKind::InvalidInput
                ) =>
            {
                -1
            }
            Err(e) => {
                self.record_fault(e);
                -1
            }
        }
    }

    fn tell(&self) -> i64 {
        match self.with_stream(|s| s.tell()) {
            Ok(pos) => i64::try_from(pos).unwrap_or(-1),
            Err(_) => -1,
        }
    }

    fn close(&self) -> i32 {
        0
    }
}

/// Presents a callback table to Symphonia as a `MediaSource`.
pub struct CallbackSource<C: StreamCallbacks> {
    callbacks: C,
    seekable: bool,
    byte_len: Option<u64>,
}

impl<C: StreamCallbacks> CallbackSource<C> {
    pub fn new(callbacks: C) -> Self {
        let seekable = callbacks.seek(0, SEEK_CUR) == 0;
        let byte_len = if seekable {
            measure_len(&callbacks)
        } else {
            None
        };

        Self {
            callbacks,
            seekable,
            byte_len,
        }
    }
}

/// Measure the stream with tell / seek-to-end / tell, then restore the position.
fn measure_len<C: StreamCallbacks>(callbacks: &C) -> Option<u64> {
    let here = callbacks.tell();
    if here < 0 || callbacks.seek(0, SEEK_END) != 0 {
        return None;
    }

    let end = callbacks.tell();
    if callbacks.seek(here, SEEK_SET) != 0 {
        return None;
    }

    u64::try_from(end).ok()
}

impl<C: StreamCallbacks> Read for CallbackSource<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.callbacks.read(buf, 1, buf.len()))
    }
}

impl<C: StreamCallbacks> Seek for CallbackSource<C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(offset) => (
                i64::try_from(offset).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset overflows i64")
                })?,
                SEEK_SET,
            ),
            SeekFrom::Current(offset) => (offset, SEEK_CUR),
            SeekFrom::End(offset) => (offset, SEEK_END),
        };

        if self.callbacks.seek(offset, whence) != 0 {
            return Err(io::Error::other(format!("seek to {pos:?} failed")));
        }

        u64::try_from(self.callbacks.tell())
            .map_err(|_| io::Error::other("stream position unavailable after seek"))
    }
}

impl<C: StreamCallbacks> MediaSource for CallbackSource<C> {
    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn byte_len(&self) -> Option<u64> {
        self.byte_len
    }
}

impl<C: StreamCallbacks> Drop for CallbackSource<C> {
    fn drop(&mut self) {
        self.callbacks.close();
    }
}
