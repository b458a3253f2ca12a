//! Caller-facing byte streams and the origins that create them.
//!
//! A [`ByteSource`] is the narrow interface the decoder pulls bytes through. It is owned by the
//! caller and only ever *shared* with a session (via [`StreamRef`]); nothing in this crate closes
//! it on the caller's behalf.
//!
//! A [`DataSource`] is an origin that can hand out fresh, independently positioned streams. It is
//! what makes `clone_with_sample_rate` possible without two sessions fighting over one cursor.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A readable, optionally seekable stream of bytes.
pub trait ByteSource: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Reposition the stream, returning the new absolute offset.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Current absolute offset.
    fn tell(&mut self) -> io::Result<u64>;

    /// Total length in bytes, if known.
    fn byte_len(&mut self) -> Option<u64>;

    /// Whether `seek` is supported at all.
    fn is_seekable(&self) -> bool {
        true
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (**self).seek(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        (**self).tell()
    }

    fn byte_len(&mut self) -> Option<u64> {
        (**self).byte_len()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
}

/// A caller-owned byte stream shared with a decoder session.
pub type StreamRef = Arc<Mutex<dyn ByteSource>>;

/// Wrap a byte source into a [`StreamRef`].
pub fn share<S: ByteSource + 'static>(source: S) -> StreamRef {
    Arc::new(Mutex::new(source))
}

/// An origin of independent byte streams.
pub trait DataSource: Send + Sync {
    /// Open a new stream positioned at byte 0.
    ///
    /// Every call must return a stream with its own cursor.
    fn create_stream(&self) -> io::Result<Box<dyn ByteSource>>;

    /// Optional file extension, used as a probing hint.
    fn extension_hint(&self) -> Option<&str> {
        None
    }
}

/// A shared [`DataSource`].
pub type DataSourceRef = Arc<dyn DataSource>;

/// Adapts any `Read + Seek` type to [`ByteSource`].
#[derive(Debug)]
pub struct ReadSeekSource<R> {
    inner: R,
    byte_len: Option<u64>,
}

impl<R: Read + Seek> ReadSeekSource<R> {
    pub fn new(mut inner: R) -> Self {
        let byte_len = probe_byte_len(&mut inner);
        Self { inner, byte_len }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Probe stream length via `seek(End(0))` and restore the position.
fn probe_byte_len<R: Seek>(reader: &mut R) -> Option<u64> {
    let current = reader.stream_position().ok()?;
    let end = reader.seek(SeekFrom::End(0)).ok()?;
    reader.seek(SeekFrom::Start(current)).ok()?;
    Some(end)
}

impl<R: Read + Seek + Send> ByteSource for ReadSeekSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    fn byte_len(&mut self) -> Option<u64> {
        self.byte_len
    }
}

/// In-memory encoded bytes; every stream is a cursor over the same shared allocation.
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl DataSource for MemorySource {
    fn create_stream(&self) -> io::Result<Box<dyn ByteSource>> {
        Ok(Box::new(ReadSeekSource::new(Cursor::new(Arc::clone(
            &self.bytes,
        )))))
    }
}

/// A file on disk; every stream opens its own file handle.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileSource {
    fn create_stream(&self) -> io::Result<Box<dyn ByteSource>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(ReadSeekSource::new(file)))
    }

    fn extension_hint(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}
