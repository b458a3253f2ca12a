//! `vorbis-source`: a seekable Ogg Vorbis audio source for real-time pipelines.
//!
//! This crate provides:
//! - A decoder session that reads planar `f32` frames from any byte stream
//! - Random-access seeking in native-rate frames
//! - Transparent sample-rate and channel conversion
//! - Vorbis comment extraction
//!
//! Decoding is done by Symphonia; resampling by rubato. The session reaches the caller's bytes
//! only through a small callback table, so anything that can read, seek and tell can feed it.

// High-level API (most consumers should start here).
pub mod ogg_vorbis;
pub mod opts;
pub mod source;

// Byte streams and the decoder-facing callback adapter.
pub mod byte_source;
pub mod callbacks;

// Samples and conversion.
pub mod buffer;
pub mod converter;

// Stream facts and comments.
pub mod handle;
pub mod metadata;

// Rendering helpers.
pub mod wav;

// Error types.
pub mod error;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

// Symphonia plumbing.
mod decode;
mod demux;

#[cfg(test)]
mod mock;

pub use buffer::Buffer;
pub use byte_source::{
    ByteSource, DataSource, DataSourceRef, FileSource, MemorySource, ReadSeekSource, StreamRef,
    share,
};
pub use error::{Error, Result};
pub use metadata::{Comment, Comments};
pub use ogg_vorbis::{DecodeDiagnostics, OggVorbisSource, StreamInfo};
pub use opts::{ResamplerQuality, SourceOptions};
pub use source::AudioSource;
