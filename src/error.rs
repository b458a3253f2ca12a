use std::error::Error as StdError;

use thiserror::Error;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
///
/// Only construction surfaces most of these to callers. Once a session is open, read and seek
/// faults are absorbed and show up as reduced output plus a diagnostics counter.
#[derive(Debug, Error)]
pub enum Error {
    /// The bytes are not an openable Ogg stream carrying a Vorbis track.
    #[error("invalid ogg vorbis stream: {0}")]
    StreamFormat(String),

    /// The underlying byte source failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A seek target lies past the end of the stream.
    #[error("seek target {requested} is beyond the end of the stream ({len} frames)")]
    SeekOutOfRange { requested: u64, len: u64 },

    /// Resampling or channel mapping failed.
    #[error("sample conversion failed: {0}")]
    Conversion(String),

    /// A single packet could not be decoded.
    #[error("corrupt packet: {0}")]
    Decode(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::StreamFormat(message.into())
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => Self::Io(e),
            other => Self::Other(Box::new(other)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<rubato::ResampleError> for Error {
    fn from(err: rubato::ResampleError) -> Self {
        Self::Conversion(err.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for Error {
    fn from(err: rubato::ResamplerConstructionError) -> Self {
        Self::Conversion(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_into_the_io_variant() {
        let err: Error = std::io::Error::other("boom").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn seek_out_of_range_reports_both_positions() {
        let err = Error::SeekOutOfRange {
            requested: 500,
            len: 100,
        };
        let text = err.to_string();
        assert!(text.contains("500"));
        assert!(text.contains("100"));
    }
}
