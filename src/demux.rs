// src/demux.rs

//! Demux helpers for Symphonia.
//!
//! This module keeps container probing and packet iteration logic isolated from the
//! rest of the decode path.
//!
//! Responsibilities:
//! - Probe a `MediaSource` as Ogg and select its Vorbis track
//! - Map Symphonia's open-time errors onto `StreamFormat` / `Io`
//! - Provide a `next_packet` helper that treats end-of-data as end-of-stream

use std::io;

use symphonia::core::codecs::CODEC_TYPE_VORBIS;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::{Hint, ProbedMetadata};
use tracing::debug;

use crate::error::{Error, Result};

/// An opened container plus the selected Vorbis track.
pub(crate) struct Demuxed {
    pub format: Box<dyn FormatReader>,
    pub track: Track,
    pub probed_metadata: ProbedMetadata,
}

/// Probe the source and pick its first Vorbis track.
///
/// Gapless mode is enabled so the container's granule positions trim the decoded output to the
/// exact encoded length.
pub(crate) fn probe_vorbis_track(
    source: Box<dyn MediaSource>,
    hint_extension: Option<&str>,
) -> Result<Demuxed> {
    let mss_opts = MediaSourceStreamOptions {
        // Symphonia expects a power-of-two buffer > 32KiB.
        buffer_len: 64 * 1024,
    };

    let mss = MediaSourceStream::new(source, mss_opts);

    let mut hint = Hint::new();
    hint.with_extension(hint_extension.unwrap_or("ogg"));

    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };
    let metadata_opts: MetadataOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(open_error)?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec == CODEC_TYPE_VORBIS)
        .cloned()
        .ok_or_else(|| Error::format("no vorbis track found"))?;

    debug!(track_id = track.id, "selected vorbis track");

    Ok(Demuxed {
        format: probed.format,
        track,
        probed_metadata: probed.metadata,
    })
}

/// Map an error raised while opening the stream.
///
/// Running out of bytes mid-header means the data is not a complete stream; any other I/O
/// failure belongs to the byte source.
pub(crate) fn open_error(err: SymphoniaError) -> Error {
    match err {
        SymphoniaError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Error::format("stream ended before the headers were complete")
        }
        SymphoniaError::IoError(e) => Error::Io(e),
        other => Error::format(other.to_string()),
    }
}

/// Read the next packet.
///
/// - `Ok(None)` means end of stream, including the start of a new chained logical stream
/// - `Err(Error::Io)` is a byte source failure
/// - `Err(Error::Decode)` is a malformed page the caller may skip past
pub(crate) fn next_packet(format: &mut dyn FormatReader) -> Result<Option<Packet>> {
    match format.next_packet() {
        Ok(p) => Ok(Some(p)),
        Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(SymphoniaError::IoError(e)) => Err(Error::Io(e)),
        Err(SymphoniaError::ResetRequired) => {
            debug!("chained logical stream reached; treating as end of stream");
            Ok(None)
        }
        Err(e) => Err(Error::Decode(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use symphonia::core::io::ReadOnlySource;

    use super::*;

    #[test]
    fn garbage_is_a_stream_format_error() {
        let source = ReadOnlySource::new(Cursor::new(vec![0x5au8; 4096]));
        let err = probe_vorbis_track(Box::new(source), None)
            .err()
            .expect("probe should fail");
        assert!(matches!(err, Error::StreamFormat(_)), "got {err:?}");
    }

    #[test]
    fn unexpected_eof_while_opening_is_a_format_error() {
        let err = open_error(SymphoniaError::IoError(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "eof",
        )));
        assert!(matches!(err, Error::StreamFormat(_)));
    }

    #[test]
    fn other_io_errors_while_opening_stay_io_errors() {
        let err = open_error(SymphoniaError::IoError(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "nope",
        )));
        assert!(matches!(err, Error::Io(_)));
    }
}
