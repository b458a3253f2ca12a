// src/decode.rs

//! Decoder helpers built on top of Symphonia.
//!
//! This module isolates codec-level concerns:
//! - constructing a Vorbis decoder for the selected track
//! - decoding packets into PCM buffers
//! - handling Symphonia's error model in a predictable, playback-friendly way

use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{Packet, Track};

use crate::error::{Error, Result};

/// Create a decoder for the given track using Symphonia's default codec registry.
///
/// Fails with `StreamFormat` if the codec parameters (the Vorbis identification and setup
/// headers) are rejected.
pub(crate) fn make_decoder_for_track(track: &Track) -> Result<Box<dyn Decoder>> {
    let decoder_opts: DecoderOptions = Default::default();

    symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| Error::format(format!("failed to create decoder for vorbis track: {e}")))
}

/// Decode a packet and immediately hand the decoded buffer to a callback.
///
/// Return value semantics:
/// - `Ok(Some(_))` → a decoded audio buffer was produced and `on_decoded` ran
/// - `Ok(None)`    → the decoder needed a reset; the packet produced nothing
/// - `Err(Error::Decode)` → the packet is corrupt and should be skipped
///
/// I/O errors raised by the decoder itself come from reading past the end of a truncated
/// packet, so they are reported as corrupt packets too.
pub(crate) fn decode_packet_and_then<T>(
    decoder: &mut dyn Decoder,
    packet: &Packet,
    on_decoded: impl FnOnce(AudioBufferRef<'_>) -> T,
) -> Result<Option<T>> {
    match decoder.decode(packet) {
        Ok(buf) => return Ok(Some(on_decoded(buf))),

        // Reset below, once the decoder is no longer borrowed by the result.
        Err(SymphoniaError::ResetRequired) => {}

        Err(SymphoniaError::DecodeError(msg)) => return Err(Error::Decode(msg.to_string())),

        Err(e) => return Err(Error::Decode(e.to_string())),
    }

    decoder.reset();
    Ok(None)
}
