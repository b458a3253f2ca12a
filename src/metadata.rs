//! Vorbis comment extraction.
//!
//! Comments are read once, right after the headers are parsed, and kept on the session. Reading
//! them later never touches the decoder, so metadata is independent of the read position.
//!
//! Text form: one `KEY=value` entry per line, in stream order, separated by `\n` with no trailing
//! newline. A stream without comments yields an empty string.

use std::fmt;

use symphonia::core::formats::FormatReader;
use symphonia::core::meta::MetadataRevision;
use symphonia::core::probe::ProbedMetadata;

/// A single `KEY=value` comment.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Comment {
    pub key: String,
    pub value: String,
}

/// All comments of a stream, in stream order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct Comments {
    entries: Vec<Comment>,
}

impl Comments {
    pub fn new(entries: Vec<Comment>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.entries.iter()
    }

    /// First value for `key`, compared case-insensitively as Vorbis comment keys are.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(key))
            .map(|c| c.value.as_str())
    }

    pub fn title(&self) -> Option<&str> {
        self.get("TITLE")
    }

    pub fn artist(&self) -> Option<&str> {
        self.get("ARTIST")
    }

    pub fn album(&self) -> Option<&str> {
        self.get("ALBUM")
    }
}

impl fmt::Display for Comments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}={}", c.key, c.value)?;
        }
        Ok(())
    }
}

/// Collect comments from the probe result and the format reader.
///
/// Container-level metadata found while probing comes first, then the reader's latest
/// revision (where Ogg keeps the Vorbis comment header).
pub(crate) fn collect(probed: &mut ProbedMetadata, format: &mut dyn FormatReader) -> Comments {
    let mut entries = Vec::new();

    if let Some(mut md) = probed.get() {
        if let Some(rev) = md.skip_to_latest() {
            push_revision(rev, &mut entries);
        }
    }

    let mut md = format.metadata();
    if let Some(rev) = md.skip_to_latest() {
        push_revision(rev, &mut entries);
    }

    Comments::new(entries)
}

fn push_revision(rev: &MetadataRevision, entries: &mut Vec<Comment>) {
    entries.extend(rev.tags().iter().map(|tag| Comment {
        key: tag.key.clone(),
        value: tag.value.to_string(),
    }));
}
