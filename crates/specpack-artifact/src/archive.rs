//! Deterministic zip encoding of packs
//!
//! Members are written in path order with one fixed modification time and
//! fixed permissions, so packs with the same logical content always encode to
//! the same bytes.

use crate::pack::{Pack, PackBuilder, PackError};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Compression used for archive members
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Deflate (default)
    #[default]
    Deflated,
    /// No compression
    Stored,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Self::Deflated => CompressionMethod::Deflated,
            Self::Stored => CompressionMethod::Stored,
        }
    }
}

/// Archive encoding options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Member compression
    pub compression: Compression,
}

impl ArchiveOptions {
    /// Options with the given compression
    #[inline]
    #[must_use]
    pub fn with_compression(compression: Compression) -> Self {
        Self { compression }
    }

    fn file_options(self) -> SimpleFileOptions {
        // DateTime::default() is 1980-01-01 00:00:00, the zip epoch
        SimpleFileOptions::default()
            .compression_method(self.compression.method())
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
    }
}

/// Encode a pack with default options
///
/// # Errors
/// Returns error if the zip writer fails (in-memory, so only on internal
/// zip errors)
pub fn serialize_pack(pack: &Pack) -> Result<Vec<u8>, ArchiveError> {
    serialize_pack_with(pack, ArchiveOptions::default())
}

/// Encode a pack
///
/// # Errors
/// Returns error if the zip writer fails
pub fn serialize_pack_with(pack: &Pack, options: ArchiveOptions) -> Result<Vec<u8>, ArchiveError> {
    let file_options = options.file_options();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    // Pack members are already in path order
    for file in pack.files() {
        writer.start_file(file.path().as_str(), file_options)?;
        writer.write_all(file.bytes())?;
    }

    let cursor = writer.finish()?;
    let bytes = cursor.into_inner();
    tracing::debug!(members = pack.len(), bytes = bytes.len(), "serialized pack");
    Ok(bytes)
}

/// Decode a pack from archive bytes
///
/// Directory members are skipped. Every file member must have a valid,
/// unique pack path.
///
/// # Errors
/// - [`ParseError::InvalidArchive`] for corrupt archives, invalid or
///   duplicate member names
/// - [`ParseError::EmptyArchive`] when no file members remain
pub fn parse_pack(bytes: &[u8]) -> Result<Pack, ParseError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ParseError::invalid(e.to_string()))?;

    let mut builder = PackBuilder::new();
    let mut members = 0usize;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ParseError::invalid(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let mut content = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut content)
            .map_err(|e| ParseError::invalid(format!("reading '{name}': {e}")))?;

        builder.insert_bytes(&name, content).map_err(|e| match e {
            PackError::DuplicatePath(path) => {
                ParseError::invalid(format!("duplicate member '{path}'"))
            }
            other => ParseError::invalid(format!("member '{name}': {other}")),
        })?;
        members += 1;
    }

    if members == 0 {
        return Err(ParseError::EmptyArchive);
    }

    tracing::debug!(members, "parsed pack");
    Ok(builder.build())
}

/// Errors decoding an archive into a pack
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Not a readable archive, or a member violates pack rules
    #[error("invalid archive: {reason}")]
    InvalidArchive {
        /// What went wrong
        reason: String,
    },

    /// Archive has no file members
    #[error("archive contains no files")]
    EmptyArchive,
}

impl ParseError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArchive {
            reason: reason.into(),
        }
    }

    /// Machine-readable error code
    #[inline]
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArchive { .. } => "INVALID_ARCHIVE",
            Self::EmptyArchive => "EMPTY_ARCHIVE",
        }
    }
}

/// Errors encoding a pack
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Zip writer failure
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Write failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
