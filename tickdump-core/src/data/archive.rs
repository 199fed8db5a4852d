//! On-disk archive store.
//!
//! Layout: `{root}/{day}/{symbol}-{day}.msgpack.lz4`
//!
//! Each file is an LZ4 frame wrapping one MessagePack array of event maps.
//! Writes go to a `.tmp` sibling that is removed on any failure and renamed
//! into place only after the compressor and the file are flushed and synced,
//! so a final path never holds a truncated archive.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{SymbolArchive, UnifiedEvent};

pub const ARCHIVE_EXTENSION: &str = "msgpack.lz4";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive stream error: {0}")]
    Stream(#[from] io::Error),

    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("compression failed: {0}")]
    Compression(#[from] lz4_flex::frame::Error),

    #[error("{} is not an archive name (expected SYMBOL-YYYY-MM-DD.msgpack.lz4)", .0.display())]
    BadName(PathBuf),

    #[error("events in {} are out of timestamp order", .0.display())]
    NotChronological(PathBuf),
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What a successful write produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub events: usize,
    /// Compressed size on disk.
    pub bytes: u64,
    /// BLAKE3 of the compressed file, hex.
    pub checksum: String,
}

/// Root of the output tree.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{root}/{day}`
    pub fn day_dir(&self, day: NaiveDate) -> PathBuf {
        self.root.join(day.format("%Y-%m-%d").to_string())
    }

    /// `{root}/{day}/{symbol}-{day}.msgpack.lz4`
    pub fn archive_path(&self, symbol: &str, day: NaiveDate) -> PathBuf {
        self.day_dir(day).join(archive_file_name(symbol, day))
    }

    /// Create the day directory if needed.
    pub fn ensure_day_dir(&self, day: NaiveDate) -> Result<PathBuf, ArchiveError> {
        let dir = self.day_dir(day);
        fs::create_dir_all(&dir).map_err(io_at(&dir))?;
        Ok(dir)
    }

    /// Encode, compress and atomically place one symbol's archive.
    pub fn write(&self, archive: &SymbolArchive) -> Result<ArchiveInfo, ArchiveError> {
        self.ensure_day_dir(archive.day())?;
        let path = self.archive_path(archive.symbol(), archive.day());
        let tmp_path = path.with_extension("lz4.tmp");

        let pending = PendingFile::new(&tmp_path);
        let file = File::create(&tmp_path).map_err(io_at(&tmp_path))?;
        let (file, digest) = write_events(file, archive.events())?;
        file.sync_all().map_err(io_at(&tmp_path))?;
        drop(file);

        fs::rename(&tmp_path, &path).map_err(io_at(&path))?;
        pending.disarm();

        Ok(ArchiveInfo {
            path,
            events: archive.len(),
            bytes: digest.bytes,
            checksum: digest.checksum,
        })
    }

    /// Load the archive for (symbol, day).
    pub fn load(&self, symbol: &str, day: NaiveDate) -> Result<SymbolArchive, ArchiveError> {
        let path = self.archive_path(symbol, day);
        let events = read_events_from(&path)?;
        SymbolArchive::from_sorted(symbol, day, events).ok_or(ArchiveError::NotChronological(path))
    }

    /// Archive files present for a day, sorted by file name.
    pub fn list_day(&self, day: NaiveDate) -> Result<Vec<PathBuf>, ArchiveError> {
        let dir = self.day_dir(day);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_at(&dir)(e)),
        };

        let suffix = format!(".{ARCHIVE_EXTENSION}");
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_at(&dir))?.path();
            let is_archive = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(&suffix));
            if is_archive {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Read an archive by path, taking symbol and day from its file name.
pub fn read_archive(path: &Path) -> Result<SymbolArchive, ArchiveError> {
    let (symbol, day) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_archive_name)
        .ok_or_else(|| ArchiveError::BadName(path.to_path_buf()))?;
    let events = read_events_from(path)?;
    SymbolArchive::from_sorted(symbol, day, events)
        .ok_or_else(|| ArchiveError::NotChronological(path.to_path_buf()))
}

fn read_events_from(path: &Path) -> Result<Vec<UnifiedEvent>, ArchiveError> {
    let file = File::open(path).map_err(io_at(path))?;
    read_events(BufReader::new(file))
}

/// `{symbol}-{day}.msgpack.lz4`, with path separators in the symbol replaced.
pub fn archive_file_name(symbol: &str, day: NaiveDate) -> String {
    let symbol: String = symbol
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{symbol}-{}.{ARCHIVE_EXTENSION}", day.format("%Y-%m-%d"))
}

/// Inverse of [`archive_file_name`].
pub fn parse_archive_name(file_name: &str) -> Option<(String, NaiveDate)> {
    let stem = file_name.strip_suffix(&format!(".{ARCHIVE_EXTENSION}"))?;
    // The day is always the trailing 10 characters; symbols may contain '-'.
    let split = stem.len().checked_sub(11)?;
    if !stem.is_char_boundary(split) || stem.as_bytes()[split] != b'-' || split == 0 {
        return None;
    }
    let day = NaiveDate::parse_from_str(&stem[split + 1..], "%Y-%m-%d").ok()?;
    Some((stem[..split].to_string(), day))
}

// ── Stream codec ────────────────────────────────────────────────────

/// Size and BLAKE3 of the compressed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDigest {
    pub bytes: u64,
    pub checksum: String,
}

/// Encode `events` as named MessagePack inside an LZ4 frame.
///
/// Returns the writer once the frame is finished, with the digest of what was
/// written to it.
pub fn write_events<W: Write>(
    writer: W,
    events: &[UnifiedEvent],
) -> Result<(W, StreamDigest), ArchiveError> {
    let mut encoder = FrameEncoder::new(DigestWriter::new(writer));
    rmp_serde::encode::write_named(&mut encoder, events)?;
    let mut digest_writer = encoder.finish()?;
    digest_writer.flush()?;
    Ok(digest_writer.into_parts())
}

/// Decompress and decode a stream written by [`write_events`].
pub fn read_events<R: Read>(reader: R) -> Result<Vec<UnifiedEvent>, ArchiveError> {
    Ok(rmp_serde::decode::from_read(FrameDecoder::new(reader))?)
}

struct DigestWriter<W> {
    inner: W,
    hasher: blake3::Hasher,
    bytes: u64,
}

impl<W: Write> DigestWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            bytes: 0,
        }
    }

    fn into_parts(self) -> (W, StreamDigest) {
        let digest = StreamDigest {
            bytes: self.bytes,
            checksum: self.hasher.finalize().to_hex().to_string(),
        };
        (self.inner, digest)
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Removes a temporary file on drop unless disarmed.
struct PendingFile<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> PendingFile<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingFile<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(self.path);
        }
    }
}
