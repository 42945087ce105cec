//! Append-only, memory-mapped event journal (§6, §10.5), for persisting
//! the exact event stream a run produced so it can be replayed later.
//!
//! Grounded on the teacher crate's `sequencer/file_journal.rs`: a
//! length-prefixed, CRC32-checked binary entry format written into a
//! pre-allocated `memmap2::MmapMut`. Scoped down from the teacher's
//! multi-segment design to a single growable file — this crate's
//! journal only needs to support one continuous replayable run, not
//! multi-gigabyte segment rotation/archiving (see DESIGN.md).
//!
//! # On-disk entry format (little-endian)
//!
//! ```text
//! [4 bytes: entry_length][N bytes: bincode(Event)][4 bytes: CRC32]
//! ```
//!
//! `entry_length` is `N + 4` (payload plus its CRC). The CRC covers the
//! payload only.

use crate::event::{Event, EventSink};
use memmap2::{Mmap, MmapMut};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const ENTRY_LEN_PREFIX: usize = 4;
const ENTRY_CRC_SIZE: usize = 4;
const DEFAULT_CAPACITY: u64 = 16 * 1024 * 1024;

/// Errors from journal I/O, encoding, or integrity verification.
#[derive(Debug, Error)]
pub enum JournalError {
    /// A filesystem operation failed.
    #[error("journal I/O error at {path}: {message}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// Underlying OS error text.
        message: String,
    },
    /// `bincode` failed to encode or decode an entry.
    #[error("journal serialization error: {0}")]
    Serialization(String),
    /// A stored CRC32 didn't match the recomputed one — the file was
    /// truncated or corrupted on disk.
    #[error("corrupt journal entry at byte offset {offset}: expected CRC {expected:08x}, got {actual:08x}")]
    CorruptEntry {
        /// Byte offset of the entry header.
        offset: usize,
        /// CRC32 stored in the entry.
        expected: u32,
        /// CRC32 recomputed from the entry's bytes.
        actual: u32,
    },
}

struct Writer {
    mmap: MmapMut,
    write_pos: usize,
    capacity: usize,
}

/// A single growable, memory-mapped append-only event log.
pub struct Journal {
    path: PathBuf,
    writer: Mutex<Writer>,
}

fn io_err(path: &Path, err: std::io::Error) -> JournalError {
    JournalError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn encode_entry(event: &Event) -> Result<Vec<u8>, JournalError> {
    let payload = bincode::serde::encode_to_vec(event, bincode::config::standard())
        .map_err(|e| JournalError::Serialization(e.to_string()))?;
    let crc = crc32fast::hash(&payload);
    let entry_length = (payload.len() + ENTRY_CRC_SIZE) as u32;

    let mut buf = Vec::with_capacity(ENTRY_LEN_PREFIX + payload.len() + ENTRY_CRC_SIZE);
    buf.extend_from_slice(&entry_length.to_le_bytes());
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Decodes one entry at `offset`. Returns `None` at end-of-data
/// (a zero or truncated length prefix — the unwritten tail of the
/// pre-allocated file).
fn decode_entry_at(data: &[u8], offset: usize) -> Option<Result<(Event, usize), JournalError>> {
    let header = data.get(offset..offset + ENTRY_LEN_PREFIX)?;
    let entry_length = u32::from_le_bytes(header.try_into().ok()?) as usize;
    if entry_length == 0 || entry_length < ENTRY_CRC_SIZE {
        return None;
    }
    let entry_end = offset.checked_add(ENTRY_LEN_PREFIX)?.checked_add(entry_length)?;
    let body = data.get(offset + ENTRY_LEN_PREFIX..entry_end)?;
    let (payload, crc_bytes) = body.split_at(body.len() - ENTRY_CRC_SIZE);
    let stored_crc = u32::from_le_bytes(crc_bytes.try_into().ok()?);
    let actual_crc = crc32fast::hash(payload);
    if stored_crc != actual_crc {
        return Some(Err(JournalError::CorruptEntry {
            offset,
            expected: stored_crc,
            actual: actual_crc,
        }));
    }
    match bincode::serde::decode_from_slice::<Event, _>(payload, bincode::config::standard()) {
        Ok((event, _)) => Some(Ok((event, entry_end))),
        Err(e) => Some(Err(JournalError::Serialization(e.to_string()))),
    }
}

fn scan_write_position(data: &[u8]) -> usize {
    let mut offset = 0usize;
    while let Some(result) = decode_entry_at(data, offset) {
        match result {
            Ok((_, next)) => offset = next,
            Err(_) => break,
        }
    }
    offset
}

impl Journal {
    /// Opens or creates a journal file at `path`, pre-allocating
    /// [`DEFAULT_CAPACITY`] bytes if it doesn't already exist. Resumes
    /// appending after the last valid entry if the file already exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, JournalError> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    /// Like [`Journal::open`], with an explicit initial capacity.
    pub fn open_with_capacity<P: AsRef<Path>>(path: P, capacity: u64) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        let existing_len = file.metadata().map_err(|e| io_err(&path, e))?.len();
        if existing_len == 0 {
            file.set_len(capacity).map_err(|e| io_err(&path, e))?;
        }
        let capacity = file.metadata().map_err(|e| io_err(&path, e))?.len() as usize;
        // SAFETY: this process owns `file` exclusively for the journal's lifetime.
        let mmap = unsafe { MmapMut::map_mut(&file).map_err(|e| io_err(&path, e))? };
        let write_pos = scan_write_position(&mmap);

        Ok(Self {
            path,
            writer: Mutex::new(Writer {
                mmap,
                write_pos,
                capacity,
            }),
        })
    }

    /// Appends one event, growing the backing file if it doesn't fit.
    pub fn append(&self, event: &Event) -> Result<(), JournalError> {
        let entry = encode_entry(event)?;
        let mut writer = self.writer.lock().unwrap();
        if writer.write_pos + entry.len() > writer.capacity {
            self.grow(&mut writer, entry.len())?;
        }
        let start = writer.write_pos;
        let end = start + entry.len();
        writer.mmap[start..end].copy_from_slice(&entry);
        writer
            .mmap
            .flush_range(start, entry.len())
            .map_err(|e| io_err(&self.path, e))?;
        writer.write_pos = end;
        Ok(())
    }

    fn grow(&self, writer: &mut Writer, at_least: usize) -> Result<(), JournalError> {
        writer.mmap.flush().map_err(|e| io_err(&self.path, e))?;
        let new_capacity = ((writer.capacity.max(1) * 2).max(writer.write_pos + at_least)) as u64;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        file.set_len(new_capacity).map_err(|e| io_err(&self.path, e))?;
        // SAFETY: same single-writer file as at construction time.
        let new_mmap = unsafe { MmapMut::map_mut(&file).map_err(|e| io_err(&self.path, e))? };
        writer.mmap = new_mmap;
        writer.capacity = new_capacity as usize;
        Ok(())
    }

    /// Reads every valid entry currently in the file, in order.
    pub fn read_all(&self) -> Result<Vec<Event>, JournalError> {
        let file = File::open(&self.path).map_err(|e| io_err(&self.path, e))?;
        // SAFETY: read-only mapping of a file this process also writes,
        // single-writer; concurrent readers only ever observe a prefix
        // of fully-flushed entries.
        let mmap = unsafe { Mmap::map(&file).map_err(|e| io_err(&self.path, e))? };
        let mut events = Vec::new();
        let mut offset = 0usize;
        while let Some(result) = decode_entry_at(&mmap, offset) {
            let (event, next) = result?;
            events.push(event);
            offset = next;
        }
        Ok(events)
    }

    /// Verifies every entry's CRC without deserializing payloads,
    /// returning the first corruption found.
    pub fn verify_integrity(&self) -> Result<(), JournalError> {
        self.read_all().map(|_| ())
    }
}

impl EventSink for Journal {
    fn deliver(&self, event: Event) {
        if let Err(err) = self.append(&event) {
            tracing::error!(?err, "journal append failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderId;

    fn sample_event(seq: u64) -> Event {
        Event {
            event_seq: seq,
            symbol: "X".into(),
            ts: 1000 + seq,
            kind: crate::event::EventKind::Accepted {
                order_id: OrderId(seq),
            },
        }
    }

    #[test]
    fn append_and_read_back_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.journal");
        let journal = Journal::open(&path).unwrap();
        for seq in 1..=5 {
            journal.append(&sample_event(seq)).unwrap();
        }
        let events = journal.read_all().unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].event_seq, 1);
        assert_eq!(events[4].event_seq, 5);
    }

    #[test]
    fn reopening_resumes_after_last_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.journal");
        {
            let journal = Journal::open(&path).unwrap();
            for seq in 1..=3 {
                journal.append(&sample_event(seq)).unwrap();
            }
        }
        let journal = Journal::open(&path).unwrap();
        journal.append(&sample_event(4)).unwrap();
        let events = journal.read_all().unwrap();
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.journal");
        let journal = Journal::open_with_capacity(&path, 64).unwrap();
        for seq in 1..=50 {
            journal.append(&sample_event(seq)).unwrap();
        }
        let events = journal.read_all().unwrap();
        assert_eq!(events.len(), 50);
    }

    #[test]
    fn corrupted_entry_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.journal");
        {
            let journal = Journal::open(&path).unwrap();
            journal.append(&sample_event(1)).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[6] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let journal = Journal::open(&path).unwrap();
        assert!(journal.verify_integrity().is_err());
    }
}
