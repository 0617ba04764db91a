//! Append-only slot journal
//!
//! Every mutation of the pool is persisted as one batch of slot records.
//! A batch is the unit of atomicity: it is either fully present in the
//! file or treated as never written.
//!
//! # Format
//!
//! ```text
//! Journal:
//! [Batch 0: {0000→available, 0001→available, ...}] ← Bootstrap
//! [Batch 1: {4711→issued}]                         ← Claim
//! [Batch 2: {0042→issued, 0043→issued}]            ← Import
//! [Batch 3: {4711→available, 0042→available, ...}] ← Clear
//! ```
//!
//! Each batch is written as `[4-byte length][json data][4-byte checksum]`.
//! Recovery reads all batches sequentially, last write wins.
//! A final batch cut short by a crash is a transaction that never
//! committed and is truncated away. Damage anywhere else, including a
//! length prefix that points past the end of the file, is corruption.

use super::slot::Slot;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Upper bound on the encoded size of one batch
///
/// A full snapshot of 10,000 slots is well under 1 MiB.
pub const MAX_BATCH_BYTES: usize = 64 * 1024 * 1024;

/// A batch of slot updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalBatch {
    /// Batch sequence number (strictly increasing within a journal)
    pub sequence: u64,
    /// Timestamp (milliseconds since epoch)
    pub timestamp: i64,
    /// Slot records written by this batch
    pub slots: Vec<Slot>,
}

/// Why a record could not be decoded
#[derive(Debug)]
enum DecodeError {
    /// Fewer bytes than the record header promises
    Incomplete,
    /// Record is complete but its content is invalid
    Damaged(String),
}

impl JournalBatch {
    /// Create a new batch stamped with the current time
    pub fn new(sequence: u64, slots: Vec<Slot>) -> Self {
        Self {
            sequence,
            timestamp: chrono::Utc::now().timestamp_millis(),
            slots,
        }
    }

    /// Serialize to bytes with length prefix and checksum trailer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::Internal(format!("Failed to serialize batch: {}", e)))?;
        if json.len() > MAX_BATCH_BYTES {
            return Err(Error::Internal(format!(
                "Batch of {} bytes exceeds the {} byte limit",
                json.len(),
                MAX_BATCH_BYTES
            )));
        }

        let mut result = Vec::with_capacity(json.len() + 8);
        result.extend_from_slice(&(json.len() as u32).to_le_bytes());
        result.extend_from_slice(&json);
        result.extend_from_slice(&checksum(&json).to_le_bytes());

        Ok(result)
    }

    /// Deserialize a single record
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match Self::decode(bytes) {
            Ok((batch, _)) => Ok(batch),
            Err(DecodeError::Incomplete) => Err(Error::Corrupt("Incomplete batch".to_string())),
            Err(DecodeError::Damaged(reason)) => Err(Error::Corrupt(reason)),
        }
    }

    /// Decode the record at the start of `bytes`, returning it with its encoded length
    fn decode(bytes: &[u8]) -> std::result::Result<(Self, usize), DecodeError> {
        if bytes.len() < 4 {
            return Err(DecodeError::Incomplete);
        }

        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let record_len = len + 8;
        if bytes.len() < record_len {
            return Err(DecodeError::Incomplete);
        }

        let json = &bytes[4..4 + len];
        let stored = u32::from_le_bytes([
            bytes[4 + len],
            bytes[5 + len],
            bytes[6 + len],
            bytes[7 + len],
        ]);
        if stored != checksum(json) {
            return Err(DecodeError::Damaged("Checksum mismatch".to_string()));
        }

        let batch = serde_json::from_slice(json)
            .map_err(|e| DecodeError::Damaged(format!("Failed to deserialize batch: {}", e)))?;
        Ok((batch, record_len))
    }
}

fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Append-only journal file
pub struct Journal {
    path: PathBuf,
    file: File,
    /// Committed length of the file in bytes
    len: u64,
    next_sequence: u64,
    batches: u64,
    sync_writes: bool,
}

impl Journal {
    /// Open or create the journal and recover its committed batches
    ///
    /// A torn final record is truncated. Returns the journal positioned
    /// for appending, together with every committed batch in file order.
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> Result<(Self, Vec<JournalBatch>)> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| Error::StoreUnavailable(format!("Failed to open journal: {}", e)))?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| Error::StoreUnavailable(format!("Failed to read journal: {}", e)))?;

        let (batches, committed) = recover(&bytes)?;

        if committed < bytes.len() {
            warn!(
                path = ?path,
                discarded = bytes.len() - committed,
                "Discarding uncommitted journal tail"
            );
            file.set_len(committed as u64)
                .map_err(|e| Error::StoreUnavailable(format!("Failed to truncate journal: {}", e)))?;
            file.sync_all()
                .map_err(|e| Error::StoreUnavailable(format!("Failed to sync journal: {}", e)))?;
        }

        let next_sequence = batches.last().map(|b| b.sequence + 1).unwrap_or(0);
        info!(
            path = ?path,
            batches = batches.len(),
            next_sequence,
            "Journal recovery complete"
        );

        let journal = Self {
            path,
            file,
            len: committed as u64,
            next_sequence,
            batches: batches.len() as u64,
            sync_writes,
        };
        Ok((journal, batches))
    }

    /// Append one batch atomically
    ///
    /// On failure the file is cut back to its last committed length, so a
    /// failed append never leaves a partial record in front of later ones.
    pub fn append(&mut self, slots: Vec<Slot>) -> Result<u64> {
        let sequence = self.next_sequence;
        let batch = JournalBatch::new(sequence, slots);
        let bytes = batch.to_bytes()?;

        if let Err(e) = self.write_record(&bytes) {
            if let Err(trunc) = self.file.set_len(self.len) {
                warn!("Failed to roll back journal tail: {}", trunc);
            }
            return Err(e);
        }

        self.len += bytes.len() as u64;
        self.next_sequence += 1;
        self.batches += 1;

        debug!(sequence, entries = batch.slots.len(), "Wrote journal batch");
        Ok(sequence)
    }

    fn write_record(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .map_err(|e| Error::StoreUnavailable(format!("Failed to write batch: {}", e)))?;

        if self.sync_writes {
            self.file
                .sync_data()
                .map_err(|e| Error::StoreUnavailable(format!("Failed to sync journal: {}", e)))?;
        }
        Ok(())
    }

    /// Replace the whole journal with a single snapshot batch
    pub fn rewrite(&mut self, snapshot: Vec<Slot>) -> Result<()> {
        info!(path = ?self.path, batches = self.batches, "Compacting journal");

        let bytes = JournalBatch::new(0, snapshot).to_bytes()?;
        let temp_path = self.path.with_extension("journal.tmp");

        {
            let mut temp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| Error::StoreUnavailable(format!("Failed to create temp journal: {}", e)))?;
            temp.write_all(&bytes)
                .map_err(|e| Error::StoreUnavailable(format!("Failed to write compacted journal: {}", e)))?;
            temp.sync_all()
                .map_err(|e| Error::StoreUnavailable(format!("Failed to sync compacted journal: {}", e)))?;
        }

        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| Error::StoreUnavailable(format!("Failed to replace journal: {}", e)))?;
        sync_parent_dir(&self.path)?;

        self.file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::StoreUnavailable(format!("Failed to reopen journal: {}", e)))?;
        self.len = bytes.len() as u64;
        self.next_sequence = 1;
        self.batches = 1;

        info!(bytes = self.len, "Journal compaction complete");
        Ok(())
    }

    /// Committed size of the journal in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of committed batches
    pub fn batches(&self) -> u64 {
        self.batches
    }
}

/// Decode every committed record, returning them with the committed byte length
fn recover(bytes: &[u8]) -> Result<(Vec<JournalBatch>, usize)> {
    let mut batches: Vec<JournalBatch> = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        match JournalBatch::decode(&bytes[offset..]) {
            Ok((batch, used)) => {
                if let Some(prev) = batches.last() {
                    if batch.sequence <= prev.sequence {
                        return Err(Error::Corrupt(format!(
                            "Journal sequence went from {} to {} at offset {}",
                            prev.sequence, batch.sequence, offset
                        )));
                    }
                }
                batches.push(batch);
                offset += used;
            }
            Err(DecodeError::Incomplete) => {
                if is_torn_tail(&bytes[offset..]) {
                    break;
                }
                return Err(Error::Corrupt(format!(
                    "Journal batch at offset {} claims more bytes than the file holds",
                    offset
                )));
            }
            Err(DecodeError::Damaged(reason)) => {
                let len = u32::from_le_bytes([
                    bytes[offset],
                    bytes[offset + 1],
                    bytes[offset + 2],
                    bytes[offset + 3],
                ]) as usize;
                if offset + len + 8 == bytes.len() {
                    // Last record: the write never finished
                    break;
                }
                return Err(Error::Corrupt(format!(
                    "{} in journal batch at offset {}",
                    reason, offset
                )));
            }
        }
    }

    Ok((batches, offset))
}

/// Whether an incomplete record at the end of the file is an unfinished append
///
/// A crash mid-append leaves a prefix of one valid record. A header that
/// announces an implausible size, or a payload that already holds a whole
/// batch before the announced end, means the length prefix itself is damaged.
fn is_torn_tail(tail: &[u8]) -> bool {
    if tail.len() < 4 {
        return true;
    }

    let len = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) as usize;
    if len > MAX_BATCH_BYTES {
        return false;
    }

    let payload = &tail[4..tail.len().min(4 + len)];
    let mut stream = serde_json::Deserializer::from_slice(payload).into_iter::<JournalBatch>();
    match stream.next() {
        None => true,
        Some(Err(e)) => e.is_eof(),
        // Only the checksum trailer is missing
        Some(Ok(_)) => stream.byte_offset() == len,
    }
}

/// Make a rename inside the journal directory durable
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| Error::StoreUnavailable(format!("Failed to sync journal directory: {}", e)))
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}
