//! Index journal format.
//!
//! ```text
//! header:  "AIXJ" | version: u16 BE
//! record:  len: u32 BE | crc32: u32 BE | CBOR payload (len bytes)
//! ```
//!
//! A record whose frame extends past the end of the journal is a torn write
//! and marks the end of the valid prefix. A complete record with a checksum
//! mismatch or an undecodable payload is corruption.

use crate::index::entry::IndexEntry;
use artindex_storage::{StorageBackend, StorageError, StorageResult};
use serde::{Deserialize, Serialize};

/// Magic bytes at the start of every journal.
pub const JOURNAL_MAGIC: [u8; 4] = *b"AIXJ";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Size of the journal header.
pub const HEADER_SIZE: usize = 6;

/// Size of a record frame header (length + CRC).
const FRAME_HEADER_SIZE: usize = 8;

/// Upper bound for a single record payload.
const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// One journaled mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    /// Insert or replace the entry at its relative path.
    Upsert(IndexEntry),
    /// Remove the entry at `relative_path`.
    Remove {
        /// Path of the removed entry.
        relative_path: String,
    },
    /// Remove every entry.
    Clear,
}

/// The decoded content of a journal.
#[derive(Debug, Default)]
pub struct Replay {
    /// Records of the valid prefix, in write order.
    pub records: Vec<JournalRecord>,
    /// Length of the valid prefix in bytes.
    pub valid_len: u64,
    /// Whether bytes after the valid prefix had to be discarded.
    pub torn: bool,
}

/// Returns the journal header bytes.
#[must_use]
pub fn header() -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.extend_from_slice(&JOURNAL_MAGIC);
    buf.extend_from_slice(&JOURNAL_VERSION.to_be_bytes());
    buf
}

/// Encodes one framed record.
///
/// # Errors
///
/// Returns `Corrupted` if the record cannot be encoded or exceeds the
/// record size limit.
pub fn encode(record: &JournalRecord) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::ser::into_writer(record, &mut payload)
        .map_err(|e| StorageError::Corrupted(format!("cannot encode journal record: {e}")))?;

    if payload.len() > MAX_RECORD_SIZE {
        return Err(StorageError::Corrupted(format!(
            "journal record of {} bytes exceeds limit",
            payload.len()
        )));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&compute_crc32(&payload).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Reads every record of the journal held by `backend`.
///
/// An empty backend replays as an empty journal with `valid_len == 0`.
///
/// # Errors
///
/// Returns `Corrupted` for a bad header, a checksum mismatch or an
/// undecodable record, and `Io` if the backend cannot be read.
pub fn replay(backend: &dyn StorageBackend) -> StorageResult<Replay> {
    let size = backend.size()?;
    if size == 0 {
        return Ok(Replay::default());
    }
    let len = usize::try_from(size)
        .map_err(|_| StorageError::Corrupted(format!("journal of {size} bytes is too large")))?;
    let data = backend.read_at(0, len)?;

    if data.len() < HEADER_SIZE {
        // The header itself was torn.
        return Ok(Replay {
            torn: true,
            ..Replay::default()
        });
    }
    if data[..4] != JOURNAL_MAGIC {
        return Err(StorageError::Corrupted("bad journal magic".into()));
    }
    let version = u16::from_be_bytes([data[4], data[5]]);
    if version != JOURNAL_VERSION {
        return Err(StorageError::Corrupted(format!(
            "unsupported journal version {version}"
        )));
    }

    let mut records = Vec::new();
    let mut offset = HEADER_SIZE;

    while offset < data.len() {
        let Some(frame) = data.get(offset..offset + FRAME_HEADER_SIZE) else {
            break;
        };
        let payload_len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        let crc = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]);
        if payload_len > MAX_RECORD_SIZE {
            return Err(StorageError::Corrupted(format!(
                "record at offset {offset} claims {payload_len} bytes"
            )));
        }

        let start = offset + FRAME_HEADER_SIZE;
        let Some(payload) = data.get(start..start + payload_len) else {
            break;
        };
        if compute_crc32(payload) != crc {
            return Err(StorageError::Corrupted(format!(
                "checksum mismatch in record at offset {offset}"
            )));
        }
        let record: JournalRecord = ciborium::de::from_reader(payload).map_err(|e| {
            StorageError::Corrupted(format!("undecodable record at offset {offset}: {e}"))
        })?;

        records.push(record);
        offset = start + payload_len;
    }

    Ok(Replay {
        records,
        valid_len: offset as u64,
        torn: offset < data.len(),
    })
}

/// Computes the IEEE CRC32 of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}
