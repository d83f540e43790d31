//! Self-describing binary records and cell framing.
//!
//! Every persisted record starts with a kind tag and a version tag, then a
//! bincode body (little-endian, fixed-width integers, independent of the
//! platform word size). Decoders accept every version a kind has ever been
//! written with and surface anything else as `Corruption` carrying the key.
//!
//! Stored cells are sequences of length-prefixed frames. A put writes one
//! frame; a merge appends an operand frame without decoding the cell. Reads
//! collapse multi-frame cells through the merge operator.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{MaildexError, Result};
use crate::ids::IndexedId;

/// Record kind tag, the first byte of every record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Posting = 1,
    PostingList = 2,
    ShardSet = 3,
    Document = 4,
    IndexedId = 5,
    Metadata = 6,
}

impl RecordKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(RecordKind::Posting),
            2 => Some(RecordKind::PostingList),
            3 => Some(RecordKind::ShardSet),
            4 => Some(RecordKind::Document),
            5 => Some(RecordKind::IndexedId),
            6 => Some(RecordKind::Metadata),
            _ => None,
        }
    }
}

/// Current (and so far only) schema version of every record kind.
pub const RECORD_VERSION: u8 = 1;

const RECORD_HEADER: usize = 2;
const FRAME_HEADER: usize = 4;

/// One posting: a single indexed id appended to a token's posting list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRecord {
    pub id: IndexedId,
}

/// A token shard's full posting list, sorted unique.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingListRecord {
    pub ids: Vec<IndexedId>,
}

/// The set of shard indices a token has postings in, sorted unique.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSetRecord {
    pub shards: Vec<u64>,
}

/// The store-wide metadata singleton.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub seq: u64,
}

/// Encode one record: kind tag, version tag, bincode body.
pub fn encode_record<T: Serialize>(kind: RecordKind, value: &T) -> Result<Vec<u8>> {
    let body = bincode::serialize(value)?;
    let mut out = Vec::with_capacity(RECORD_HEADER + body.len());
    out.push(kind as u8);
    out.push(RECORD_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Kind and version tags of a record, without decoding the body.
pub fn peek_kind(record: &[u8]) -> Option<(RecordKind, u8)> {
    if record.len() < RECORD_HEADER {
        return None;
    }
    RecordKind::from_tag(record[0]).map(|k| (k, record[1]))
}

/// Decode one record of the expected kind. Any mismatch or decode failure
/// is a `Corruption` carrying the offending key.
pub fn decode_record<T: DeserializeOwned>(key: &[u8], kind: RecordKind, record: &[u8]) -> Result<T> {
    if record.len() < RECORD_HEADER {
        return Err(MaildexError::corruption(key, "record shorter than header"));
    }
    match RecordKind::from_tag(record[0]) {
        Some(k) if k == kind => {}
        Some(k) => {
            return Err(MaildexError::corruption(
                key,
                format!("expected record kind {:?}, found {:?}", kind, k),
            ))
        }
        None => {
            return Err(MaildexError::corruption(
                key,
                format!("unknown record kind tag {}", record[0]),
            ))
        }
    }
    if record[1] != RECORD_VERSION {
        return Err(MaildexError::corruption(
            key,
            format!("unknown {:?} record version {}", kind, record[1]),
        ));
    }
    bincode::deserialize(&record[RECORD_HEADER..])
        .map_err(|e| MaildexError::corruption(key, e.to_string()))
}

/// Append one record to a cell as a length-prefixed frame.
pub fn push_frame(cell: &mut Vec<u8>, record: &[u8]) {
    cell.extend_from_slice(&(record.len() as u32).to_le_bytes());
    cell.extend_from_slice(record);
}

/// A cell holding exactly one frame.
pub fn single_frame(record: &[u8]) -> Vec<u8> {
    let mut cell = Vec::with_capacity(FRAME_HEADER + record.len());
    push_frame(&mut cell, record);
    cell
}

/// Split a cell into its record frames. Truncated framing is `Corruption`.
pub fn split_frames<'a>(key: &[u8], cell: &'a [u8]) -> Result<Vec<&'a [u8]>> {
    let mut frames = Vec::new();
    let mut pos = 0;
    while pos < cell.len() {
        if pos + FRAME_HEADER > cell.len() {
            return Err(MaildexError::corruption(key, "truncated frame header"));
        }
        let mut len = [0u8; FRAME_HEADER];
        len.copy_from_slice(&cell[pos..pos + FRAME_HEADER]);
        let len = u32::from_le_bytes(len) as usize;
        pos += FRAME_HEADER;
        if pos + len > cell.len() {
            return Err(MaildexError::corruption(key, "truncated frame body"));
        }
        frames.push(&cell[pos..pos + len]);
        pos += len;
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let record = encode_record(
            RecordKind::ShardSet,
            &ShardSetRecord {
                shards: vec![0, 1, 7],
            },
        )
        .unwrap();
        assert_eq!(peek_kind(&record), Some((RecordKind::ShardSet, 1)));

        let decoded: ShardSetRecord =
            decode_record(b"token_shards.m.content.fox", RecordKind::ShardSet, &record).unwrap();
        assert_eq!(decoded.shards, vec![0, 1, 7]);
    }

    #[test]
    fn test_decode_wrong_kind_is_corruption() {
        let record = encode_record(RecordKind::Metadata, &MetadataRecord { seq: 9 }).unwrap();
        let err = decode_record::<ShardSetRecord>(b"k", RecordKind::ShardSet, &record).unwrap_err();
        assert!(matches!(err, MaildexError::Corruption { .. }));
    }

    #[test]
    fn test_decode_unknown_version_is_corruption() {
        let mut record =
            encode_record(RecordKind::Posting, &PostingRecord { id: IndexedId::default() }).unwrap();
        record[1] = 9;
        let err = decode_record::<PostingRecord>(b"k", RecordKind::Posting, &record).unwrap_err();
        assert!(matches!(err, MaildexError::Corruption { .. }));
    }

    #[test]
    fn test_frames_roundtrip() {
        let mut cell = single_frame(b"first");
        push_frame(&mut cell, b"second");
        push_frame(&mut cell, b"");

        let frames = split_frames(b"k", &cell).unwrap();
        assert_eq!(frames, vec![&b"first"[..], &b"second"[..], &b""[..]]);
    }

    #[test]
    fn test_truncated_frame_is_corruption() {
        let cell = single_frame(b"payload");
        let err = split_frames(b"k", &cell[..cell.len() - 2]).unwrap_err();
        assert!(matches!(err, MaildexError::Corruption { .. }));
    }
}
