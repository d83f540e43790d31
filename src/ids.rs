use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{MaildexError, Result};

/// Number of bytes in the wire encoding of an [`IndexedId`].
pub const INDEXED_ID_LEN: usize = 28;

/// Sortable internal document identifier.
///
/// The byte encoding is the big-endian concatenation of the four fields, so
/// lexicographic byte order equals `(timestamp, sequence, hash)` order and a
/// forward scan over ids yields documents chronologically with deterministic
/// tie-breaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexedId {
    pub tsec: u64,
    pub tnsec: u32,
    pub seq: u64,
    pub hash: u64,
}

impl IndexedId {
    /// Largest possible id; used as the open upper bound of time ranges.
    pub const MAX: IndexedId = IndexedId {
        tsec: u64::MAX,
        tnsec: u32::MAX,
        seq: u64::MAX,
        hash: u64::MAX,
    };

    pub fn new(tsec: u64, tnsec: u32, seq: u64, hash: u64) -> Self {
        Self {
            tsec,
            tnsec,
            seq,
            hash,
        }
    }

    /// Id with the given timestamp and zeroed sequence/hash. Range
    /// endpoints are built this way: the result sorts before every real id
    /// carrying the same timestamp.
    pub fn from_timestamp(tsec: u64, tnsec: u32) -> Self {
        Self::new(tsec, tnsec, 0, 0)
    }

    pub fn timestamp(&self) -> (u64, u32) {
        (self.tsec, self.tnsec)
    }

    pub fn to_bytes(&self) -> [u8; INDEXED_ID_LEN] {
        let mut out = [0u8; INDEXED_ID_LEN];
        out[0..8].copy_from_slice(&self.tsec.to_be_bytes());
        out[8..12].copy_from_slice(&self.tnsec.to_be_bytes());
        out[12..20].copy_from_slice(&self.seq.to_be_bytes());
        out[20..28].copy_from_slice(&self.hash.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != INDEXED_ID_LEN {
            return Err(MaildexError::InvalidArgument(format!(
                "indexed id must be {} bytes, got {}",
                INDEXED_ID_LEN,
                bytes.len()
            )));
        }
        let mut tsec = [0u8; 8];
        let mut tnsec = [0u8; 4];
        let mut seq = [0u8; 8];
        let mut hash = [0u8; 8];
        tsec.copy_from_slice(&bytes[0..8]);
        tnsec.copy_from_slice(&bytes[8..12]);
        seq.copy_from_slice(&bytes[12..20]);
        hash.copy_from_slice(&bytes[20..28]);
        Ok(Self {
            tsec: u64::from_be_bytes(tsec),
            tnsec: u32::from_be_bytes(tnsec),
            seq: u64::from_be_bytes(seq),
            hash: u64::from_be_bytes(hash),
        })
    }

    /// The smallest id strictly greater than `self` (byte-wise +1 with
    /// carry). Saturates at [`IndexedId::MAX`].
    pub fn successor(&self) -> Self {
        let mut bytes = self.to_bytes();
        for b in bytes.iter_mut().rev() {
            let (v, carry) = b.overflowing_add(1);
            *b = v;
            if !carry {
                break;
            }
        }
        if bytes.iter().all(|&b| b == 0) {
            return IndexedId::MAX;
        }
        IndexedId::from_bytes(&bytes).unwrap_or(IndexedId::MAX)
    }

    /// Parse the printable form produced by `to_string`. Empty input is
    /// reported as `InvalidArgument`; callers treat absent cursors before
    /// parsing.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != INDEXED_ID_LEN * 2 {
            return Err(MaildexError::InvalidArgument(format!(
                "indexed id string must be {} hex digits, got {}",
                INDEXED_ID_LEN * 2,
                s.len()
            )));
        }
        let mut bytes = [0u8; INDEXED_ID_LEN];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk)
                .map_err(|_| MaildexError::InvalidArgument("indexed id is not hex".into()))?;
            bytes[i] = u8::from_str_radix(hex, 16)
                .map_err(|_| MaildexError::InvalidArgument("indexed id is not hex".into()))?;
        }
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for IndexedId {
    /// Fixed-width lowercase hex; sorts the same way as the byte encoding.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Deterministic hash of an external document id, the tie-break component
/// of [`IndexedId`].
pub fn external_id_hash(external_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    external_id.hash(&mut hasher);
    hasher.finish()
}

/// Current wall-clock time as `(seconds, nanoseconds)`.
pub fn wallclock() -> (u64, u32) {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs(), d.subsec_nanos()),
        Err(_) => (0, 0),
    }
}
