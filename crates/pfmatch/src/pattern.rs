//! Pattern ingestion and deduplication
//!
//! Patterns accumulate in an open-chained hash keyed by a cheap byte hash,
//! used only to find an existing entry with the same id cheaply. At build
//! time the set is frozen into a flat array (bucket-major, insertion order
//! within a bucket) and the hash is discarded.

use crate::error::{PfmatchError, Result};
use tracing::warn;

/// Bucket count of the insertion-time dedup hash.
const INIT_HASH_SIZE: usize = 65_536;

/// Longest accepted pattern.
pub(crate) const MAX_PATTERN_LEN: usize = u16::MAX as usize;

/// Largest accepted pattern id; the scan-time output encoding keeps ids in
/// 16 bits.
pub(crate) const MAX_PATTERN_ID: u32 = u16::MAX as u32;

/// Flags accepted by the add-pattern calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternFlags(u8);

impl PatternFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Match without regard to ASCII case.
    pub const NOCASE: Self = Self(1 << 0);

    /// True when every flag in `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PatternFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A stored pattern: the bytes as supplied plus the case-folded view the
/// trie is built from.
#[derive(Debug)]
pub(crate) struct Pattern {
    pub(crate) id: u32,
    pub(crate) flags: PatternFlags,
    pub(crate) original: Box<[u8]>,
    pub(crate) folded: Box<[u8]>,
}

impl Pattern {
    /// True when a match must be re-checked against the original bytes.
    pub(crate) fn needs_verify(&self) -> bool {
        !self.flags.contains(PatternFlags::NOCASE)
    }
}

/// The mutable pattern set a builder accumulates into.
pub(crate) struct PatternSet {
    buckets: Vec<Vec<Pattern>>,
    pub(crate) pattern_cnt: u32,
    pub(crate) min_len: u16,
    pub(crate) max_len: u16,
    pub(crate) max_id: u32,
}

impl PatternSet {
    pub(crate) fn new() -> Self {
        Self {
            buckets: (0..INIT_HASH_SIZE).map(|_| Vec::new()).collect(),
            pattern_cnt: 0,
            min_len: 0,
            max_len: 0,
            max_id: 0,
        }
    }

    fn bucket_of(pat: &[u8]) -> usize {
        let mut hash = pat.len() as u32 * u32::from(pat[0]);
        if pat.len() > 1 {
            hash += u32::from(pat[1]);
        }
        hash as usize % INIT_HASH_SIZE
    }

    /// Store a pattern unless one with the same id already sits in its
    /// bucket. Zero-length patterns are ignored. Returns whether a pattern
    /// was stored.
    pub(crate) fn add(&mut self, pat: &[u8], id: u32, flags: PatternFlags) -> Result<bool> {
        if pat.is_empty() {
            warn!(id, "ignoring zero-length pattern");
            return Ok(false);
        }
        if pat.len() > MAX_PATTERN_LEN {
            return Err(PfmatchError::PatternTooLong {
                len: pat.len(),
                max: MAX_PATTERN_LEN,
            });
        }
        if id > MAX_PATTERN_ID {
            return Err(PfmatchError::PatternIdTooLarge {
                id,
                max: MAX_PATTERN_ID,
            });
        }

        let bucket = Self::bucket_of(pat);
        if self.buckets[bucket].iter().any(|p| p.id == id) {
            return Ok(false);
        }

        let folded = pat.to_ascii_lowercase();
        self.buckets[bucket].push(Pattern {
            id,
            flags,
            original: pat.into(),
            folded: folded.into(),
        });

        self.pattern_cnt += 1;
        let len = pat.len() as u16;
        if self.max_len < len {
            self.max_len = len;
        }
        if self.min_len == 0 || self.min_len > len {
            self.min_len = len;
        }
        if id > self.max_id {
            self.max_id = id;
        }
        Ok(true)
    }

    /// Freeze the set into a flat array and discard the hash.
    pub(crate) fn freeze(self) -> Vec<Pattern> {
        let mut patterns = Vec::with_capacity(self.pattern_cnt as usize);
        for bucket in self.buckets {
            patterns.extend(bucket);
        }
        patterns
    }
}

/// Build the scan-time pattern list, indexed by id: the exact bytes a
/// case-sensitive match is verified against. Patterns added nocase need no
/// verification and get no entry.
pub(crate) fn build_pattern_list(patterns: &[Pattern], max_id: u32) -> Box<[Option<Box<[u8]>>]> {
    let mut list: Vec<Option<Box<[u8]>>> = vec![None; max_id as usize + 1];
    for p in patterns {
        if p.needs_verify() {
            list[p.id as usize] = Some(p.original.clone());
        }
    }
    list.into_boxed_slice()
}
