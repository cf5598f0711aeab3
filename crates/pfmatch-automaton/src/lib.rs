//! Aho-Corasick automaton construction for pfmatch
//!
//! This crate builds the state machine behind the pfmatch scan kernel. It
//! takes a frozen set of case-folded patterns and compiles them into a dense
//! delta table: one row of 256 cells per state, with the "this transition
//! reaches an output state" flag packed into the cell itself so the scan
//! loop never touches a second table on the non-matching path.
//!
//! # Design
//!
//! Construction runs in three passes over a temporary goto table:
//!
//! 1. **Trie insertion** — each pattern is walked byte-by-byte down the
//!    trie, allocating a suffix chain of fresh states where it diverges.
//!    Before insertion, a first-level state is pre-allocated for every byte
//!    value that starts at least one pattern, so the root row is dense for
//!    all live prefixes.
//! 2. **Failure links** — a breadth-first pass computes the classical
//!    failure function. The compiled table does not consume it (see below),
//!    but it is built and checked so a broken trie cannot survive to the
//!    frozen tables.
//! 3. **Delta compilation** — the goto table is folded into the final
//!    packed table. Cells with no goto transition collapse to the root
//!    instead of chasing failure links: the scan kernel compensates by
//!    restarting the automaton at every input offset, which keeps the inner
//!    loop at a single table load per byte.
//!
//! Two cell widths exist. Below [`NARROW_STATE_LIMIT`] states the table is
//! `u16` per cell (bit 15 = output flag, bits 0..=14 = next state);
//! otherwise `u32` per cell (bit 24 = output flag, bits 0..=23 = next
//! state, bits 25..=31 zero). Encoded output ids carry the pattern id in
//! the low 16 bits and the "case-sensitive verify required" marker in bit
//! 16.

use std::collections::VecDeque;
use std::fmt;

pub mod validation;

pub use validation::{validate_reachability, validate_structure, AutomatonStats, ValidationResult};

/// Sentinel for "no transition" in the goto table during construction.
const NO_TRANSITION: i32 = -1;

/// State counts below this limit compile to the 16-bit table; bit 15 of a
/// narrow cell is the output flag, which leaves 15 bits for the state.
pub const NARROW_STATE_LIMIT: u32 = 32_767;

/// Hard cap on state count: the wide cell stores the state in bits 0..=23.
pub const MAX_STATES: u32 = 1 << 24;

/// Narrow (16-bit) cell layout.
pub const STATE_MASK_16: u16 = 0x7fff;
/// Output flag of a narrow cell.
pub const OUTPUT_FLAG_16: u16 = 1 << 15;

/// Wide (32-bit) cell layout.
pub const STATE_MASK_32: u32 = 0x00ff_ffff;
/// Output flag of a wide cell.
pub const OUTPUT_FLAG_32: u32 = 1 << 24;

/// Low 16 bits of an encoded output entry hold the pattern id.
pub const PID_MASK: u32 = 0xffff;
/// Bit 16 of an encoded output entry: match needs a case-sensitive re-check.
pub const PID_VERIFY_FLAG: u32 = 1 << 16;

/// Errors that can occur while building an automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomatonError {
    /// The pattern set needs more states than the wide cell can address.
    TooManyStates {
        /// States required so far.
        count: u32,
        /// Maximum representable state count.
        max: u32,
    },
    /// A pattern id does not fit the 16-bit output encoding.
    PatternIdOverflow {
        /// The offending id.
        id: u32,
    },
}

impl fmt::Display for AutomatonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutomatonError::TooManyStates { count, max } => {
                write!(f, "too many states: {} (max: {})", count, max)
            }
            AutomatonError::PatternIdOverflow { id } => {
                write!(f, "pattern id {} does not fit in 16 bits", id)
            }
        }
    }
}

impl std::error::Error for AutomatonError {}

/// One pattern as seen by the automaton builder.
///
/// `bytes` must already be case-folded; the builder inserts them verbatim.
/// `verify` marks patterns whose match must be re-checked against the
/// original input bytes at scan time (it becomes bit 16 of every encoded
/// output entry carrying this id).
#[derive(Debug, Clone, Copy)]
pub struct BuildPattern<'a> {
    /// Case-folded pattern bytes, never empty.
    pub bytes: &'a [u8],
    /// Pattern id, below 2^16.
    pub id: u32,
    /// Case-sensitive re-check required at scan time.
    pub verify: bool,
}

/// Construction options.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Build both cell widths when the state count allows it. Consumers
    /// that need a fixed-width table (offload-style integrations) set this;
    /// the scan path still picks the width by state count.
    pub build_both_widths: bool,
}

/// The compiled table driving a scan, borrowed from an [`Automaton`].
#[derive(Debug, Clone, Copy)]
pub enum ScanTable<'a> {
    /// 16-bit cells, row-major, 256 cells per state.
    Narrow(&'a [u16]),
    /// 32-bit cells, row-major, 256 cells per state.
    Wide(&'a [u32]),
}

enum DeltaTable {
    Narrow(Box<[u16]>),
    Wide(Box<[u32]>),
    Both {
        narrow: Box<[u16]>,
        wide: Box<[u32]>,
    },
}

/// A compiled, immutable automaton.
///
/// Holds the packed delta table(s) and the per-state encoded output sets.
/// Everything here is read-only after [`Automaton::build`] returns; the
/// scan kernel shares it freely across threads.
pub struct Automaton {
    state_count: u32,
    table: DeltaTable,
    outputs: Box<[Box<[u32]>]>,
}

impl Automaton {
    /// Build an automaton from a frozen pattern set.
    ///
    /// Patterns must be case-folded and non-empty; ids must be unique per
    /// distinct pattern and below 2^16.
    pub fn build(
        patterns: &[BuildPattern<'_>],
        options: &BuildOptions,
    ) -> Result<Self, AutomatonError> {
        let mut max_id = 0u32;
        for p in patterns {
            debug_assert!(!p.bytes.is_empty());
            if p.id > PID_MASK {
                return Err(AutomatonError::PatternIdOverflow { id: p.id });
            }
            max_id = max_id.max(p.id);
        }

        let mut builder = GotoBuilder::new();
        builder.fill_level_one_gap(patterns)?;
        for p in patterns {
            builder.insert_pattern(p.bytes, p.id)?;
        }
        builder.seal_root();

        let state_count = builder.rows.len() as u32;

        // Not consumed by the failureless table; built to sanity-check the
        // trie before the rows are frozen.
        let failure = builder.failure_table();
        debug_assert!(failure
            .iter()
            .enumerate()
            .skip(1)
            .all(|(s, &f)| f >= 0 && (f as usize) < builder.rows.len() && f as usize != s));

        let narrow_fits = state_count < NARROW_STATE_LIMIT;
        let table = if narrow_fits {
            if options.build_both_widths {
                DeltaTable::Both {
                    narrow: builder.compile_narrow(),
                    wide: builder.compile_wide(),
                }
            } else {
                DeltaTable::Narrow(builder.compile_narrow())
            }
        } else {
            DeltaTable::Wide(builder.compile_wide())
        };

        let mut verify_by_id = vec![false; max_id as usize + 1];
        for p in patterns {
            if p.verify {
                verify_by_id[p.id as usize] = true;
            }
        }
        let outputs = builder
            .outputs
            .into_iter()
            .map(|pids| {
                pids.into_iter()
                    .map(|pid| {
                        let mut enc = pid & PID_MASK;
                        if verify_by_id[pid as usize] {
                            enc |= PID_VERIFY_FLAG;
                        }
                        enc
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            state_count,
            table,
            outputs,
        })
    }

    /// Number of states, including the root.
    pub fn state_count(&self) -> u32 {
        self.state_count
    }

    /// The table the scan kernel should drive, selected by state count.
    pub fn scan_table(&self) -> ScanTable<'_> {
        match &self.table {
            DeltaTable::Narrow(t) | DeltaTable::Both { narrow: t, .. } => ScanTable::Narrow(t),
            DeltaTable::Wide(t) => ScanTable::Wide(t),
        }
    }

    /// The narrow table, when one was built.
    pub fn narrow_table(&self) -> Option<&[u16]> {
        match &self.table {
            DeltaTable::Narrow(t) | DeltaTable::Both { narrow: t, .. } => Some(t),
            DeltaTable::Wide(_) => None,
        }
    }

    /// The wide table, when one was built.
    pub fn wide_table(&self) -> Option<&[u32]> {
        match &self.table {
            DeltaTable::Wide(t) | DeltaTable::Both { wide: t, .. } => Some(t),
            DeltaTable::Narrow(_) => None,
        }
    }

    /// Encoded output sets, indexed by state.
    pub fn output_sets(&self) -> &[Box<[u32]>] {
        &self.outputs
    }

    /// Bytes retained by the compiled tables and output sets.
    pub fn memory_bytes(&self) -> usize {
        let table_bytes = match &self.table {
            DeltaTable::Narrow(t) => t.len() * 2,
            DeltaTable::Wide(t) => t.len() * 4,
            DeltaTable::Both { narrow, wide } => narrow.len() * 2 + wide.len() * 4,
        };
        let output_bytes: usize = self.outputs.iter().map(|o| o.len() * 4).sum::<usize>()
            + self.outputs.len() * std::mem::size_of::<Box<[u32]>>();
        table_bytes + output_bytes
    }

    /// Allocation count backing [`Automaton::memory_bytes`].
    pub fn memory_allocations(&self) -> u32 {
        let tables = match &self.table {
            DeltaTable::Both { .. } => 2,
            _ => 1,
        };
        let output_arrays = self.outputs.iter().filter(|o| !o.is_empty()).count() as u32;
        tables + 1 + output_arrays
    }
}

/// Temporary goto table and raw output sets used during construction.
struct GotoBuilder {
    rows: Vec<[i32; 256]>,
    outputs: Vec<Vec<u32>>,
}

impl GotoBuilder {
    fn new() -> Self {
        let mut b = Self {
            rows: Vec::new(),
            outputs: Vec::new(),
        };
        // Root is state 0.
        b.rows.push([NO_TRANSITION; 256]);
        b.outputs.push(Vec::new());
        b
    }

    fn new_state(&mut self) -> Result<i32, AutomatonError> {
        if self.rows.len() as u32 >= MAX_STATES {
            return Err(AutomatonError::TooManyStates {
                count: self.rows.len() as u32,
                max: MAX_STATES,
            });
        }
        let id = self.rows.len() as i32;
        self.rows.push([NO_TRANSITION; 256]);
        self.outputs.push(Vec::new());
        Ok(id)
    }

    /// Pre-allocate a first-level state for every byte value that starts a
    /// pattern, so the root row is dense for all live prefixes.
    fn fill_level_one_gap(&mut self, patterns: &[BuildPattern<'_>]) -> Result<(), AutomatonError> {
        let mut starts = [false; 256];
        for p in patterns {
            if let Some(&b) = p.bytes.first() {
                starts[b as usize] = true;
            }
        }
        for byte in 0..256 {
            if starts[byte] {
                let state = self.new_state()?;
                self.rows[0][byte] = state;
            }
        }
        Ok(())
    }

    /// Walk the trie along `bytes`, allocating the unmatched suffix, and
    /// record `id` in the terminal state's output set.
    fn insert_pattern(&mut self, bytes: &[u8], id: u32) -> Result<(), AutomatonError> {
        let mut state = 0i32;
        let mut matched = 0usize;
        for (i, &b) in bytes.iter().enumerate() {
            let next = self.rows[state as usize][b as usize];
            if next == NO_TRANSITION {
                matched = i;
                break;
            }
            state = next;
            matched = i + 1;
        }
        for &b in &bytes[matched..] {
            let next = self.new_state()?;
            self.rows[state as usize][b as usize] = next;
            state = next;
        }
        let out = &mut self.outputs[state as usize];
        if !out.contains(&id) {
            out.push(id);
        }
        Ok(())
    }

    /// Rewrite the root row's remaining no-transition cells to self-loops.
    fn seal_root(&mut self) {
        for cell in self.rows[0].iter_mut() {
            if *cell == NO_TRANSITION {
                *cell = 0;
            }
        }
    }

    /// Classical failure function, breadth-first from the root. The root
    /// row must be sealed before this runs.
    fn failure_table(&self) -> Vec<i32> {
        let mut failure = vec![0i32; self.rows.len()];
        let mut queue = VecDeque::new();

        for &child in self.rows[0].iter().filter(|&&t| t != 0) {
            failure[child as usize] = 0;
            queue.push_back(child);
        }

        while let Some(r) = queue.pop_front() {
            for byte in 0..256 {
                let u = self.rows[r as usize][byte];
                if u == NO_TRANSITION {
                    continue;
                }
                queue.push_back(u);
                let mut state = failure[r as usize];
                while self.rows[state as usize][byte] == NO_TRANSITION {
                    state = failure[state as usize];
                }
                failure[u as usize] = self.rows[state as usize][byte];
            }
        }
        failure
    }

    /// Fold the goto table into a narrow packed table. Cells with no goto
    /// transition collapse to the root; the scan kernel's per-offset
    /// restart recovers the matches classical failure links would find.
    fn compile_narrow(&self) -> Box<[u16]> {
        let mut cells = vec![0u16; self.rows.len() * 256];
        for (r, row) in self.rows.iter().enumerate() {
            for (byte, &t) in row.iter().enumerate() {
                if t != NO_TRANSITION {
                    cells[(r << 8) + byte] = t as u16;
                }
            }
        }
        for cell in cells.iter_mut() {
            if !self.outputs[(*cell & STATE_MASK_16) as usize].is_empty() {
                *cell |= OUTPUT_FLAG_16;
            }
        }
        cells.into_boxed_slice()
    }

    fn compile_wide(&self) -> Box<[u32]> {
        let mut cells = vec![0u32; self.rows.len() * 256];
        for (r, row) in self.rows.iter().enumerate() {
            for (byte, &t) in row.iter().enumerate() {
                if t != NO_TRANSITION {
                    cells[(r << 8) + byte] = t as u32;
                }
            }
        }
        for cell in cells.iter_mut() {
            if !self.outputs[(*cell & STATE_MASK_32) as usize].is_empty() {
                *cell |= OUTPUT_FLAG_32;
            }
        }
        cells.into_boxed_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(bytes: &[u8], id: u32) -> BuildPattern<'_> {
        BuildPattern {
            bytes,
            id,
            verify: false,
        }
    }

    fn build(patterns: &[BuildPattern<'_>]) -> Automaton {
        Automaton::build(patterns, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_level_one_gap_states() {
        // One pre-allocated state per distinct first byte, plus the root
        // and the suffix chains.
        let patterns = [pat(b"ab", 0), pat(b"ac", 1), pat(b"bz", 2)];
        let ac = build(&patterns);
        // root + level-1 {a, b} + suffixes {b, c under a; z under b}
        assert_eq!(ac.state_count(), 1 + 2 + 3);
    }

    #[test]
    fn test_shared_prefix_reuses_states() {
        let a = build(&[pat(b"abcd", 0), pat(b"abce", 1)]);
        let b = build(&[pat(b"abcd", 0)]);
        assert_eq!(a.state_count(), b.state_count() + 1);
    }

    #[test]
    fn test_duplicate_output_ids_unioned() {
        let patterns = [pat(b"abc", 7), pat(b"abc", 7)];
        let ac = build(&patterns);
        let terminal: Vec<_> = ac
            .output_sets()
            .iter()
            .filter(|o| !o.is_empty())
            .collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].as_ref(), &[7]);
    }

    #[test]
    fn test_failure_links_classical() {
        let patterns = [pat(b"he", 1), pat(b"she", 2), pat(b"his", 3), pat(b"hers", 4)];
        let mut builder = GotoBuilder::new();
        builder.fill_level_one_gap(&patterns).unwrap();
        for p in &patterns {
            builder.insert_pattern(p.bytes, p.id).unwrap();
        }
        builder.seal_root();
        let failure = builder.failure_table();

        // Walk goto to locate states.
        let walk = |bytes: &[u8]| -> i32 {
            let mut s = 0i32;
            for &b in bytes {
                s = builder.rows[s as usize][b as usize];
                assert!(s > 0);
            }
            s
        };
        let h = walk(b"h");
        let he = walk(b"he");
        let she = walk(b"she");
        let sh = walk(b"sh");
        let her = walk(b"her");

        // "she" falls back to "he", "sh" to "h", "her" to nothing useful.
        assert_eq!(failure[she as usize], he);
        assert_eq!(failure[sh as usize], h);
        assert_eq!(failure[her as usize], 0);
        // Depth-1 states fail to the root.
        assert_eq!(failure[h as usize], 0);
    }

    #[test]
    fn test_delta_is_failureless() {
        let ac = build(&[pat(b"he", 1), pat(b"she", 2)]);
        let delta = ac.narrow_table().unwrap();
        let next = |s: u16, b: u8| delta[(((s & STATE_MASK_16) as usize) << 8) + b as usize];

        // "sh" then a mismatching byte drops to the root, not to "h".
        let s = next(0, b's');
        let sh = next(s, b'h');
        assert_ne!(sh & STATE_MASK_16, 0);
        assert_eq!(next(sh, b'x') & STATE_MASK_16, 0);
    }

    #[test]
    fn test_output_flag_set_on_incoming_cells() {
        let ac = build(&[pat(b"ab", 3)]);
        let delta = ac.narrow_table().unwrap();
        let next = |s: u16, b: u8| delta[(((s & STATE_MASK_16) as usize) << 8) + b as usize];

        let a = next(0, b'a');
        assert_eq!(a & OUTPUT_FLAG_16, 0);
        let ab = next(a, b'b');
        assert_ne!(ab & OUTPUT_FLAG_16, 0);
        assert_eq!(
            ac.output_sets()[(ab & STATE_MASK_16) as usize].as_ref(),
            &[3]
        );
    }

    #[test]
    fn test_root_row_self_loops() {
        let ac = build(&[pat(b"xy", 0)]);
        let delta = ac.narrow_table().unwrap();
        // Bytes that start no pattern loop on the root.
        assert_eq!(delta[b'a' as usize] & STATE_MASK_16, 0);
        assert_ne!(delta[b'x' as usize] & STATE_MASK_16, 0);
    }

    #[test]
    fn test_verify_bit_encoding() {
        let patterns = [
            BuildPattern {
                bytes: b"one",
                id: 0,
                verify: true,
            },
            BuildPattern {
                bytes: b"two",
                id: 1,
                verify: false,
            },
        ];
        let ac = build(&patterns);
        let mut seen = [false; 2];
        for out in ac.output_sets().iter().filter(|o| !o.is_empty()) {
            for &enc in out.iter() {
                let id = (enc & PID_MASK) as usize;
                seen[id] = true;
                assert_eq!(enc & PID_VERIFY_FLAG != 0, id == 0);
                assert_eq!(enc & !(PID_MASK | PID_VERIFY_FLAG), 0);
            }
        }
        assert_eq!(seen, [true, true]);
    }

    #[test]
    fn test_build_both_widths() {
        let ac = Automaton::build(
            &[pat(b"abc", 0)],
            &BuildOptions {
                build_both_widths: true,
            },
        )
        .unwrap();
        assert!(ac.narrow_table().is_some());
        assert!(ac.wide_table().is_some());
        assert!(matches!(ac.scan_table(), ScanTable::Narrow(_)));

        let narrow = ac.narrow_table().unwrap();
        let wide = ac.wide_table().unwrap();
        for (n, w) in narrow.iter().zip(wide.iter()) {
            assert_eq!(u32::from(n & STATE_MASK_16), w & STATE_MASK_32);
            assert_eq!(n & OUTPUT_FLAG_16 != 0, w & OUTPUT_FLAG_32 != 0);
        }
    }

    #[test]
    fn test_pattern_id_overflow_rejected() {
        let err = Automaton::build(&[pat(b"abc", 0x1_0000)], &BuildOptions::default())
            .err()
            .unwrap();
        assert_eq!(err, AutomatonError::PatternIdOverflow { id: 0x1_0000 });
        assert!(err.to_string().contains("16 bits"));
    }

    #[test]
    fn test_error_display() {
        let err = AutomatonError::TooManyStates {
            count: MAX_STATES,
            max: MAX_STATES,
        };
        assert!(err.to_string().contains("too many states"));
    }
}
