//! pfmatch - Failureless Multi-Pattern Matching
//!
//! pfmatch answers one question fast: *which of these byte patterns occur
//! anywhere in this buffer?* It is built for signature scanning inside a
//! network detection engine, where a prepared matcher is shared across
//! worker threads and asked the question for every payload.
//!
//! # Quick Start
//!
//! ```rust
//! use pfmatch::{MatcherBuilder, MatchSink, PatternFlags, ThreadCtx};
//!
//! let mut builder = MatcherBuilder::new();
//! builder.add_pattern_cs(b"abcd", 0, 0, 0, 0, PatternFlags::NONE)?;
//! builder.add_pattern_ci(b"DeFg", 0, 0, 1, 0, PatternFlags::NONE)?;
//! let matcher = builder.build()?;
//!
//! let mut thread_ctx = ThreadCtx::new();
//! let mut sink = MatchSink::new(matcher.max_pattern_id());
//! matcher.search(&mut thread_ctx, &mut sink, b"xxabcdefgxx");
//! assert_eq!(sink.ids(), &[0, 1]);
//! # Ok::<(), pfmatch::PfmatchError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  MatcherBuilder                             │
//! │  (pattern store: dedup hash, folded views)  │
//! └──────────────┬──────────────────────────────┘
//!                │ build()
//!                v
//! ┌─────────────────────────────────────────────┐
//! │  pfmatch-automaton                          │
//! │  (trie -> failure -> packed delta table)    │
//! └──────────────┬──────────────────────────────┘
//!                │
//!                v
//! ┌─────────────────────────────────────────────┐
//! │  Matcher::search                            │
//! │  (per-offset restart kernel -> MatchSink)   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The compiled table drops failure links entirely and the kernel restarts
//! the automaton at every input offset instead. That trades asymptotics
//! for an inner loop of one table load per byte, which is the right trade
//! for the short buffers a packet pipeline feeds in.
//!
//! Case-insensitive patterns match on an ASCII-folded view of the input;
//! case-sensitive patterns are confirmed against the original bytes before
//! they are reported. Each pattern id is reported at most once per scan.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod matcher;
mod pattern;
mod scan;
mod sink;

/// ASCII case folding used by the scan path.
pub mod fold;

pub use crate::error::{PfmatchError, Result};
pub use crate::matcher::{Matcher, MatcherBuilder, MatcherStats, SearchStats, ThreadCtx};
pub use crate::pattern::PatternFlags;
pub use crate::sink::MatchSink;

/// Automaton construction and compiled-table internals.
pub use pfmatch_automaton as automaton;

/// Library version string.
pub const PFMATCH_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!PFMATCH_VERSION.is_empty());
    }

    #[test]
    fn test_quick_start_shape() {
        let mut builder = MatcherBuilder::new();
        builder
            .add_pattern_cs(b"abcd", 0, 0, 0, 0, PatternFlags::NONE)
            .unwrap();
        let matcher = builder.build().unwrap();
        let mut thread_ctx = ThreadCtx::new();
        let mut sink = MatchSink::new(matcher.max_pattern_id());
        assert_eq!(matcher.search(&mut thread_ctx, &mut sink, b"abcd"), 1);
    }
}
