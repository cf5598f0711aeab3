//! Matcher lifecycle
//!
//! A [`MatcherBuilder`] accumulates patterns; [`MatcherBuilder::build`]
//! freezes them, compiles the automaton, and produces an immutable
//! [`Matcher`]. Building consumes the builder, so a matcher can never be
//! prepared twice or mutated after preparation. Scans take a per-thread
//! [`ThreadCtx`] (fold scratch plus counters) and a caller-owned
//! [`crate::MatchSink`]; any number of threads may scan one matcher
//! concurrently as long as each brings its own.

use crate::error::Result;
use crate::pattern::{build_pattern_list, PatternFlags, PatternSet};
use crate::scan;
use crate::sink::MatchSink;
use crate::fold;
use pfmatch_automaton::{Automaton, BuildOptions, BuildPattern, ScanTable};
use std::fmt;
use tracing::debug;

/// Accumulates patterns and compiles them into a [`Matcher`].
pub struct MatcherBuilder {
    patterns: PatternSet,
    build_both_widths: bool,
}

impl MatcherBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            patterns: PatternSet::new(),
            build_both_widths: false,
        }
    }

    /// Compile both table widths when the state count allows it. The scan
    /// path still selects the width by state count; consumers that need a
    /// fixed-width table read the other one off the automaton.
    pub fn build_both_widths(mut self, yes: bool) -> Self {
        self.build_both_widths = yes;
        self
    }

    /// Add a case-sensitive pattern.
    ///
    /// `offset`, `depth` and `sid` are accepted for surface compatibility
    /// with the wider matcher-API family and ignored here. A second add
    /// with an id already stored is ignored; zero-length patterns are
    /// logged and ignored.
    pub fn add_pattern_cs(
        &mut self,
        pat: &[u8],
        _offset: u16,
        _depth: u16,
        id: u32,
        _sid: u32,
        flags: PatternFlags,
    ) -> Result<()> {
        self.patterns.add(pat, id, flags)?;
        Ok(())
    }

    /// Add a case-insensitive pattern: identical to
    /// [`MatcherBuilder::add_pattern_cs`] with [`PatternFlags::NOCASE`]
    /// forced into the flags.
    pub fn add_pattern_ci(
        &mut self,
        pat: &[u8],
        offset: u16,
        depth: u16,
        id: u32,
        sid: u32,
        flags: PatternFlags,
    ) -> Result<()> {
        self.add_pattern_cs(pat, offset, depth, id, sid, flags | PatternFlags::NOCASE)
    }

    /// Number of patterns stored so far.
    pub fn pattern_count(&self) -> u32 {
        self.patterns.pattern_cnt
    }

    /// Freeze the pattern set and compile the scan tables.
    ///
    /// With no patterns stored this yields a matcher whose `search` always
    /// returns 0.
    pub fn build(self) -> Result<Matcher> {
        let pattern_cnt = self.patterns.pattern_cnt;
        let min_len = self.patterns.min_len;
        let max_len = self.patterns.max_len;
        let max_id = self.patterns.max_id;

        if pattern_cnt == 0 {
            debug!("no patterns supplied, building empty matcher");
            return Ok(Matcher {
                automaton: None,
                pattern_list: Box::new([]),
                pattern_cnt: 0,
                min_len: 0,
                max_len: 0,
                max_id: 0,
                memory_cnt: 0,
                memory_bytes: 0,
            });
        }

        let patterns = self.patterns.freeze();
        let pattern_list = build_pattern_list(&patterns, max_id);

        let build_patterns: Vec<BuildPattern<'_>> = patterns
            .iter()
            .map(|p| BuildPattern {
                bytes: &p.folded,
                id: p.id,
                verify: p.needs_verify(),
            })
            .collect();
        let automaton = Automaton::build(
            &build_patterns,
            &BuildOptions {
                build_both_widths: self.build_both_widths,
            },
        )?;
        debug!(
            patterns = pattern_cnt,
            states = automaton.state_count(),
            "compiled scan tables"
        );

        // The frozen pattern copies are dropped here; the pattern list and
        // the automaton retain everything the scan needs.
        let mut memory_cnt = automaton.memory_allocations() + 1;
        let mut memory_bytes = automaton.memory_bytes()
            + pattern_list.len() * std::mem::size_of::<Option<Box<[u8]>>>();
        for entry in pattern_list.iter().flatten() {
            memory_cnt += 1;
            memory_bytes += entry.len();
        }

        Ok(Matcher {
            automaton: Some(automaton),
            pattern_list,
            pattern_cnt,
            min_len,
            max_len,
            max_id,
            memory_cnt,
            memory_bytes,
        })
    }
}

impl Default for MatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A prepared, immutable multi-pattern matcher.
pub struct Matcher {
    automaton: Option<Automaton>,
    pattern_list: Box<[Option<Box<[u8]>>]>,
    pattern_cnt: u32,
    min_len: u16,
    max_len: u16,
    max_id: u32,
    memory_cnt: u32,
    memory_bytes: usize,
}

impl Matcher {
    /// Scan `buf` and report every registered pattern occurring in it.
    ///
    /// Matched ids are inserted into `sink` once each; the return value
    /// counts raw match events (each id emission, including repeats the
    /// sink already holds), which feeds the thread statistics.
    pub fn search(&self, thread_ctx: &mut ThreadCtx, sink: &mut MatchSink, buf: &[u8]) -> u32 {
        thread_ctx.total_calls += 1;
        let Some(automaton) = &self.automaton else {
            return 0;
        };
        if buf.is_empty() {
            return 0;
        }

        fold::ascii_lowercase(buf, &mut thread_ctx.fold_buf);
        let matches = match automaton.scan_table() {
            ScanTable::Narrow(delta) => scan::search_narrow(
                delta,
                automaton.output_sets(),
                &self.pattern_list,
                buf,
                &thread_ctx.fold_buf,
                sink,
            ),
            ScanTable::Wide(delta) => scan::search_wide(
                delta,
                automaton.output_sets(),
                &self.pattern_list,
                buf,
                &thread_ctx.fold_buf,
                sink,
            ),
        };
        thread_ctx.total_matches += u64::from(matches);
        matches
    }

    /// Number of unique patterns compiled in.
    pub fn pattern_count(&self) -> u32 {
        self.pattern_cnt
    }

    /// Largest pattern id in use; sinks must cover it.
    pub fn max_pattern_id(&self) -> u32 {
        self.max_id
    }

    /// Construction and memory statistics.
    pub fn stats(&self) -> MatcherStats {
        MatcherStats {
            pattern_cnt: self.pattern_cnt,
            min_len: self.min_len,
            max_len: self.max_len,
            state_count: self.automaton.as_ref().map_or(0, |a| a.state_count()),
            memory_cnt: self.memory_cnt,
            memory_bytes: self.memory_bytes,
        }
    }

    pub(crate) fn automaton(&self) -> Option<&Automaton> {
        self.automaton.as_ref()
    }
}

/// Diagnostic counters for a prepared matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherStats {
    /// Unique patterns compiled in.
    pub pattern_cnt: u32,
    /// Shortest pattern length.
    pub min_len: u16,
    /// Longest pattern length.
    pub max_len: u16,
    /// States in the compiled table, including the root.
    pub state_count: u32,
    /// Retained allocations.
    pub memory_cnt: u32,
    /// Retained bytes.
    pub memory_bytes: usize,
}

impl fmt::Display for MatcherStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matcher information:")?;
        writeln!(f, "  Unique patterns: {}", self.pattern_cnt)?;
        writeln!(f, "  Smallest:        {}", self.min_len)?;
        writeln!(f, "  Largest:         {}", self.max_len)?;
        writeln!(f, "  States:          {}", self.state_count)?;
        writeln!(f, "  Memory allocs:   {}", self.memory_cnt)?;
        writeln!(f, "  Memory bytes:    {}", self.memory_bytes)
    }
}

/// Per-thread scan scratch: the case-fold buffer and search counters.
///
/// Not shared between threads; every scanning thread owns one.
#[derive(Debug, Default)]
pub struct ThreadCtx {
    pub(crate) fold_buf: Vec<u8>,
    pub(crate) total_calls: u64,
    pub(crate) total_matches: u64,
}

impl ThreadCtx {
    /// Fresh scratch with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters accumulated across this thread's searches.
    pub fn search_stats(&self) -> SearchStats {
        SearchStats {
            total_calls: self.total_calls,
            total_matches: self.total_matches,
        }
    }
}

/// Accumulated per-thread search counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    /// Search invocations.
    pub total_calls: u64,
    /// Raw match events across all searches.
    pub total_matches: u64,
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Search stats:")?;
        writeln!(f, "  Total calls:   {}", self.total_calls)?;
        writeln!(f, "  Total matches: {}", self.total_matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_builds_empty_matcher() {
        let matcher = MatcherBuilder::new().build().unwrap();
        let mut thread_ctx = ThreadCtx::new();
        let mut sink = MatchSink::new(0);
        assert_eq!(matcher.search(&mut thread_ctx, &mut sink, b"anything"), 0);
        assert!(sink.is_empty());
        assert_eq!(matcher.stats().state_count, 0);
        assert_eq!(thread_ctx.search_stats().total_calls, 1);
    }

    #[test]
    fn test_stats_reflect_patterns() {
        let mut builder = MatcherBuilder::new();
        builder
            .add_pattern_cs(b"ab", 0, 0, 0, 0, PatternFlags::NONE)
            .unwrap();
        builder
            .add_pattern_cs(b"abcdef", 0, 0, 1, 0, PatternFlags::NONE)
            .unwrap();
        let matcher = builder.build().unwrap();
        let stats = matcher.stats();
        assert_eq!(stats.pattern_cnt, 2);
        assert_eq!(stats.min_len, 2);
        assert_eq!(stats.max_len, 6);
        assert!(stats.state_count > 0);
        assert!(stats.memory_bytes > 0);
        assert!(format!("{}", stats).contains("Unique patterns: 2"));
    }

    #[test]
    fn test_thread_counters_accumulate() {
        let mut builder = MatcherBuilder::new();
        builder
            .add_pattern_cs(b"ab", 0, 0, 0, 0, PatternFlags::NONE)
            .unwrap();
        let matcher = builder.build().unwrap();
        let mut thread_ctx = ThreadCtx::new();
        let mut sink = MatchSink::new(matcher.max_pattern_id());
        matcher.search(&mut thread_ctx, &mut sink, b"ab ab");
        sink.clear();
        matcher.search(&mut thread_ctx, &mut sink, b"zzz");
        let stats = thread_ctx.search_stats();
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.total_matches, 2);
        assert!(format!("{}", stats).contains("Total calls:   2"));
    }

    #[test]
    fn test_compiled_automaton_is_structurally_valid() {
        let mut builder = MatcherBuilder::new();
        for (i, pat) in [b"he".as_ref(), b"she", b"his", b"hers"].iter().enumerate() {
            builder
                .add_pattern_cs(pat, 0, 0, i as u32, 0, PatternFlags::NONE)
                .unwrap();
        }
        let matcher = builder.build().unwrap();
        let automaton = matcher.automaton().unwrap();
        let result = pfmatch_automaton::validate_structure(automaton);
        assert!(result.is_valid(), "{:?}", result.errors);
        let reach = pfmatch_automaton::validate_reachability(automaton);
        assert_eq!(reach.stats.reachable_count, automaton.state_count());
    }
}
