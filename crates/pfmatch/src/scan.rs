//! The scan kernel
//!
//! The compiled table is failureless: a cell with no goto transition sends
//! the automaton back to the root instead of chasing failure links. The
//! kernel compensates by restarting the automaton at every input offset,
//! so the inner loop is a single table load per byte and every occurrence
//! is still found from its own start offset. The per-offset cost is
//! bounded by the longest prefix match starting there.
//!
//! Both widths walk `folded` (the lowercase view of the input) and verify
//! case-sensitive hits against the original `buf`. A match of length L
//! detected from offset `i` spans `buf[i..i + L]`; with unmerged output
//! sets every id at the reached state has exactly that length.

use crate::sink::MatchSink;
use pfmatch_automaton::{
    OUTPUT_FLAG_16, OUTPUT_FLAG_32, PID_MASK, PID_VERIFY_FLAG, STATE_MASK_16, STATE_MASK_32,
};

/// Emit the encoded ids of one output state. Returns the number of raw
/// match events; a failed case verify stops emission for this state.
#[inline(always)]
fn emit(
    encoded: &[u32],
    pattern_list: &[Option<Box<[u8]>>],
    buf: &[u8],
    start: usize,
    sink: &mut MatchSink,
) -> u32 {
    let mut matches = 0;
    for &enc in encoded {
        let id = enc & PID_MASK;
        if enc & PID_VERIFY_FLAG != 0 {
            let exact = pattern_list.get(id as usize).and_then(|e| e.as_deref());
            let window = exact.and_then(|e| buf.get(start..start + e.len()));
            match (exact, window) {
                (Some(exact), Some(window)) if window == exact => {}
                _ => break,
            }
        }
        sink.insert(id);
        matches += 1;
    }
    matches
}

/// 16-bit table scan: bit 15 of a cell flags an output state, bits 0..=14
/// hold the next state.
pub(crate) fn search_narrow(
    delta: &[u16],
    outputs: &[Box<[u32]>],
    pattern_list: &[Option<Box<[u8]>>],
    buf: &[u8],
    folded: &[u8],
    sink: &mut MatchSink,
) -> u32 {
    let mut matches = 0;
    for i in 0..folded.len() {
        let mut state: u16 = 0;
        for &byte in &folded[i..] {
            state = delta[(((state & STATE_MASK_16) as usize) << 8) + byte as usize];
            if state == 0 {
                break;
            }
            if state & OUTPUT_FLAG_16 != 0 {
                let s = (state & STATE_MASK_16) as usize;
                matches += emit(&outputs[s], pattern_list, buf, i, sink);
            }
        }
    }
    matches
}

/// 32-bit table scan: bit 24 flags an output state, bits 0..=23 hold the
/// next state.
pub(crate) fn search_wide(
    delta: &[u32],
    outputs: &[Box<[u32]>],
    pattern_list: &[Option<Box<[u8]>>],
    buf: &[u8],
    folded: &[u8],
    sink: &mut MatchSink,
) -> u32 {
    let mut matches = 0;
    for i in 0..folded.len() {
        let mut state: u32 = 0;
        for &byte in &folded[i..] {
            state = delta[(((state & STATE_MASK_32) as usize) << 8) + byte as usize];
            if state == 0 {
                break;
            }
            if state & OUTPUT_FLAG_32 != 0 {
                let s = (state & STATE_MASK_32) as usize;
                matches += emit(&outputs[s], pattern_list, buf, i, sink);
            }
        }
    }
    matches
}
