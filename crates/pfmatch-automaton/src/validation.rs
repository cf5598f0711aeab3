//! Structural validation for compiled automatons
//!
//! Checks that a compiled automaton is internally consistent: every cell
//! targets a real state, output flags agree with the output sets, encoded
//! output entries use only the documented bits, and every state is
//! reachable from the root. Construction is trusted code, so these checks
//! run in tests and diagnostics rather than on the scan path.

use crate::{
    Automaton, ScanTable, OUTPUT_FLAG_16, OUTPUT_FLAG_32, PID_MASK, PID_VERIFY_FLAG,
    STATE_MASK_16, STATE_MASK_32,
};

/// Validation outcome: errors, warnings, and gathered statistics.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Critical inconsistencies; the automaton must not be scanned.
    pub errors: Vec<String>,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
    /// Statistics gathered during validation.
    pub stats: AutomatonStats,
}

/// Statistics gathered while validating an automaton.
#[derive(Debug, Clone, Default)]
pub struct AutomatonStats {
    /// Number of states, including the root.
    pub state_count: u32,
    /// States with a non-empty output set.
    pub output_state_count: u32,
    /// Total encoded output entries across all states.
    pub encoded_id_count: u32,
    /// States reachable from the root via delta transitions.
    pub reachable_count: u32,
}

impl ValidationResult {
    fn new(state_count: u32) -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            stats: AutomatonStats {
                state_count,
                ..AutomatonStats::default()
            },
        }
    }

    /// True when no errors were recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate cell targets, output-flag consistency, and output encoding.
pub fn validate_structure(automaton: &Automaton) -> ValidationResult {
    let mut result = ValidationResult::new(automaton.state_count());
    let state_count = automaton.state_count() as usize;
    let outputs = automaton.output_sets();

    if outputs.len() != state_count {
        result.errors.push(format!(
            "output table has {} entries for {} states",
            outputs.len(),
            state_count
        ));
        return result;
    }

    match automaton.scan_table() {
        ScanTable::Narrow(cells) => {
            validate_cells(
                cells.iter().map(|&c| {
                    (
                        u32::from(c & STATE_MASK_16),
                        c & OUTPUT_FLAG_16 != 0,
                        u32::from(c & !(STATE_MASK_16 | OUTPUT_FLAG_16)),
                    )
                }),
                state_count,
                outputs,
                &mut result,
            );
        }
        ScanTable::Wide(cells) => {
            validate_cells(
                cells.iter().map(|&c| {
                    (
                        c & STATE_MASK_32,
                        c & OUTPUT_FLAG_32 != 0,
                        c & !(STATE_MASK_32 | OUTPUT_FLAG_32),
                    )
                }),
                state_count,
                outputs,
                &mut result,
            );
        }
    }

    for (state, out) in outputs.iter().enumerate() {
        if out.is_empty() {
            continue;
        }
        result.stats.output_state_count += 1;
        result.stats.encoded_id_count += out.len() as u32;
        for &enc in out.iter() {
            if enc & !(PID_MASK | PID_VERIFY_FLAG) != 0 {
                result.errors.push(format!(
                    "state {} output entry {:#x} uses reserved bits",
                    state, enc
                ));
            }
        }
    }
    // Patterns are at least one byte long, so the root never emits.
    if !outputs[0].is_empty() {
        result.errors.push("root state has outputs".to_string());
    }

    result
}

fn validate_cells(
    cells: impl Iterator<Item = (u32, bool, u32)>,
    state_count: usize,
    outputs: &[Box<[u32]>],
    result: &mut ValidationResult,
) {
    for (i, (target, flagged, reserved)) in cells.enumerate() {
        let state = i / 256;
        let byte = i % 256;
        if target as usize >= state_count {
            result.errors.push(format!(
                "cell [{}][{}] targets state {} of {}",
                state, byte, target, state_count
            ));
            continue;
        }
        if reserved != 0 {
            result.errors.push(format!(
                "cell [{}][{}] has reserved bits set: {:#x}",
                state, byte, reserved
            ));
        }
        let has_output = !outputs[target as usize].is_empty();
        if flagged != has_output {
            result.errors.push(format!(
                "cell [{}][{}] output flag {} but target {} has {} outputs",
                state,
                byte,
                flagged,
                target,
                outputs[target as usize].len()
            ));
        }
    }
}

/// Breadth-first reachability from the root over delta transitions.
///
/// Every state a trie insertion allocates stays reachable after delta
/// compilation; an unreachable state indicates a construction bug.
pub fn validate_reachability(automaton: &Automaton) -> ValidationResult {
    let mut result = ValidationResult::new(automaton.state_count());
    let state_count = automaton.state_count() as usize;

    let mut reachable = vec![false; state_count];
    let mut queue = vec![0usize];
    reachable[0] = true;

    let next = |state: usize, byte: usize| -> usize {
        match automaton.scan_table() {
            ScanTable::Narrow(cells) => {
                (cells[(state << 8) + byte] & STATE_MASK_16) as usize
            }
            ScanTable::Wide(cells) => (cells[(state << 8) + byte] & STATE_MASK_32) as usize,
        }
    };

    while let Some(state) = queue.pop() {
        for byte in 0..256 {
            let target = next(state, byte);
            if target < state_count && !reachable[target] {
                reachable[target] = true;
                queue.push(target);
            }
        }
    }

    let reachable_count = reachable.iter().filter(|&&r| r).count();
    result.stats.reachable_count = reachable_count as u32;
    if reachable_count < state_count {
        result.warnings.push(format!(
            "{} states unreachable from the root",
            state_count - reachable_count
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuildOptions, BuildPattern};

    fn build(patterns: &[(&[u8], u32)]) -> Automaton {
        let build_patterns: Vec<BuildPattern<'_>> = patterns
            .iter()
            .map(|&(bytes, id)| BuildPattern {
                bytes,
                id,
                verify: false,
            })
            .collect();
        Automaton::build(&build_patterns, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_valid_automaton_passes() {
        let ac = build(&[(b"he", 1), (b"she", 2), (b"his", 3), (b"hers", 4)]);
        let structure = validate_structure(&ac);
        assert!(structure.is_valid(), "{:?}", structure.errors);
        assert_eq!(structure.stats.output_state_count, 4);
        assert_eq!(structure.stats.encoded_id_count, 4);

        let reach = validate_reachability(&ac);
        assert!(reach.warnings.is_empty());
        assert_eq!(reach.stats.reachable_count, ac.state_count());
    }

    #[test]
    fn test_empty_automaton_passes() {
        let ac = build(&[]);
        assert_eq!(ac.state_count(), 1);
        assert!(validate_structure(&ac).is_valid());
        assert_eq!(validate_reachability(&ac).stats.reachable_count, 1);
    }

    #[test]
    fn test_shared_terminal_counts_ids() {
        // Same folded bytes, two ids: one output state, two encoded ids.
        let ac = build(&[(b"works", 0), (b"works", 1)]);
        let structure = validate_structure(&ac);
        assert!(structure.is_valid());
        assert_eq!(structure.stats.output_state_count, 1);
        assert_eq!(structure.stats.encoded_id_count, 2);
    }
}
