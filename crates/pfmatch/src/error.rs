//! Error types for the pfmatch library
//!
//! A single error type wraps everything construction can report; the scan
//! path is total and never returns an error.

use thiserror::Error;

/// Main error type for pfmatch operations.
#[derive(Error, Debug)]
pub enum PfmatchError {
    /// Error from automaton construction.
    #[error(transparent)]
    Automaton(#[from] pfmatch_automaton::AutomatonError),

    /// Pattern exceeds the representable length.
    #[error("pattern too long: {len} bytes (max: {max})")]
    PatternTooLong {
        /// Supplied pattern length.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// Pattern id does not fit the 16-bit scan-time encoding.
    #[error("pattern id too large: {id} (max: {max})")]
    PatternIdTooLarge {
        /// Supplied id.
        id: u32,
        /// Maximum accepted id.
        max: u32,
    },
}

/// Result type alias for pfmatch operations.
pub type Result<T> = std::result::Result<T, PfmatchError>;
