//! Engine status codes.
//!
//! Every fallible operation at the engine boundary returns one of these.
//! The vocabulary is deliberately small so the host can map it onto its own
//! error surface without inspection.

use thiserror::Error;

/// Boundary error vocabulary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Status {
    /// Caller passed an address or argument the engine cannot act on.
    #[error("invalid argument: {reason} (addr 0x{addr:x})")]
    InvalidArgument {
        /// Offending address.
        addr: u64,
        /// Short description.
        reason: &'static str,
    },

    /// No packet covers the queried address.
    #[error("no packet found at 0x{addr:x}")]
    NotFound {
        /// Queried address.
        addr: u64,
    },

    /// Input bytes were insufficient or misshapen; nothing was stored.
    #[error("insufficient input: {reason}")]
    FailedPrecondition {
        /// Short description.
        reason: &'static str,
    },

    /// The decoder hit an inconsistency in the encoding or its own tables.
    /// The current packet was discarded.
    #[error("decode aborted at word {word_index}: {reason}")]
    Internal {
        /// Index of the word being decoded when the abort fired.
        word_index: usize,
        /// Short description.
        reason: &'static str,
    },
}

impl Status {
    pub(crate) fn internal(word_index: usize, reason: &'static str) -> Self {
        Status::Internal { word_index, reason }
    }
}
