// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// The failures the training loop distinguishes. None of them is
// recoverable: every variant ends the run.
//
// File I/O failures are not listed here — they travel as
// std::io / recorder errors wrapped with anyhow context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoopError {
    /// Missing or inconsistent run configuration (caught at startup)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A batch source ran out while the loop still needed batches
    #[error("{source_name} data exhausted after {consumed} of {requested} batches")]
    DataExhausted {
        source_name: String,
        consumed:    usize,
        requested:   usize,
    },

    /// Trainable and evaluation model do not share an architecture
    #[error("cannot sync weights: {0}")]
    WeightSync(String),
}

impl LoopError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_message_names_source() {
        let err = LoopError::DataExhausted {
            source_name: "training".into(),
            consumed:    3,
            requested:   10,
        };
        assert_eq!(
            err.to_string(),
            "training data exhausted after 3 of 10 batches"
        );
    }
}
