use thiserror::Error;

/// Errors produced by the generation driver
///
/// Only [`DroverError::TokenizationOverflow`] is recoverable: the caller
/// may retry with a larger token budget or reject the input, and no state
/// has been mutated when it is reported. Every other variant is terminal
/// for the generation session that raised it; pieces already emitted
/// before the failure remain valid.
#[derive(Debug, Error)]
pub enum DroverError {
    /// The input text needs more token slots than the caller allowed
    #[error("tokenization overflow: input requires {required} tokens")]
    TokenizationOverflow { required: usize },

    /// The orchestrating loop tried to push past the batch capacity
    ///
    /// Capacity is a fixed, known constant for the session, so hitting
    /// this is an invariant violation, not an input problem.
    #[error("batch is full (capacity {capacity})")]
    BatchFull { capacity: usize },

    /// The runtime refused to create an evaluation context
    #[error("context creation failed: {0}")]
    ContextCreationFailed(String),

    /// The runtime reported an evaluation failure
    ///
    /// Cache state is presumed corrupted; the session must be torn down
    /// and recreated from scratch before retrying.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// Generation was requested with an empty prompt
    #[error("prompt is empty")]
    EmptyPrompt,

    /// The tokenized prompt does not fit the configured batch capacity
    #[error("prompt of {len} tokens exceeds batch capacity {capacity}")]
    PromptTooLong { len: usize, capacity: usize },

    /// Logits were requested for a position that did not ask for them
    #[error("invalid logits request: {0}")]
    InvalidLogits(String),

    /// A streaming sink failed to accept an emitted piece
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DroverError {
    /// Whether the caller can branch on this error and continue
    ///
    /// Recoverable conditions are reported before any state mutation;
    /// everything else terminates the current session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DroverError::TokenizationOverflow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(DroverError::TokenizationOverflow { required: 600 }.is_recoverable());
        assert!(!DroverError::BatchFull { capacity: 512 }.is_recoverable());
        assert!(!DroverError::DecodeFailed("code 1".into()).is_recoverable());
    }

    #[test]
    fn test_display_carries_detail() {
        let err = DroverError::PromptTooLong {
            len: 700,
            capacity: 512,
        };
        let text = err.to_string();
        assert!(text.contains("700"));
        assert!(text.contains("512"));
    }
}
