//! Capability boundary between the driver and the model-inference runtime
//!
//! The driver never touches runtime internals: everything it needs from a
//! loaded model is expressed by [`ModelApi`], and everything it needs from
//! one evaluation stream by [`EvalContext`]. A native adapter (e.g. around
//! a linked llama.cpp build) implements these traits over its foreign
//! handles; [`crate::mock::MockModel`] implements them in-process for
//! tests. How the model file was produced or loaded is outside this
//! boundary - any value implementing [`ModelApi`] is a valid model handle.

use crate::batch::Batch;
use crate::error::DroverError;
use crate::token::{PieceBuffer, TokenBuffer, TokenId};

/// Tokenizer special-token policy
///
/// The two flags mirror the runtime's tokenizer entry point: `add_special`
/// inserts the vocabulary's leading markers (BOS and friends) around the
/// input, `parse_special` lets special-token text in the input map to
/// their ids instead of being split as plain text. The default is
/// `true`/`true`, the recommended prompt-handling path for chat-style
/// models; [`TokenizeOptions::raw`] selects the untreated `false`/`false`
/// behavior for callers feeding pre-marked token streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizeOptions {
    pub add_special: bool,
    pub parse_special: bool,
}

impl TokenizeOptions {
    /// No special-token insertion or parsing
    pub fn raw() -> Self {
        Self {
            add_special: false,
            parse_special: false,
        }
    }
}

impl Default for TokenizeOptions {
    fn default() -> Self {
        Self {
            add_special: true,
            parse_special: true,
        }
    }
}

/// Parameters for creating an evaluation context
#[derive(Debug, Clone)]
pub struct ContextParams {
    /// Number of tokens the context cache can hold
    pub n_ctx: u32,
    /// Worker threads for single-token evaluation
    pub n_threads: i32,
    /// Worker threads for batch (prompt) evaluation
    pub n_threads_batch: i32,
    /// Seed for stochastic sampling policies (unused under greedy)
    pub seed: u64,
}

impl Default for ContextParams {
    fn default() -> Self {
        let threads = num_cpus::get() as i32;
        Self {
            n_ctx: 2048,
            n_threads: threads,
            n_threads_batch: threads,
            seed: 1234,
        }
    }
}

/// Capability surface of a loaded model
///
/// The handle is read-only and safely shared: any number of contexts may
/// be derived from one model and run on separate sequential streams.
/// `tokenize` and `token_piece` are pure with respect to process state
/// and may be called concurrently for different inputs.
pub trait ModelApi {
    /// The evaluation-context type this model produces
    type Context: EvalContext;

    /// Create a fresh evaluation context with its own cache state
    ///
    /// Fails with [`DroverError::ContextCreationFailed`] if the runtime
    /// cannot allocate one.
    fn new_context(&self, params: &ContextParams) -> Result<Self::Context, DroverError>;

    /// Convert text to token ids
    ///
    /// Fails with [`DroverError::TokenizationOverflow`] when the text
    /// needs more than `max_tokens` ids; the caller may retry with a
    /// larger budget.
    fn tokenize(
        &self,
        text: &str,
        max_tokens: usize,
        opts: TokenizeOptions,
    ) -> Result<TokenBuffer, DroverError>;

    /// Render one token's text fragment into a fixed-capacity buffer
    ///
    /// An unknown or non-printing token renders as the empty piece.
    /// Overlong pieces are truncated by the buffer (see
    /// [`PieceBuffer`]); rendering never fails the stream.
    fn token_piece(&self, token: TokenId, out: &mut PieceBuffer);

    /// Whether the model designates this token as end-of-generation
    fn is_eog(&self, token: TokenId) -> bool;

    /// Number of entries in the vocabulary
    fn n_vocab(&self) -> usize;

    /// Human-readable description of the loaded runtime/build
    ///
    /// Purely observational; has no effect on generation.
    fn runtime_info(&self) -> String;
}

/// One evaluation stream and its accumulated cache state
///
/// Exactly one evaluate call may be in flight per context; the `&mut`
/// receiver on `decode` encodes that at compile time. A context must not
/// be shared between sessions.
pub trait EvalContext {
    /// Evaluate a batch, advancing the context's internal cache
    ///
    /// A runtime-reported failure surfaces as
    /// [`DroverError::DecodeFailed`] and leaves the context unusable.
    fn decode(&mut self, batch: &Batch) -> Result<(), DroverError>;

    /// Score vector for a batch index that requested logits in the most
    /// recent decode
    ///
    /// One `f32` per vocabulary entry. The borrow is only valid until the
    /// next decode on this context. Requesting an index that was not
    /// marked for output is an error.
    fn logits(&self, index: usize) -> Result<&[f32], DroverError>;
}
