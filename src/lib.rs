//! # drover
//!
//! An autoregressive text-generation driver over a pluggable
//! model-inference runtime. The runtime - weight storage, forward-pass
//! math, hardware acceleration - sits behind the capability traits in
//! [`runtime`]; this crate owns everything around it: tokenizing the
//! prompt, staging fixed-capacity batches, submitting them for
//! evaluation, selecting the next token from the resulting scores,
//! rendering it back to text, and repeating until the model signals the
//! end of generation or the configured length bound is hit.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use drover::{generate, ContextParams, GenerateConfig, MockModel, Session};
//!
//! let model = Arc::new(MockModel::with_script(vec![
//!     MockModel::peak(72), // 'H'
//!     MockModel::peak(105), // 'i'
//! ]));
//! let mut session = Session::new(model, ContextParams::default())?;
//!
//! let mut output = String::new();
//! for piece in generate(&mut session, "prompt", &GenerateConfig::default())? {
//!     output.push_str(&piece?);
//! }
//! assert_eq!(output, "Hi");
//! # Ok::<(), drover::DroverError>(())
//! ```
//!
//! Swap [`MockModel`] for an adapter around a real runtime to generate
//! from actual weights; the loop does not change.
//!
//! ## Structure
//!
//! - [`runtime`] - the trait boundary an adapter implements
//! - [`batch`] - the fixed-capacity, reusable evaluation batch
//! - [`session`] - a model handle paired with one evaluation context
//! - [`sampler`] - candidate construction and the selection policy seam
//! - [`generate`] - the loop itself, as a lazy piece iterator
//! - [`mock`] - a deterministic scripted runtime for tests

pub mod arena;
pub mod batch;
pub mod error;
pub mod generate;
pub mod mock;
pub mod runtime;
pub mod sampler;
pub mod session;
pub mod token;

pub use batch::{Batch, BATCH_CAPACITY};
pub use error::DroverError;
pub use generate::{generate, generate_to, generate_with, GenerateConfig, Pieces};
pub use mock::MockModel;
pub use runtime::{ContextParams, EvalContext, ModelApi, TokenizeOptions};
pub use sampler::{Candidate, Candidates, Greedy, Sampler};
pub use session::Session;
pub use token::{PieceBuffer, Pos, SeqId, TokenBuffer, TokenId, PIECE_CAPACITY};
