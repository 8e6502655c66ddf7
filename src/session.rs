use std::sync::Arc;

use tracing::{debug, trace};

use crate::batch::Batch;
use crate::error::DroverError;
use crate::runtime::{ContextParams, EvalContext, ModelApi};

/// An inference session: one model handle plus one evaluation context
///
/// The model is shared read-only via `Arc` - independent sessions derived
/// from the same model run concurrently on separate streams. The context
/// is exclusive to the session and strictly sequential: `decode` takes
/// `&mut self`, so a second in-flight evaluation cannot be expressed.
/// Dropping the session releases the context; there is no cancellation
/// primitive beyond not calling `decode` again.
pub struct Session<M: ModelApi> {
    model: Arc<M>,
    ctx: M::Context,
    params: ContextParams,
}

impl<M: ModelApi> std::fmt::Debug for Session<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl<M: ModelApi> Session<M> {
    /// Create a session with a fresh evaluation context
    pub fn new(model: Arc<M>, params: ContextParams) -> Result<Self, DroverError> {
        let ctx = model.new_context(&params)?;
        debug!(
            n_ctx = params.n_ctx,
            n_threads = params.n_threads,
            seed = params.seed,
            "created inference session"
        );
        Ok(Self { model, ctx, params })
    }

    /// Evaluate a batch, advancing the context's cache state
    ///
    /// An empty batch is a no-op. A runtime failure surfaces as
    /// [`DroverError::DecodeFailed`]; the session is unusable afterwards.
    pub fn decode(&mut self, batch: &Batch) -> Result<(), DroverError> {
        if batch.is_empty() {
            return Ok(());
        }
        trace!(n_tokens = batch.len(), "decode");
        self.ctx.decode(batch)
    }

    /// Score vector for a batch index marked for output in the last decode
    ///
    /// The borrow ends at the next `decode` call.
    pub fn logits(&self, index: usize) -> Result<&[f32], DroverError> {
        self.ctx.logits(index)
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    pub fn params(&self) -> &ContextParams {
        &self.params
    }

    /// Description of the runtime backing this session
    pub fn runtime_info(&self) -> String {
        self.model.runtime_info()
    }
}
