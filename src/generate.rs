//! The generation loop: prompt evaluation, then decode/select/emit
//!
//! [`generate`] seeds the batch with the prompt, evaluates it, and returns
//! a lazy [`Pieces`] iterator that produces one text fragment per decoded
//! token until the model emits its end-of-generation token or the
//! configured length bound is reached. The loop owns the batch and the
//! step arena for its whole lifetime: the batch is cleared and refilled
//! every iteration, never reallocated, and the candidate array lives only
//! inside the step that built it.
//!
//! Position bookkeeping is the invariant everything depends on: the
//! prompt occupies positions `0..n-1`, each generated token takes the
//! next position, and the run stays gapless and strictly increasing. An
//! off-by-one here desynchronizes the runtime's cache and produces wrong
//! tokens without any error signal, which is why the cursor is advanced
//! in exactly one place.

use std::io::Write;

use tracing::{debug, trace, warn};

use crate::arena::StepArena;
use crate::batch::{Batch, BATCH_CAPACITY};
use crate::error::DroverError;
use crate::runtime::{ModelApi, TokenizeOptions};
use crate::sampler::{Candidates, Greedy, Sampler};
use crate::session::Session;
use crate::token::{PieceBuffer, Pos, SeqId, TokenBuffer, TokenId};

/// The single sequence this driver generates into
const STREAM_SEQ: SeqId = 0;

/// Configuration for one generation run
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Maximum number of tokens to emit; checked before every decoding
    /// step, so zero emits nothing after prompt evaluation
    pub max_tokens: usize,
    /// Batch capacity in tokens; the tokenized prompt must fit
    pub batch_capacity: usize,
    /// Special-token policy for tokenizing the prompt
    pub tokenize: TokenizeOptions,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            max_tokens: 128,
            batch_capacity: BATCH_CAPACITY,
            tokenize: TokenizeOptions::default(),
        }
    }
}

enum LoopState {
    PromptEval,
    Decoding,
    Done,
}

/// Lazy stream of generated text fragments
///
/// Yields `Ok(piece)` per generated token; a fatal condition ends the
/// stream with a single terminal `Err` item. Pieces yielded before a
/// failure remain valid. The stream is not restartable: a new run needs
/// a fresh session (the context's cache holds this run's positions).
pub struct Pieces<'s, M: ModelApi, S: Sampler = Greedy> {
    session: &'s mut Session<M>,
    sampler: S,
    batch: Batch,
    arena: StepArena,
    prompt: TokenBuffer,
    cursor: Pos,
    emitted: usize,
    max_tokens: usize,
    state: LoopState,
}

/// Start a generation run with greedy selection
///
/// Validates the prompt, tokenizes it, and returns the piece stream.
/// Prompt evaluation happens on the first `next` call. Init-stage
/// failures (empty prompt, tokenization overflow, prompt longer than the
/// batch capacity) are reported here, before any context state mutates.
pub fn generate<'s, M: ModelApi>(
    session: &'s mut Session<M>,
    prompt: &str,
    config: &GenerateConfig,
) -> Result<Pieces<'s, M>, DroverError> {
    generate_with(session, prompt, config, Greedy::new())
}

/// Start a generation run with a caller-supplied selection policy
pub fn generate_with<'s, M: ModelApi, S: Sampler>(
    session: &'s mut Session<M>,
    prompt: &str,
    config: &GenerateConfig,
    sampler: S,
) -> Result<Pieces<'s, M, S>, DroverError> {
    if prompt.is_empty() {
        return Err(DroverError::EmptyPrompt);
    }

    let n_ctx = session.params().n_ctx as usize;
    let tokens = session.model().tokenize(prompt, n_ctx, config.tokenize)?;
    if tokens.is_empty() {
        return Err(DroverError::EmptyPrompt);
    }
    if tokens.len() > config.batch_capacity {
        return Err(DroverError::PromptTooLong {
            len: tokens.len(),
            capacity: config.batch_capacity,
        });
    }
    if tokens.len() + config.max_tokens > n_ctx {
        warn!(
            prompt_tokens = tokens.len(),
            max_tokens = config.max_tokens,
            n_ctx,
            "requested length may exceed the context window"
        );
    }

    debug!(
        prompt_tokens = tokens.len(),
        max_tokens = config.max_tokens,
        sampler = sampler.name(),
        "starting generation"
    );

    Ok(Pieces {
        session,
        sampler,
        batch: Batch::new(config.batch_capacity),
        arena: StepArena::default(),
        prompt: tokens,
        cursor: 0,
        emitted: 0,
        max_tokens: config.max_tokens,
        state: LoopState::PromptEval,
    })
}

/// Run a generation to completion, streaming each piece into `sink`
///
/// Pieces are written as they are produced (no whole-output buffering);
/// the collected text is returned once the stream ends.
pub fn generate_to<M: ModelApi, W: Write>(
    session: &mut Session<M>,
    prompt: &str,
    config: &GenerateConfig,
    sink: &mut W,
) -> Result<String, DroverError> {
    let mut text = String::new();
    for piece in generate(session, prompt, config)? {
        let piece = piece?;
        sink.write_all(piece.as_bytes())?;
        text.push_str(&piece);
    }
    sink.flush()?;
    Ok(text)
}

impl<M: ModelApi, S: Sampler> std::fmt::Debug for Pieces<'_, M, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pieces")
            .field("cursor", &self.cursor)
            .field("emitted", &self.emitted)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl<M: ModelApi, S: Sampler> Pieces<'_, M, S> {
    /// Evaluate the whole prompt at positions `0..n-1`
    ///
    /// Only the final position requests logits; earlier distributions are
    /// never read.
    fn eval_prompt(&mut self) -> Result<(), DroverError> {
        let last = self.prompt.len() - 1;
        for (i, &token) in self.prompt.iter().enumerate() {
            self.batch.add(token, i as Pos, &[STREAM_SEQ], i == last)?;
        }
        self.session.decode(&self.batch)?;
        self.cursor = last as Pos;
        Ok(())
    }

    /// One decoding step: select, check termination, emit, re-seed, evaluate
    fn step(&mut self) -> Option<Result<String, DroverError>> {
        if self.emitted >= self.max_tokens {
            debug!(emitted = self.emitted, "length bound reached");
            self.state = LoopState::Done;
            return None;
        }

        let index = match self.batch.last_index() {
            Some(i) => i,
            None => return self.fail(DroverError::InvalidLogits("empty batch".into())),
        };

        let token = match select_next(self.session, &self.arena, &mut self.sampler, index) {
            Ok(token) => token,
            Err(e) => return self.fail(e),
        };
        // The candidate array does not outlive the step that built it
        self.arena.reset();

        if self.session.model().is_eog(token) {
            debug!(emitted = self.emitted, "end-of-generation token");
            self.state = LoopState::Done;
            return None;
        }

        let mut piece = PieceBuffer::new();
        self.session.model().token_piece(token, &mut piece);
        if piece.truncated() {
            warn!(token, "piece truncated to buffer capacity");
        }
        let text = piece.as_str().to_string();

        let next_pos = self.cursor + 1;
        self.batch.clear();
        if let Err(e) = self.batch.add(token, next_pos, &[STREAM_SEQ], true) {
            return self.fail(e);
        }
        if let Err(e) = self.session.decode(&self.batch) {
            return self.fail(e);
        }
        self.cursor = next_pos;
        self.emitted += 1;
        trace!(token, pos = next_pos, "emitted piece");

        Some(Ok(text))
    }

    fn fail(&mut self, err: DroverError) -> Option<Result<String, DroverError>> {
        self.state = LoopState::Done;
        Some(Err(err))
    }

    /// Tokens emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

/// Read logits, build the step's candidate list, and apply the policy
///
/// A free function so the immutable borrows of the session and arena end
/// at the call boundary; only the chosen id escapes.
fn select_next<M: ModelApi, S: Sampler>(
    session: &Session<M>,
    arena: &StepArena,
    sampler: &mut S,
    index: usize,
) -> Result<TokenId, DroverError> {
    let logits = session.logits(index)?;
    let candidates = Candidates::from_logits(arena, logits);
    sampler
        .select(candidates.as_slice())
        .ok_or_else(|| DroverError::InvalidLogits("no selectable candidate".into()))
}

impl<M: ModelApi, S: Sampler> Iterator for Pieces<'_, M, S> {
    type Item = Result<String, DroverError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                LoopState::Done => return None,
                LoopState::PromptEval => {
                    if let Err(e) = self.eval_prompt() {
                        return self.fail(e);
                    }
                    self.state = LoopState::Decoding;
                }
                LoopState::Decoding => return self.step(),
            }
        }
    }
}

impl<M: ModelApi, S: Sampler> std::iter::FusedIterator for Pieces<'_, M, S> {}
