//! Deterministic in-process runtime for driving the loop in tests
//!
//! [`MockModel`] implements the capability traits over a byte-level
//! vocabulary: ids `0..=255` are the single byte of the same value and
//! id 256 is the end-of-generation token. Tokenization is the identity
//! over the input's bytes, so `detokenize(tokenize(text))` reconstructs
//! ASCII text exactly. Score vectors come from a script consumed one
//! vector per decode; when the script runs out, every subsequent vector
//! peaks at the end-of-generation token. Each decode is recorded so tests
//! can assert the exact entries (token, position, sequence, logits flag)
//! the driver submitted.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::batch::Batch;
use crate::error::DroverError;
use crate::runtime::{ContextParams, EvalContext, ModelApi, TokenizeOptions};
use crate::token::{PieceBuffer, Pos, SeqId, TokenBuffer, TokenId};

/// Vocabulary size of the mock: 256 byte tokens plus the EOG token
pub const MOCK_N_VOCAB: usize = 257;

/// The mock's designated end-of-generation token
pub const MOCK_EOG: TokenId = 256;

/// One batch entry as seen by the mock runtime during a decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluated {
    pub token: TokenId,
    pub pos: Pos,
    pub seq: SeqId,
    pub output: bool,
}

/// Scripted mock model
pub struct MockModel {
    script: Vec<Vec<f32>>,
    fail_decodes: bool,
    log: Arc<Mutex<Vec<Evaluated>>>,
}

impl MockModel {
    /// A mock whose every score vector peaks at the EOG token
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    /// A mock that serves the given score vectors, one per decode call
    pub fn with_script(script: Vec<Vec<f32>>) -> Self {
        Self {
            script,
            fail_decodes: false,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock whose contexts fail every decode
    pub fn failing() -> Self {
        Self {
            script: Vec::new(),
            fail_decodes: true,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A score vector of [`MOCK_N_VOCAB`] entries peaking at `id`
    pub fn peak(id: TokenId) -> Vec<f32> {
        let mut scores = vec![0.0f32; MOCK_N_VOCAB];
        scores[id as usize] = 10.0;
        scores
    }

    /// Every entry submitted across all decodes, in submission order
    pub fn evaluated(&self) -> Vec<Evaluated> {
        lock_log(&self.log).clone()
    }

    /// Forget everything recorded so far
    pub fn clear_log(&self) {
        lock_log(&self.log).clear();
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_log(log: &Mutex<Vec<Evaluated>>) -> MutexGuard<'_, Vec<Evaluated>> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ModelApi for MockModel {
    type Context = MockContext;

    fn new_context(&self, params: &ContextParams) -> Result<Self::Context, DroverError> {
        if params.n_ctx == 0 {
            return Err(DroverError::ContextCreationFailed(
                "n_ctx must be nonzero".into(),
            ));
        }
        Ok(MockContext {
            script: VecDeque::from(self.script.clone()),
            current: Vec::new(),
            output_flags: Vec::new(),
            fail_decodes: self.fail_decodes,
            log: Arc::clone(&self.log),
        })
    }

    fn tokenize(
        &self,
        text: &str,
        max_tokens: usize,
        _opts: TokenizeOptions,
    ) -> Result<TokenBuffer, DroverError> {
        // Byte-level vocabulary has no special tokens; the flags are
        // accepted and ignored.
        let bytes = text.as_bytes();
        if bytes.len() > max_tokens {
            return Err(DroverError::TokenizationOverflow {
                required: bytes.len(),
            });
        }
        Ok(bytes.iter().map(|&b| b as TokenId).collect())
    }

    fn token_piece(&self, token: TokenId, out: &mut PieceBuffer) {
        if (0..256).contains(&token) {
            out.set(&[token as u8]);
        } else {
            out.set(b"");
        }
    }

    fn is_eog(&self, token: TokenId) -> bool {
        token == MOCK_EOG
    }

    fn n_vocab(&self) -> usize {
        MOCK_N_VOCAB
    }

    fn runtime_info(&self) -> String {
        format!("mock runtime: byte vocabulary ({MOCK_N_VOCAB} entries), scripted scores")
    }
}

/// Evaluation context produced by [`MockModel`]
pub struct MockContext {
    script: VecDeque<Vec<f32>>,
    current: Vec<f32>,
    output_flags: Vec<bool>,
    fail_decodes: bool,
    log: Arc<Mutex<Vec<Evaluated>>>,
}

impl EvalContext for MockContext {
    fn decode(&mut self, batch: &Batch) -> Result<(), DroverError> {
        if self.fail_decodes {
            return Err(DroverError::DecodeFailed("scripted decode failure".into()));
        }

        {
            let mut log = lock_log(&self.log);
            for i in 0..batch.len() {
                log.push(Evaluated {
                    token: batch.tokens()[i],
                    pos: batch.positions()[i],
                    seq: batch.seq_ids(i).first().copied().unwrap_or(0),
                    output: batch.output_flags()[i],
                });
            }
        }

        self.output_flags = batch.output_flags().to_vec();
        self.current = self
            .script
            .pop_front()
            .unwrap_or_else(|| MockModel::peak(MOCK_EOG));
        Ok(())
    }

    fn logits(&self, index: usize) -> Result<&[f32], DroverError> {
        match self.output_flags.get(index) {
            Some(true) => Ok(&self.current),
            Some(false) => Err(DroverError::InvalidLogits(format!(
                "index {index} did not request logits"
            ))),
            None => Err(DroverError::InvalidLogits(format!(
                "index {index} out of range for last batch"
            ))),
        }
    }
}
