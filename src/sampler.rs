//! Next-token selection over one evaluation's score vector
//!
//! The loop's contract with a sampler is "score vector in, token id out":
//! candidates are built once per step from the raw logits, the policy
//! picks one, and the candidate array dies with the step. [`Greedy`] is
//! the only policy in this crate; stochastic policies (top-k, top-p,
//! temperature) slot in behind [`Sampler`] without touching the loop,
//! seeded from the session's `ContextParams`.

use crate::arena::StepArena;
use crate::token::TokenId;

/// One vocabulary entry under consideration for the next token
///
/// `p` is only populated by policies that normalize the distribution;
/// greedy selection leaves it at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Candidate {
    pub id: TokenId,
    pub logit: f32,
    pub p: f32,
}

/// Arena-backed candidate array for one decoding step
///
/// Built from a score vector in a single pass; the backing memory comes
/// from the step arena and is released when the arena resets.
pub struct Candidates<'a> {
    items: &'a mut [Candidate],
}

impl<'a> Candidates<'a> {
    /// Build the candidate list, one entry per vocabulary id
    pub fn from_logits(arena: &'a StepArena, logits: &[f32]) -> Self {
        let items = arena.alloc_slice::<Candidate>(logits.len());
        for (id, (slot, &logit)) in items.iter_mut().zip(logits.iter()).enumerate() {
            *slot = Candidate {
                id: id as TokenId,
                logit,
                p: 0.0,
            };
        }
        Candidates { items }
    }

    pub fn as_slice(&self) -> &[Candidate] {
        self.items
    }

    /// Mutable access for policies that rewrite scores in place
    pub fn as_mut_slice(&mut self) -> &mut [Candidate] {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A next-token selection policy
pub trait Sampler {
    fn name(&self) -> &str;

    /// Pick the next token from the candidate list
    ///
    /// Returns `None` when no candidate is selectable (empty list, or
    /// every score is NaN).
    fn select(&mut self, candidates: &[Candidate]) -> Option<TokenId>;
}

/// Greedy policy: the candidate with the maximum logit
///
/// Ties break to the lowest id - the strict comparison keeps the
/// first-seen maximum while scanning ids in increasing order, so
/// selection is deterministic. One full scan of the vocabulary per call.
#[derive(Debug, Default)]
pub struct Greedy;

impl Greedy {
    pub fn new() -> Self {
        Self
    }
}

impl Sampler for Greedy {
    fn name(&self) -> &str {
        "greedy"
    }

    fn select(&mut self, candidates: &[Candidate]) -> Option<TokenId> {
        let mut best: Option<TokenId> = None;
        let mut best_logit = f32::NEG_INFINITY;
        for c in candidates {
            if c.logit.is_nan() {
                continue;
            }
            if best.is_none() || c.logit > best_logit {
                best_logit = c.logit;
                best = Some(c.id);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_from_logits() {
        let arena = StepArena::default();
        let candidates = Candidates::from_logits(&arena, &[0.5, -1.0, 2.0]);

        assert_eq!(candidates.len(), 3);
        let items = candidates.as_slice();
        assert_eq!(items[0], Candidate { id: 0, logit: 0.5, p: 0.0 });
        assert_eq!(items[2].id, 2);
        assert_eq!(items[2].logit, 2.0);
    }

    #[test]
    fn test_greedy_picks_maximum() {
        let arena = StepArena::default();
        let candidates = Candidates::from_logits(&arena, &[0.1, 3.0, 2.9, -5.0]);
        assert_eq!(Greedy::new().select(candidates.as_slice()), Some(1));
    }

    #[test]
    fn test_greedy_tie_breaks_to_lowest_id() {
        // Equal maxima at ids 5 and 9: must return 5
        let mut logits = vec![0.0f32; 12];
        logits[5] = 7.0;
        logits[9] = 7.0;

        let arena = StepArena::default();
        let candidates = Candidates::from_logits(&arena, &logits);
        assert_eq!(Greedy::new().select(candidates.as_slice()), Some(5));
    }

    #[test]
    fn test_greedy_skips_nan() {
        let arena = StepArena::default();
        let candidates = Candidates::from_logits(&arena, &[f32::NAN, 1.0, 0.5]);
        assert_eq!(Greedy::new().select(candidates.as_slice()), Some(1));
    }

    #[test]
    fn test_greedy_negative_infinity_floor() {
        // All-minus-infinity still selects the first id deterministically
        let arena = StepArena::default();
        let candidates =
            Candidates::from_logits(&arena, &[f32::NEG_INFINITY, f32::NEG_INFINITY]);
        assert_eq!(Greedy::new().select(candidates.as_slice()), Some(0));
    }

    #[test]
    fn test_greedy_empty_is_none() {
        assert_eq!(Greedy::new().select(&[]), None);
    }

    #[test]
    fn test_candidate_array_scoped_to_step() {
        // After a reset the arena serves the next step from the start
        let mut arena = StepArena::default();
        {
            let candidates = Candidates::from_logits(&arena, &[1.0, 2.0]);
            assert_eq!(candidates.len(), 2);
        }
        arena.reset();
        let next = Candidates::from_logits(&arena, &[3.0]);
        assert_eq!(next.as_slice()[0].logit, 3.0);
    }
}
