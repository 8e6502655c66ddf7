use smallvec::SmallVec;

use crate::error::DroverError;
use crate::token::{Pos, SeqId, TokenId};

/// Default batch capacity in tokens
pub const BATCH_CAPACITY: usize = 512;

/// Per-entry sequence membership; almost always a single sequence
type SeqIdSet = SmallVec<[SeqId; 1]>;

/// Fixed-capacity staging area for the tokens of one evaluation pass
///
/// Stores entries as parallel arrays (token, position, sequence set,
/// logits flag) - the layout an adapter hands to the runtime without
/// copying. Storage is allocated once at construction and reused across
/// iterations: `clear` resets the count, never the allocation, so the
/// decode path performs no per-token allocation.
///
/// Exceeding the capacity fails with [`DroverError::BatchFull`] and
/// leaves the existing contents untouched. Capacity is fixed for the
/// batch's lifetime; running into it is an orchestration bug, not an
/// input condition.
pub struct Batch {
    capacity: usize,
    tokens: Vec<TokenId>,
    positions: Vec<Pos>,
    seq_ids: Vec<SeqIdSet>,
    output: Vec<bool>,
}

impl Batch {
    /// Create a batch with storage for `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tokens: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            seq_ids: Vec::with_capacity(capacity),
            output: Vec::with_capacity(capacity),
        }
    }

    /// Append one entry
    ///
    /// `emit_logits` marks whether the runtime should produce a score
    /// vector for this position.
    pub fn add(
        &mut self,
        token: TokenId,
        pos: Pos,
        seq_ids: &[SeqId],
        emit_logits: bool,
    ) -> Result<(), DroverError> {
        if self.tokens.len() == self.capacity {
            return Err(DroverError::BatchFull {
                capacity: self.capacity,
            });
        }
        self.tokens.push(token);
        self.positions.push(pos);
        self.seq_ids.push(SeqIdSet::from_slice(seq_ids));
        self.output.push(emit_logits);
        Ok(())
    }

    /// Reset the count to zero without releasing storage
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.positions.clear();
        self.seq_ids.clear();
        self.output.clear();
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index of the last entry, the position the loop reads logits for
    pub fn last_index(&self) -> Option<usize> {
        self.tokens.len().checked_sub(1)
    }

    // Read-only views over the parallel arrays, for runtime adapters.

    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn positions(&self) -> &[Pos] {
        &self.positions
    }

    pub fn seq_ids(&self, index: usize) -> &[SeqId] {
        &self.seq_ids[index]
    }

    pub fn output_flags(&self) -> &[bool] {
        &self.output
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(BATCH_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_views() {
        let mut batch = Batch::new(8);
        batch.add(10, 0, &[0], false).unwrap();
        batch.add(11, 1, &[0], true).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.tokens(), &[10, 11]);
        assert_eq!(batch.positions(), &[0, 1]);
        assert_eq!(batch.seq_ids(0), &[0]);
        assert_eq!(batch.output_flags(), &[false, true]);
        assert_eq!(batch.last_index(), Some(1));
    }

    #[test]
    fn test_full_batch_rejects_add_and_keeps_contents() {
        let mut batch = Batch::new(2);
        batch.add(1, 0, &[0], false).unwrap();
        batch.add(2, 1, &[0], true).unwrap();

        let err = batch.add(3, 2, &[0], true).unwrap_err();
        assert!(matches!(err, DroverError::BatchFull { capacity: 2 }));

        // Existing contents are unmodified
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.tokens(), &[1, 2]);
        assert_eq!(batch.positions(), &[0, 1]);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut batch = Batch::new(4);
        batch.add(5, 0, &[0], true).unwrap();
        batch.clear();

        assert!(batch.is_empty());
        assert_eq!(batch.last_index(), None);
        assert_eq!(batch.capacity(), 4);

        // Reusable after clear
        batch.add(6, 1, &[0], true).unwrap();
        assert_eq!(batch.tokens(), &[6]);
    }

    #[test]
    fn test_default_capacity() {
        let batch = Batch::default();
        assert_eq!(batch.capacity(), BATCH_CAPACITY);
        assert!(batch.is_empty());
    }
}
