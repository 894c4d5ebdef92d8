// ============================================================
// Layer 4 — Batch Scheduler
// ============================================================
// Wraps one split's indices into a restartable producer of
// index batches. Each call to `epoch()` is one full pass.
//
//   Training           → reshuffled at the start of EVERY pass,
//                        from one StdRng owned by the scheduler,
//                        so consecutive epochs see different orders
//   Testing/Validation → always split order, never shuffled
//
// The last batch is kept even when it is short:
//   |split| = 10, batch_size = 4  →  [4, 4, 2]
//
// Batches are produced lazily; only the epoch's index order is
// materialised up front.
//
// Reference: Rust Book §13 (Iterators), rand::seq::SliceRandom

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

/// What a split is used for; decides the shuffling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitRole {
    Training,
    Testing,
    Validation,
}

impl SplitRole {
    pub fn shuffles(&self) -> bool {
        matches!(self, SplitRole::Training)
    }
}

#[derive(Debug, Clone)]
pub struct BatchScheduler {
    indices:    Vec<usize>,
    batch_size: usize,
    /// Present only for the training role
    rng:        Option<StdRng>,
}

impl BatchScheduler {
    pub fn new(
        role:       SplitRole,
        indices:    Vec<usize>,
        batch_size: usize,
        seed:       u64,
    ) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::InvalidBatchSize);
        }
        let rng = role.shuffles().then(|| StdRng::seed_from_u64(seed));
        Ok(Self { indices, batch_size, rng })
    }

    /// Records in the split.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Batches per pass: ceil(len / batch_size).
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    /// Start a new pass over the split.
    pub fn epoch(&mut self) -> EpochBatches {
        let mut order = self.indices.clone();
        if let Some(rng) = self.rng.as_mut() {
            order.shuffle(rng);
        }
        EpochBatches { order, batch_size: self.batch_size, cursor: 0 }
    }
}

/// One pass worth of index batches.
#[derive(Debug)]
pub struct EpochBatches {
    order:      Vec<usize>,
    batch_size: usize,
    cursor:     usize,
}

impl Iterator for EpochBatches {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end   = (self.cursor + self.batch_size).min(self.order.len());
        let batch = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.order.len() - self.cursor).div_ceil(self.batch_size);
        (left, Some(left))
    }
}

impl ExactSizeIterator for EpochBatches {}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_pass_yields_ceil_batches_summing_to_len() {
        for (m, b) in [(80, 16), (81, 16), (10, 16), (1, 1), (33, 5)] {
            let mut s = BatchScheduler::new(SplitRole::Training, (0..m).collect(), b, 3).unwrap();
            let batches: Vec<_> = s.epoch().collect();
            assert_eq!(batches.len(), m.div_ceil(b));
            assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), m);
            assert!(batches[..batches.len() - 1].iter().all(|x| x.len() == b));
            assert!(batches.last().unwrap().len() <= b);
        }
    }

    #[test]
    fn test_short_final_batch_is_kept() {
        let mut s = BatchScheduler::new(SplitRole::Testing, (0..10).collect(), 4, 0).unwrap();
        let sizes: Vec<usize> = s.epoch().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_evaluation_order_is_stable_and_unshuffled() {
        let split = vec![9, 3, 7, 1, 5];
        for role in [SplitRole::Testing, SplitRole::Validation] {
            let mut s = BatchScheduler::new(role, split.clone(), 2, 99).unwrap();
            let first:  Vec<usize> = s.epoch().flatten().collect();
            let second: Vec<usize> = s.epoch().flatten().collect();
            assert_eq!(first, split);
            assert_eq!(second, split);
        }
    }

    #[test]
    fn test_training_reshuffles_each_epoch() {
        let mut s = BatchScheduler::new(SplitRole::Training, (0..200).collect(), 16, 5).unwrap();
        let a: Vec<usize> = s.epoch().flatten().collect();
        let b: Vec<usize> = s.epoch().flatten().collect();
        assert_ne!(a, b);

        // Still a permutation of the split
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_training_order_is_reproducible_from_seed() {
        let mut a = BatchScheduler::new(SplitRole::Training, (0..50).collect(), 8, 11).unwrap();
        let mut b = BatchScheduler::new(SplitRole::Training, (0..50).collect(), 8, 11).unwrap();
        for _ in 0..3 {
            assert_eq!(a.epoch().collect::<Vec<_>>(), b.epoch().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_empty_split_and_zero_batch_size() {
        let mut s = BatchScheduler::new(SplitRole::Validation, vec![], 16, 0).unwrap();
        assert_eq!(s.num_batches(), 0);
        assert_eq!(s.epoch().count(), 0);
        assert!(matches!(
            BatchScheduler::new(SplitRole::Training, vec![1], 0, 0),
            Err(PipelineError::InvalidBatchSize)
        ));
    }

    #[test]
    fn test_size_hint_tracks_remaining_batches() {
        let mut s = BatchScheduler::new(SplitRole::Testing, (0..10).collect(), 4, 0).unwrap();
        let mut it = s.epoch();
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.len(), 2);
    }
}
