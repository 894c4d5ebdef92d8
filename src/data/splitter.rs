// ============================================================
// Layer 4 — Train/Test/Validation Partitioner
// ============================================================
// Splits the index range 0..N into three disjoint subsets that
// together cover every index exactly once:
//
//   |training|   = floor(train_ratio * N)
//   |testing|    = floor(test_ratio  * N)
//   |validation| = N - |training| - |testing|
//
// Validation absorbs the truncation remainder, so the three
// sizes always sum to N. With the default 0.80 / 0.10 ratios:
//
//   N = 100  →  80 / 10 / 10
//   N = 3    →   2 /  0 /  1   (zero-sized testing is allowed)
//
// Assignment is random but seeded: the same (N, ratios, seed)
// always yields the same partition, so experiments can be
// reproduced and audited.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom over a
// StdRng seeded from the pipeline seed.
//
// Reference: rand crate documentation (SeedableRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

/// Smallest N that can be split into three subsets.
pub const MIN_RECORDS: usize = 3;

/// The three disjoint index sets, in draw order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub training:   Vec<usize>,
    pub testing:    Vec<usize>,
    pub validation: Vec<usize>,
}

impl Partition {
    pub fn sizes(&self) -> [usize; 3] {
        [self.training.len(), self.testing.len(), self.validation.len()]
    }
}

/// Check that the ratios describe a valid three-way split.
pub fn validate_ratios(train_ratio: f64, test_ratio: f64) -> Result<(), PipelineError> {
    let train_ok = train_ratio > 0.0 && train_ratio <= 1.0;
    let test_ok  = (0.0..1.0).contains(&test_ratio);
    if !train_ok || !test_ok || train_ratio + test_ratio > 1.0 {
        return Err(PipelineError::InvalidRatios { train: train_ratio, test: test_ratio });
    }
    Ok(())
}

/// Subset sizes for N records: (training, testing, validation).
pub fn split_sizes(n: usize, train_ratio: f64, test_ratio: f64) -> (usize, usize, usize) {
    let train = ((n as f64) * train_ratio).floor() as usize;
    let test  = ((n as f64) * test_ratio).floor() as usize;

    // Guard against ratio rounding pushing the sum past N
    let train = train.min(n);
    let test  = test.min(n - train);

    (train, test, n - train - test)
}

/// Randomly assign indices 0..n to training / testing / validation.
pub fn partition(
    n:           usize,
    train_ratio: f64,
    test_ratio:  f64,
    seed:        u64,
) -> Result<Partition, PipelineError> {
    if n < MIN_RECORDS {
        return Err(PipelineError::TooFewRecords { found: n, required: MIN_RECORDS });
    }
    validate_ratios(train_ratio, test_ratio)?;

    let (train_len, test_len, val_len) = split_sizes(n, train_ratio, test_ratio);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    // split_off(k) leaves [0..k] in place and returns [k..]
    let mut testing    = indices.split_off(train_len);
    let validation     = testing.split_off(test_len);
    let training       = indices;

    if test_len == 0 || val_len == 0 {
        tracing::warn!(
            "Tiny dataset: split sizes {} / {} / {} include an empty subset",
            train_len, test_len, val_len
        );
    }

    tracing::debug!(
        "Partitioned {} records: {} training, {} testing, {} validation (seed {})",
        n, training.len(), testing.len(), validation.len(), seed
    );

    Ok(Partition { training, testing, validation })
}
