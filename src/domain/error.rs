// ============================================================
// Layer 3 — Pipeline Error Taxonomy
// ============================================================
// Three classes of failure, all fatal, none retried:
//
//   configuration — bad inputs detected before or while the
//                   pipeline is assembled
//   compute       — failures while batches are flowing
//   persistence   — failures writing the checkpoint
//
// Application code wraps these in anyhow with context; the
// typed enum lets tests assert on the exact failure.
//
// Reference: thiserror documentation, Rust Book §9

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::component::Component;

#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Configuration ────────────────────────────────────────
    #[error("annotation source '{0}' contains no records")]
    EmptyAnnotations(String),

    #[error("invalid annotation at row {row}: {reason}")]
    InvalidAnnotation { row: usize, reason: String },

    #[error("cannot split {found} records into three subsets (need at least {required})")]
    TooFewRecords { found: usize, required: usize },

    #[error("invalid split ratios: train={train}, test={test}")]
    InvalidRatios { train: f64, test: f64 },

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("training split is empty; nothing to optimise")]
    EmptyTrainingSplit,

    #[error("model component '{0}' has no optimiser policy")]
    MissingPolicy(Component),

    #[error("a policy names component '{0}' but the model does not expose it")]
    MissingComponent(Component),

    #[error("output directory '{0}' does not exist")]
    OutputDirMissing(PathBuf),

    #[error("trainer state version {found} is not supported (expected {expected})")]
    UnsupportedStateVersion { found: u32, expected: u32 },

    // ── Compute ──────────────────────────────────────────────
    #[error("record {0} could not be loaded")]
    RecordUnavailable(usize),

    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    #[error("trainer can only start from Idle, but it is in {0}")]
    NotIdle(String),

    // ── Persistence ──────────────────────────────────────────
    #[error("failed to write '{path}': {reason}")]
    Persistence { path: PathBuf, reason: String },
}
