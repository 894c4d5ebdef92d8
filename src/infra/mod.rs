// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence used by the application layer:
//
//   checkpoint.rs — staged, all-or-nothing save of model
//                   weights, optimiser state, the versioned
//                   trainer snapshot and the metrics history.
//                   Also loads them back for `history` and
//                   `locate`.
//
//   metrics.rs    — optional per-epoch CSV log, appended as
//                   each epoch finishes.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
