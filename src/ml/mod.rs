// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model, optimiser and training code lives here.
// The domain layer never imports burn; the data layer only
// touches it for Dataset / Batcher.
//
// What's in this layer:
//
//   model.rs      — base → dense → {classification, bbox}
//                   localisation network
//
//   objective.rs  — loss + evaluation statistics, behind the
//                   Objective trait so the loop can be tested
//                   with a stub
//
//   groups.rs     — Parameter Group Builder and one AdamW
//                   optimiser per component
//
//   trainer.rs    — Epoch Loop state machine
//                   Idle → TrainingEpoch → EvaluatingEpoch
//                        → … → Completed
//
//   device.rs     — compile-time backend, runtime device
//
//   inferencer.rs — single-image prediction from a checkpoint
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Localisation network architecture
pub mod model;

/// Loss and evaluation metrics
pub mod objective;

/// Per-component parameter groups and optimisers
pub mod groups;

/// Epoch loop over train / test / validation
pub mod trainer;

/// Backend aliases and device selection
pub mod device;

/// Loads a checkpoint and locates the target in one image
pub mod inferencer;
