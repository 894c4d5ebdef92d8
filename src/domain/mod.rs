// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define what the trainer
// works with: annotations, boxes, model branches, per-epoch
// history, and the error taxonomy.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Keeping this layer pure means the split/batch/history logic
// can be tested without a backend or a GPU.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// One annotated image and its ground-truth box
pub mod record;

// Named model branches and their optimiser policies
pub mod component;

// Append-only per-epoch metrics
pub mod history;

// Configuration / compute / persistence error taxonomy
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
