// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the annotation CSV to tensor batches:
//
//   waldo.csv
//       │
//       ▼
//   CsvAnnotationLoader → validated Annotation rows
//       │
//       ▼
//   WaldoDataset        → Record Store; opens and transforms
//       │                 images lazily (Transformation)
//       ▼
//   partition           → disjoint train / test / val index sets
//       │
//       ▼
//   BatchScheduler      → per-epoch batch index order
//       │
//       ▼
//   BatchLoader         → fetches records, WaldoBatcher stacks
//                         them into tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads the annotation CSV
pub mod loader;

/// Image resize / normalisation and box scaling
pub mod transform;

/// Implements Burn's Dataset trait over the annotations
pub mod dataset;

/// Seeded train / test / validation partition
pub mod splitter;

/// Batch ordering per split
pub mod scheduler;

/// Implements Burn's Batcher trait and drives one split
pub mod batcher;
