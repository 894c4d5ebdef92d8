// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The orchestration layer only needs narrow capabilities from
// its collaborators. Programming against these traits keeps
// the CSV format, the image pipeline and the model layout
// replaceable.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::{component::Component, record::Annotation};

// ─── AnnotationSource ─────────────────────────────────────────────────────────
/// Anything that can produce the annotation table.
///
/// Implementations:
///   - CsvAnnotationLoader → reads waldo.csv
pub trait AnnotationSource {
    /// Load every annotation row, in file order.
    fn load_all(&self) -> Result<Vec<Annotation>>;
}

// ─── Branched ─────────────────────────────────────────────────────────────────
/// A model made of named trainable sub-components.
///
/// The parameter group builder reads this to decide which
/// policy applies to which weights.
pub trait Branched {
    /// Every named branch with its trainable parameter count.
    fn branches(&self) -> Vec<(Component, usize)>;

    /// Total trainable parameters of the whole model.
    fn total_params(&self) -> usize;
}
