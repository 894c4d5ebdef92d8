// ============================================================
// Layer 3 — Training History
// ============================================================
// One EpochMetrics entry is appended after every completed
// epoch. Entries are never reordered or edited after append;
// History only exposes read access plus `push`, which checks
// that epoch indices stay 0, 1, 2, ... in order.
//
// Evaluation splits may legitimately be empty (tiny datasets
// with floor-based split sizes), so their loss/accuracy/IoU
// are Option — None means "no samples", not "zero".
//
// Reference: Rust Book §8 (Vectors), serde documentation

use serde::{Deserialize, Serialize};

/// Metrics for one evaluation split over one epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    /// Number of records evaluated
    pub samples: usize,

    /// Mean of the per-batch losses
    pub loss: Option<f64>,

    /// Fraction of records whose predicted class is correct
    pub accuracy: Option<f64>,

    /// Mean IoU between predicted and ground-truth boxes
    pub mean_iou: Option<f64>,
}

/// One row of history: everything measured in one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Zero-based epoch index
    pub epoch: usize,

    /// Mean of the per-batch training losses
    pub train_loss: f64,

    pub testing: SplitMetrics,

    pub validation: SplitMetrics,
}

/// Append-only, ordered record of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<EpochMetrics>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next epoch. The entry's index must equal the
    /// number of entries already recorded.
    pub fn push(&mut self, entry: EpochMetrics) -> Result<(), String> {
        if entry.epoch != self.entries.len() {
            return Err(format!(
                "history expects epoch {} next, got {}",
                self.entries.len(),
                entry.epoch
            ));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[EpochMetrics] {
        &self.entries
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.entries.last()
    }

    /// Epoch with the lowest validation loss, for reporting only.
    pub fn best_validation_epoch(&self) -> Option<&EpochMetrics> {
        self.entries
            .iter()
            .filter_map(|e| e.validation.loss.map(|l| (l, e)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, e)| e)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(epoch: usize, val_loss: Option<f64>) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: 1.0,
            testing:    SplitMetrics::default(),
            validation: SplitMetrics { samples: 4, loss: val_loss, accuracy: None, mean_iou: None },
        }
    }

    #[test]
    fn test_push_enforces_ascending_epochs() {
        let mut h = History::new();
        assert!(h.push(entry(0, None)).is_ok());
        assert!(h.push(entry(2, None)).is_err());
        assert!(h.push(entry(1, None)).is_ok());
        assert_eq!(h.len(), 2);
        assert_eq!(h.last().unwrap().epoch, 1);
    }

    #[test]
    fn test_best_validation_epoch_skips_empty_splits() {
        let mut h = History::new();
        h.push(entry(0, Some(0.9))).unwrap();
        h.push(entry(1, None)).unwrap();
        h.push(entry(2, Some(0.4))).unwrap();
        h.push(entry(3, Some(0.6))).unwrap();
        assert_eq!(h.best_validation_epoch().unwrap().epoch, 2);
    }

    #[test]
    fn test_serialises_as_plain_sequence() {
        let mut h = History::new();
        h.push(entry(0, Some(0.5))).unwrap();
        let json = serde_json::to_string(&h).unwrap();
        assert!(json.starts_with('['));
        let back: History = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
