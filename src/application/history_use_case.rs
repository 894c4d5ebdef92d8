// ============================================================
// Layer 2 — History Use Case
// ============================================================
// Reads a finished run back from its state directory and
// renders the per-epoch metrics as a plain-text table.
//
// The "best" epoch (lowest validation loss) is reported only;
// training itself never selects or restores a best model.

use anyhow::Result;
use std::fmt::Write;

use crate::domain::history::{History, SplitMetrics};
use crate::infra::checkpoint::{CheckpointManager, TrainerSnapshot};

pub struct HistoryReport {
    pub snapshot: TrainerSnapshot,
    pub history:  History,
}

pub struct HistoryUseCase {
    ckpt: CheckpointManager,
}

impl HistoryUseCase {
    pub fn new(state_dir: impl Into<std::path::PathBuf>) -> Self {
        Self { ckpt: CheckpointManager::new(state_dir) }
    }

    pub fn load(&self) -> Result<HistoryReport> {
        let snapshot = self.ckpt.load_snapshot()?;
        let history  = self.ckpt.load_history()?;
        if history.len() != snapshot.epochs_completed {
            tracing::warn!(
                "history.json has {} entries but trainer.json reports {} epochs",
                history.len(),
                snapshot.epochs_completed
            );
        }
        Ok(HistoryReport { snapshot, history })
    }
}

impl HistoryReport {
    pub fn render(&self) -> String {
        let s = &self.snapshot;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Run: {}/{} epochs, seed {}, batch {}, split {} / {} / {}",
            s.epochs_completed, s.epoch_count, s.seed, s.batch_size,
            s.split_sizes[0], s.split_sizes[1], s.split_sizes[2],
        );
        out.push_str(&render_table(&self.history));
        match self.history.best_validation_epoch() {
            Some(best) => {
                let _ = writeln!(
                    out,
                    "Lowest validation loss: epoch {} ({:.4})",
                    best.epoch,
                    best.validation.loss.unwrap_or_default(),
                );
            }
            None => out.push_str("No validation loss recorded\n"),
        }
        out
    }
}

/// One row per epoch; "-" marks a metric of an empty split.
pub fn render_table(history: &History) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:>10}  {:>10}  {:>8}  {:>8}  {:>10}  {:>8}  {:>8}",
        "epoch", "train", "test", "test_acc", "test_iou", "val", "val_acc", "val_iou",
    );
    for e in history.entries() {
        let [tl, ta, ti] = cells(&e.testing);
        let [vl, va, vi] = cells(&e.validation);
        let _ = writeln!(
            out,
            "{:>5}  {:>10.4}  {:>10}  {:>8}  {:>8}  {:>10}  {:>8}  {:>8}",
            e.epoch, e.train_loss, tl, ta, ti, vl, va, vi,
        );
    }
    out
}

fn cells(m: &SplitMetrics) -> [String; 3] {
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    [fmt(m.loss), fmt(m.accuracy), fmt(m.mean_iou)]
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::EpochMetrics;

    fn history() -> History {
        let mut h = History::new();
        for (epoch, val) in [(0, Some(0.9)), (1, Some(0.4)), (2, Some(0.6))] {
            h.push(EpochMetrics {
                epoch,
                train_loss: 1.0 / (epoch + 1) as f64,
                testing:    SplitMetrics::default(),
                validation: SplitMetrics { samples: 3, loss: val, accuracy: Some(0.5), mean_iou: Some(0.25) },
            })
            .unwrap();
        }
        h
    }

    #[test]
    fn test_table_has_header_and_one_row_per_epoch() {
        let table = render_table(&history());
        assert_eq!(table.lines().count(), 4);
        assert!(table.lines().next().unwrap().contains("val_iou"));
    }

    #[test]
    fn test_empty_split_renders_dashes() {
        let table = render_table(&history());
        let row   = table.lines().nth(1).unwrap();
        assert!(row.contains(" - "));
        assert!(row.contains("0.9000"));
    }

    #[test]
    fn test_missing_state_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let uc  = HistoryUseCase::new(dir.path().join("nope"));
        assert!(uc.load().is_err());
    }
}
