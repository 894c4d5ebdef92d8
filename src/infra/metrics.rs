// ============================================================
// Layer 6 — Metrics CSV Logger
// ============================================================
// Appends one row per finished epoch so a run can be followed
// (or plotted) while it is still going:
//
//   epoch,train_loss,test_loss,test_accuracy,test_iou,val_loss,val_accuracy,val_iou
//   0,1.912300,1.850100,0.500000,0.112000,1.861200,0.400000,0.098000
//
// Empty evaluation splits leave their cells blank.
//
// How to read it:
//   - train_loss should fall epoch over epoch
//   - val_loss rising while train_loss falls → overfitting
//     (training still runs every configured epoch)
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use crate::domain::history::EpochMetrics;

const HEADER: &str = "epoch,train_loss,test_loss,test_accuracy,test_iou,val_loss,val_accuracy,val_iou";

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header if the file is new; an existing file
    /// is appended to.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = path.into();

        if let Some(parent) = csv_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{},{},{},{},{},{}",
            m.epoch,
            m.train_loss,
            cell(m.testing.loss),
            cell(m.testing.accuracy),
            cell(m.testing.mean_iou),
            cell(m.validation.loss),
            cell(m.validation.accuracy),
            cell(m.validation.mean_iou),
        )?;

        tracing::debug!("Logged epoch {} to '{}'", m.epoch, self.csv_path.display());
        Ok(())
    }
}

fn cell(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::SplitMetrics;
    use tempfile::tempdir;

    fn metrics(epoch: usize) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_loss: 1.5,
            testing:    SplitMetrics { samples: 2, loss: Some(1.25), accuracy: Some(0.5), mean_iou: Some(0.25) },
            validation: SplitMetrics::default(),
        }
    }

    #[test]
    fn test_header_once_and_rows_appended() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("logs/metrics.csv");

        let logger = MetricsLogger::new(&path).unwrap();
        logger.log(&metrics(0)).unwrap();

        // A second logger on the same file must not repeat the header
        MetricsLogger::new(&path).unwrap().log(&metrics(1)).unwrap();

        let text  = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "0,1.500000,1.250000,0.500000,0.250000,,,");
        assert!(lines[2].starts_with("1,"));
    }
}
