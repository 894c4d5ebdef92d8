// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists a finished run into an EXISTING state directory:
//
//   state/
//     model.mpk                       ← weights (full precision,
//                                       keyed by module param names)
//     optimizer-classification.mpk    ← AdamW state, one per group
//     optimizer-box.mpk
//     optimizer-base.mpk
//     optimizer-dense.mpk
//     trainer.json                    ← versioned TrainerSnapshot
//     history.json                    ← per-epoch metrics
//
// Writes are staged:
//   1. everything is written into state/.staging/
//   2. the live artifacts of the same names are moved aside
//      into state/.previous/
//   3. the staged artifacts are renamed into state/
//   4. .previous/ and .staging/ are removed
//
// A failure in step 1 never touches state/. A failure in
// step 2 or 3 undoes the renames already made and restores
// the previous set, so old and new artifacts never get mixed.
//
// The trainer snapshot is plain JSON with a schema version,
// independent of the in-memory Trainer layout.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::domain::{
    component::Component,
    error::PipelineError,
    history::History,
    record::LabelMap,
};
use crate::ml::{
    groups::ParameterGroups,
    model::{WaldoModel, WaldoModelConfig},
    objective::Objective,
    trainer::Trainer,
};

/// Current trainer.json schema.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Weights and optimiser records are stored without precision loss.
pub type StateRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

const STAGING_DIR:   &str = ".staging";
const BACKUP_DIR:    &str = ".previous";
const MODEL_STEM:    &str = "model";
const TRAINER_FILE:  &str = "trainer.json";
const HISTORY_FILE:  &str = "history.json";

/// Facts about the run that the Trainer itself does not own.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub seed:        u64,
    pub batch_size:  usize,
    pub split_sizes: [usize; 3],
    pub model:       WaldoModelConfig,
    pub image_size:  u32,
    pub labels:      LabelMap,
}

/// Resumable trainer state, serialised as trainer.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerSnapshot {
    pub version:          u32,
    pub epochs_completed: usize,
    pub epoch_count:      usize,
    pub seed:             u64,
    pub batch_size:       usize,
    /// training / testing / validation
    pub split_sizes:      [usize; 3],
    pub groups:           ParameterGroups,
    pub model:            WaldoModelConfig,
    pub image_size:       u32,
    pub labels:           LabelMap,
    /// Record file stem per optimiser group
    pub optimizer_files:  BTreeMap<Component, String>,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// The directory is NOT created here; it must already exist
    /// when `save` runs.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the full checkpoint set for a completed run.
    pub fn save<B: AutodiffBackend, O: Objective<B>>(
        &self,
        trainer: &Trainer<B, O>,
        meta:    RunMetadata,
        history: &History,
    ) -> Result<TrainerSnapshot> {
        if !self.dir.is_dir() {
            return Err(PipelineError::OutputDirMissing(self.dir.clone()).into());
        }

        let staging = self.dir.join(STAGING_DIR);
        if staging.exists() {
            tracing::warn!("Removing stale staging directory '{}'", staging.display());
            fs::remove_dir_all(&staging)
                .with_context(|| format!("Cannot clear '{}'", staging.display()))?;
        }
        fs::create_dir(&staging)
            .with_context(|| format!("Cannot create '{}'", staging.display()))?;

        let staged = self.write_artifacts(&staging, trainer, meta, history);
        let snapshot = match staged {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Nothing has touched the live directory yet
                fs::remove_dir_all(&staging).ok();
                return Err(e);
            }
        };

        if let Err(e) = self.commit(&staging, |from, to| fs::rename(from, to)) {
            fs::remove_dir_all(&staging).ok();
            return Err(e);
        }
        tracing::info!("Checkpoint written to '{}'", self.dir.display());
        Ok(snapshot)
    }

    fn write_artifacts<B: AutodiffBackend, O: Objective<B>>(
        &self,
        staging: &Path,
        trainer: &Trainer<B, O>,
        meta:    RunMetadata,
        history: &History,
    ) -> Result<TrainerSnapshot> {
        // Model weights — the recorder appends its own extension
        let model_path = staging.join(MODEL_STEM);
        StateRecorder::new()
            .record(trainer.model().clone().into_record(), model_path.clone())
            .map_err(|e| persistence(&model_path, e))?;

        let optimizer_files = trainer.optimizers().save(staging)?;

        let snapshot = TrainerSnapshot {
            version:          SNAPSHOT_VERSION,
            epochs_completed: trainer.epochs_completed(),
            epoch_count:      trainer.epoch_count(),
            seed:             meta.seed,
            batch_size:       meta.batch_size,
            split_sizes:      meta.split_sizes,
            groups:           trainer.groups().clone(),
            model:            meta.model,
            image_size:       meta.image_size,
            labels:           meta.labels,
            optimizer_files,
        };
        write_json(&staging.join(TRAINER_FILE), &snapshot)?;
        write_json(&staging.join(HISTORY_FILE), history)?;

        Ok(snapshot)
    }

    /// Swap every staged artifact into the state directory,
    /// restoring the previous set if any rename fails.
    fn commit(
        &self,
        staging:    &Path,
        mut rename: impl FnMut(&Path, &Path) -> io::Result<()>,
    ) -> Result<()> {
        let backup = self.dir.join(BACKUP_DIR);
        if backup.exists() {
            fs::remove_dir_all(&backup)
                .with_context(|| format!("Cannot clear '{}'", backup.display()))?;
        }
        fs::create_dir(&backup)
            .with_context(|| format!("Cannot create '{}'", backup.display()))?;

        let mut names = Vec::new();
        for entry in fs::read_dir(staging)
            .with_context(|| format!("Cannot read '{}'", staging.display()))?
        {
            names.push(entry?.file_name());
        }

        let mut displaced: Vec<&OsString> = Vec::new();
        let mut placed:    Vec<&OsString> = Vec::new();
        let mut swap = || -> Result<()> {
            for name in &names {
                let live = self.dir.join(name);
                if live.symlink_metadata().is_ok() {
                    rename(&live, &backup.join(name)).map_err(|e| persistence(&live, e))?;
                    displaced.push(name);
                }
            }
            for name in &names {
                let target = self.dir.join(name);
                rename(&staging.join(name), &target).map_err(|e| persistence(&target, e))?;
                placed.push(name);
                tracing::debug!("Committed '{}'", target.display());
            }
            Ok(())
        };

        if let Err(e) = swap() {
            tracing::warn!("Checkpoint commit failed, restoring previous artifacts: {e}");
            self.rollback(&backup, &placed, &displaced);
            return Err(e);
        }

        fs::remove_dir_all(&backup)
            .with_context(|| format!("Cannot remove '{}'", backup.display()))?;
        fs::remove_dir_all(staging)
            .with_context(|| format!("Cannot remove '{}'", staging.display()))?;
        Ok(())
    }

    /// Best effort: drop what was placed, move the old set back.
    fn rollback(&self, backup: &Path, placed: &[&OsString], displaced: &[&OsString]) {
        for name in placed {
            let live = self.dir.join(name);
            let removed = if live.is_dir() { fs::remove_dir_all(&live) } else { fs::remove_file(&live) };
            if let Err(e) = removed {
                tracing::error!("Cannot remove '{}' during rollback: {e}", live.display());
            }
        }
        for name in displaced {
            let live = self.dir.join(name);
            if let Err(e) = fs::rename(backup.join(name), &live) {
                tracing::error!("Cannot restore '{}': {e}", live.display());
            }
        }
        fs::remove_dir_all(backup).ok();
    }

    pub fn load_snapshot(&self) -> Result<TrainerSnapshot> {
        let path = self.dir.join(TRAINER_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read '{}'. Have you run 'train' first?", path.display())
        })?;
        let snapshot: TrainerSnapshot = serde_json::from_str(&json)
            .with_context(|| format!("Malformed trainer state '{}'", path.display()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PipelineError::UnsupportedStateVersion {
                found:    snapshot.version,
                expected: SNAPSHOT_VERSION,
            }
            .into());
        }
        Ok(snapshot)
    }

    pub fn load_history(&self) -> Result<History> {
        let path = self.dir.join(HISTORY_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Rebuild the architecture from the snapshot, then restore
    /// the saved weights into it.
    pub fn load_model<B: Backend>(
        &self,
        snapshot: &TrainerSnapshot,
        device:   &B::Device,
    ) -> Result<WaldoModel<B>> {
        let path   = self.dir.join(MODEL_STEM);
        let record = StateRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load model weights from '{}'", path.display()))?;
        Ok(snapshot.model.init::<B>(device).load_record(record))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| persistence(path, e))?;
    tracing::debug!("Wrote '{}'", path.display());
    Ok(())
}

fn persistence(path: &Path, e: impl std::fmt::Display) -> anyhow::Error {
    PipelineError::Persistence { path: path.to_path_buf(), reason: e.to_string() }.into()
}
