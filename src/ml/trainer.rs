// ============================================================
// Layer 5 — Epoch Loop
// ============================================================
// State machine over one training run:
//
//   Idle ─start()─▶ TrainingEpoch(e) ─▶ EvaluatingEpoch(e) ─┐
//                        ▲                                   │
//                        └──────── e + 1 < epoch_count ──────┘
//                                         │ otherwise
//                                         ▼
//                                     Completed
//
// TrainingEpoch:   every training batch → forward, loss,
//                  backward, per-branch optimiser step
// EvaluatingEpoch: testing then validation batches on
//                  model.valid() (inner backend, no autodiff,
//                  dropout off), forward only
//
// One History entry is appended per epoch. Every configured
// epoch runs; there is no early stopping, no LR schedule and
// no best-checkpoint tracking. The first error aborts the run.
//
// Key Burn insight (same as the training/validation split in
// the loaders):
//   - training batches live on B (Autodiff<...>)
//   - model.valid() returns the model on B::InnerBackend
//   - evaluation loaders therefore batch on B::InnerBackend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{module::AutodiffModule, prelude::*, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};

use crate::data::batcher::BatchLoader;
use crate::domain::{
    error::PipelineError,
    history::{EpochMetrics, History, SplitMetrics},
};
use crate::infra::metrics::MetricsLogger;
use crate::ml::{
    groups::{GroupOptimizers, ParameterGroups},
    model::WaldoModel,
    objective::{BatchStats, Objective},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    TrainingEpoch(usize),
    EvaluatingEpoch(usize),
    Completed,
}

/// The three split loaders the loop consumes.
pub struct SplitLoaders<B: AutodiffBackend> {
    pub training:   BatchLoader<B>,
    pub testing:    BatchLoader<B::InnerBackend>,
    pub validation: BatchLoader<B::InnerBackend>,
}

pub struct Trainer<B: AutodiffBackend, O: Objective<B>> {
    model:            WaldoModel<B>,
    groups:           ParameterGroups,
    optimizers:       GroupOptimizers<B>,
    loaders:          SplitLoaders<B>,
    objective:        O,
    epoch_count:      usize,
    phase:            Phase,
    epochs_completed: usize,
    metrics:          Option<MetricsLogger>,
}

impl<B: AutodiffBackend, O: Objective<B>> Trainer<B, O> {
    /// Assemble a trainer; one optimiser is created per group.
    pub fn new(
        model:       WaldoModel<B>,
        groups:      ParameterGroups,
        loaders:     SplitLoaders<B>,
        objective:   O,
        epoch_count: usize,
    ) -> Result<Self, PipelineError> {
        if loaders.training.scheduler().is_empty() {
            return Err(PipelineError::EmptyTrainingSplit);
        }
        let optimizers = GroupOptimizers::new(&groups)?;
        Ok(Self {
            model,
            groups,
            optimizers,
            loaders,
            objective,
            epoch_count,
            phase: Phase::Idle,
            epochs_completed: 0,
            metrics: None,
        })
    }

    /// Append a CSV row after every epoch.
    pub fn with_metrics_logger(mut self, logger: MetricsLogger) -> Self {
        self.metrics = Some(logger);
        self
    }

    pub fn model(&self) -> &WaldoModel<B> {
        &self.model
    }

    pub fn optimizers(&self) -> &GroupOptimizers<B> {
        &self.optimizers
    }

    pub fn loaders(&self) -> &SplitLoaders<B> {
        &self.loaders
    }

    pub fn groups(&self) -> &ParameterGroups {
        &self.groups
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn epoch_count(&self) -> usize {
        self.epoch_count
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    /// Run every epoch and return the full history.
    pub fn start(&mut self) -> Result<History> {
        if self.phase != Phase::Idle {
            return Err(PipelineError::NotIdle(format!("{:?}", self.phase)).into());
        }

        let mut history = History::new();
        let mut model   = self.model.clone();

        for epoch in 0..self.epoch_count {
            self.phase = Phase::TrainingEpoch(epoch);
            let (trained, train_loss) = self
                .train_epoch(model)
                .with_context(|| format!("Training failed in epoch {epoch}"))?;
            model = trained;

            self.phase = Phase::EvaluatingEpoch(epoch);
            let valid      = model.valid();
            let testing    = evaluate(&mut self.loaders.testing, &valid, &self.objective)
                .with_context(|| format!("Testing failed in epoch {epoch}"))?;
            let validation = evaluate(&mut self.loaders.validation, &valid, &self.objective)
                .with_context(|| format!("Validation failed in epoch {epoch}"))?;

            let entry = EpochMetrics { epoch, train_loss, testing, validation };
            log_epoch(&entry, self.epoch_count);
            if let Some(logger) = &self.metrics {
                logger.log(&entry)?;
            }
            history.push(entry).map_err(anyhow::Error::msg)?;
            self.epochs_completed = epoch + 1;
        }

        self.model = model;
        self.phase = Phase::Completed;
        tracing::info!("Training complete after {} epochs", self.epochs_completed);
        Ok(history)
    }

    fn train_epoch(&mut self, mut model: WaldoModel<B>) -> Result<(WaldoModel<B>, f64)> {
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in self.loaders.training.epoch() {
            let loss = self.objective.loss(&model, batch?);

            let value: f64 = loss.clone().into_scalar().elem::<f64>();
            if !value.is_finite() {
                tracing::warn!("Non-finite training loss in batch {}", batches);
            }
            loss_sum += value;
            batches  += 1;

            // Backward pass + one AdamW update per branch
            model = self.optimizers.step(model, loss.backward());
        }

        if batches == 0 {
            return Err(PipelineError::EmptyTrainingSplit.into());
        }
        Ok((model, loss_sum / batches as f64))
    }
}

fn evaluate<B: AutodiffBackend, O: Objective<B>>(
    loader:    &mut BatchLoader<B::InnerBackend>,
    model:     &WaldoModel<B::InnerBackend>,
    objective: &O,
) -> Result<SplitMetrics> {
    let mut stats = BatchStats::default();
    for batch in loader.epoch() {
        stats.merge(objective.evaluate(model, batch?));
    }
    Ok(stats.finish())
}

fn log_epoch(m: &EpochMetrics, total: usize) {
    let fmt = |v: Option<f64>| v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "-".into());
    tracing::info!(
        "Epoch {:>3}/{} | train_loss={:.4} | test_loss={} acc={} iou={} | val_loss={} acc={} iou={}",
        m.epoch + 1, total, m.train_loss,
        fmt(m.testing.loss), fmt(m.testing.accuracy), fmt(m.testing.mean_iou),
        fmt(m.validation.loss), fmt(m.validation.accuracy), fmt(m.validation.mean_iou),
    );
}
