// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Check the state directory  (Layer 6 - infra)
//   Step 2: Load annotation CSV        (Layer 4 - data)
//   Step 3: Build the Record Store     (Layer 4 - data)
//   Step 4: Select the device          (Layer 5 - ml)
//   Step 5: Partition + schedulers     (Layer 4 - data)
//   Step 6: Model + parameter groups   (Layer 5 - ml)
//   Step 7: Run the epoch loop         (Layer 5 - ml)
//   Step 8: Save the checkpoint set    (Layer 6 - infra)
//
// Steps 5–7 live in `run_pipeline`, generic over backend and
// objective, so they run in tests on in-memory records.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{Context, Result};
use std::{collections::BTreeMap, fs, path::Path, sync::Arc};
use burn::{data::dataset::Dataset, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::BatchLoader,
    dataset::{WaldoDataset, WaldoItem},
    loader::CsvAnnotationLoader,
    scheduler::{BatchScheduler, SplitRole},
    splitter::{partition, validate_ratios, Partition},
    transform::Transformation,
};
use crate::domain::{
    component::{default_group_policies, Component, GroupPolicy},
    error::PipelineError,
    history::History,
    traits::AnnotationSource,
};
use crate::infra::{
    checkpoint::{CheckpointManager, RunMetadata},
    metrics::MetricsLogger,
};
use crate::ml::{
    device::{select_device, TrainBackend},
    groups::build_parameter_groups,
    model::WaldoModelConfig,
    objective::{DetectionObjective, Objective},
    trainer::{SplitLoaders, Trainer},
};

// ─── Pipeline Configuration ──────────────────────────────────────────────────
// Everything that shapes the split, the batches and the optimisers.
// Built once, validated once, then only borrowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub train_ratio:    f64,
    pub test_ratio:     f64,
    pub batch_size:     usize,
    pub epoch_count:    usize,
    pub seed:           u64,
    pub group_policies: BTreeMap<Component, GroupPolicy>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            train_ratio:    0.80,
            test_ratio:     0.10,
            batch_size:     16,
            epoch_count:    15,
            seed:           0,
            group_policies: default_group_policies(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_ratios(self.train_ratio, self.test_ratio)?;
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidBatchSize);
        }
        for component in Component::ALL {
            if !self.group_policies.contains_key(&component) {
                return Err(PipelineError::MissingPolicy(component));
            }
        }
        Ok(())
    }

    /// Seed for the training scheduler. Distinct from the
    /// partition seed so the two streams are independent.
    pub fn shuffle_seed(&self) -> u64 {
        self.seed.wrapping_add(1)
    }
}

/// Use the given seed, or draw one from the OS and log it so
/// the run can be replayed.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random::<u64>();
            tracing::info!("No --seed given, using {}", seed);
            seed
        }
    }
}

/// Read a `{ "classification": { "lr": .., "weight_decay": .. }, .. }` file.
pub fn load_policies(path: &Path) -> Result<BTreeMap<Component, GroupPolicy>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read policies file '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed policies file '{}'", path.display()))
}

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub annotations:   String,
    pub state_dir:     String,
    pub metrics_csv:   Option<String>,
    pub image_size:    u32,
    pub base_channels: usize,
    pub hidden:        usize,
    pub dropout:       f64,
    pub pipeline:      PipelineConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            annotations:   "dataset/waldo.csv".to_string(),
            state_dir:     "state".to_string(),
            metrics_csv:   None,
            image_size:    224,
            base_channels: 16,
            hidden:        64,
            dropout:       0.1,
            pipeline:      PipelineConfig::default(),
        }
    }
}

impl TrainConfig {
    fn model_config(&self, num_classes: usize) -> WaldoModelConfig {
        WaldoModelConfig::new(num_classes)
            .with_base_channels(self.base_channels)
            .with_hidden(self.hidden)
            .with_dropout(self.dropout)
    }
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────
/// A finished run: the trainer (holding model and optimiser
/// state), its history, and the split that produced it.
pub struct TrainingRun<B: AutodiffBackend, O: Objective<B>> {
    pub trainer:   Trainer<B, O>,
    pub history:   History,
    pub partition: Partition,
}

/// Partition → schedulers → model → groups → epoch loop.
pub fn run_pipeline<B: AutodiffBackend, O: Objective<B>>(
    cfg:       &PipelineConfig,
    store:     Arc<dyn Dataset<WaldoItem>>,
    model_cfg: &WaldoModelConfig,
    objective: O,
    device:    &B::Device,
    metrics:   Option<MetricsLogger>,
) -> Result<TrainingRun<B, O>> {
    cfg.validate()?;

    let partition = partition(store.len(), cfg.train_ratio, cfg.test_ratio, cfg.seed)?;
    let [train_len, test_len, val_len] = partition.sizes();
    tracing::info!(
        "Split: {} training, {} testing, {} validation",
        train_len, test_len, val_len
    );

    let scheduler = |role, indices: &Vec<usize>, seed| {
        BatchScheduler::new(role, indices.clone(), cfg.batch_size, seed)
    };
    let loaders = SplitLoaders {
        training: BatchLoader::new(
            scheduler(SplitRole::Training, &partition.training, cfg.shuffle_seed())?,
            store.clone(),
            device.clone(),
        ),
        testing: BatchLoader::new(
            scheduler(SplitRole::Testing, &partition.testing, cfg.seed)?,
            store.clone(),
            device.clone(),
        ),
        validation: BatchLoader::new(
            scheduler(SplitRole::Validation, &partition.validation, cfg.seed)?,
            store,
            device.clone(),
        ),
    };

    tracing::info!(
        "Batches per epoch: {} training, {} testing, {} validation",
        loaders.training.scheduler().num_batches(),
        loaders.testing.scheduler().num_batches(),
        loaders.validation.scheduler().num_batches()
    );

    let model  = model_cfg.init::<B>(device);
    let groups = build_parameter_groups(&model, &cfg.group_policies)?;

    let mut trainer = Trainer::new(model, groups, loaders, objective, cfg.epoch_count)?;
    if let Some(logger) = metrics {
        trainer = trainer.with_metrics_logger(logger);
    }
    let history = trainer.start()?;

    Ok(TrainingRun { trainer, history, partition })
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<History> {
        let cfg = &self.config;

        // ── Step 1: Fail before any work if the checkpoint can't be written
        let ckpt = CheckpointManager::new(&cfg.state_dir);
        if !ckpt.dir().is_dir() {
            return Err(PipelineError::OutputDirMissing(ckpt.dir().to_path_buf()).into());
        }

        // ── Step 2: Annotation table ─────────────────────────────────────────
        tracing::info!("Loading annotations from '{}'", cfg.annotations);
        let loader = CsvAnnotationLoader::new(&cfg.annotations);
        let rows   = loader.load_all()?;

        // ── Step 3: Record Store ─────────────────────────────────────────────
        let dataset = WaldoDataset::new(
            rows,
            loader.image_root(),
            Transformation::new(cfg.image_size),
        );
        let labels = dataset.labels().clone();
        tracing::info!("{} records, {} classes", dataset.len(), labels.len());

        // ── Step 4: Device ───────────────────────────────────────────────────
        let device = select_device();

        // ── Steps 5–7: Partition, model, epoch loop ──────────────────────────
        let metrics = cfg
            .metrics_csv
            .as_ref()
            .map(MetricsLogger::new)
            .transpose()?;
        let model_cfg = cfg.model_config(labels.len());
        let run = run_pipeline::<TrainBackend, _>(
            &cfg.pipeline,
            Arc::new(dataset),
            &model_cfg,
            DetectionObjective::default(),
            &device,
            metrics,
        )?;

        // ── Step 8: Persist ──────────────────────────────────────────────────
        let meta = RunMetadata {
            seed:        cfg.pipeline.seed,
            batch_size:  cfg.pipeline.batch_size,
            split_sizes: run.partition.sizes(),
            model:       model_cfg,
            image_size:  cfg.image_size,
            labels,
        };
        ckpt.save(&run.trainer, meta, &run.history)?;

        Ok(run.history)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::WaldoBatch;
    use crate::domain::record::{Annotation, LabelMap};
    use crate::ml::{model::WaldoModel, objective::BatchStats};
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataset::InMemDataset,
        prelude::*,
    };
    use tempfile::tempdir;

    type TestBackend = Autodiff<NdArray<f32>>;

    /// Real forward pass, loss pinned to 1.0.
    struct ConstantLoss;

    impl Objective<TestBackend> for ConstantLoss {
        fn loss(&self, model: &WaldoModel<TestBackend>, batch: WaldoBatch<TestBackend>) -> Tensor<TestBackend, 1> {
            model.forward(batch.images).boxes.sum().mul_scalar(0.0).add_scalar(1.0)
        }

        fn evaluate(&self, model: &WaldoModel<NdArray<f32>>, batch: WaldoBatch<NdArray<f32>>) -> BatchStats {
            let n = batch.len();
            let _ = model.forward(batch.images);
            BatchStats { batches: 1, samples: n, loss_sum: 1.0, correct: 0, iou_sum: 0.0 }
        }
    }

    fn store(n: usize) -> Arc<dyn Dataset<WaldoItem>> {
        let items = (0..n)
            .map(|i| WaldoItem {
                pixels: vec![(i % 5) as f32 / 5.0; 3 * 2 * 2],
                size:   2,
                bbox:   [0.1, 0.1, 0.5, 0.5],
                label:  i % 2,
            })
            .collect();
        Arc::new(InMemDataset::new(items))
    }

    fn tiny_model() -> WaldoModelConfig {
        WaldoModelConfig::new(2).with_base_channels(1).with_hidden(2)
    }

    fn config(epochs: usize, seed: u64) -> PipelineConfig {
        PipelineConfig { epoch_count: epochs, seed, ..PipelineConfig::default() }
    }

    #[test]
    fn test_default_config_is_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batch_size, 16);
        assert_eq!(cfg.epoch_count, 15);
        assert_eq!(cfg.group_policies.len(), 4);
    }

    #[test]
    fn test_config_without_dense_policy_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.group_policies.remove(&Component::Dense);
        assert!(matches!(cfg.validate(), Err(PipelineError::MissingPolicy(Component::Dense))));
    }

    #[test]
    fn test_resolve_seed_keeps_explicit_value() {
        assert_eq!(resolve_seed(Some(42)), 42);
    }

    #[test]
    fn test_policies_file_overrides_defaults() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("policies.json");
        let mut policies = default_group_policies();
        policies.insert(Component::Base, GroupPolicy::new(0.0, 0.0));
        fs::write(&path, serde_json::to_string(&policies).unwrap()).unwrap();

        let loaded = load_policies(&path).unwrap();
        assert_eq!(loaded[&Component::Base].lr, 0.0);
        assert_eq!(loaded[&Component::Classification].lr, 1e-6);
    }

    #[test]
    fn test_hundred_records_split_and_batch_counts() {
        let device = Default::default();
        let run = run_pipeline::<TestBackend, _>(
            &config(1, 3), store(100), &tiny_model(), ConstantLoss, &device, None,
        )
        .unwrap();

        assert_eq!(run.partition.sizes(), [80, 10, 10]);
        // 80 / 16 → 5 full batches; 10 / 16 → one short batch each
        let loaders = run.trainer.loaders();
        assert_eq!(loaders.training.scheduler().num_batches(), 5);
        assert_eq!(loaders.testing.scheduler().num_batches(), 1);
        assert_eq!(loaders.validation.scheduler().num_batches(), 1);
        let entry = run.history.last().unwrap();
        assert_eq!(entry.testing.samples, 10);
        assert_eq!(entry.validation.samples, 10);
        assert_eq!(run.trainer.epochs_completed(), 1);
    }

    #[test]
    fn test_constant_loss_over_fifteen_epochs() {
        let device = Default::default();
        let run = run_pipeline::<TestBackend, _>(
            &config(15, 7), store(1000), &tiny_model(), ConstantLoss, &device, None,
        )
        .unwrap();

        assert_eq!(run.partition.sizes(), [800, 100, 100]);
        assert_eq!(run.history.len(), 15);
        for (i, e) in run.history.entries().iter().enumerate() {
            assert_eq!(e.epoch, i);
            assert!((e.train_loss - 1.0).abs() < 1e-6);
            assert!((e.testing.loss.unwrap() - 1.0).abs() < 1e-9);
            assert!((e.validation.loss.unwrap() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_partition() {
        let device = Default::default();
        let a = run_pipeline::<TestBackend, _>(&config(0, 11), store(30), &tiny_model(), ConstantLoss, &device, None).unwrap();
        let b = run_pipeline::<TestBackend, _>(&config(0, 11), store(30), &tiny_model(), ConstantLoss, &device, None).unwrap();
        assert_eq!(a.partition, b.partition);
        assert!(a.history.is_empty());
    }

    #[test]
    fn test_two_records_is_a_configuration_error() {
        let device = Default::default();
        let err = run_pipeline::<TestBackend, _>(&config(1, 0), store(2), &tiny_model(), ConstantLoss, &device, None)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::TooFewRecords { found: 2, .. })
        ));
    }

    #[test]
    fn test_run_then_checkpoint_writes_artifacts() {
        let device = Default::default();
        let epochs = 3;
        let run = run_pipeline::<TestBackend, _>(
            &config(epochs, 5), store(20), &tiny_model(), ConstantLoss, &device, None,
        )
        .unwrap();

        let dir  = tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        let row  = |class: &str| Annotation {
            filename: "x.png".into(), width: 4, height: 4, class: class.into(),
            xmin: 0.0, ymin: 0.0, xmax: 2.0, ymax: 2.0,
        };
        let meta = RunMetadata {
            seed:        5,
            batch_size:  16,
            split_sizes: run.partition.sizes(),
            model:       tiny_model(),
            image_size:  2,
            labels:      LabelMap::from_annotations(&[row("a"), row("b")]),
        };
        ckpt.save(&run.trainer, meta, &run.history).unwrap();

        assert!(dir.path().join("trainer.json").is_file());
        assert!(dir.path().join("history.json").is_file());
        let has_model = fs::read_dir(dir.path())
            .unwrap()
            .any(|e| e.unwrap().file_name().to_string_lossy().starts_with("model."));
        assert!(has_model);
        assert!(!dir.path().join(".staging").exists());

        let reloaded = ckpt.load_history().unwrap();
        assert_eq!(reloaded.len(), epochs);
        assert_eq!(reloaded, run.history);
        let snapshot = ckpt.load_snapshot().unwrap();
        assert_eq!(snapshot.epochs_completed, epochs);
        assert_eq!(snapshot.split_sizes, [16, 2, 2]);
        assert_eq!(snapshot.optimizer_files.len(), 4);
    }
}
