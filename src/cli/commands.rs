// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands `train`, `history` and
// `locate` with their flags.
//
// clap's derive macros generate help text, missing-argument
// errors and string → number conversion.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use crate::application::train_use_case::{
    load_policies, resolve_seed, PipelineConfig, TrainConfig,
};
use crate::domain::component::default_group_policies;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the localisation model on an annotated image set
    Train(TrainArgs),

    /// Print the per-epoch metrics of a finished run
    History(HistoryArgs),

    /// Predict class and box for one image with a trained model
    Locate(LocateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Annotation CSV (filename,width,height,class,xmin,ymin,xmax,ymax).
    /// Image paths are relative to this file's directory.
    #[arg(long, default_value = "dataset/waldo.csv")]
    pub annotations: String,

    /// Existing directory that receives model, trainer state and history
    #[arg(long, default_value = "state")]
    pub state_dir: String,

    /// Records per batch; the last batch of a split may be smaller
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Number of full passes over the training split
    #[arg(long, default_value_t = 15)]
    pub epochs: usize,

    /// Fraction of records used for training
    #[arg(long, default_value_t = 0.8)]
    pub train_ratio: f64,

    /// Fraction of records used for testing; validation gets the rest
    #[arg(long, default_value_t = 0.1)]
    pub test_ratio: f64,

    /// Seed for the split and the per-epoch shuffle (random if omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Side length images are resized to
    #[arg(long, default_value_t = 224)]
    pub image_size: u32,

    /// JSON file replacing the per-component learning rate / weight decay
    #[arg(long)]
    pub policies: Option<PathBuf>,

    /// Append one CSV row of metrics per epoch to this file
    #[arg(long)]
    pub metrics_csv: Option<String>,

    /// Channels of the first convolution in the base
    #[arg(long, default_value_t = 16)]
    pub base_channels: usize,

    /// Width of the dense layer shared by both heads
    #[arg(long, default_value_t = 64)]
    pub hidden: usize,

    /// Dropout probability in the dense layer
    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// Fallible because the policies file is read here.
impl TryFrom<TrainArgs> for TrainConfig {
    type Error = anyhow::Error;

    fn try_from(a: TrainArgs) -> Result<Self> {
        let group_policies = match a.policies.as_deref() {
            Some(path) => load_policies(path)?,
            None       => default_group_policies(),
        };
        Ok(TrainConfig {
            annotations:   a.annotations,
            state_dir:     a.state_dir,
            metrics_csv:   a.metrics_csv,
            image_size:    a.image_size,
            base_channels: a.base_channels,
            hidden:        a.hidden,
            dropout:       a.dropout,
            pipeline: PipelineConfig {
                train_ratio:  a.train_ratio,
                test_ratio:   a.test_ratio,
                batch_size:   a.batch_size,
                epoch_count:  a.epochs,
                seed:         resolve_seed(a.seed),
                group_policies,
            },
        })
    }
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Directory a previous `train` wrote to
    #[arg(long, default_value = "state")]
    pub state_dir: String,
}

#[derive(Args, Debug)]
pub struct LocateArgs {
    /// Image to run the model on
    #[arg(long)]
    pub image: PathBuf,

    /// Directory a previous `train` wrote to
    #[arg(long, default_value = "state")]
    pub state_dir: String,
}

impl LocateArgs {
    pub fn image(&self) -> &Path {
        &self.image
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["waldo-trainer", "train", "--seed", "9"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainConfig::try_from(args).unwrap();

        assert_eq!(cfg.annotations, "dataset/waldo.csv");
        assert_eq!(cfg.pipeline.batch_size, 16);
        assert_eq!(cfg.pipeline.epoch_count, 15);
        assert_eq!(cfg.pipeline.seed, 9);
        assert_eq!(cfg.pipeline.group_policies.len(), 4);
        assert!(cfg.pipeline.validate().is_ok());
    }

    #[test]
    fn test_locate_requires_image() {
        assert!(Cli::try_parse_from(["waldo-trainer", "locate"]).is_err());
    }
}
