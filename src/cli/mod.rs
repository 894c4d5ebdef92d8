// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// Commands:
//   1. `train`   — split, train and checkpoint a model
//   2. `history` — print the metrics of a finished run
//   3. `locate`  — run a trained model on one image
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, HistoryArgs, LocateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "waldo-trainer",
    version,
    about = "Train a model that finds Waldo, then inspect or use it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. Routes only.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::History(args) => run_history(args),
            Commands::Locate(args)  => run_locate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on annotations in: {}", args.annotations);
    let state_dir = args.state_dir.clone();
    let use_case  = TrainUseCase::new(args.try_into()?);
    let history   = use_case.execute()?;

    match history.last() {
        Some(last) => println!(
            "Training complete after {} epochs (final train loss {:.4}). State saved to '{}'.",
            history.len(),
            last.train_loss,
            state_dir,
        ),
        None => println!("No epochs requested. State saved to '{}'.", state_dir),
    }
    Ok(())
}

fn run_history(args: HistoryArgs) -> Result<()> {
    use crate::application::history_use_case::HistoryUseCase;

    let report = HistoryUseCase::new(&args.state_dir).load()?;
    print!("{}", report.render());
    Ok(())
}

fn run_locate(args: LocateArgs) -> Result<()> {
    use crate::application::locate_use_case::LocateUseCase;

    let use_case = LocateUseCase::new(&args.state_dir)?;
    let found    = use_case.locate(args.image())?;
    let [x0, y0, x1, y1] = found.bbox.to_array();
    println!(
        "\n{} ({:.1}%) at [{:.0}, {:.0}, {:.0}, {:.0}]",
        found.class,
        found.confidence * 100.0,
        x0, y0, x1, y1,
    );
    Ok(())
}
