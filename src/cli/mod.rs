// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — runs the train/evaluate cycle for a named run
//   2. `stats` — scores the latest checkpoint of a run
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, StatsArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "segtrain",
    version,
    about = "Train an image segmentation model with periodic evaluation and checkpoints."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching use case. Never computes anything itself.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Stats(args) => run_stats(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting run '{}' on images in '{}'", args.run, args.train_image_dir.display());

    let state = TrainUseCase::new(args.into()).execute()?;

    println!("Training complete after {} steps.", state.step);
    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<()> {
    use crate::application::stats_use_case::StatsUseCase;

    let outcome = StatsUseCase::new(&args.ckpt_root, &args.run)?.execute()?;
    let r = &outcome.report;

    println!("checkpoint {}", outcome.checkpoint.display());
    println!("precision {:.4}\trecall {:.4}\tf1 {:.4}", r.precision, r.recall, r.f1);
    println!("debug image {}", outcome.debug_path.display());
    Ok(())
}
