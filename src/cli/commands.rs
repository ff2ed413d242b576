// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `stats`, and all
// their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::RunConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a segmentation model, evaluating after every cycle
    Train(TrainArgs),

    /// Precision / recall / F1 of a run's latest checkpoint
    Stats(StatsArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, default_value = "sample_data/training/")]
    pub train_image_dir: PathBuf,

    #[arg(long, default_value = "sample_data/test/")]
    pub test_image_dir: PathBuf,

    /// Label bitmaps, one per image with the same file name
    #[arg(long, default_value = "sample_data/labels/")]
    pub label_dir: PathBuf,

    /// JSON point labels used for precision / recall
    #[arg(long, default_value = "label.201802_sample.json")]
    pub label_db: PathBuf,

    /// Train on random square patches of this size instead of full images
    #[arg(long)]
    pub patch_width_height: Option<u32>,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 0.001)]
    pub learning_rate: f64,

    /// Weight of positive pixels in the cross-entropy loss
    #[arg(long, default_value_t = 1.0)]
    pub pos_weight: f32,

    /// Run name; checkpoints go to <ckpt-root>/<run>, summaries to <tb-root>/<run>
    #[arg(long)]
    pub run: String,

    #[arg(long)]
    pub no_use_skip_connections: bool,

    #[arg(long)]
    pub no_use_batch_norm: bool,

    #[arg(long, default_value_t = 8)]
    pub base_filter_size: usize,

    #[arg(long)]
    pub flip_left_right: bool,

    /// Rotate by random multiples of 90 degrees (180 only for non-square inputs)
    #[arg(long)]
    pub random_rotate: bool,

    /// Max number of train/test cycles
    #[arg(long, default_value_t = 100_000)]
    pub steps: usize,

    /// Optimiser steps per cycle
    #[arg(long, default_value_t = 100)]
    pub train_steps: usize,

    /// If set, stop once this many seconds have elapsed
    #[arg(long)]
    pub secs: Option<u64>,

    /// Test image width; inferred from the first test image if unset
    #[arg(long)]
    pub width: Option<u32>,

    /// Test image height; inferred from the first test image if unset
    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long, default_value_t = 0.05)]
    pub connected_components_threshold: f32,

    /// Seed for weight initialisation, shuffling and augmentation
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value = "ckpts")]
    pub ckpt_root: PathBuf,

    #[arg(long, default_value = "tb")]
    pub tb_root: PathBuf,
}

/// Convert CLI TrainArgs into the application-layer RunConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for RunConfig {
    fn from(a: TrainArgs) -> Self {
        RunConfig {
            train_image_dir:    a.train_image_dir,
            test_image_dir:     a.test_image_dir,
            label_dir:          a.label_dir,
            label_db:           a.label_db,
            patch_width_height: a.patch_width_height,
            batch_size:         a.batch_size,
            learning_rate:      a.learning_rate,
            pos_weight:         a.pos_weight,
            run:                a.run,
            use_skip_connections: !a.no_use_skip_connections,
            use_batch_norm:     !a.no_use_batch_norm,
            base_filter_size:   a.base_filter_size,
            flip_left_right:    a.flip_left_right,
            random_rotate:      a.random_rotate,
            steps:              a.steps,
            train_steps:        a.train_steps,
            secs:               a.secs,
            width:              a.width,
            height:             a.height,
            connected_components_threshold: a.connected_components_threshold,
            seed:               a.seed,
            ckpt_root:          a.ckpt_root,
            tb_root:            a.tb_root,
        }
    }
}

/// All arguments for the `stats` command
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Run whose latest checkpoint is scored
    #[arg(long)]
    pub run: String,

    #[arg(long, default_value = "ckpts")]
    pub ckpt_root: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn train_args(extra: &[&str]) -> TrainArgs {
        let argv = ["segtrain", "train", "--run", "r1"].iter().chain(extra);
        match Cli::parse_from(argv).command {
            Commands::Train(args) => args,
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_match_run_config() {
        let cfg: RunConfig = train_args(&[]).into();
        let expected = RunConfig { run: "r1".into(), ..RunConfig::default() };
        assert_eq!(cfg, expected);
    }

    #[test]
    fn test_negated_flags_and_options() {
        let cfg: RunConfig = train_args(&[
            "--no-use-skip-connections",
            "--no-use-batch-norm",
            "--patch-width-height", "64",
            "--secs", "30",
            "--flip-left-right",
        ])
        .into();

        assert!(!cfg.use_skip_connections);
        assert!(!cfg.use_batch_norm);
        assert!(cfg.flip_left_right);
        assert_eq!(cfg.patch_width_height, Some(64));
        assert_eq!(cfg.secs, Some(30));
    }

    #[test]
    fn test_run_is_required() {
        assert!(Cli::try_parse_from(["segtrain", "train"]).is_err());
        assert!(Cli::try_parse_from(["segtrain", "stats"]).is_err());
    }
}
