// ============================================================
// Layer 2 — StatsUseCase
// ============================================================
// Scores the latest checkpoint of an existing run:
//
//   Step 1: Read ckpts/<run>/opts.json            (Layer 6 - infra)
//   Step 2: Rebuild the full-size evaluation model (Layer 5 - ml)
//   Step 3: Load the newest checkpoint into it
//   Step 4: One precision / recall / F1 pass      (Layer 5 - ml)
//   Step 5: Save the debug collage next to the checkpoints
//
// The evaluation model is the one checkpoints are loaded into at
// training time too, so scores here match the test stream.

use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::{Path, PathBuf};

use crate::application::train_use_case::RunConfig;
use crate::domain::stats::StatsReport;
use crate::domain::traits::StatsEngine;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{evaluator::BurnEvaluator, stats::PrStatsEngine, EvalBackend};

/// Result of scoring one checkpoint
#[derive(Debug, Clone)]
pub struct StatsOutcome {
    pub checkpoint: PathBuf,
    pub report:     StatsReport,
    pub debug_path: PathBuf,
}

pub struct StatsUseCase {
    checkpoints: CheckpointManager,
    config:      RunConfig,
}

impl StatsUseCase {
    pub fn new(ckpt_root: impl AsRef<Path>, run: &str) -> Result<Self> {
        let checkpoints = CheckpointManager::open(ckpt_root, run)?;
        let config: RunConfig = checkpoints.load_opts()?;
        Ok(Self { checkpoints, config })
    }

    pub fn execute(&self) -> Result<StatsOutcome> {
        let (width, height) = self.config.dimensions()?;
        let checkpoint = self.checkpoints.latest_checkpoint()?;

        let device = <EvalBackend as Backend>::Device::default();
        let model  = self.config.segnet_config(width, height).init::<EvalBackend>(&device);
        let evaluator = BurnEvaluator::<EvalBackend>::new(model, self.config.pos_weight, device)
            .load_checkpoint(&checkpoint)?;

        let request = self.config.stats_request()?;
        let report  = PrStatsEngine::default().compute(&request, &evaluator)?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let debug_path = self.checkpoints.dir().join(format!("debug_{stamp}.png"));
        report
            .debug_image
            .save(&debug_path)
            .with_context(|| format!("Cannot write debug image '{}'", debug_path.display()))?;

        Ok(StatsOutcome { checkpoint, report, debug_path })
    }
}
