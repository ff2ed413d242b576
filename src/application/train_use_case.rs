// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Startup wiring for one training run, in order:
//
//   Step 1: Validate the run configuration
//   Step 2: Resolve width/height (first test image if unset)
//   Step 3: Write ckpts/<run>/opts.json          (Layer 6 - infra)
//   Step 4: Build train/test batch iterators     (Layer 4 - data)
//   Step 5: Count whole test batches
//   Step 6: Build trainable + evaluation models  (Layer 5 - ml)
//   Step 7: Open the two summary streams         (Layer 6 - infra)
//   Step 8: Hand everything to the TrainingLoop
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::{optim::AdamConfig, prelude::*};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::training_loop::{num_test_steps, LoopSettings, TrainingLoop};
use crate::data::{
    augment::Augmentation,
    dataset::ImageDataset,
    iterator::{ImageBatchIterator, IteratorConfig},
    loader::{list_image_files, load_rgb},
};
use crate::domain::error::LoopError;
use crate::domain::stats::StatsRequest;
use crate::domain::termination::LoopState;
use crate::infra::{checkpoint::CheckpointManager, summary::SummaryWriter};
use crate::ml::{
    evaluator::BurnEvaluator,
    model::{SegNet, SegNetConfig, SIZE_MULTIPLE},
    stats::PrStatsEngine,
    trainer::BurnTrainer,
    EvalBackend, TrainBackend,
};

// ─── Run Configuration ───────────────────────────────────────────────────────
// Everything a run was started with. Written to opts.json before the
// first cycle and read back by the `stats` command, so it round-trips
// through serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub train_image_dir:    PathBuf,
    pub test_image_dir:     PathBuf,
    pub label_dir:          PathBuf,
    pub label_db:           PathBuf,
    pub patch_width_height: Option<u32>,
    pub batch_size:         usize,
    pub learning_rate:      f64,
    pub pos_weight:         f32,
    pub run:                String,
    pub use_skip_connections: bool,
    pub use_batch_norm:     bool,
    pub base_filter_size:   usize,
    pub flip_left_right:    bool,
    pub random_rotate:      bool,
    pub steps:              usize,
    pub train_steps:        usize,
    pub secs:               Option<u64>,
    pub width:              Option<u32>,
    pub height:             Option<u32>,
    pub connected_components_threshold: f32,
    pub seed:               u64,
    pub ckpt_root:          PathBuf,
    pub tb_root:            PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            train_image_dir:    "sample_data/training/".into(),
            test_image_dir:     "sample_data/test/".into(),
            label_dir:          "sample_data/labels/".into(),
            label_db:           "label.201802_sample.json".into(),
            patch_width_height: None,
            batch_size:         32,
            learning_rate:      0.001,
            pos_weight:         1.0,
            run:                String::new(),
            use_skip_connections: true,
            use_batch_norm:     true,
            base_filter_size:   8,
            flip_left_right:    false,
            random_rotate:      false,
            steps:              100_000,
            train_steps:        100,
            secs:               None,
            width:              None,
            height:             None,
            connected_components_threshold: 0.05,
            seed:               42,
            ckpt_root:          "ckpts".into(),
            tb_root:            "tb".into(),
        }
    }
}

fn check_size(name: &str, value: u32) -> Result<(), LoopError> {
    if value == 0 || value as usize % SIZE_MULTIPLE != 0 {
        return Err(LoopError::config(format!(
            "{name} must be a positive multiple of {SIZE_MULTIPLE}, got {value}"
        )));
    }
    Ok(())
}

impl RunConfig {
    /// Reject anything the loop cannot run with. Called before any
    /// file is written.
    pub fn validate(&self) -> Result<(), LoopError> {
        if self.run.trim().is_empty() {
            return Err(LoopError::config("--run must name the run"));
        }
        if self.run.contains(['/', '\\']) {
            return Err(LoopError::config(format!("run name '{}' must not contain a path separator", self.run)));
        }
        if self.batch_size == 0 {
            return Err(LoopError::config("--batch-size must be at least 1"));
        }
        if self.train_steps == 0 {
            return Err(LoopError::config("--train-steps must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(LoopError::config(format!("--learning-rate must be positive, got {}", self.learning_rate)));
        }
        if !(self.pos_weight > 0.0) {
            return Err(LoopError::config(format!("--pos-weight must be positive, got {}", self.pos_weight)));
        }
        if self.base_filter_size == 0 {
            return Err(LoopError::config("--base-filter-size must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.connected_components_threshold) {
            return Err(LoopError::config(format!(
                "--connected-components-threshold must be in [0, 1), got {}",
                self.connected_components_threshold
            )));
        }
        if let Some(p) = self.patch_width_height {
            check_size("--patch-width-height", p)?;
        }
        if let Some(w) = self.width {
            check_size("--width", w)?;
        }
        if let Some(h) = self.height {
            check_size("--height", h)?;
        }
        if let (Some(p), Some(w), Some(h)) = (self.patch_width_height, self.width, self.height) {
            if p > w || p > h {
                return Err(LoopError::config(format!("patch {p} does not fit in {w}x{h}")));
            }
        }
        Ok(())
    }

    /// Fill in width/height from the first test image when either is
    /// missing, then re-validate.
    pub fn resolve_dimensions(mut self) -> Result<Self> {
        if self.width.is_none() || self.height.is_none() {
            let files = list_image_files(&self.test_image_dir)?;
            let first = files.first().ok_or_else(|| {
                LoopError::config(format!(
                    "cannot infer --width/--height: no images in '{}'",
                    self.test_image_dir.display()
                ))
            })?;
            let (w, h) = load_rgb(first)?.dimensions();
            tracing::info!("Inferred {}x{} from '{}'", w, h, first.display());
            self.width  = self.width.or(Some(w));
            self.height = self.height.or(Some(h));
        }
        self.validate()?;
        Ok(self)
    }

    /// (width, height) after resolution
    pub fn dimensions(&self) -> Result<(u32, u32), LoopError> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Ok((w, h)),
            _ => Err(LoopError::config("width/height have not been resolved")),
        }
    }

    pub fn segnet_config(&self, width: u32, height: u32) -> SegNetConfig {
        SegNetConfig::new(width as usize, height as usize)
            .with_base_filter_size(self.base_filter_size)
            .with_use_skip_connections(self.use_skip_connections)
            .with_use_batch_norm(self.use_batch_norm)
    }

    /// Statistics inputs at the resolved model size
    pub fn stats_request(&self) -> Result<StatsRequest, LoopError> {
        let (width, height) = self.dimensions()?;
        Ok(StatsRequest {
            run:            self.run.clone(),
            test_image_dir: self.test_image_dir.clone(),
            label_db:       self.label_db.clone(),
            threshold:      self.connected_components_threshold,
            width,
            height,
        })
    }

    pub fn summary_dir(&self, phase: &str) -> PathBuf {
        self.tb_root.join(&self.run).join(phase)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: RunConfig,
}

impl TrainUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Execute the whole run; returns the loop's final state.
    pub fn execute(&self) -> Result<LoopState> {
        // ── Step 1 + 2: Validate and resolve dimensions ──────────────────────
        self.config.validate()?;
        let cfg = self.config.clone().resolve_dimensions()?;
        let (width, height) = cfg.dimensions()?;

        // ── Step 3: Persist options ──────────────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.ckpt_root, &cfg.run)?;
        checkpoints.save_opts(&cfg)?;

        // ── Step 4: Batch iterators ──────────────────────────────────────────
        let train_dataset = ImageDataset::from_dirs(&cfg.train_image_dir, &cfg.label_dir)?;
        let test_dataset  = ImageDataset::from_dirs(&cfg.test_image_dir, &cfg.label_dir)?;
        if train_dataset.entry_count() == 0 {
            return Err(LoopError::config(format!(
                "no training images in '{}'",
                cfg.train_image_dir.display()
            ))
            .into());
        }

        // ── Step 5: Whole test batches per evaluation ────────────────────────
        let num_test_files = test_dataset.entry_count();
        let test_steps     = num_test_steps(num_test_files, cfg.batch_size);
        tracing::info!(
            "num_test_files={} batch_size={} => num_test_steps={}",
            num_test_files, cfg.batch_size, test_steps
        );
        if test_steps == 0 {
            return Err(LoopError::config(format!(
                "{num_test_files} test images cannot fill one batch of {}",
                cfg.batch_size
            ))
            .into());
        }

        let train_data = ImageBatchIterator::new("training", train_dataset, IteratorConfig {
            batch_size:   cfg.batch_size,
            patch_size:   cfg.patch_width_height,
            augmentation: Augmentation {
                distort_rgb:     true,
                flip_left_right: cfg.flip_left_right,
                random_rotate:   cfg.random_rotate,
            },
            repeat: true,
            width:  Some(width),
            height: Some(height),
            seed:   cfg.seed,
        });
        let test_data = ImageBatchIterator::new("test", test_dataset, IteratorConfig {
            batch_size:   cfg.batch_size,
            patch_size:   cfg.patch_width_height,
            augmentation: Augmentation::none(),
            repeat: false,
            width:  Some(width),
            height: Some(height),
            seed:   cfg.seed.wrapping_add(1),
        });

        // ── Step 6: Models ───────────────────────────────────────────────────
        // the training model may work on patches; evaluation is always full size
        TrainBackend::seed(cfg.seed);
        let device = <TrainBackend as Backend>::Device::default();

        let train_size = cfg.patch_width_height;
        let train_cfg  = cfg.segnet_config(train_size.unwrap_or(width), train_size.unwrap_or(height));
        let test_cfg   = cfg.segnet_config(width, height);
        tracing::info!("Train model: {:?}", train_cfg);
        tracing::info!("Test model: {:?}", test_cfg);

        let optim   = AdamConfig::new().init::<TrainBackend, SegNet<TrainBackend>>();
        let trainer = BurnTrainer::new(
            train_cfg.init::<TrainBackend>(&device),
            optim,
            cfg.learning_rate,
            cfg.pos_weight,
            device.clone(),
        );
        let evaluator = BurnEvaluator::<EvalBackend>::new(
            test_cfg.init::<EvalBackend>(&device),
            cfg.pos_weight,
            device,
        );

        // ── Step 7: Summary streams ──────────────────────────────────────────
        let train_summary = SummaryWriter::new(cfg.summary_dir("training"))?;
        let test_summary  = SummaryWriter::new(cfg.summary_dir("test"))?;

        // ── Step 8: Run ──────────────────────────────────────────────────────
        let settings = LoopSettings {
            steps:          cfg.steps,
            train_steps:    cfg.train_steps,
            secs:           cfg.secs,
            num_test_steps: test_steps,
            stats_request:  cfg.stats_request()?,
        };

        let mut training_loop = TrainingLoop::new(
            settings,
            trainer,
            evaluator,
            PrStatsEngine::default(),
            Box::new(train_data),
            Box::new(test_data),
            train_summary,
            test_summary,
            checkpoints,
        );
        training_loop
            .run()
            .with_context(|| format!("Run '{}' failed", cfg.run))
    }
}

/// Write a tiny but complete dataset under `root` (tests only)
#[cfg(test)]
pub(crate) fn write_fixture(root: &std::path::Path, images: usize, size: u32) -> RunConfig {
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::fs;

    let train = root.join("train");
    let test  = root.join("test");
    let label = root.join("labels");
    for d in [&train, &test, &label] {
        fs::create_dir_all(d).unwrap();
    }

    let mut db = serde_json::Map::new();
    for i in 0..images {
        let name = format!("img_{i}.png");
        let mut rgb  = RgbImage::from_pixel(size, size, Rgb([30, 60, 90]));
        let mut mask = GrayImage::new(size, size);
        let c = 4 + i as u32 % (size - 8);
        for y in c..c + 3 {
            for x in c..c + 3 {
                rgb.put_pixel(x, y, Rgb([250, 250, 250]));
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        rgb.save(train.join(&name)).unwrap();
        rgb.save(test.join(&name)).unwrap();
        mask.save(label.join(&name)).unwrap();
        db.insert(name, serde_json::json!([[c as f32 + 1.0, c as f32 + 1.0]]));
    }
    let label_db = root.join("labels.json");
    fs::write(&label_db, serde_json::Value::Object(db).to_string()).unwrap();

    RunConfig {
        train_image_dir:  train,
        test_image_dir:   test,
        label_dir:        label,
        label_db,
        batch_size:       1,
        run:              "fixture".into(),
        base_filter_size: 2,
        steps:            2,
        train_steps:      1,
        ckpt_root:        root.join("ckpts"),
        tb_root:          root.join("tb"),
        ..RunConfig::default()
    }
}
