// ============================================================
// Layer 4 — Image Batch Iterator
// ============================================================
// Implements the domain's BatchSource over an image directory.
//
// Per sample:
//   decode image + label → resize to (width, height) if set
//     → random patch if patch_size is set → augmentation
//     → normalised SegmentationSample
//
// Two modes:
//   repeat = true   training: reshuffle and start over whenever a
//                   pass ends, so the stream never runs dry
//   repeat = false  test: one pass in file-name order, then None
//                   until restart(); the last batch may be short
//
// All randomness comes from one StdRng seeded from the config.
// Restarting a finite source reseeds it, so every evaluation
// pass sees exactly the same patches.

use anyhow::{bail, Result};
use burn::data::dataset::Dataset;
use image::imageops;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::augment::{sample_patch, Augmentation};
use crate::data::dataset::ImageDataset;
use crate::data::loader::{load_mask, load_rgb, to_sample};
use crate::domain::sample::{SampleBatch, SegmentationSample};
use crate::domain::traits::BatchSource;

#[derive(Debug, Clone)]
pub struct IteratorConfig {
    pub batch_size:   usize,
    pub patch_size:   Option<u32>,
    pub augmentation: Augmentation,
    pub repeat:       bool,
    pub width:        Option<u32>,
    pub height:       Option<u32>,
    pub seed:         u64,
}

pub struct ImageBatchIterator {
    name:    String,
    dataset: ImageDataset,
    cfg:     IteratorConfig,
    rng:     StdRng,
    order:   Vec<usize>,
    cursor:  usize,
}

impl ImageBatchIterator {
    pub fn new(name: impl Into<String>, dataset: ImageDataset, cfg: IteratorConfig) -> Self {
        let rng = StdRng::seed_from_u64(cfg.seed);
        let mut it = Self {
            name: name.into(),
            dataset,
            cfg,
            rng,
            order: Vec::new(),
            cursor: 0,
        };
        it.begin_pass();
        it
    }

    fn begin_pass(&mut self) {
        self.order = (0..self.dataset.len()).collect();
        if self.cfg.repeat {
            self.order.shuffle(&mut self.rng);
        }
        self.cursor = 0;
    }

    fn load_sample(&mut self, index: usize) -> Result<SegmentationSample> {
        let Some(entry) = self.dataset.get(index) else {
            bail!("{} dataset has no entry {index}", self.name);
        };

        let mut rgb = load_rgb(&entry.image_path)?;
        let (w, h)  = rgb.dimensions();
        let mut mask = load_mask(entry.label_path.as_deref(), w, h)?;

        if let (Some(tw), Some(th)) = (self.cfg.width, self.cfg.height) {
            if (w, h) != (tw, th) {
                rgb  = imageops::resize(&rgb, tw, th, imageops::FilterType::Triangle);
                mask = imageops::resize(&mask, tw, th, imageops::FilterType::Nearest);
            }
        }

        if let Some(size) = self.cfg.patch_size {
            (rgb, mask) = sample_patch(&rgb, &mask, size, &mut self.rng)?;
        }

        let (rgb, mask) = self.cfg.augmentation.apply(rgb, mask, &mut self.rng);
        Ok(to_sample(&rgb, &mask))
    }
}

impl BatchSource for ImageBatchIterator {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_batch(&mut self) -> Result<Option<SampleBatch>> {
        let mut batch: SampleBatch = Vec::with_capacity(self.cfg.batch_size);

        while batch.len() < self.cfg.batch_size {
            if self.cursor == self.order.len() {
                if !self.cfg.repeat || self.order.is_empty() {
                    break;
                }
                self.begin_pass();
            }
            let index = self.order[self.cursor];
            self.cursor += 1;
            batch.push(self.load_sample(index)?);
        }

        if let Some(first) = batch.first() {
            let dims = (first.width, first.height);
            if let Some(odd) = batch.iter().find(|s| (s.width, s.height) != dims) {
                bail!(
                    "{} batch mixes image sizes {:?} and {:?}; set --width/--height \
                     or --patch-width-height",
                    self.name, dims, (odd.width, odd.height)
                );
            }
        }

        Ok((!batch.is_empty()).then_some(batch))
    }

    fn restart(&mut self) -> Result<()> {
        if !self.cfg.repeat {
            self.rng = StdRng::seed_from_u64(self.cfg.seed);
        }
        self.begin_pass();
        Ok(())
    }
}
