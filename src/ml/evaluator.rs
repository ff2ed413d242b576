// ============================================================
// Layer 5 — Burn Evaluator (the evaluation model)
// ============================================================
// A second SegNet instance on the plain (non-autodiff) backend,
// usually built for the full test resolution while the trainer
// works on patches. The two never share parameter storage: once
// per cycle the trainer's weights are COPIED in via set_weights().
//
// set_weights() is where a structural mismatch is caught: the
// incoming weights carry the SegNetArch they were produced by and
// are refused unless it equals this model's arch.

use anyhow::{Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::activation::sigmoid,
};
use std::path::Path;

use crate::data::batcher::SegBatcher;
use crate::domain::error::LoopError;
use crate::domain::traits::{BatchSource, EvaluableModel, Predictor};
use crate::ml::model::SegNet;
use crate::ml::ModelWeights;

pub struct BurnEvaluator<B: Backend> {
    model:      SegNet<B>,
    pos_weight: f32,
    batcher:    SegBatcher<B>,
}

impl<B: Backend> BurnEvaluator<B> {
    pub fn new(model: SegNet<B>, pos_weight: f32, device: B::Device) -> Self {
        Self { model, pos_weight, batcher: SegBatcher::new(device) }
    }

    /// Replace the weights with a checkpoint written by the trainer.
    /// `path` is the extension-less checkpoint stem; the recorder
    /// appends its own `.mpk.gz`.
    pub fn load_checkpoint(mut self, path: &Path) -> Result<Self> {
        let record = CompactRecorder::new()
            .load(path.to_path_buf(), &self.batcher.device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;
        self.model = self.model.load_record(record);
        tracing::info!("Loaded checkpoint '{}'", path.display());
        Ok(self)
    }
}

impl<B: Backend> Predictor for BurnEvaluator<B> {
    fn predict(&self, image: &[f32], width: usize, height: usize) -> Result<Vec<f32>> {
        let input = self.batcher.image(image, width, height);
        let probs = sigmoid(self.model.forward(input));
        probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read prediction tensor: {e:?}"))
    }
}

impl<B: Backend> EvaluableModel for BurnEvaluator<B> {
    type Weights = ModelWeights<B>;

    fn set_weights(&mut self, weights: Self::Weights) -> Result<()> {
        let ours = self.model.arch();
        if weights.arch != ours {
            return Err(LoopError::WeightSync(format!(
                "source arch {:?} does not match evaluation arch {:?}",
                weights.arch, ours
            ))
            .into());
        }
        self.model = self.model.clone().load_record(weights.record);
        Ok(())
    }

    fn evaluate(&mut self, data: &mut dyn BatchSource, steps: usize) -> Result<f64> {
        if steps == 0 {
            return Ok(f64::NAN);
        }

        let mut total = 0.0f64;

        for step in 0..steps {
            let samples = data.next_batch()?.ok_or_else(|| LoopError::DataExhausted {
                source_name: data.name().to_string(),
                consumed:    step,
                requested:   steps,
            })?;
            let batch = self.batcher.batch(samples);
            let (loss, _) = self.model.forward_loss(batch.images, batch.masks, self.pos_weight);
            total += loss.into_scalar().elem::<f64>();
        }

        Ok(total / steps as f64)
    }
}
