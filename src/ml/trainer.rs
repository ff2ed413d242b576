// ============================================================
// Layer 5 — Burn Trainer (the trainable model)
// ============================================================
// Wraps the autodiff SegNet plus its optimiser and implements the
// domain's TrainableModel trait.
//
// One fit() call = `steps` iterations of:
//   batch → forward → weighted sigmoid xent → backward → Adam step
//
// The loss reported back is the one from the LAST step.
//
// Weights handed to the evaluator are taken from model.valid(),
// i.e. already moved to the inner (non-autodiff) backend.
//
// Reference: Burn Book §5 (Training)
//            Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use std::path::Path;

use crate::data::batcher::SegBatcher;
use crate::domain::error::LoopError;
use crate::domain::traits::{BatchSource, TrainableModel};
use crate::ml::model::SegNet;
use crate::ml::ModelWeights;

pub struct BurnTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SegNet<B>, B>,
{
    model:      SegNet<B>,
    optim:      O,
    lr:         f64,
    pos_weight: f32,
    batcher:    SegBatcher<B>,
}

impl<B, O> BurnTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SegNet<B>, B>,
{
    pub fn new(model: SegNet<B>, optim: O, lr: f64, pos_weight: f32, device: B::Device) -> Self {
        Self {
            model,
            optim,
            lr,
            pos_weight,
            batcher: SegBatcher::new(device),
        }
    }

    #[cfg(test)]
    pub fn model(&self) -> &SegNet<B> {
        &self.model
    }
}

impl<B, O> TrainableModel for BurnTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SegNet<B>, B>,
{
    type Weights = ModelWeights<B::InnerBackend>;

    fn fit(&mut self, data: &mut dyn BatchSource, steps: usize) -> Result<f64> {
        let mut last_loss = f64::NAN;

        for step in 0..steps {
            let samples = data.next_batch()?.ok_or_else(|| LoopError::DataExhausted {
                source_name: data.name().to_string(),
                consumed:    step,
                requested:   steps,
            })?;
            let batch = self.batcher.batch(samples);

            let (loss, _) = self.model.forward_loss(batch.images, batch.masks, self.pos_weight);
            last_loss = loss.clone().into_scalar().elem::<f64>();

            let grads = GradientsParams::from_grads(loss.backward(), &self.model);
            self.model = self.optim.step(self.lr, self.model.clone(), grads);
        }

        tracing::debug!("fit: {} steps, final loss {:.6}", steps, last_loss);
        Ok(last_loss)
    }

    fn weights(&self) -> Self::Weights {
        let valid = self.model.valid();
        ModelWeights {
            arch:   valid.arch(),
            record: valid.into_record(),
        }
    }

    fn save_weights(&self, path: &Path) -> Result<()> {
        CompactRecorder::new()
            .record(self.model.clone().into_record(), path.to_path_buf())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        tracing::debug!("Saved weights to '{}'", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::{SampleBatch, SegmentationSample};
    use crate::ml::model::SegNetConfig;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamConfig,
    };

    type AD = Autodiff<NdArray>;

    /// Yields the same tiny batch `remaining` times
    struct FixedSource {
        remaining: usize,
    }

    impl BatchSource for FixedSource {
        fn name(&self) -> &str { "fixed" }

        fn next_batch(&mut self) -> Result<Option<SampleBatch>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            let mut mask = vec![0.0; 64];
            mask[27] = 1.0;
            Ok(Some(vec![SegmentationSample::new(vec![0.1; 3 * 64], mask, 8, 8)]))
        }

        fn restart(&mut self) -> Result<()> { Ok(()) }
    }

    fn trainer() -> BurnTrainer<AD, impl Optimizer<SegNet<AD>, AD>> {
        let device = Default::default();
        let model: SegNet<AD> = SegNetConfig::new(8, 8).with_base_filter_size(2).init(&device);
        BurnTrainer::new(model, AdamConfig::new().init::<AD, SegNet<AD>>(), 1e-2, 1.0, device)
    }

    #[test]
    fn test_fit_returns_finite_loss() {
        let mut t = trainer();
        let loss = t.fit(&mut FixedSource { remaining: 3 }, 3).unwrap();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_fit_fails_when_source_runs_dry() {
        let mut t = trainer();
        let err = t.fit(&mut FixedSource { remaining: 1 }, 2).unwrap_err();
        let loop_err = err.downcast_ref::<LoopError>().unwrap();
        assert!(matches!(loop_err, LoopError::DataExhausted { consumed: 1, requested: 2, .. }));
    }

    #[test]
    fn test_save_weights_writes_compact_record() {
        let dir = tempfile::tempdir().unwrap();
        let t = trainer();
        t.save_weights(&dir.path().join("20260101_000000")).unwrap();
        assert!(dir.path().join("20260101_000000.mpk.gz").exists());
    }
}
