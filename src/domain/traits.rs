// ============================================================
// Layer 3 — Core Traits (Collaborator Boundaries)
// ============================================================
// The training loop only ever talks to these traits. The burn
// model, the image pipeline and the file writers implement them
// in Layers 4-6; the loop's own tests implement them with stubs
// that need no numeric framework at all.
//
//   BatchSource     → data::iterator::ImageBatchIterator
//   TrainableModel  → ml::trainer::BurnTrainer
//   EvaluableModel  → ml::evaluator::BurnEvaluator
//   StatsEngine     → ml::stats::PrStatsEngine
//   SummarySink     → infra::summary::SummaryWriter
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

use crate::domain::sample::SampleBatch;
use crate::domain::stats::{DebugImage, StatsReport, StatsRequest};

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// A stream of (image, label) batches.
///
/// Training sources repeat forever; test sources make one pass and
/// then return `Ok(None)` until `restart` is called.
pub trait BatchSource {
    /// Short name used in error messages ("training", "test")
    fn name(&self) -> &str;

    /// Next batch, or None once a finite pass is over
    fn next_batch(&mut self) -> Result<Option<SampleBatch>>;

    /// Rewind to the start of a new pass
    fn restart(&mut self) -> Result<()>;
}

// ─── Predictor ────────────────────────────────────────────────────────────────
/// Anything that maps one normalised CHW image to per-pixel
/// foreground probabilities (row-major, `width * height` values).
pub trait Predictor {
    fn predict(&self, image: &[f32], width: usize, height: usize) -> Result<Vec<f32>>;
}

// ─── TrainableModel ───────────────────────────────────────────────────────────
/// The model that receives gradient updates.
pub trait TrainableModel {
    /// Detached copy of the full parameter state
    type Weights;

    /// Run `steps` optimiser steps, pulling one batch per step.
    /// Returns the loss of the final step.
    fn fit(&mut self, data: &mut dyn BatchSource, steps: usize) -> Result<f64>;

    fn weights(&self) -> Self::Weights;

    /// Persist the full weight state. `path` has no extension;
    /// implementations may append their own.
    fn save_weights(&self, path: &Path) -> Result<()>;
}

// ─── EvaluableModel ───────────────────────────────────────────────────────────
/// The model used for evaluation, possibly at another resolution.
pub trait EvaluableModel: Predictor {
    type Weights;

    /// Replace the whole parameter state.
    fn set_weights(&mut self, weights: Self::Weights) -> Result<()>;

    /// Mean loss over exactly `steps` batches of `data`.
    fn evaluate(&mut self, data: &mut dyn BatchSource, steps: usize) -> Result<f64>;
}

/// Copy every parameter of `source` into `destination`.
///
/// Precondition: both models share one architecture (same depth,
/// filter counts, skip and normalisation layout); only their input
/// resolution may differ. A violation surfaces as an error from
/// `set_weights`.
pub fn sync_weights<T, E>(source: &T, destination: &mut E) -> Result<()>
where
    T: TrainableModel,
    E: EvaluableModel<Weights = T::Weights>,
{
    destination.set_weights(source.weights())
}

// ─── StatsEngine ──────────────────────────────────────────────────────────────
/// Precision / recall / F1 over a full test pass.
pub trait StatsEngine {
    fn compute<P: Predictor>(&self, request: &StatsRequest, model: &P) -> Result<StatsReport>;
}

// ─── SummarySink ──────────────────────────────────────────────────────────────
/// An append-only stream of step-tagged records.
pub trait SummarySink {
    fn add_scalars(&mut self, values: &[(&str, f64)], step: usize) -> Result<()>;

    fn add_image(&mut self, tag: &str, image: &DebugImage, step: usize) -> Result<()>;

    /// Make everything written so far visible to readers
    fn flush(&mut self) -> Result<()>;
}
