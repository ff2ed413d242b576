// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn-specific model code lives here.
//
//   model.rs     — SegNet: conv encoder / transposed-conv decoder
//                  with optional skip connections and batch norm,
//                  plus the positive-weighted sigmoid xent loss
//
//   trainer.rs   — BurnTrainer: autodiff model + Adam, implements
//                  TrainableModel (fit / weights / save_weights)
//
//   evaluator.rs — BurnEvaluator: inner-backend model, implements
//                  EvaluableModel (set_weights / evaluate / predict)
//
//   stats.rs     — PrStatsEngine: P/R/F1 via connected components
//                  of predicted probability maps
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

use burn::prelude::*;

use crate::ml::model::{SegNet, SegNetArch};

/// Segmentation network architecture
pub mod model;

/// Training side: gradient updates and checkpoint writes
pub mod trainer;

/// Evaluation side: synced weights, test loss, predictions
pub mod evaluator;

/// Precision / recall / F1 statistics engine
pub mod stats;

/// Backend the evaluation model (and checkpoint reloads) run on
#[cfg(not(feature = "wgpu"))]
pub type EvalBackend = burn::backend::NdArray;
#[cfg(feature = "wgpu")]
pub type EvalBackend = burn::backend::Wgpu;

/// Backend the trainable model runs on
pub type TrainBackend = burn::backend::Autodiff<EvalBackend>;

/// A detached copy of a SegNet's parameters, tagged with the
/// architecture that produced them.
pub struct ModelWeights<B: Backend> {
    pub arch:   SegNetArch,
    pub record: <SegNet<B> as Module<B>>::Record,
}
