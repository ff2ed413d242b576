// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from image files on disk to tensor batches.
//
//   <image_dir>/*.png  +  <label_dir>/*.png
//       │
//       ▼
//   ImageDataset        → file index, pairs images with labels
//       │
//       ▼
//   ImageBatchIterator  → decode, resize, patch, augment, batch
//       │                 (implements domain::traits::BatchSource)
//       ▼
//   SegBatcher          → stacks samples into burn tensors
//
// Separately, LabelDb holds the point labels the statistics
// engine scores predictions against.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Directory scanning and image / label decoding
pub mod loader;

/// Random flips, rotations, colour jitter and patch crops
pub mod augment;

/// Burn Dataset over an image directory
pub mod dataset;

/// Repeating / one-pass batch streams
pub mod iterator;

/// Burn Batcher: samples → tensors
pub mod batcher;

/// JSON point labels for P/R/F1 scoring
pub mod label_db;
