// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training a run or scoring its checkpoint).
//
// Rules for this layer:
//   - No ML math or model code here
//   - Printing only for the per-cycle progress line
//   - No direct image or record decoding (that's Layer 4 and 5)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The cycle controller (train → sync → evaluate → report → checkpoint)
pub mod training_loop;

// Startup wiring for a training run
pub mod train_use_case;

// P/R/F1 of a run's latest checkpoint
pub mod stats_use_case;
