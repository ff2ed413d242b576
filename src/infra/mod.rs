// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the loop
// but is not part of the data pipeline:
//
//   checkpoint.rs  — Per-run checkpoint directory
//                    Hands out collision-free timestamped
//                    checkpoint names, finds the latest one,
//                    saves/loads opts.json.
//
//   summary.rs     — Summary event streams
//                    JSONL scalar/image records per phase
//                    (training, test), implements SummarySink.
//
//   debug_image.rs — Debug collage rendering
//                    Input images next to their probability
//                    maps, with predicted/labelled points.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Checkpoint naming and run options
pub mod checkpoint;

/// Summary event writer
pub mod summary;

/// Debug image helpers
pub mod debug_image;
