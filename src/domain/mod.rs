// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, traits and algorithms that define the core
// concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, traits and small algorithms
//
// Everything here is unit tested without a model or a GPU.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Decoded (image, label bitmap) pairs
pub mod sample;

// Collaborator traits the training loop is written against
pub mod traits;

// Step / time termination predicate and loop bookkeeping
pub mod termination;

// Stats request/report and per-cycle statistics
pub mod stats;

// Probability map → connected regions → centroids
pub mod components;

// Centroid vs label matching, precision / recall / F1
pub mod set_comparison;

// Fatal error taxonomy
pub mod error;
