// ============================================================
// Layer 3 — Segmentation Sample Domain Type
// ============================================================
// One (image, label bitmap) pair, already decoded and scaled.
//
// Memory layout:
//   image: channel-major [3, height, width], values in [-1, 1]
//   mask:  [height, width], 1.0 = positive pixel, 0.0 = background
//
// The batcher in Layer 5 stacks a SampleBatch into burn tensors,
// so nothing in this file knows about tensors.

/// Number of colour channels every sample carries
pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationSample {
    pub image:  Vec<f32>,
    pub mask:   Vec<f32>,
    pub width:  usize,
    pub height: usize,
}

/// A batch is just the samples in the order they were drawn.
pub type SampleBatch = Vec<SegmentationSample>;

impl SegmentationSample {
    pub fn new(image: Vec<f32>, mask: Vec<f32>, width: usize, height: usize) -> Self {
        debug_assert_eq!(image.len(), CHANNELS * width * height);
        debug_assert_eq!(mask.len(), width * height);
        Self { image, mask, width, height }
    }
}

/// Map an 8-bit channel value into [-1, 1]
pub fn normalise_channel(v: u8) -> f32 {
    (v as f32 / 127.5) - 1.0
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalisation_endpoints() {
        assert_eq!(normalise_channel(0), -1.0);
        assert_eq!(normalise_channel(255), 1.0);
        assert!(normalise_channel(128) > 0.0);
    }
}
