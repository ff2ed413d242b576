// ============================================================
// Layer 4 — Segmentation Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a SampleBatch into
// device tensors.
//
//   Input:  N samples, each [3, H, W] image + [H, W] mask
//   Output: images [N, 3, H, W], masks [N, 1, H, W]
//
// All samples in a batch share H and W (the iterator checks this
// before a batch ever reaches here).
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::sample::{SegmentationSample, CHANNELS};

#[derive(Debug, Clone)]
pub struct SegBatch<B: Backend> {
    /// Normalised images — shape: [batch, 3, height, width]
    pub images: Tensor<B, 4>,

    /// Label bitmaps — shape: [batch, 1, height, width]
    pub masks: Tensor<B, 4>,
}

#[derive(Clone, Debug)]
pub struct SegBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SegBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// A single image as a [1, 3, H, W] tensor (prediction path)
    pub fn image(&self, image: &[f32], width: usize, height: usize) -> Tensor<B, 4> {
        Tensor::from_data(
            TensorData::new(image.to_vec(), [1, CHANNELS, height, width]),
            &self.device,
        )
    }
}

impl<B: Backend> Batcher<SegmentationSample, SegBatch<B>> for SegBatcher<B> {
    fn batch(&self, items: Vec<SegmentationSample>) -> SegBatch<B> {
        let n = items.len();
        let (w, h) = (items[0].width, items[0].height);

        let image_flat: Vec<f32> = items.iter().flat_map(|s| s.image.iter().copied()).collect();
        let mask_flat:  Vec<f32> = items.iter().flat_map(|s| s.mask.iter().copied()).collect();

        let images = Tensor::from_data(
            TensorData::new(image_flat, [n, CHANNELS, h, w]),
            &self.device,
        );
        let masks = Tensor::from_data(
            TensorData::new(mask_flat, [n, 1, h, w]),
            &self.device,
        );

        SegBatch { images, masks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes_and_values() {
        let device = Default::default();
        let batcher = SegBatcher::<NdArray>::new(device);

        let a = SegmentationSample::new(vec![0.5; 3 * 2 * 4], vec![1.0; 8], 4, 2);
        let b = SegmentationSample::new(vec![-0.5; 3 * 2 * 4], vec![0.0; 8], 4, 2);
        let batch = batcher.batch(vec![a, b]);

        assert_eq!(batch.images.dims(), [2, 3, 2, 4]);
        assert_eq!(batch.masks.dims(), [2, 1, 2, 4]);

        let mask_sum: f32 = batch.masks.sum().into_scalar().elem();
        assert_eq!(mask_sum, 8.0);
    }
}
