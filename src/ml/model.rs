use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

/// Encoder downsamples three times, so inputs must divide by this
pub const SIZE_MULTIPLE: usize = 8;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SegNetConfig {
    pub width:  usize,
    pub height: usize,
    #[config(default = 8)]
    pub base_filter_size: usize,
    #[config(default = true)]
    pub use_skip_connections: bool,
    #[config(default = true)]
    pub use_batch_norm: bool,
}

/// The part of the config that determines parameter shapes.
/// Two models with equal arch can exchange weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegNetArch {
    pub base_filter_size:     usize,
    pub use_skip_connections: bool,
    pub use_batch_norm:       bool,
}

impl SegNetConfig {
    pub fn arch(&self) -> SegNetArch {
        SegNetArch {
            base_filter_size:     self.base_filter_size,
            use_skip_connections: self.use_skip_connections,
            use_batch_norm:       self.use_batch_norm,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SegNet<B> {
        let f = self.base_filter_size;
        let (dec1_in, dec2_in) = if self.use_skip_connections {
            (4 * f, 2 * f)
        } else {
            (2 * f, f)
        };

        SegNet {
            enc1: self.conv_block(3, f, 2, device),
            enc2: self.conv_block(f, 2 * f, 2, device),
            enc3: self.conv_block(2 * f, 4 * f, 2, device),
            up1:  Self::upsample(4 * f, 2 * f, device),
            dec1: self.conv_block(dec1_in, 2 * f, 1, device),
            up2:  Self::upsample(2 * f, f, device),
            dec2: self.conv_block(dec2_in, f, 1, device),
            up3:  Self::upsample(f, f, device),
            head: Conv2dConfig::new([f, 1], [1, 1]).init(device),
            base_filter_size:     f,
            use_skip_connections: self.use_skip_connections,
            use_batch_norm:       self.use_batch_norm,
            width:  self.width,
            height: self.height,
        }
    }

    fn conv_block<B: Backend>(
        &self,
        channels_in:  usize,
        channels_out: usize,
        stride:       usize,
        device:       &B::Device,
    ) -> ConvBlock<B> {
        let conv = Conv2dConfig::new([channels_in, channels_out], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let norm = self
            .use_batch_norm
            .then(|| BatchNormConfig::new(channels_out).init(device));
        ConvBlock { conv, norm }
    }

    // 2x2 kernel, stride 2: output is exactly twice the input size
    fn upsample<B: Backend>(
        channels_in:  usize,
        channels_out: usize,
        device:       &B::Device,
    ) -> ConvTranspose2d<B> {
        ConvTranspose2dConfig::new([channels_in, channels_out], [2, 2])
            .with_stride([2, 2])
            .init(device)
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: Option<BatchNorm<B, 2>>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        relu(x)
    }
}

#[derive(Module, Debug)]
pub struct SegNet<B: Backend> {
    pub enc1: ConvBlock<B>,
    pub enc2: ConvBlock<B>,
    pub enc3: ConvBlock<B>,
    pub up1:  ConvTranspose2d<B>,
    pub dec1: ConvBlock<B>,
    pub up2:  ConvTranspose2d<B>,
    pub dec2: ConvBlock<B>,
    pub up3:  ConvTranspose2d<B>,
    pub head: Conv2d<B>,
    pub base_filter_size:     usize,
    pub use_skip_connections: bool,
    pub use_batch_norm:       bool,
    pub width:  usize,
    pub height: usize,
}

impl<B: Backend> SegNet<B> {
    /// images: [batch, 3, H, W] → logits: [batch, 1, H, W]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let e1 = self.enc1.forward(images);      // f,  H/2
        let e2 = self.enc2.forward(e1.clone());  // 2f, H/4
        let e3 = self.enc3.forward(e2.clone());  // 4f, H/8

        let d = relu(self.up1.forward(e3));
        let d = if self.use_skip_connections { Tensor::cat(vec![d, e2], 1) } else { d };
        let d = self.dec1.forward(d);

        let d = relu(self.up2.forward(d));
        let d = if self.use_skip_connections { Tensor::cat(vec![d, e1], 1) } else { d };
        let d = self.dec2.forward(d);

        let d = relu(self.up3.forward(d));
        self.head.forward(d)
    }

    pub fn forward_loss(
        &self,
        images:     Tensor<B, 4>,
        masks:      Tensor<B, 4>,
        pos_weight: f32,
    ) -> (Tensor<B, 1>, Tensor<B, 4>) {
        let logits = self.forward(images);
        let loss   = weighted_cross_entropy_with_logits(logits.clone(), masks, pos_weight);
        (loss, logits)
    }

    pub fn arch(&self) -> SegNetArch {
        SegNetArch {
            base_filter_size:     self.base_filter_size,
            use_skip_connections: self.use_skip_connections,
            use_batch_norm:       self.use_batch_norm,
        }
    }
}

/// Numerically stable log(1 + e^x) = max(x, 0) + log(1 + e^-|x|)
fn softplus<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.clone().clamp_min(0.0) + x.abs().neg().exp().add_scalar(1.0).log()
}

/// Sigmoid cross-entropy with the positive term scaled by `pos_weight`:
///   mean( pos_weight · y · -log σ(x)  +  (1 - y) · -log(1 - σ(x)) )
pub fn weighted_cross_entropy_with_logits<B: Backend, const D: usize>(
    logits:     Tensor<B, D>,
    targets:    Tensor<B, D>,
    pos_weight: f32,
) -> Tensor<B, 1> {
    let positive = softplus(logits.clone().neg()) * targets.clone().mul_scalar(pos_weight);
    let negative = softplus(logits) * targets.neg().add_scalar(1.0);
    (positive + negative).mean()
}
