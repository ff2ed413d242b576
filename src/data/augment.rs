// ============================================================
// Layer 4 — Augmentation and Patch Sampling
// ============================================================
// Random transforms applied to training pairs. Every geometric
// transform is applied to the image AND its label bitmap with the
// same parameters so the labels stay aligned.
//
//   distort_rgb      — brightness / contrast jitter (image only)
//   flip_left_right  — mirror with probability 0.5
//   random_rotate    — rotate by a random multiple of 90°
//                      (non-square inputs only get 0° or 180°
//                       so the batch shape never changes)
//
// Patch sampling crops one random square of side `size`.

use anyhow::{bail, Result};
use image::{imageops, GrayImage, RgbImage};
use rand::Rng;

/// Largest brightness shift, in 8-bit units
const MAX_BRIGHTNESS_DELTA: f32 = 32.0;
/// Contrast factor range
const CONTRAST_RANGE: (f32, f32) = (0.8, 1.2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Augmentation {
    pub distort_rgb:     bool,
    pub flip_left_right: bool,
    pub random_rotate:   bool,
}

impl Augmentation {
    /// No transforms at all (test streams)
    pub fn none() -> Self {
        Self::default()
    }

    pub fn apply<R: Rng>(
        &self,
        mut rgb:  RgbImage,
        mut mask: GrayImage,
        rng:      &mut R,
    ) -> (RgbImage, GrayImage) {
        if self.flip_left_right && rng.gen_bool(0.5) {
            rgb  = imageops::flip_horizontal(&rgb);
            mask = imageops::flip_horizontal(&mask);
        }

        if self.random_rotate {
            let square = rgb.width() == rgb.height();
            let quarter_turns = if square {
                rng.gen_range(0..4)
            } else {
                2 * rng.gen_range(0..2)
            };
            match quarter_turns {
                1 => {
                    rgb  = imageops::rotate90(&rgb);
                    mask = imageops::rotate90(&mask);
                }
                2 => {
                    rgb  = imageops::rotate180(&rgb);
                    mask = imageops::rotate180(&mask);
                }
                3 => {
                    rgb  = imageops::rotate270(&rgb);
                    mask = imageops::rotate270(&mask);
                }
                _ => {}
            }
        }

        if self.distort_rgb {
            distort_colours(&mut rgb, rng);
        }

        (rgb, mask)
    }
}

fn distort_colours<R: Rng>(rgb: &mut RgbImage, rng: &mut R) {
    let delta    = rng.gen_range(-MAX_BRIGHTNESS_DELTA..=MAX_BRIGHTNESS_DELTA);
    let contrast = rng.gen_range(CONTRAST_RANGE.0..=CONTRAST_RANGE.1);

    let n = (rgb.width() * rgb.height() * 3).max(1) as f32;
    let mean = rgb.as_raw().iter().map(|&v| v as f32).sum::<f32>() / n;

    for v in rgb.iter_mut() {
        let out = (*v as f32 - mean) * contrast + mean + delta;
        *v = out.round().clamp(0.0, 255.0) as u8;
    }
}

/// Crop the same random `size x size` window from image and mask.
pub fn sample_patch<R: Rng>(
    rgb:  &RgbImage,
    mask: &GrayImage,
    size: u32,
    rng:  &mut R,
) -> Result<(RgbImage, GrayImage)> {
    let (w, h) = rgb.dimensions();
    if size > w || size > h {
        bail!("patch size {size} does not fit in a {w}x{h} image");
    }

    let x = rng.gen_range(0..=w - size);
    let y = rng.gen_range(0..=h - size);

    Ok((
        imageops::crop_imm(rgb, x, y, size, size).to_image(),
        imageops::crop_imm(mask, x, y, size, size).to_image(),
    ))
}
