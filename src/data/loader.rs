// ============================================================
// Layer 4 — Image and Label Loader
// ============================================================
// Reads images and their label bitmaps from disk using the
// `image` crate.
//
// Directory conventions:
//   <image_dir>/frame_0001.png     ← RGB (or grey, promoted to RGB)
//   <label_dir>/frame_0001.png     ← label bitmap, same file stem
//
// Any non-zero label pixel is foreground. A missing label file is
// NOT an error: it simply means the image has no positives.
//
// Reference: image crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use image::{imageops, GrayImage, RgbImage};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::sample::{normalise_channel, SegmentationSample, CHANNELS};

/// File extensions treated as images
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// All image files directly inside `dir`, sorted by file name.
pub fn list_image_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read image directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            files.push(path);
        }
    }

    files.sort();
    tracing::debug!("Found {} images in '{}'", files.len(), dir.display());
    Ok(files)
}

/// Label bitmap path for an image: same file name, inside `label_dir`
pub fn label_path_for(label_dir: impl AsRef<Path>, image_path: &Path) -> Option<PathBuf> {
    let name = image_path.file_name()?;
    let candidate = label_dir.as_ref().join(name);
    candidate.exists().then_some(candidate)
}

pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let img = image::open(path)
        .with_context(|| format!("Cannot decode image '{}'", path.display()))?;
    Ok(img.to_rgb8())
}

/// Load a label bitmap as 0/255, resized (nearest) to the image size.
/// `None` gives an all-background bitmap.
pub fn load_mask(path: Option<&Path>, width: u32, height: u32) -> Result<GrayImage> {
    let Some(path) = path else {
        return Ok(GrayImage::new(width, height));
    };

    let raw = image::open(path)
        .with_context(|| format!("Cannot decode label bitmap '{}'", path.display()))?
        .to_luma8();

    let mut mask = if raw.dimensions() != (width, height) {
        tracing::debug!(
            "Resizing label '{}' from {:?} to {}x{}",
            path.display(), raw.dimensions(), width, height
        );
        imageops::resize(&raw, width, height, imageops::FilterType::Nearest)
    } else {
        raw
    };

    for p in mask.pixels_mut() {
        p.0[0] = if p.0[0] > 0 { 255 } else { 0 };
    }
    Ok(mask)
}

/// Flatten an (image, mask) pair into the normalised CHW layout.
pub fn to_sample(rgb: &RgbImage, mask: &GrayImage) -> SegmentationSample {
    let (w, h) = rgb.dimensions();
    let (w, h) = (w as usize, h as usize);
    let plane  = w * h;

    let mut image = vec![0.0f32; CHANNELS * plane];
    for (x, y, px) in rgb.enumerate_pixels() {
        let idx = y as usize * w + x as usize;
        for c in 0..CHANNELS {
            image[c * plane + idx] = normalise_channel(px.0[c]);
        }
    }

    let mask = mask.pixels().map(|p| if p.0[0] > 0 { 1.0 } else { 0.0 }).collect();

    SegmentationSample::new(image, mask, w, h)
}
