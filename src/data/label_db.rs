// ============================================================
// Layer 4 — Label Database
// ============================================================
// Point labels used for precision / recall scoring.
//
// On disk this is one JSON object mapping an image file name to
// the (x, y) pixel coordinates of every labelled object:
//
//   {
//     "frame_0001.png": [[12.0, 40.5], [88.0, 17.0]],
//     "frame_0002.png": []
//   }
//
// Images that are absent from the file simply have no labels.

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path};

#[derive(Debug, Clone, Default)]
pub struct LabelDb {
    labels: HashMap<String, Vec<(f32, f32)>>,
}

impl LabelDb {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read label db '{}'", path.display()))?;

        let raw: HashMap<String, Vec<[f32; 2]>> = serde_json::from_str(&json)
            .with_context(|| format!("Malformed label db '{}'", path.display()))?;

        let labels: HashMap<_, _> = raw
            .into_iter()
            .map(|(name, pts)| (name, pts.into_iter().map(|[x, y]| (x, y)).collect()))
            .collect();

        tracing::debug!("Label db '{}' covers {} images", path.display(), labels.len());
        Ok(Self { labels })
    }

    /// Points for one image file name; empty if unlabelled
    pub fn get_labels(&self, filename: &str) -> &[(f32, f32)] {
        self.labels.get(filename).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn image_count(&self) -> usize {
        self.labels.len()
    }
}
