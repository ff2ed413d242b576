use anyhow::Result;
use burn::data::dataset::Dataset;
use std::path::{Path, PathBuf};

use crate::data::loader::{label_path_for, list_image_files};

/// One image file and (if present) its label bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub image_path: PathBuf,
    pub label_path: Option<PathBuf>,
}

/// The file index of one image directory. Decoding happens lazily
/// in the batch iterator so large directories stay cheap to hold.
pub struct ImageDataset {
    entries: Vec<ImageEntry>,
}

impl ImageDataset {
    pub fn from_dirs(image_dir: impl AsRef<Path>, label_dir: impl AsRef<Path>) -> Result<Self> {
        let label_dir = label_dir.as_ref();
        let entries: Vec<ImageEntry> = list_image_files(image_dir)?
            .into_iter()
            .map(|image_path| {
                let label_path = label_path_for(label_dir, &image_path);
                ImageEntry { image_path, label_path }
            })
            .collect();

        let unlabelled = entries.iter().filter(|e| e.label_path.is_none()).count();
        if unlabelled > 0 {
            tracing::debug!("{} of {} images have no label bitmap", unlabelled, entries.len());
        }
        Ok(Self { entries })
    }

    pub fn entry_count(&self) -> usize { self.entries.len() }
}

impl Dataset<ImageEntry> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageEntry> {
        self.entries.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
