// ============================================================
// Layer 5 — Precision / Recall Statistics Engine
// ============================================================
// One full pass over the test image directory:
//
//   for each image (sorted by file name):
//       image     = resized to the request's width x height
//       probs     = model.predict(image)
//       predicted = centroids of connected components (p > threshold)
//       labelled  = label_db[file name], scaled like the image
//       SetComparison accumulates TP / FP / FN
//
// The first DEBUG_ROWS images also go into the debug collage:
// input on the left, probability map on the right, predicted
// centroids in red and labelled points in green.

use anyhow::{Context, Result};
use image::{imageops, GrayImage};

use crate::data::label_db::LabelDb;
use crate::data::loader::{list_image_files, load_rgb, to_sample};
use crate::domain::components::centroids;
use crate::domain::set_comparison::{SetComparison, MATCH_DISTANCE};
use crate::domain::stats::{StatsReport, StatsRequest};
use crate::domain::traits::{Predictor, StatsEngine};
use crate::infra::debug_image::{
    mark_points, probability_map, side_by_side, stack_vertically, LABELLED_COLOUR,
    PREDICTED_COLOUR,
};
use crate::ml::model::SIZE_MULTIPLE;

/// Images rendered into the debug collage
pub const DEBUG_ROWS: usize = 4;

#[derive(Debug, Clone)]
pub struct PrStatsEngine {
    match_distance: f32,
    debug_rows:     usize,
}

impl Default for PrStatsEngine {
    fn default() -> Self {
        Self::new(MATCH_DISTANCE, DEBUG_ROWS)
    }
}

impl PrStatsEngine {
    pub fn new(match_distance: f32, debug_rows: usize) -> Self {
        Self { match_distance, debug_rows }
    }
}

impl StatsEngine for PrStatsEngine {
    fn compute<P: Predictor>(&self, request: &StatsRequest, model: &P) -> Result<StatsReport> {
        let (w, h) = (request.width, request.height);
        if w == 0 || h == 0 || w as usize % SIZE_MULTIPLE != 0 || h as usize % SIZE_MULTIPLE != 0 {
            anyhow::bail!(
                "Stats size {}x{} is not usable; both sides must be multiples of {}",
                w, h, SIZE_MULTIPLE
            );
        }

        let label_db   = LabelDb::load(&request.label_db)?;
        let files      = list_image_files(&request.test_image_dir)?;
        let mut scores = SetComparison::new(self.match_distance);
        let mut rows   = Vec::with_capacity(self.debug_rows);

        for path in &files {
            let mut rgb = load_rgb(path)?;
            let (native_w, native_h) = rgb.dimensions();
            if (native_w, native_h) != (w, h) {
                rgb = imageops::resize(&rgb, w, h, imageops::FilterType::Triangle);
            }
            let (sx, sy) = (w as f32 / native_w as f32, h as f32 / native_h as f32);

            let sample = to_sample(&rgb, &GrayImage::new(w, h));
            let probs  = model
                .predict(&sample.image, sample.width, sample.height)
                .with_context(|| format!("Prediction failed for '{}'", path.display()))?;

            let predicted = centroids(&probs, sample.width, sample.height, request.threshold);
            let name      = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let labelled: Vec<_> = label_db
                .get_labels(name)
                .iter()
                .map(|&(x, y)| (x * sx, y * sy))
                .collect();
            scores.compare_sets(&labelled, &predicted);

            if rows.len() < self.debug_rows {
                let mut map = probability_map(&probs, w, h);
                mark_points(&mut map, &labelled, LABELLED_COLOUR);
                mark_points(&mut map, &predicted, PREDICTED_COLOUR);
                rows.push(side_by_side(&rgb, &map));
            }
        }

        let (precision, recall, f1) = scores.precision_recall_f1();
        let totals = scores.totals();
        tracing::debug!(
            "[{}] stats over {} images ({} labelled): tp={} fp={} fn={}",
            request.run,
            files.len(),
            label_db.image_count(),
            totals.true_positives,
            totals.false_positives,
            totals.false_negatives
        );

        Ok(StatsReport {
            precision,
            recall,
            f1,
            debug_image: stack_vertically(&rows),
        })
    }
}
