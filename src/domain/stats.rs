// ============================================================
// Layer 3 — Statistics Domain Types
// ============================================================
// What goes into, and comes out of, one statistics pass.

use std::path::PathBuf;
use std::time::Duration;

/// Debug visualisations are plain RGB rasters
pub type DebugImage = image::RgbImage;

/// Inputs for one precision/recall/F1 pass over the test set.
/// Images are scored at `width x height`, the size the model was
/// built for; label points are scaled along with them.
#[derive(Debug, Clone)]
pub struct StatsRequest {
    pub run:            String,
    pub test_image_dir: PathBuf,
    pub label_db:       PathBuf,
    pub threshold:      f32,
    pub width:          u32,
    pub height:         u32,
}

/// Output of one statistics pass
#[derive(Debug, Clone)]
pub struct StatsReport {
    pub precision:   f64,
    pub recall:      f64,
    pub f1:          f64,
    pub debug_image: DebugImage,
}

/// Everything a single cycle reports. Built once, handed to the
/// summary sinks, then dropped.
#[derive(Debug, Clone)]
pub struct CycleStatistics {
    pub step:        usize,
    pub elapsed:     Duration,
    pub train_loss:  f64,
    pub test_loss:   f64,
    pub precision:   f64,
    pub recall:      f64,
    pub f1:          f64,
    pub debug_image: DebugImage,
}

impl CycleStatistics {
    pub fn new(
        step:       usize,
        elapsed:    Duration,
        train_loss: f64,
        test_loss:  f64,
        report:     StatsReport,
    ) -> Self {
        Self {
            step,
            elapsed,
            train_loss,
            test_loss,
            precision:   report.precision,
            recall:      report.recall,
            f1:          report.f1,
            debug_image: report.debug_image,
        }
    }

    /// The one-line progress message printed after every cycle
    pub fn progress_line(&self, total_steps: usize) -> String {
        format!(
            "step {}/{}\ttime {}\ttrain_loss {:.6}\ttest_loss {:.6}",
            self.step,
            total_steps,
            self.elapsed.as_secs(),
            self.train_loss,
            self.test_loss,
        )
    }
}
