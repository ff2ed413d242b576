// ============================================================
// Layer 3 — Point Set Comparison
// ============================================================
// Scores predicted centroids against labelled points.
//
// Matching is one-to-one: all (true, predicted) pairs closer than
// `max_distance` are sorted by distance and accepted greedily,
// skipping any point that is already matched.
//
//   TP = matched pairs
//   FN = true points left unmatched
//   FP = predicted points left unmatched
//
// Counts accumulate across calls so one SetComparison covers a
// full pass over the test set.

/// Default match radius in pixels
pub const MATCH_DISTANCE: f32 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchCounts {
    pub true_positives:  usize,
    pub false_negatives: usize,
    pub false_positives: usize,
}

#[derive(Debug, Clone)]
pub struct SetComparison {
    max_distance: f32,
    totals:       MatchCounts,
}

impl Default for SetComparison {
    fn default() -> Self {
        Self::new(MATCH_DISTANCE)
    }
}

impl SetComparison {
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance, totals: MatchCounts::default() }
    }

    /// Compare one image's point sets and add the result to the totals.
    pub fn compare_sets(
        &mut self,
        true_pts:      &[(f32, f32)],
        predicted_pts: &[(f32, f32)],
    ) -> MatchCounts {
        let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
        for (i, t) in true_pts.iter().enumerate() {
            for (j, p) in predicted_pts.iter().enumerate() {
                let d = ((t.0 - p.0).powi(2) + (t.1 - p.1).powi(2)).sqrt();
                if d <= self.max_distance {
                    pairs.push((d, i, j));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut true_used = vec![false; true_pts.len()];
        let mut pred_used = vec![false; predicted_pts.len()];
        let mut tp = 0;
        for (_, i, j) in pairs {
            if !true_used[i] && !pred_used[j] {
                true_used[i] = true;
                pred_used[j] = true;
                tp += 1;
            }
        }

        let counts = MatchCounts {
            true_positives:  tp,
            false_negatives: true_pts.len() - tp,
            false_positives: predicted_pts.len() - tp,
        };
        self.totals.true_positives  += counts.true_positives;
        self.totals.false_negatives += counts.false_negatives;
        self.totals.false_positives += counts.false_positives;
        counts
    }

    pub fn totals(&self) -> MatchCounts {
        self.totals
    }

    /// (precision, recall, f1); each ratio is 0 when undefined
    pub fn precision_recall_f1(&self) -> (f64, f64, f64) {
        let tp = self.totals.true_positives as f64;
        let fp = self.totals.false_positives as f64;
        let fn_ = self.totals.false_negatives as f64;

        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall    = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        (precision, recall, f1)
    }
}
