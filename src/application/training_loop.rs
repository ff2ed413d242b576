// ============================================================
// Layer 2 — Training Loop Controller
// ============================================================
// Drives the alternating train / evaluate cycle until the step
// bound or the optional time bound is hit. Every cycle runs
// these phases strictly in order:
//
//   1. train       trainer.fit(train_data, train_steps)
//   2. sync        evaluator ← copy of trainer weights
//   3. evaluate    test_data.restart(), mean loss over num_test_steps
//   4. statistics  P / R / F1 + debug collage from the evaluator
//   5. report      one progress line on stdout (mirrored to tracing)
//   6. summaries   training: xent | test: xent, precision, recall,
//                  f1, debug_img | both flushed
//   7. checkpoint  trainer.save_weights(next timestamped stem)
//   8. terminate?  step += 1, then TerminationPolicy::is_done
//
// The controller only sees the domain traits, so its tests run
// against small stubs and never touch burn.

use anyhow::Result;

use crate::domain::stats::{CycleStatistics, StatsRequest};
use crate::domain::termination::{hms, LoopState, TerminationPolicy};
use crate::domain::traits::{
    sync_weights, BatchSource, EvaluableModel, StatsEngine, SummarySink, TrainableModel,
};
use crate::infra::checkpoint::CheckpointManager;

/// Number of whole test batches in one pass over `num_test_files`.
/// A trailing partial batch is not evaluated.
pub fn num_test_steps(num_test_files: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    num_test_files / batch_size
}

/// Fixed loop parameters, derived once from the run configuration
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub steps:          usize,
    pub train_steps:    usize,
    pub secs:           Option<u64>,
    pub num_test_steps: usize,
    pub stats_request:  StatsRequest,
}

pub struct TrainingLoop<T, E, S, W> {
    settings:      LoopSettings,
    policy:        TerminationPolicy,
    trainer:       T,
    evaluator:     E,
    stats:         S,
    train_data:    Box<dyn BatchSource>,
    test_data:     Box<dyn BatchSource>,
    train_summary: W,
    test_summary:  W,
    checkpoints:   CheckpointManager,
}

impl<T, E, S, W> TrainingLoop<T, E, S, W>
where
    T: TrainableModel,
    E: EvaluableModel<Weights = T::Weights>,
    S: StatsEngine,
    W: SummarySink,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings:      LoopSettings,
        trainer:       T,
        evaluator:     E,
        stats:         S,
        train_data:    Box<dyn BatchSource>,
        test_data:     Box<dyn BatchSource>,
        train_summary: W,
        test_summary:  W,
        checkpoints:   CheckpointManager,
    ) -> Self {
        let policy = TerminationPolicy::new(settings.steps, settings.secs);
        Self {
            settings,
            policy,
            trainer,
            evaluator,
            stats,
            train_data,
            test_data,
            train_summary,
            test_summary,
            checkpoints,
        }
    }

    /// Run cycles until done. Any error aborts the loop immediately.
    pub fn run(&mut self) -> Result<LoopState> {
        let mut state = LoopState::start();

        // a zero step bound means there is nothing to do
        state.done = self.policy.is_done(state.step, state.elapsed());

        while !state.done {
            self.cycle(&state)?;

            state.step += 1;
            state.done = self.policy.is_done(state.step, state.elapsed());

            if let Some(remaining) = self.policy.remaining_secs(state.elapsed()) {
                tracing::info!(
                    "run_time {}  remaining_time {}",
                    hms(state.elapsed().as_secs_f64()),
                    hms(remaining)
                );
            }
        }

        tracing::info!("Training loop finished after {} cycles", state.step);
        Ok(state)
    }

    fn cycle(&mut self, state: &LoopState) -> Result<()> {
        let step = state.step;

        // ── 1. Train ─────────────────────────────────────────────────────────
        let train_loss = self
            .trainer
            .fit(self.train_data.as_mut(), self.settings.train_steps)?;

        // ── 2. Sync ──────────────────────────────────────────────────────────
        sync_weights(&self.trainer, &mut self.evaluator)?;

        // ── 3. Evaluate ──────────────────────────────────────────────────────
        self.test_data.restart()?;
        let test_loss = self
            .evaluator
            .evaluate(self.test_data.as_mut(), self.settings.num_test_steps)?;

        // ── 4. Statistics ────────────────────────────────────────────────────
        let report = self.stats.compute(&self.settings.stats_request, &self.evaluator)?;
        let stats  = CycleStatistics::new(step, state.elapsed(), train_loss, test_loss, report);

        // ── 5. Report ────────────────────────────────────────────────────────
        let line = stats.progress_line(self.settings.steps);
        println!("{line}");
        tracing::info!(
            "{line}\tprecision {:.4}\trecall {:.4}\tf1 {:.4}",
            stats.precision, stats.recall, stats.f1
        );

        // ── 6. Summaries ─────────────────────────────────────────────────────
        self.train_summary.add_scalars(&[("xent", stats.train_loss)], step)?;
        self.test_summary.add_scalars(
            &[
                ("xent",      stats.test_loss),
                ("precision", stats.precision),
                ("recall",    stats.recall),
                ("f1",        stats.f1),
            ],
            step,
        )?;
        self.test_summary.add_image("debug_img", &stats.debug_image, step)?;
        self.train_summary.flush()?;
        self.test_summary.flush()?;

        // ── 7. Checkpoint ────────────────────────────────────────────────────
        let path = self.checkpoints.next_checkpoint_path();
        self.trainer.save_weights(&path)?;
        tracing::debug!("Checkpoint for step {} at '{}'", step, path.display());

        Ok(())
    }

    #[cfg(test)]
    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    #[cfg(test)]
    pub fn train_summary(&self) -> &W {
        &self.train_summary
    }

    #[cfg(test)]
    pub fn test_summary(&self) -> &W {
        &self.test_summary
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::LoopError;
    use crate::domain::sample::{SampleBatch, SegmentationSample};
    use crate::domain::stats::{DebugImage, StatsReport};
    use crate::domain::traits::Predictor;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::path::{Path, PathBuf};

    // ── Stub collaborators ───────────────────────────────────────────────────

    /// Seeded random 2x2 single-sample batches.
    /// `len: None` repeats forever; `Some(n)` yields n batches per pass.
    struct RandomSource {
        seed: u64,
        rng:  StdRng,
        len:  Option<usize>,
        pos:  usize,
    }

    impl RandomSource {
        fn new(seed: u64, len: Option<usize>) -> Self {
            Self { seed, rng: StdRng::seed_from_u64(seed), len, pos: 0 }
        }
    }

    impl BatchSource for RandomSource {
        fn name(&self) -> &str { "random" }

        fn next_batch(&mut self) -> Result<Option<SampleBatch>> {
            if self.len.is_some_and(|n| self.pos >= n) {
                return Ok(None);
            }
            self.pos += 1;
            let image = (0..12).map(|_| self.rng.gen_range(-1.0..1.0)).collect();
            Ok(Some(vec![SegmentationSample::new(image, vec![0.0; 4], 2, 2)]))
        }

        fn restart(&mut self) -> Result<()> {
            self.pos = 0;
            self.rng = StdRng::seed_from_u64(self.seed);
            Ok(())
        }
    }

    fn batch_mean(batch: &SampleBatch) -> f64 {
        let s = &batch[0];
        s.image.iter().map(|&v| v as f64).sum::<f64>() / s.image.len() as f64
    }

    /// "Weights" are a running sum of everything it has seen
    struct StubTrainer {
        weight: f64,
    }

    impl TrainableModel for StubTrainer {
        type Weights = f64;

        fn fit(&mut self, data: &mut dyn BatchSource, steps: usize) -> Result<f64> {
            let mut loss = f64::NAN;
            for consumed in 0..steps {
                let batch = data.next_batch()?.ok_or_else(|| LoopError::DataExhausted {
                    source_name: data.name().to_string(),
                    consumed,
                    requested: steps,
                })?;
                self.weight += batch_mean(&batch);
                loss = self.weight.abs();
            }
            Ok(loss)
        }

        fn weights(&self) -> f64 {
            self.weight
        }

        fn save_weights(&self, path: &Path) -> Result<()> {
            let file = PathBuf::from(format!("{}.mpk.gz", path.display()));
            std::fs::write(file, self.weight.to_string())?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubEvaluator {
        weight: f64,
    }

    impl Predictor for StubEvaluator {
        fn predict(&self, _image: &[f32], width: usize, height: usize) -> Result<Vec<f32>> {
            Ok(vec![0.0; width * height])
        }
    }

    impl EvaluableModel for StubEvaluator {
        type Weights = f64;

        fn set_weights(&mut self, weights: f64) -> Result<()> {
            self.weight = weights;
            Ok(())
        }

        fn evaluate(&mut self, data: &mut dyn BatchSource, steps: usize) -> Result<f64> {
            let mut total = 0.0;
            for consumed in 0..steps {
                let batch = data.next_batch()?.ok_or_else(|| LoopError::DataExhausted {
                    source_name: data.name().to_string(),
                    consumed,
                    requested: steps,
                })?;
                total += (self.weight - batch_mean(&batch)).abs();
            }
            Ok(total / steps as f64)
        }
    }

    struct StubStats;

    impl StatsEngine for StubStats {
        fn compute<P: Predictor>(&self, _request: &StatsRequest, model: &P) -> Result<StatsReport> {
            let probs = model.predict(&[0.0; 12], 2, 2)?;
            Ok(StatsReport {
                precision:   0.5,
                recall:      0.25,
                f1:          probs.len() as f64,
                debug_image: DebugImage::new(2, 2),
            })
        }
    }

    /// Keeps every record in memory
    #[derive(Default)]
    struct RecordingSink {
        scalars: Vec<(String, f64, usize)>,
        images:  Vec<(String, usize)>,
        flushes: usize,
    }

    impl SummarySink for RecordingSink {
        fn add_scalars(&mut self, values: &[(&str, f64)], step: usize) -> Result<()> {
            for &(tag, v) in values {
                self.scalars.push((tag.to_string(), v, step));
            }
            Ok(())
        }

        fn add_image(&mut self, tag: &str, _image: &DebugImage, step: usize) -> Result<()> {
            self.images.push((tag.to_string(), step));
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    // ── Fixtures ─────────────────────────────────────────────────────────────

    type StubLoop = TrainingLoop<StubTrainer, StubEvaluator, StubStats, RecordingSink>;

    fn settings(steps: usize, secs: Option<u64>) -> LoopSettings {
        LoopSettings {
            steps,
            train_steps:    3,
            secs,
            num_test_steps: num_test_steps(5, 2),
            stats_request:  StatsRequest {
                run:            "stub".into(),
                test_image_dir: PathBuf::from("unused"),
                label_db:       PathBuf::from("unused.json"),
                threshold:      0.05,
                width:          2,
                height:         2,
            },
        }
    }

    fn build(root: &Path, settings: LoopSettings, train_len: Option<usize>) -> StubLoop {
        TrainingLoop::new(
            settings,
            StubTrainer { weight: 0.0 },
            StubEvaluator::default(),
            StubStats,
            Box::new(RandomSource::new(1, train_len)),
            Box::new(RandomSource::new(2, Some(5))),
            RecordingSink::default(),
            RecordingSink::default(),
            CheckpointManager::new(root, "stub").unwrap(),
        )
    }

    fn checkpoint_count(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".mpk.gz"))
            .count()
    }

    fn series<'a>(sink: &'a RecordingSink, tag: &'a str) -> Vec<(f64, usize)> {
        sink.scalars
            .iter()
            .filter(|(t, _, _)| t == tag)
            .map(|(_, v, s)| (*v, *s))
            .collect()
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[test]
    fn test_num_test_steps_drops_partial_batch() {
        assert_eq!(num_test_steps(100, 32), 3);
        assert_eq!(num_test_steps(96, 32), 3);
        assert_eq!(num_test_steps(31, 32), 0);
        assert_eq!(num_test_steps(10, 0), 0);
    }

    #[test]
    fn test_runs_exactly_step_bound_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = build(dir.path(), settings(4, None), None);

        let state = l.run().unwrap();

        assert_eq!(state.step, 4);
        assert!(state.done);

        let train = series(l.train_summary(), "xent");
        let steps: Vec<usize> = train.iter().map(|(_, s)| *s).collect();
        assert_eq!(steps, vec![0, 1, 2, 3]);

        let test = l.test_summary();
        assert_eq!(series(test, "xent").len(), 4);
        assert_eq!(series(test, "precision")[3], (0.5, 3));
        assert_eq!(series(test, "f1")[0], (4.0, 0));
        assert_eq!(test.images.last(), Some(&("debug_img".to_string(), 3)));
        assert_eq!(test.flushes, 4);
        assert_eq!(l.train_summary().flushes, 4);
    }

    #[test]
    fn test_one_checkpoint_per_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = build(dir.path(), settings(5, None), None);
        l.run().unwrap();
        assert_eq!(checkpoint_count(&dir.path().join("stub")), 5);
    }

    #[test]
    fn test_zero_step_bound_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = build(dir.path(), settings(0, None), None);
        let state = l.run().unwrap();
        assert_eq!(state.step, 0);
        assert!(l.train_summary().scalars.is_empty());
    }

    #[test]
    fn test_time_bound_stops_after_current_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = build(dir.path(), settings(1_000, Some(0)), None);
        let state = l.run().unwrap();
        assert_eq!(state.step, 1);
        assert_eq!(checkpoint_count(&dir.path().join("stub")), 1);
    }

    #[test]
    fn test_identical_setup_gives_identical_losses() {
        let a_dir = tempfile::tempdir().unwrap();
        let b_dir = tempfile::tempdir().unwrap();
        let mut a = build(a_dir.path(), settings(3, None), None);
        let mut b = build(b_dir.path(), settings(3, None), None);
        a.run().unwrap();
        b.run().unwrap();

        assert_eq!(series(a.train_summary(), "xent"), series(b.train_summary(), "xent"));
        assert_eq!(series(a.test_summary(), "xent"), series(b.test_summary(), "xent"));
    }

    #[test]
    fn test_evaluator_sees_synced_weights() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = build(dir.path(), settings(2, None), None);
        l.run().unwrap();
        assert_eq!(l.evaluator.weight, l.trainer().weight);
    }

    #[test]
    fn test_training_data_exhaustion_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // 4 batches: cycle 0 takes 3, cycle 1 runs dry after 1
        let mut l = build(dir.path(), settings(10, None), Some(4));

        let err = l.run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoopError>(),
            Some(LoopError::DataExhausted { consumed: 1, requested: 3, .. })
        ));
        assert_eq!(checkpoint_count(&dir.path().join("stub")), 1);
    }
}
