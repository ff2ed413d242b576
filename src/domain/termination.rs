// ============================================================
// Layer 3 — Termination Policy and Loop State
// ============================================================
// The loop stops when EITHER bound is hit:
//
//   step bound  — always present, counts completed cycles
//   time bound  — optional, wall-clock seconds since start
//
// Both bounds are checked by one predicate so the controller
// never branches on which of them is configured.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminationPolicy {
    /// Maximum number of completed cycles
    pub max_steps: usize,

    /// Optional wall-clock limit
    pub max_duration: Option<Duration>,
}

impl TerminationPolicy {
    pub fn new(max_steps: usize, max_secs: Option<u64>) -> Self {
        Self {
            max_steps,
            max_duration: max_secs.map(Duration::from_secs),
        }
    }

    /// `step` is the number of cycles completed so far.
    /// The time bound fires only once elapsed time strictly exceeds it.
    pub fn is_done(&self, step: usize, elapsed: Duration) -> bool {
        let steps_done = step >= self.max_steps;
        let time_done  = self.max_duration.is_some_and(|limit| elapsed > limit);
        steps_done || time_done
    }

    /// Seconds left before the time bound, negative once it has passed.
    /// None when no time bound is configured.
    pub fn remaining_secs(&self, elapsed: Duration) -> Option<f64> {
        self.max_duration
            .map(|limit| limit.as_secs_f64() - elapsed.as_secs_f64())
    }
}

/// The controller's private bookkeeping. Mutated only by TrainingLoop.
#[derive(Debug, Clone)]
pub struct LoopState {
    pub step:    usize,
    pub started: Instant,
    pub done:    bool,
}

impl LoopState {
    pub fn start() -> Self {
        Self { step: 0, started: Instant::now(), done: false }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Format seconds as h:mm:ss, with a leading '-' for negative values
pub fn hms(secs: f64) -> String {
    let sign  = if secs < 0.0 { "-" } else { "" };
    let total = secs.abs() as u64;
    format!("{sign}{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_bound_only() {
        let p = TerminationPolicy::new(3, None);
        assert!(!p.is_done(2, Duration::from_secs(1_000_000)));
        assert!(p.is_done(3, Duration::ZERO));
        assert!(p.remaining_secs(Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_time_bound_fires_before_step_bound() {
        let p = TerminationPolicy::new(100_000, Some(60));
        assert!(!p.is_done(1, Duration::from_secs(60)));
        assert!(p.is_done(1, Duration::from_millis(60_001)));
    }

    #[test]
    fn test_remaining_goes_negative() {
        let p = TerminationPolicy::new(10, Some(10));
        let r = p.remaining_secs(Duration::from_secs(12)).unwrap();
        assert!(r < 0.0);
    }

    #[test]
    fn test_hms() {
        assert_eq!(hms(0.0), "0:00:00");
        assert_eq!(hms(3725.4), "1:02:05");
        assert_eq!(hms(-61.0), "-0:01:01");
    }
}
