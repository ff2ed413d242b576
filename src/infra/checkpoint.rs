// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Owns the per-run checkpoint directory:
//
//   ckpts/<run>/
//     opts.json                 ← the full run configuration
//     20260301_141502.mpk.gz    ← weights, one file per cycle
//     20260301_141502_1.mpk.gz  ← second save within the same second
//     ...
//
// Checkpoint names are local wall-clock timestamps. Two saves in
// the same second get a `_<n>` suffix, so names sort in save order
// and an existing checkpoint is never overwritten. The weights
// themselves are written by the trainer (CompactRecorder appends
// the `.mpk.gz`); this module only hands out and finds the stems.
// The directory is scanned once when the manager is created; after
// that the last issued name is remembered in memory.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const CHECKPOINT_SUFFIX: &str = ".mpk.gz";
const OPTS_FILE:         &str = "opts.json";
const TIMESTAMP_FORMAT:  &str = "%Y%m%d_%H%M%S";

/// Length of a formatted TIMESTAMP_FORMAT string
const TIMESTAMP_LEN: usize = 15;

/// (timestamp, sequence) ordering key of one checkpoint
type CheckpointKey = (String, u32);

pub struct CheckpointManager {
    dir:  PathBuf,
    last: Option<CheckpointKey>,
}

impl CheckpointManager {
    /// Use `<root>/<run>`, creating it if needed.
    pub fn new(root: impl AsRef<Path>, run: &str) -> Result<Self> {
        let dir = root.as_ref().join(run);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Self::scanned(dir)
    }

    /// Open `<root>/<run>` without creating it.
    pub fn open(root: impl AsRef<Path>, run: &str) -> Result<Self> {
        let dir = root.as_ref().join(run);
        if !dir.is_dir() {
            anyhow::bail!("No checkpoint directory '{}'. Has run '{}' been trained?", dir.display(), run);
        }
        Self::scanned(dir)
    }

    fn scanned(dir: PathBuf) -> Result<Self> {
        let last = existing_keys(&dir)?.into_iter().max();
        if let Some((ts, seq)) = &last {
            tracing::debug!("Continuing after checkpoint '{}' in '{}'", stem(ts, *seq), dir.display());
        }
        Ok(Self { dir, last })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_opts<T: Serialize>(&self, opts: &T) -> Result<()> {
        let path = self.dir.join(OPTS_FILE);
        let json = serde_json::to_string_pretty(opts)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write options to '{}'", path.display()))?;
        tracing::debug!("Saved run options to '{}'", path.display());
        Ok(())
    }

    pub fn load_opts<T: DeserializeOwned>(&self) -> Result<T> {
        let path = self.dir.join(OPTS_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read options from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed options file '{}'", path.display()))
    }

    /// Stem for the next checkpoint, named after the current time.
    pub fn next_checkpoint_path(&mut self) -> PathBuf {
        let now = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.checkpoint_path_at(now)
    }

    /// Stem of the most recent checkpoint in the run directory.
    pub fn latest_checkpoint(&self) -> Result<PathBuf> {
        let (ts, seq) = existing_keys(&self.dir)?
            .into_iter()
            .max()
            .with_context(|| format!("No checkpoints found in '{}'", self.dir.display()))?;
        Ok(self.dir.join(stem(&ts, seq)))
    }

    fn checkpoint_path_at(&mut self, timestamp: String) -> PathBuf {
        let candidate: CheckpointKey = (timestamp, 0);
        let key = match self.last.take() {
            Some((last_ts, last_seq)) if candidate.0 <= last_ts => (last_ts, last_seq + 1),
            _ => candidate,
        };
        let path = self.dir.join(stem(&key.0, key.1));
        self.last = Some(key);
        path
    }
}

fn existing_keys(dir: &Path) -> Result<Vec<CheckpointKey>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Cannot list checkpoint dir '{}'", dir.display()))?;

    let mut keys = Vec::new();
    for entry in entries {
        let name = entry?.file_name();
        if let Some(key) = name.to_str().and_then(parse_checkpoint_name) {
            keys.push(key);
        }
    }
    Ok(keys)
}

fn stem(timestamp: &str, seq: u32) -> String {
    if seq == 0 {
        timestamp.to_string()
    } else {
        format!("{timestamp}_{seq}")
    }
}

/// "20260301_141502.mpk.gz" → ("20260301_141502", 0)
/// "20260301_141502_3.mpk.gz" → ("20260301_141502", 3)
fn parse_checkpoint_name(name: &str) -> Option<CheckpointKey> {
    let stem = name.strip_suffix(CHECKPOINT_SUFFIX)?;
    if stem.len() < TIMESTAMP_LEN || !stem.is_char_boundary(TIMESTAMP_LEN) {
        return None;
    }
    let (ts, rest) = stem.split_at(TIMESTAMP_LEN);

    let well_formed = ts.char_indices().all(|(i, c)| {
        if i == 8 { c == '_' } else { c.is_ascii_digit() }
    });
    if !well_formed {
        return None;
    }

    let seq = match rest {
        "" => 0,
        _  => rest.strip_prefix('_')?.parse().ok()?,
    };
    Some((ts.to_string(), seq))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn touch(dir: &Path, stem: &Path) {
        let name = format!("{}{}", stem.file_name().unwrap().to_str().unwrap(), CHECKPOINT_SUFFIX);
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_parse_checkpoint_names() {
        assert_eq!(parse_checkpoint_name("20260301_141502.mpk.gz"), Some(("20260301_141502".into(), 0)));
        assert_eq!(parse_checkpoint_name("20260301_141502_12.mpk.gz"), Some(("20260301_141502".into(), 12)));
        assert_eq!(parse_checkpoint_name("opts.json"), None);
        assert_eq!(parse_checkpoint_name("model_epoch_1.mpk.gz"), None);
        assert_eq!(parse_checkpoint_name("20260301_141502x3.mpk.gz"), None);
    }

    #[test]
    fn test_same_second_saves_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = CheckpointManager::new(dir.path(), "run").unwrap();

        // nothing is written to disk between calls
        let mut names = Vec::new();
        for _ in 0..4 {
            let path = mgr.checkpoint_path_at("20260301_141502".into());
            names.push(path.file_name().unwrap().to_str().unwrap().to_string());
        }

        assert_eq!(
            names,
            ["20260301_141502", "20260301_141502_1", "20260301_141502_2", "20260301_141502_3"]
        );
    }

    #[test]
    fn test_names_increase_even_if_clock_goes_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = CheckpointManager::new(dir.path(), "run").unwrap();

        let first = mgr.checkpoint_path_at("20260301_141502".into());
        let second = mgr.checkpoint_path_at("20260301_141459".into());
        assert!(second.file_name() > first.file_name());

        let later = mgr.checkpoint_path_at("20260301_141510".into());
        assert!(later.ends_with("20260301_141510"));
    }

    #[test]
    fn test_reopened_run_continues_after_existing_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("run");
        fs::create_dir_all(&run_dir).unwrap();
        for name in ["20260301_141502", "20260301_141502_4"] {
            touch(&run_dir, Path::new(name));
        }

        let mut mgr = CheckpointManager::open(dir.path(), "run").unwrap();
        let next = mgr.checkpoint_path_at("20260301_141502".into());
        assert!(next.ends_with("20260301_141502_5"));

        // files added after the scan are not seen; the cached key still advances
        touch(mgr.dir(), Path::new("20260301_141502_9"));
        let after = mgr.checkpoint_path_at("20260301_141502".into());
        assert!(after.ends_with("20260301_141502_6"));
    }

    #[test]
    fn test_latest_checkpoint_uses_sequence_order() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path(), "run").unwrap();
        assert!(mgr.latest_checkpoint().is_err());

        for name in ["20260301_141502", "20260301_141502_2", "20260301_141502_10", "20260228_235959"] {
            touch(mgr.dir(), Path::new(name));
        }
        assert_eq!(mgr.latest_checkpoint().unwrap(), mgr.dir().join("20260301_141502_10"));
    }

    #[test]
    fn test_next_checkpoint_path_is_inside_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = CheckpointManager::new(dir.path(), "run").unwrap();
        let path = mgr.next_checkpoint_path();
        assert_eq!(path.parent().unwrap(), dir.path().join("run"));
        assert_eq!(path.file_name().unwrap().len(), TIMESTAMP_LEN);
    }

    #[test]
    fn test_opts_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Opts {
            run:   String,
            steps: usize,
        }

        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path(), "r1").unwrap();
        let opts = Opts { run: "r1".into(), steps: 7 };
        mgr.save_opts(&opts).unwrap();

        let reopened = CheckpointManager::open(dir.path(), "r1").unwrap();
        assert_eq!(reopened.load_opts::<Opts>().unwrap(), opts);
        assert!(CheckpointManager::open(dir.path(), "missing").is_err());
    }
}
