// ============================================================
// Layer 6 — Summary Writer
// ============================================================
// Append-only event streams, one per phase:
//
//   tb/<run>/training/events.jsonl
//   tb/<run>/test/events.jsonl
//   tb/<run>/test/images/debug_img_<step>.png
//
// Each line of events.jsonl is one record:
//
//   {"wall_time":1772374502.1,"step":3,"tag":"xent","kind":"scalar","value":0.41}
//   {"wall_time":1772374502.3,"step":3,"tag":"debug_img","kind":"image","path":"images/debug_img_3.png"}
//
// Image paths are relative to the stream directory. Records are
// buffered and only guaranteed on disk after flush(); the training
// loop flushes both streams once per cycle.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::stats::DebugImage;
use crate::domain::traits::SummarySink;

const EVENTS_FILE: &str = "events.jsonl";
const IMAGES_DIR:  &str = "images";

/// One line of an events file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEvent {
    pub wall_time: f64,
    pub step:      usize,
    pub tag:       String,
    #[serde(flatten)]
    pub payload:   EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventPayload {
    Scalar { value: f64 },
    Image  { path: String },
}

pub struct SummaryWriter {
    dir:    PathBuf,
    events: BufWriter<fs::File>,
}

impl SummaryWriter {
    /// Open (or continue) the stream in `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create summary dir '{}'", dir.display()))?;

        let events_path = dir.join(EVENTS_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)
            .with_context(|| format!("Cannot open '{}'", events_path.display()))?;

        tracing::debug!("Summary stream at '{}'", events_path.display());
        Ok(Self { dir, events: BufWriter::new(file) })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_event(&mut self, tag: &str, step: usize, payload: EventPayload) -> Result<()> {
        let event = SummaryEvent {
            wall_time: wall_time(),
            step,
            tag: tag.to_string(),
            payload,
        };
        serde_json::to_writer(&mut self.events, &event)?;
        self.events.write_all(b"\n")?;
        Ok(())
    }
}

impl SummarySink for SummaryWriter {
    fn add_scalars(&mut self, values: &[(&str, f64)], step: usize) -> Result<()> {
        for &(tag, value) in values {
            self.write_event(tag, step, EventPayload::Scalar { value })?;
        }
        Ok(())
    }

    fn add_image(&mut self, tag: &str, image: &DebugImage, step: usize) -> Result<()> {
        let images = self.dir.join(IMAGES_DIR);
        fs::create_dir_all(&images)?;

        let file_name = format!("{tag}_{step}.png");
        let full_path = images.join(&file_name);
        image
            .save(&full_path)
            .with_context(|| format!("Cannot write summary image '{}'", full_path.display()))?;

        let path = format!("{IMAGES_DIR}/{file_name}");
        self.write_event(tag, step, EventPayload::Image { path })
    }

    fn flush(&mut self) -> Result<()> {
        self.events
            .flush()
            .with_context(|| format!("Cannot flush summary stream in '{}'", self.dir.display()))
    }
}

/// Seconds since the Unix epoch, with sub-second precision
fn wall_time() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1e6
}

/// Read every event of a stream back, in write order.
#[cfg(test)]
pub fn read_events(dir: impl AsRef<Path>) -> Result<Vec<SummaryEvent>> {
    let path = dir.as_ref().join(EVENTS_FILE);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).with_context(|| format!("Bad event line: {l}")))
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_visible_after_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = SummaryWriter::new(dir.path().join("training")).unwrap();

        w.add_scalars(&[("xent", 0.5), ("precision", 0.25)], 3).unwrap();
        w.flush().unwrap();

        let events = read_events(w.dir()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].tag, "xent");
        assert_eq!(events[0].step, 3);
        assert_eq!(events[1].payload, EventPayload::Scalar { value: 0.25 });
        assert!(events[0].wall_time > 0.0);
    }

    #[test]
    fn test_image_written_next_to_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = SummaryWriter::new(dir.path()).unwrap();

        w.add_image("debug_img", &DebugImage::new(4, 2), 7).unwrap();
        w.flush().unwrap();

        assert!(dir.path().join("images/debug_img_7.png").exists());
        let events = read_events(dir.path()).unwrap();
        assert_eq!(events[0].payload, EventPayload::Image { path: "images/debug_img_7.png".into() });
    }

    #[test]
    fn test_event_line_format() {
        let event = SummaryEvent {
            wall_time: 1.5,
            step:      2,
            tag:       "xent".into(),
            payload:   EventPayload::Scalar { value: 0.75 },
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "scalar");
        assert_eq!(json["value"], 0.75);
        assert_eq!(json["tag"], "xent");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        for step in 0..2 {
            let mut w = SummaryWriter::new(dir.path()).unwrap();
            w.add_scalars(&[("xent", 1.0)], step).unwrap();
            w.flush().unwrap();
        }
        assert_eq!(read_events(dir.path()).unwrap().len(), 2);
    }
}
