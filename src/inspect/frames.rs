//! JSON-lines frame source
//!
//! One [`Frame`] per line. Blank lines are ignored; a malformed line is logged
//! and skipped so one bad frame never ends the session.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::detect::Frame;
use crate::store::StoreError;

pub struct FrameReader<R> {
    lines: Lines<R>,
    line_no: usize,
    malformed: Arc<AtomicUsize>,
}

impl FrameReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            malformed: Arc::default(),
        }
    }

    /// Lines skipped because they did not parse
    pub fn malformed(&self) -> usize {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Shared skip counter that stays readable after the reader moves into
    /// a producer thread
    pub fn malformed_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.malformed)
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(line = self.line_no + 1, error = %e, "frame source read failed");
                    return None;
                }
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Frame>(trimmed) {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    self.malformed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(line = self.line_no, error = %e, "skipping malformed frame");
                }
            }
        }
    }
}
