//! Recorded landmark stream playback.
//!
//! One `LandmarkerResult` JSON object per line, in the detector's own output
//! shape (`landmarks` / `worldLandmarks`).

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::iter::Peekable;
use std::time::Duration;
use tracing::info;

use super::landmark::LandmarkerResult;
use super::landmarker::LandmarkBackend;
use crate::config::DetectorConfig;

pub struct ReplayBackend<R: BufRead> {
    lines: Peekable<Lines<R>>,
    line_no: usize,
    exhausted: bool,
}

impl<R: BufRead> ReplayBackend<R> {
    pub fn from_reader(reader: R) -> Self {
        let mut replay = Self {
            lines: reader.lines().peekable(),
            line_no: 0,
            exhausted: false,
        };
        replay.skip_blank_lines();
        replay
    }

    /// 次のフレームを読む。終端以降は空の結果を返す
    pub fn next_frame(&mut self) -> Result<LandmarkerResult> {
        let Some(line) = self.lines.next() else {
            return Ok(LandmarkerResult::default());
        };
        self.line_no += 1;
        let line_no = self.line_no;
        let result = line
            .with_context(|| format!("Failed to read replay line {}", line_no))
            .and_then(|line| {
                serde_json::from_str::<LandmarkerResult>(&line)
                    .with_context(|| format!("Malformed landmark record at line {}", line_no))
            });
        self.skip_blank_lines();
        result
    }

    /// 次のレコードまで空行を読み飛ばし、終端なら exhausted にする
    fn skip_blank_lines(&mut self) {
        while let Some(Ok(line)) = self.lines.peek() {
            if !line.trim().is_empty() {
                break;
            }
            self.lines.next();
            self.line_no += 1;
        }
        if self.lines.peek().is_none() && !self.exhausted {
            info!("Replay finished after {} lines", self.line_no);
            self.exhausted = true;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl LandmarkBackend for ReplayBackend<BufReader<File>> {
    fn open(config: &DetectorConfig) -> Result<Self> {
        let path = config
            .replay_path
            .as_ref()
            .context("detector.replay_path is not set")?;
        let file = File::open(path)
            .with_context(|| format!("Failed to open replay {}", path.display()))?;
        info!("Replaying landmarks from {}", path.display());
        Ok(Self::from_reader(BufReader::new(file)))
    }

    fn detect(&mut self, _timestamp: Duration) -> Result<LandmarkerResult> {
        self.next_frame()
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
