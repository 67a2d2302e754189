//! Session artifacts
//!
//! `<session_id>_raw.json` holds the buffered frames with aggregate stats;
//! `<session_id>_analysis.json` holds the interview report.

use crate::error::PresenceError;
use crate::session::report::InterviewAnalysisReport;
use crate::session::stats::SessionStats;
use crate::types::FrameRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Raw per-frame dump of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSessionDump {
    pub session_id: String,
    pub start_time: String,
    /// Frames in `frames`
    pub frame_count: u64,
    /// Frames dropped from the front of the buffer at capacity
    pub evicted_frames: u64,
    pub stats: SessionStats,
    pub frames: Vec<FrameRecord>,
}

/// Where the artifacts of a session were written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPaths {
    pub raw: PathBuf,
    pub analysis: PathBuf,
}

impl ReportPaths {
    pub fn for_session(dir: &Path, session_id: &str) -> Self {
        Self {
            raw: dir.join(format!("{session_id}_raw.json")),
            analysis: dir.join(format!("{session_id}_analysis.json")),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PresenceError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PresenceError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write both artifacts into `dir`, creating it if needed
pub fn write_artifacts(
    dir: &Path,
    dump: &RawSessionDump,
    report: &InterviewAnalysisReport,
) -> Result<ReportPaths, PresenceError> {
    fs::create_dir_all(dir)?;
    let paths = ReportPaths::for_session(dir, &dump.session_id);
    write_json(&paths.raw, dump)?;
    write_json(&paths.analysis, report)?;
    Ok(paths)
}

pub fn load_report(path: &Path) -> Result<InterviewAnalysisReport, PresenceError> {
    read_json(path)
}

pub fn load_raw_dump(path: &Path) -> Result<RawSessionDump, PresenceError> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::report::InterviewReporter;
    use crate::session::stats::compute_stats;
    use crate::types::{ExpressionMetrics, HeadPoseMetrics};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    /// Frames whose values need all 17 significant digits to survive JSON
    fn awkward_frames() -> Vec<FrameRecord> {
        (0..30)
            .map(|i| {
                let mut record = FrameRecord {
                    frame_number: i + 1,
                    elapsed_seconds: i as f64 / 30.0,
                    expression: Some(ExpressionMetrics {
                        face_detected: true,
                        mar: 0.1 + (i as f64) / 7.0 * 1e-3,
                        ear_avg: 0.3 - (i as f64) / 3.0 * 1e-3,
                        ..ExpressionMetrics::default()
                    }),
                    head_pose: Some(HeadPoseMetrics {
                        yaw: 1.0 / 3.0 * 1e-13,
                        solved: true,
                        engagement: 0.7,
                        ..HeadPoseMetrics::default()
                    }),
                    ..FrameRecord::default()
                };
                record.attention.attention_score = (i as f64 + 0.1) / 31.0;
                record
            })
            .collect()
    }

    #[test]
    fn test_artifacts_reload_bit_exact() {
        let dir = tempdir().unwrap();
        let frames = awkward_frames();
        let report = InterviewReporter::default().build(
            "session_test",
            29.0 / 30.0,
            &frames,
            Utc::now(),
        );
        let dump = RawSessionDump {
            session_id: "session_test".to_string(),
            start_time: Utc::now().to_rfc3339(),
            frame_count: frames.len() as u64,
            evicted_frames: 0,
            stats: compute_stats(&frames),
            frames,
        };

        let paths = write_artifacts(&dir.path().join("nested"), &dump, &report).unwrap();
        assert_eq!(paths, ReportPaths::for_session(&dir.path().join("nested"), "session_test"));
        assert_eq!(load_report(&paths.analysis).unwrap(), report);
        assert_eq!(load_raw_dump(&paths.raw).unwrap(), dump);

        let sum: f64 = report.emotions.distribution.percentages.values().sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }
}
