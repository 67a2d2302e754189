//! Session data logger
//!
//! Buffers frame records for one session in a bounded FIFO, stamps frame
//! numbers and elapsed time, and produces the aggregate stats, the report
//! and the exported artifacts at session end.

use crate::config::SessionConfig;
use crate::error::PresenceError;
use crate::history::History;
use crate::session::export::{write_artifacts, RawSessionDump, ReportPaths};
use crate::session::report::{InterviewAnalysisReport, InterviewReporter};
use crate::session::stats::{compute_stats, SessionStats};
use crate::types::FrameRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Metadata returned when a session starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub buffer_capacity: usize,
}

/// Result of finishing a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub report_paths: ReportPaths,
    /// Frames logged over the whole session, evicted ones included
    pub frame_count: u64,
    pub duration_sec: f64,
    pub report: InterviewAnalysisReport,
}

/// `session_YYYYMMDD_HHMMSS_<8 hex>`
pub fn new_session_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

#[derive(Debug, Clone)]
struct ActiveSession {
    info: SessionInfo,
    frames: History<FrameRecord>,
    frames_logged: u64,
    evicted: u64,
    first_timestamp: Option<f64>,
    last_elapsed: f64,
}

/// Bounded per-session frame buffer
#[derive(Debug, Clone, Default)]
pub struct SessionLogger {
    config: SessionConfig,
    active: Option<ActiveSession>,
}

impl SessionLogger {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.info.session_id.as_str())
    }

    /// Start a new session, discarding any session in progress
    pub fn start_session(&mut self) -> SessionInfo {
        let started_at = Utc::now();
        let info = SessionInfo {
            session_id: new_session_id(started_at),
            started_at,
            buffer_capacity: self.config.buffer_capacity.max(1),
        };
        self.active = Some(ActiveSession {
            info: info.clone(),
            frames: History::new(self.config.buffer_capacity),
            frames_logged: 0,
            evicted: 0,
            first_timestamp: None,
            last_elapsed: 0.0,
        });
        info
    }

    fn session(&self) -> Result<&ActiveSession, PresenceError> {
        self.active
            .as_ref()
            .ok_or_else(|| PresenceError::NoActiveSession("no session has been started".to_string()))
    }

    /// Append a record, stamping its frame number and elapsed time from the
    /// capture `timestamp`. Returns the stamped record.
    pub fn log_frame_data(
        &mut self,
        mut record: FrameRecord,
        timestamp: f64,
    ) -> Result<FrameRecord, PresenceError> {
        let session = self
            .active
            .as_mut()
            .ok_or_else(|| PresenceError::NoActiveSession("cannot log frame before start_session".to_string()))?;

        let first = *session.first_timestamp.get_or_insert(timestamp);
        session.frames_logged += 1;
        record.frame_number = session.frames_logged;
        record.elapsed_seconds = (timestamp - first).max(0.0);
        session.last_elapsed = session.last_elapsed.max(record.elapsed_seconds);

        if session.frames.push(record.clone()).is_some() {
            session.evicted += 1;
        }
        Ok(record)
    }

    /// Frames currently buffered, oldest first
    pub fn frames(&self) -> Result<Vec<FrameRecord>, PresenceError> {
        Ok(self.session()?.frames.to_vec())
    }

    pub fn buffered_count(&self) -> usize {
        self.active.as_ref().map_or(0, |s| s.frames.len())
    }

    pub fn frames_logged(&self) -> u64 {
        self.active.as_ref().map_or(0, |s| s.frames_logged)
    }

    pub fn evicted_count(&self) -> u64 {
        self.active.as_ref().map_or(0, |s| s.evicted)
    }

    pub fn aggregate_stats(&self) -> Result<SessionStats, PresenceError> {
        Ok(compute_stats(&self.frames()?))
    }

    /// Build the interview report over the buffered frames
    pub fn export_interview_analysis(
        &self,
        reporter: &InterviewReporter,
    ) -> Result<InterviewAnalysisReport, PresenceError> {
        let session = self.session()?;
        let frames = session.frames.to_vec();
        Ok(reporter.build(&session.info.session_id, session.last_elapsed, &frames, Utc::now()))
    }

    /// Compute the report, write both artifacts into `dir` and close the
    /// session. On I/O failure the session stays open.
    pub fn finish(&mut self, dir: &Path, reporter: &InterviewReporter) -> Result<SessionSummary, PresenceError> {
        let session = self.session()?;
        let frames = session.frames.to_vec();
        let report = reporter.build(&session.info.session_id, session.last_elapsed, &frames, Utc::now());
        let dump = RawSessionDump {
            session_id: session.info.session_id.clone(),
            start_time: session.info.started_at.to_rfc3339(),
            frame_count: frames.len() as u64,
            evicted_frames: session.evicted,
            stats: compute_stats(&frames),
            frames,
        };
        let report_paths = write_artifacts(dir, &dump, &report)?;

        let summary = SessionSummary {
            session_id: dump.session_id,
            report_paths,
            frame_count: session.frames_logged,
            duration_sec: session.last_elapsed,
            report,
        };
        info!(
            session_id = %summary.session_id,
            frames = summary.frame_count,
            evicted = dump.evicted_frames,
            "session exported"
        );
        self.active = None;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::export::{load_raw_dump, load_report};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(score: f64) -> FrameRecord {
        let mut record = FrameRecord::default();
        record.attention.attention_score = score;
        record
    }

    #[test]
    fn test_log_before_start() {
        let mut logger = SessionLogger::default();
        let err = logger.log_frame_data(record(0.5), 0.0).unwrap_err();
        assert!(matches!(err, PresenceError::NoActiveSession(_)));
    }

    #[test]
    fn test_session_id_format() {
        let now = Utc::now();
        let id = new_session_id(now);
        let prefix = format!("session_{}_", now.format("%Y%m%d_%H%M%S"));
        assert!(id.starts_with(&prefix));
        let suffix = &id[prefix.len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(new_session_id(now), new_session_id(now));
    }

    #[test]
    fn test_stamping() {
        let mut logger = SessionLogger::default();
        logger.start_session();
        let first = logger.log_frame_data(record(0.5), 10.0).unwrap();
        let second = logger.log_frame_data(record(0.5), 10.5).unwrap();
        assert_eq!(first.frame_number, 1);
        assert_eq!(first.elapsed_seconds, 0.0);
        assert_eq!(second.frame_number, 2);
        assert_eq!(second.elapsed_seconds, 0.5);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut logger = SessionLogger::new(SessionConfig {
            buffer_capacity: 3,
            ..SessionConfig::default()
        });
        logger.start_session();
        for i in 0..5 {
            logger.log_frame_data(record(0.5), i as f64).unwrap();
        }
        let frames = logger.frames().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames.iter().map(|f| f.frame_number).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
        assert_eq!(logger.evicted_count(), 2);
        assert_eq!(logger.frames_logged(), 5);
    }

    #[test]
    fn test_restart_clears_buffer() {
        let mut logger = SessionLogger::default();
        let first = logger.start_session();
        logger.log_frame_data(record(0.5), 0.0).unwrap();
        let second = logger.start_session();
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(logger.buffered_count(), 0);
        let stamped = logger.log_frame_data(record(0.5), 3.0).unwrap();
        assert_eq!(stamped.frame_number, 1);
    }

    #[test]
    fn test_finish_writes_loadable_artifacts() {
        let dir = tempdir().unwrap();
        let mut logger = SessionLogger::default();
        let info = logger.start_session();
        for i in 0..30 {
            logger.log_frame_data(record(0.6), i as f64 / 30.0).unwrap();
        }
        let reporter = InterviewReporter::default();
        let summary = logger.finish(dir.path(), &reporter).unwrap();

        assert_eq!(summary.session_id, info.session_id);
        assert_eq!(summary.frame_count, 30);
        assert!((summary.duration_sec - 29.0 / 30.0).abs() < 1e-9);
        assert!(summary
            .report_paths
            .raw
            .ends_with(format!("{}_raw.json", info.session_id)));

        let report = load_report(&summary.report_paths.analysis).unwrap();
        assert_eq!(report, summary.report);

        let dump = load_raw_dump(&summary.report_paths.raw).unwrap();
        assert_eq!(dump.frame_count, 30);
        assert_eq!(dump.evicted_frames, 0);
        assert_eq!(dump.stats.total_frames, 30);
        assert_eq!(dump.frames[0].frame_number, 1);

        assert!(!logger.is_active());
        assert!(matches!(
            logger.finish(dir.path(), &reporter),
            Err(PresenceError::NoActiveSession(_))
        ));
    }

    #[test]
    fn test_export_failure_keeps_session() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();

        let mut logger = SessionLogger::default();
        logger.start_session();
        logger.log_frame_data(record(0.5), 0.0).unwrap();
        let err = logger
            .finish(&blocker, &InterviewReporter::default())
            .unwrap_err();
        assert!(matches!(err, PresenceError::Io(_)));
        assert!(logger.is_active());
    }
}
