//! Session logging, aggregation and export

pub mod export;
pub mod logger;
pub mod report;
pub mod stats;

pub use export::{load_raw_dump, load_report, RawSessionDump, ReportPaths};
pub use logger::{SessionInfo, SessionLogger, SessionSummary};
pub use report::{InterviewAnalysisReport, InterviewReporter, OverallScore, Rating};
pub use stats::{compute_stats, Distribution, SessionStats};
