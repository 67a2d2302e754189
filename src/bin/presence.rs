//! Presence CLI - Command-line interface for Synheart Presence
//!
//! Commands:
//! - run: Process a recorded frame stream into an interview report
//! - validate: Check frame landmark shapes
//! - report: Summarize a saved analysis report
//! - config: Print the effective configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use synheart_presence::session::{load_report, InterviewAnalysisReport};
use synheart_presence::types::FrameInput;
use synheart_presence::{
    FrameAdapter, InterviewSession, PresenceConfig, PresenceError, VERSION,
};

/// Presence - On-device behavioral signals for interview practice
#[derive(Parser)]
#[command(name = "presence")]
#[command(author = "Synheart AI Inc")]
#[command(version = VERSION)]
#[command(about = "Turn landmark streams into interview behavior reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a frame stream into an interview report
    Run {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Directory for the raw and analysis artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// JSON configuration file (defaults for anything omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write each processed frame record to stdout as NDJSON
        #[arg(long)]
        emit_frames: bool,
    },

    /// Validate frame landmark shapes
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a saved analysis report
    Report {
        /// Path to a `<session_id>_analysis.json` file
        path: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// JSON configuration file to merge over the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable. Level from `RUST_LOG`.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(atty::is(atty::Stream::Stderr))
                .with_target(false),
        )
        .with(env_filter)
        .init();
}

fn run(cli: Cli) -> Result<(), PresenceCliError> {
    match cli.command {
        Commands::Run {
            input,
            input_format,
            output_dir,
            config,
            emit_frames,
        } => cmd_run(
            &input,
            input_format,
            output_dir.as_deref(),
            config.as_deref(),
            emit_frames,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Report { path, json } => cmd_report(&path, json),

        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<PresenceConfig, PresenceCliError> {
    match path {
        Some(path) => Ok(PresenceConfig::from_file(path)?),
        None => Ok(PresenceConfig::default()),
    }
}

fn is_stdin(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(input: &Path) -> Result<String, PresenceCliError> {
    if is_stdin(input) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_frames(input: &Path, input_format: &InputFormat) -> Result<Vec<FrameInput>, PresenceCliError> {
    let data = read_input(input)?;
    let frames = match input_format {
        InputFormat::Ndjson => FrameAdapter::parse_ndjson(&data)?,
        InputFormat::Json => FrameAdapter::parse_array(&data)?,
    };
    Ok(frames)
}

fn cmd_run(
    input: &Path,
    input_format: InputFormat,
    output_dir: Option<&Path>,
    config: Option<&Path>,
    emit_frames: bool,
) -> Result<(), PresenceCliError> {
    let config = load_config(config)?;
    let mut session = InterviewSession::new(config);
    session.start_session();

    let mut stdout = io::stdout();
    let mut process = |session: &mut InterviewSession, frame: &FrameInput| -> Result<(), PresenceCliError> {
        let record = match session.process_frame(frame) {
            Ok(record) => record,
            Err(PresenceError::InvalidFrame(reason)) => {
                warn!(timestamp = frame.timestamp, %reason, "skipping invalid frame");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if emit_frames {
            writeln!(stdout, "{}", serde_json::to_string(&record)?)?;
        }
        Ok(())
    };

    match input_format {
        // NDJSON is processed line by line so long recordings stream
        InputFormat::Ndjson => {
            let reader: Box<dyn BufRead> = if is_stdin(input) {
                Box::new(BufReader::new(io::stdin()))
            } else {
                Box::new(BufReader::new(File::open(input)?))
            };
            for (line_num, line) in reader.lines().enumerate() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let frame: FrameInput = serde_json::from_str(trimmed).map_err(|e| {
                    PresenceCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
                })?;
                process(&mut session, &frame)?;
            }
        }
        InputFormat::Json => {
            for frame in read_frames(input, &input_format)? {
                process(&mut session, &frame)?;
            }
        }
    }

    if session.frames_logged() == 0 {
        return Err(PresenceCliError::NoFrames);
    }

    let report = match output_dir {
        Some(dir) => {
            let summary = session.stop_session(dir)?;
            eprintln!(
                "Wrote {} and {}",
                summary.report_paths.raw.display(),
                summary.report_paths.analysis.display()
            );
            summary.report
        }
        None => session.current_report()?,
    };

    if !emit_frames {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    io::stdout().flush()?;
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), PresenceCliError> {
    let frames = read_frames(input, &input_format)?;
    let results = FrameAdapter::validate_frames(&frames);

    let report = ValidationReport {
        total_frames: frames.len(),
        valid_frames: frames.len() - results.len(),
        invalid_frames: results.len(),
        errors: results
            .into_iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                timestamp: r.timestamp,
                errors: r.errors,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for detail in &report.errors {
                for error in &detail.errors {
                    println!(
                        "  - Frame {} (t={:.3}s): {}",
                        detail.index, detail.timestamp, error
                    );
                }
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(PresenceCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_report(path: &Path, json: bool) -> Result<(), PresenceCliError> {
    let report = load_report(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &InterviewAnalysisReport) {
    let score = &report.overall_interview_score;
    println!("Interview Report");
    println!("================");
    println!("Session:   {}", report.session_id);
    println!("Generated: {}", report.generated_at_utc);
    println!("Producer:  {} {}", report.producer.name, report.producer.version);
    println!("Duration:  {:.1}s ({} frames)", report.duration_sec, report.total_frames);
    println!();
    println!("Overall:           {:5.1}  {}", score.overall_score, score.rating.as_str());
    println!("Attention:         {:5.1}", score.attention_score);
    println!("Posture:           {:5.1}", score.posture_score);
    println!("Emotional control: {:5.1}", score.emotional_control_score);
    println!("Gesture control:   {:5.1}", score.gesture_control_score);
}

fn cmd_config(config: Option<&Path>) -> Result<(), PresenceCliError> {
    let config = load_config(config)?;
    println!("{}", config.to_json()?);
    Ok(())
}

// Error types

#[derive(Debug)]
enum PresenceCliError {
    Io(io::Error),
    Presence(PresenceError),
    Json(serde_json::Error),
    NoFrames,
    ValidationFailed(usize),
    ParseError(String),
}

impl From<io::Error> for PresenceCliError {
    fn from(e: io::Error) -> Self {
        PresenceCliError::Io(e)
    }
}

impl From<PresenceError> for PresenceCliError {
    fn from(e: PresenceError) -> Self {
        PresenceCliError::Presence(e)
    }
}

impl From<serde_json::Error> for PresenceCliError {
    fn from(e: serde_json::Error) -> Self {
        PresenceCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PresenceCliError> for CliError {
    fn from(e: PresenceCliError) -> Self {
        match e {
            PresenceCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PresenceCliError::Presence(e) => {
                let (code, hint) = match &e {
                    PresenceError::Config(_) => ("CONFIG_ERROR", "Run 'presence config' to see valid settings"),
                    PresenceError::InvalidFrame(_) => ("INVALID_FRAME", "Run 'presence validate' for details"),
                    PresenceError::ParseError(_) | PresenceError::JsonError(_) => {
                        ("PARSE_ERROR", "Ensure each frame has timestamp, width and height")
                    }
                    PresenceError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    _ => ("PRESENCE_ERROR", "Re-run with RUST_LOG=debug for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PresenceCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PresenceCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PresenceCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PresenceCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp: f64,
    errors: Vec<String>,
}
