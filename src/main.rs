//! streamlog - inspect and join recorded sessions
//!
//! # Usage
//!
//! ```bash
//! # Header, metadata and record count of a container
//! streamlog inspect logs/streams/20250101_100000_EEG.bin
//!
//! # Sessions found in the event directory
//! streamlog sessions
//!
//! # Trials of a session (identifier, suffix or timestamp)
//! streamlog trials SUBJ01
//!
//! # Samples per trial for a container/session pair
//! streamlog segments 20250101_100000 SUBJ01
//!
//! # Replay a JSON-lines capture of the control stream into event tables
//! streamlog log-events control.jsonl --suffix SUBJ01
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use streamlog_rs::{
    config::LoggerConfig,
    container::ContainerReader,
    events::TrialLogger,
    session::{joiner::load_session_events, SessionCatalog, SessionJoiner, SessionKey},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Multi-stream recording toolkit
#[derive(Parser, Debug)]
#[command(name = "streamlog")]
#[command(author, version, about = "Inspect and join recorded stream sessions", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write a daily rotated log file into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the header and metadata of a container
    Inspect {
        /// Container file
        path: PathBuf,

        /// Also print the first N records
        #[arg(short, long, default_value = "0")]
        records: usize,

        /// Fail on a truncated final record
        #[arg(long)]
        strict: bool,
    },

    /// List the sessions in the event directory
    Sessions {
        /// Event table directory
        #[arg(long)]
        event_dir: Option<PathBuf>,
    },

    /// List the trials of a session
    Trials {
        /// Session identifier, suffix or timestamp
        session: String,

        /// Event table directory
        #[arg(long)]
        event_dir: Option<PathBuf>,
    },

    /// Cut a container into per-trial segments
    Segments {
        /// Container file name prefix (e.g. its timestamp)
        stream: String,

        /// Session identifier, suffix or timestamp
        session: String,

        /// Container directory
        #[arg(long)]
        stream_dir: Option<PathBuf>,

        /// Event table directory
        #[arg(long)]
        event_dir: Option<PathBuf>,
    },

    /// Replay control messages from a JSON-lines file into event tables
    LogEvents {
        /// Input file, one `{"timestamp": .., "payload": ..}` per line
        input: PathBuf,

        /// Session suffix (defaults to the configured one)
        #[arg(short, long)]
        suffix: Option<String>,

        /// Event table directory
        #[arg(long)]
        event_dir: Option<PathBuf>,
    },
}

/// One replayed control message
#[derive(Debug, Deserialize)]
struct ReplayLine {
    timestamp: f64,
    /// Either the JSON object itself or its text
    payload: Value,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref())?;

    let config = match &cli.config {
        Some(path) => LoggerConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => LoggerConfig::load_or_default(),
    };

    match cli.command {
        Commands::Inspect {
            path,
            records,
            strict,
        } => inspect(&path, records, strict),
        Commands::Sessions { event_dir } => {
            sessions(&event_dir.unwrap_or_else(|| config.event_dir.clone()))
        }
        Commands::Trials { session, event_dir } => trials(
            &event_dir.unwrap_or_else(|| config.event_dir.clone()),
            &session,
        ),
        Commands::Segments {
            stream,
            session,
            stream_dir,
            event_dir,
        } => {
            let joiner = SessionJoiner::new(
                stream_dir.unwrap_or_else(|| config.stream_dir.clone()),
                event_dir.unwrap_or_else(|| config.event_dir.clone()),
            );
            segments(&joiner, &stream, &session)
        }
        Commands::LogEvents {
            input,
            suffix,
            event_dir,
        } => {
            let mut config = config;
            if let Some(suffix) = suffix {
                config.session_suffix = suffix;
            }
            if let Some(event_dir) = event_dir {
                config.event_dir = event_dir;
            }
            log_events(&input, &config)
        }
    }
}

/// Console logging, plus a daily file when `log_dir` is given
fn init_tracing(
    log_dir: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, "streamlog.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,streamlog_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn inspect(path: &Path, records: usize, strict: bool) -> anyhow::Result<()> {
    let mut reader = ContainerReader::open(path)?;
    let header = reader.header().clone();
    let metadata = reader.metadata().clone();

    println!("File:         {}", path.display());
    println!("Stream:       {}", header.name);
    println!("Version:      {}", header.version);
    println!("Channels:     {}", header.channel_count);
    println!("Sample rate:  {} Hz", header.sample_rate);
    println!("Encoding:     {}", header.encoding.display_name());
    println!("Metadata:     v{}", metadata.version);
    println!("Source:       {}", metadata.source_id);
    for (name, unit) in metadata.channel_names.iter().zip(&metadata.units) {
        println!("  {:<12} [{}]", name, unit);
    }
    for (key, value) in &metadata.extra {
        println!("  extra {} = {}", key, value);
    }

    for record in reader.records().take(records) {
        match record {
            Ok(record) => println!("{:>14.6}  {:?}", record.timestamp, record.samples),
            // Reported below with the record count
            Err(e) if e.is_recoverable() => break,
            Err(e) => return Err(e.into()),
        }
    }

    let loaded = if strict {
        ContainerReader::load_strict(path)?
    } else {
        ContainerReader::load(path)?
    };
    match loaded.metadata.start_time {
        Some(t) if loaded.start_time_estimated => println!("Start time:   {} (estimated)", t),
        Some(t) => println!("Start time:   {}", t),
        None => println!("Start time:   -"),
    }
    println!("Records:      {}", loaded.record_count());
    if let Some(truncation) = loaded.truncation() {
        println!("Warning:      {}", truncation);
    }
    Ok(())
}

fn sessions(event_dir: &Path) -> anyhow::Result<()> {
    let catalog = SessionCatalog::scan(event_dir)?;
    if catalog.is_empty() {
        println!("No sessions in {}", event_dir.display());
        return Ok(());
    }
    for id in catalog.ids() {
        let started = SessionKey::parse(id)
            .and_then(|k| k.started_at())
            .map(|t| t.to_string())
            .unwrap_or_default();
        println!("{:<40} {}", id, started);
    }
    Ok(())
}

fn trials(event_dir: &Path, key: &str) -> anyhow::Result<()> {
    let session_id = SessionCatalog::scan(event_dir)?.resolve(key)?;
    let events = load_session_events(event_dir, &session_id)?;

    println!("Session {} ({} trials)", session_id, events.trials.len());
    for (i, trial) in events.trials.iter().enumerate() {
        let end = trial
            .end_time()
            .map(|t| format!("{:.6}", t))
            .unwrap_or_else(|| "open".to_string());
        println!(
            "{:>4}  {:>14.6} -> {:>14}  {:>3} events  {}",
            i,
            trial.start_time(),
            end,
            trial.events.len(),
            trial.file().unwrap_or("-")
        );
    }
    Ok(())
}

fn segments(joiner: &SessionJoiner, stream: &str, session: &str) -> anyhow::Result<()> {
    let session = joiner.load(stream, session)?;
    println!(
        "{} x {} samples joined with session {}",
        session.container.channel_count(),
        session.container.record_count(),
        session.session_id
    );
    for segment in session.segments() {
        let end = segment
            .end
            .map(|t| format!("{:.6}", t))
            .unwrap_or_else(|| "end".to_string());
        println!(
            "{:>4}  {:>14.6} -> {:>14}  {:>8} samples",
            segment.trial_index,
            segment.start,
            end,
            segment.len()
        );
    }
    Ok(())
}

fn log_events(input: &Path, config: &LoggerConfig) -> anyhow::Result<()> {
    let file = std::fs::File::open(input).with_context(|| format!("Failed to open {:?}", input))?;
    let mut logger = TrialLogger::create(config)?;

    for (number, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let replay: ReplayLine = match serde_json::from_str(&line) {
            Ok(replay) => replay,
            Err(e) => {
                tracing::warn!("{:?}:{}: skipping line: {}", input, number + 1, e);
                continue;
            }
        };
        let payload = match replay.payload {
            Value::String(text) => text,
            other => other.to_string(),
        };
        logger.handle_raw(&payload, replay.timestamp)?;
    }

    let summary = logger.finish()?;
    println!(
        "Session {}: {} messages, {} malformed, {} trials",
        summary.session_id,
        summary.stats.messages,
        summary.stats.malformed,
        summary.stats.trials_completed
    );
    if let Some(warning) = summary.incomplete_trial_warning() {
        println!("Warning: {}", warning);
    }
    Ok(())
}
