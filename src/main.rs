//! Orchardlog CLI
//!
//! Collects sensor log sessions from a serial-connected data logger and
//! exports chill-unit tables.

use chrono::Utc;
use clap::{Parser, Subcommand};
use orchardlog::config::Config;
use orchardlog::core::{build_table, create_shared_buffer, parse_lines, ExportTable};
use orchardlog::diagnostics::{create_shared_log_with_persistence, DiagnosticsLog};
use orchardlog::session::{load_last_session, SessionError, SessionRunner, SessionSummary};
use orchardlog::transport::{device, LinkReader};
use orchardlog::VERSION;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Name of the persisted diagnostics counter file.
const DIAGNOSTICS_FILE: &str = "diagnostics.json";

#[derive(Parser)]
#[command(name = "orchardlog")]
#[command(version = VERSION)]
#[command(about = "Serial session logger for chill-unit tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture sessions from a connected logger
    Capture {
        /// Serial device path (already configured, e.g. /dev/ttyUSB0)
        device: PathBuf,

        /// Stop after one completed session instead of looping
        #[arg(long)]
        once: bool,

        /// Output directory for export tables
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Rebuild the export table from the last captured session
    Export {
        /// Output directory for the export table
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show configuration and cumulative statistics
    Status,

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Capture {
            device,
            once,
            output,
        } => {
            cmd_capture(&device, once, output);
        }
        Commands::Export { output } => {
            cmd_export(output);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn cmd_capture(device_path: &Path, once: bool, output: Option<PathBuf>) {
    println!("Orchardlog v{VERSION}");
    println!();

    let config = Config::load().unwrap_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    let export_dir = output.unwrap_or_else(|| config.export_path.clone());

    println!("Opening {}", device_path.display());
    let (source, sink) = match device::open(device_path) {
        Ok(halves) => halves,
        Err(e) => {
            eprintln!("Failed to open device: {e}");
            std::process::exit(1);
        }
    };

    let buffer = create_shared_buffer();
    let diagnostics =
        create_shared_log_with_persistence(config.data_path.join(DIAGNOSTICS_FILE));

    // Relay pipeline progress messages to the terminal.
    let messages = diagnostics.messages();
    let _printer = thread::spawn(move || {
        for msg in messages.iter() {
            println!("{msg}");
        }
    });

    let mut reader = LinkReader::new(Box::new(source), buffer.clone(), diagnostics.clone());
    if let Err(e) = reader.start() {
        eprintln!("Error starting reader: {e}");
        std::process::exit(1);
    }

    let mut runner = SessionRunner::new(
        buffer,
        Box::new(sink),
        diagnostics.clone(),
        config.clone(),
        reader.alive_flag(),
    );
    ctrlc_handler(runner.cancel_flag());

    println!("  Trigger marker: {:?}", config.trigger_marker);
    println!("  End marker: {:?}", config.end_marker);
    println!("  Export directory: {:?}", export_dir);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    loop {
        match runner.auto_cycle() {
            Ok(table) => {
                for line in table.preview_lines() {
                    println!("{line}");
                }
                match write_table(&table, &export_dir) {
                    Ok(path) => {
                        diagnostics.record_table_exported();
                        println!("Exported {} rows to {:?}", table.len(), path);
                    }
                    Err(e) => {
                        eprintln!("Error writing export: {e}");
                    }
                }
            }
            Err(SessionError::Cancelled) => {
                println!();
                println!("Stopping capture...");
                break;
            }
            Err(SessionError::LinkDown) => {
                eprintln!("Serial link lost; reconnect and run capture again.");
                break;
            }
            Err(e) => {
                eprintln!("Session failed: {e}");
                break;
            }
        }

        if once {
            break;
        }
    }

    reader.stop();

    if let Err(e) = diagnostics.save() {
        eprintln!("Warning: Could not save diagnostics: {e}");
    }

    println!();
    println!("{}", diagnostics.summary());
}

fn cmd_export(output: Option<PathBuf>) {
    let config = Config::load().unwrap_or_default();

    let lines = match load_last_session(&config.data_path) {
        Ok(lines) => lines,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Run 'orchardlog capture' to collect a session first.");
            std::process::exit(1);
        }
    };

    println!("Rebuilding export from {} saved lines", lines.len());

    let diagnostics = DiagnosticsLog::new();
    let records = parse_lines(&lines, &diagnostics);
    for msg in diagnostics.messages().try_iter() {
        println!("{msg}");
    }

    let table = build_table(&records);
    for line in table.preview_lines() {
        println!("{line}");
    }

    let export_dir = output.unwrap_or_else(|| config.export_path.clone());
    match write_table(&table, &export_dir) {
        Ok(path) => println!("Exported {} rows to {:?}", table.len(), path),
        Err(e) => {
            eprintln!("Error writing export: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Orchardlog Status");
    println!("=================");
    println!();

    println!("Configuration:");
    println!("  Trigger marker: {:?}", config.trigger_marker);
    println!("  End marker: {:?}", config.end_marker);
    println!("  Read command: '{}'", config.read_command as char);
    println!("  Poll interval: {}ms", config.poll_interval.as_millis());
    println!("  Export path: {:?}", config.export_path);
    println!();

    // Show the last captured session, if any
    let summary_path = config
        .data_path
        .join(orchardlog::session::SESSION_SUMMARY_FILE);
    if let Ok(content) = std::fs::read_to_string(&summary_path) {
        if let Ok(summary) = serde_json::from_str::<SessionSummary>(&content) {
            println!("Last session:");
            println!("  Session ID: {}", summary.session_id);
            println!("  Host: {}", summary.host);
            println!("  Completed: {}", summary.completed_at);
            println!("  Lines collected: {}", summary.line_count);
            println!("  Records parsed: {}", summary.record_count);
            println!();
        }
    }

    // Load and show cumulative counters if available
    let stats_path = config.data_path.join(DIAGNOSTICS_FILE);
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                if let Some(lines) = stats.get("lines_framed") {
                    println!("  Lines framed: {lines}");
                }
                if let Some(skipped) = stats.get("lines_skipped") {
                    println!("  Lines skipped: {skipped}");
                }
                if let Some(records) = stats.get("records_parsed") {
                    println!("  Records parsed: {records}");
                }
                if let Some(sessions) = stats.get("sessions_completed") {
                    println!("  Read cycles completed: {sessions}");
                }
                if let Some(tables) = stats.get("tables_exported") {
                    println!("  Tables exported: {tables}");
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Write an export table as a timestamped file in `dir`.
fn write_table(table: &ExportTable, dir: &Path) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(format!(
        "chill_log_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    let json = serde_json::to_string_pretty(table).map_err(std::io::Error::other)?;
    std::fs::write(&path, json)?;

    Ok(path)
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(cancel: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
