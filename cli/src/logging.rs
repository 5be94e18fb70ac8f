//! FILENAME: cli/src/logging.rs
// PURPOSE: `log` backend for the command line tool.
// CONTEXT: Every record becomes one "seq|LEVEL|target|message" line on
// stderr and, when a log file was opened, in that file too.

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

// ============================================================================
// SESSION LOG
// ============================================================================

/// Global sequence counter
static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// Session log file handle, `None` until `init_log_file` succeeds
pub static LOG_FILE: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));

static LOGGER: CliLogger = CliLogger;

/// Get next sequence number
pub fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst) + 1
}

/// Opens (and truncates) the session log file, creating its directory.
pub fn init_log_file(path: &Path) -> Result<(), String> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create log dir at {:?}: {}", dir, e))?;
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| format!("Failed to create log file {:?}: {}", path, e))?;

    let mut log_file = LOG_FILE.lock().map_err(|e| format!("Lock error: {}", e))?;
    *log_file = Some(file);
    Ok(())
}

/// "seq|LEVEL|target|message"
pub fn format_line(seq: u64, level: Level, target: &str, message: &str) -> String {
    format!("{}|{}|{}|{}", seq, level, target, message)
}

/// Write a log line to stderr and the session log file.
pub fn write_log(level: Level, target: &str, message: &str) {
    let line = format_line(next_seq(), level, target, message);
    eprintln!("{}", line);

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            if let Err(e) = writeln!(file, "{}", line) {
                eprintln!("[LOG_ERROR] Failed to write: {}", e);
            }
            let _ = file.flush();
        }
    }
}

// ============================================================================
// LOG FACADE
// ============================================================================

struct CliLogger;

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            write_log(record.level(), record.target(), &record.args().to_string());
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = LOG_FILE.lock() {
            if let Some(ref mut file) = *guard {
                let _ = file.flush();
            }
        }
    }
}

/// debug, info, warn, error (case-insensitive); anything else is an error.
pub fn parse_level(verbosity: &str) -> Result<LevelFilter, String> {
    match verbosity.to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" => Ok(LevelFilter::Off),
        other => Err(format!("Unknown verbosity: {}", other)),
    }
}

/// Installs the logger. Can only succeed once per process.
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> Result<(), String> {
    if let Some(path) = log_file {
        init_log_file(path)?;
    }
    log::set_logger(&LOGGER).map_err(|e| format!("Logger already set: {}", e))?;
    log::set_max_level(level);
    Ok(())
}
