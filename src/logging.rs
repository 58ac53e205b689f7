use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Maximum size of a log file before rotation (in bytes).
const MAX_LOG_BYTES: u64 = 1_000_000; // ~1 MB

/// File name (inside the log directory) of the yt-dlp stderr log.
const YT_DLP_LOG_FILE: &str = "yeyo-yt-dlp.log";

/// File name (inside the log directory) of the structured error log.
const ERROR_LOG_FILE: &str = "yeyo-errors.log";

/// Environment variable to control log level filtering
const LOG_LEVEL_ENV_VAR: &str = "YEYO_LOG_LEVEL";

/// Default log level when not specified
const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Network,
    Validation,
    System,
    Download,
    Settings,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredLogEntry {
    timestamp: u128,
    level: LogLevel,
    category: ErrorCategory,
    message: String,
    context: Option<serde_json::Value>,
    error_details: Option<String>,
}

impl LogLevel {
    /// Get numeric value for comparison (higher = more verbose)
    pub fn level_value(&self) -> u8 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
        }
    }

    /// Check if this level should be logged given the minimum level
    pub fn should_log(&self, min_level: &LogLevel) -> bool {
        self.level_value() <= min_level.level_value()
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Debug => write!(f, "DEBUG"),
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        DEFAULT_LOG_LEVEL
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl StructuredLogEntry {
    /// Returns the current timestamp in milliseconds since Unix epoch
    fn current_timestamp() -> u128 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0)
    }

    fn new(
        level: LogLevel,
        category: ErrorCategory,
        message: &str,
        context: Option<serde_json::Value>,
        error_details: Option<&str>,
    ) -> Self {
        Self {
            timestamp: Self::current_timestamp(),
            level,
            category,
            message: message.to_string(),
            context,
            error_details: error_details.map(|s| s.to_string()),
        }
    }

    pub fn error(
        category: ErrorCategory,
        message: &str,
        context: Option<serde_json::Value>,
        error_details: Option<&str>,
    ) -> Self {
        Self::new(LogLevel::Error, category, message, context, error_details)
    }

    pub fn warn(category: ErrorCategory, message: &str, context: Option<serde_json::Value>) -> Self {
        Self::new(LogLevel::Warn, category, message, context, None)
    }

    pub fn info(category: ErrorCategory, message: &str, context: Option<serde_json::Value>) -> Self {
        Self::new(LogLevel::Info, category, message, context, None)
    }

    pub fn debug(category: ErrorCategory, message: &str, context: Option<serde_json::Value>) -> Self {
        Self::new(LogLevel::Debug, category, message, context, None)
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Get the current log level from environment variable or default
fn get_log_level() -> LogLevel {
    static LOG_LEVEL: OnceLock<LogLevel> = OnceLock::new();

    *LOG_LEVEL
        .get_or_init(|| std::env::var(LOG_LEVEL_ENV_VAR).ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_LOG_LEVEL))
}

fn rotate_if_needed(path: &Path) -> io::Result<()> {
    if let Ok(meta) = fs::metadata(path)
        && meta.len() >= MAX_LOG_BYTES
    {
        // Simple single-file rotation: yeyo-errors.log -> yeyo-errors.log.1
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| ERROR_LOG_FILE.to_string());

        let rotated_path = path.with_file_name(format!("{}.1", file_name));

        // Best-effort cleanup of any existing rotated file
        let _ = fs::remove_file(&rotated_path);

        fs::rename(path, rotated_path)?;
    }

    Ok(())
}

fn append_line_raw(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Ensure rotation happens before we append
    rotate_if_needed(path)?;

    let mut file = if path.exists() {
        OpenOptions::new().append(true).open(path)?
    } else {
        File::create(path)?
    };

    writeln!(file, "{}", line)?;
    Ok(())
}

/// Cloneable handle that writes structured log lines.
///
/// With no log directory every entry falls back to stderr, which is what
/// tests and headless embedders get by default.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    log_dir: Option<PathBuf>,
}

impl Logger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: Some(log_dir.into()),
        }
    }

    /// Logger that only writes to stderr.
    pub fn stderr() -> Self {
        Self { log_dir: None }
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Append a single yt-dlp stderr line to the rotated yt-dlp log.
    ///
    /// This is best-effort logging: failures are reported to stderr but do not
    /// affect the download flow.
    pub fn append_yt_dlp_log(&self, download_id: &str, line: &str) {
        let Some(dir) = self.log_dir.as_deref() else {
            eprintln!("[yt-dlp][{}] {}", download_id, line);
            return;
        };

        let path = dir.join(YT_DLP_LOG_FILE);
        let decorated = format!("[{}] [{}] {}", StructuredLogEntry::current_timestamp(), download_id, line);

        if let Err(e) = append_line_raw(&path, &decorated) {
            eprintln!("Failed to write yt-dlp log entry to {}: {}", path.display(), e);
        }
    }

    /// Log a structured entry with level filtering
    pub fn log(&self, entry: StructuredLogEntry) {
        if !entry.level.should_log(&get_log_level()) {
            return;
        }

        let Some(dir) = self.log_dir.as_deref() else {
            match entry.to_json() {
                Ok(json_string) => eprintln!("[LOG] {}", json_string),
                Err(_) => eprintln!("[{}] {:?}", entry.level, entry),
            }
            return;
        };

        let path = dir.join(ERROR_LOG_FILE);
        match entry.to_json() {
            Ok(json_line) => {
                if let Err(e) = append_line_raw(&path, &json_line) {
                    eprintln!("Failed to write log entry to {}: {}", path.display(), e);
                }
            }
            Err(e) => {
                eprintln!("Failed to serialize log entry: {}", e);
            }
        }
    }

    pub fn error(&self, category: ErrorCategory, message: &str, error_details: Option<&str>) {
        self.log(StructuredLogEntry::error(category, message, None, error_details));
    }

    pub fn error_with_context(
        &self,
        category: ErrorCategory,
        message: &str,
        context: serde_json::Value,
        error_details: Option<&str>,
    ) {
        self.log(StructuredLogEntry::error(category, message, Some(context), error_details));
    }

    pub fn warn(&self, category: ErrorCategory, message: &str) {
        self.log(StructuredLogEntry::warn(category, message, None));
    }

    pub fn warn_with_context(&self, category: ErrorCategory, message: &str, context: serde_json::Value) {
        self.log(StructuredLogEntry::warn(category, message, Some(context)));
    }

    pub fn info(&self, category: ErrorCategory, message: &str) {
        self.log(StructuredLogEntry::info(category, message, None));
    }

    pub fn debug(&self, category: ErrorCategory, message: &str) {
        self.log(StructuredLogEntry::debug(category, message, None));
    }
}
