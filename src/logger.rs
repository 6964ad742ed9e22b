// src/logger.rs
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use colored::Colorize;
use serde::Serialize;

use crate::args::OutputState;
use crate::error_handling::{Context, Result};

pub const LOG_FILE_NAME: &str = "office-remover.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Serialize)]
struct LogRecord<'a> {
    timestamp: u64,
    level: Level,
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a serde_json::Value>,
}

/// Event sink shared by the whole run.
///
/// Console lines are gated by the `OutputState`; the log file receives every
/// event as one JSON object per line.
pub struct Logger {
    output: OutputState,
    console: bool,
    file: Option<Mutex<File>>,
    path: Option<PathBuf>,
}

impl Logger {
    /// Console-only logger.
    pub fn new(output: OutputState) -> Self {
        Self { output, console: true, file: None, path: None }
    }

    /// Logger that prints nothing; only an attached log file receives events.
    pub fn silent() -> Self {
        Self { output: OutputState::Quiet, console: false, file: None, path: None }
    }

    /// Appends events to `<dir>/office-remover.log`, creating the directory if needed.
    pub fn with_log_dir(mut self, dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory '{}'", dir.display()))?;
        let path = dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
        self.file = Some(Mutex::new(file));
        self.path = Some(path);
        Ok(self)
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn debug(&self, event: &str, message: &str) {
        self.emit(Level::Debug, event, None, message, None);
    }

    pub fn info(&self, event: &str, message: &str) {
        self.emit(Level::Info, event, None, message, None);
    }

    pub fn warn(&self, event: &str, message: &str) {
        self.emit(Level::Warn, event, None, message, None);
    }

    pub fn error(&self, event: &str, message: &str) {
        self.emit(Level::Error, event, None, message, None);
    }

    /// Event about one removal target.
    pub fn target(&self, level: Level, event: &str, target: &str, message: &str) {
        self.emit(level, event, Some(target), message, None);
    }

    /// File-only event carrying a serialised payload (reports, detection results).
    pub fn record<T: Serialize>(&self, event: &str, message: &str, data: &T) {
        if let Ok(value) = serde_json::to_value(data) {
            self.write_file(Level::Info, event, None, message, Some(&value));
        }
    }

    /// Plain console text (tables, banners). Suppressed in `Quiet`, never written to the file.
    pub fn echo(&self, text: &str) {
        if self.console && self.output != OutputState::Quiet {
            println!("{}", text);
        }
    }

    fn emit(&self, level: Level, event: &str, target: Option<&str>, message: &str, data: Option<&serde_json::Value>) {
        self.write_console(level, target, message);
        self.write_file(level, event, target, message, data);
    }

    fn write_console(&self, level: Level, target: Option<&str>, message: &str) {
        let visible = self.console && match self.output {
            OutputState::Quiet => level == Level::Error,
            OutputState::Normal => level >= Level::Info,
            OutputState::Verbose => true,
        };
        if !visible {
            return;
        }
        let text = match target {
            Some(target) => format!("{} {}", message, target.bright_white()),
            None => message.to_string(),
        };
        match level {
            Level::Debug => println!("{}", text.dimmed()),
            Level::Info => println!("{}", text),
            Level::Warn => eprintln!("{} {}", "warning:".yellow().bold(), text),
            Level::Error => eprintln!("{} {}", "error:".red().bold(), text),
        }
    }

    fn write_file(&self, level: Level, event: &str, target: Option<&str>, message: &str, data: Option<&serde_json::Value>) {
        let Some(file) = &self.file else {
            return;
        };
        let record = LogRecord {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            level,
            event,
            message,
            target,
            data,
        };
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        if let Ok(mut file) = file.lock() {
            // A failing log write must not abort a half-finished removal.
            let _ = writeln!(file, "{}", line);
        }
    }
}
