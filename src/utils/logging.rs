use std::{
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Success => "OK",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Reporter handed to every component that needs to tell the operator
/// something. Secrets must never be passed through it.
pub trait Logger: Send {
    fn log(&mut self, level: LogLevel, message: &str);

    fn info(&mut self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn success(&mut self, message: &str) {
        self.log(LogLevel::Success, message);
    }

    fn warn(&mut self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&mut self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn debug_log(&mut self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
}

/// Forwards to `tracing`; filtering is left to the installed subscriber.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Success => tracing::info!(status = "ok", "{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
    }
}

#[derive(Debug)]
pub struct FileLogger {
    log_file: PathBuf,
    debug: bool,
}

impl FileLogger {
    pub fn new(log_file: &Path, debug: bool) -> std::io::Result<Self> {
        // Create log directory if it doesn't exist
        if let Some(parent) = log_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(FileLogger {
            log_file: log_file.to_path_buf(),
            debug,
        })
    }

    fn write_to_file(&self, level: LogLevel, message: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;

        writeln!(
            file,
            "{}: [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        )
    }
}

impl Logger for FileLogger {
    fn log(&mut self, level: LogLevel, message: &str) {
        if level == LogLevel::Debug && !self.debug {
            return;
        }
        if let Err(e) = self.write_to_file(level, message) {
            eprintln!("Failed to write to log file: {}", e);
        }
    }
}

// MultiLogger allows logging to multiple destinations
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn Logger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, logger: Box<dyn Logger>) -> Self {
        self.loggers.push(logger);
        self
    }
}

impl Logger for MultiLogger {
    fn log(&mut self, level: LogLevel, message: &str) {
        for logger in &mut self.loggers {
            logger.log(level, message);
        }
    }
}

/// Keeps every line in memory so tests can assert on what was reported.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryLogger {
    pub lines: Vec<(LogLevel, String)>,
}

#[cfg(test)]
impl MemoryLogger {
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }

    pub fn any_contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|(_, line)| line.contains(needle))
    }
}

#[cfg(test)]
impl Logger for MemoryLogger {
    fn log(&mut self, level: LogLevel, message: &str) {
        self.lines.push((level, message.to_string()));
    }
}
