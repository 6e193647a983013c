//! Logging facility
//!
//! Routes the `log` crate's records to stderr, keeping stdout for command
//! output. Log levels default by build configuration (debug/release).

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Global logger instance
pub static LOGGER: Logger = Logger::new();

/// Thread-safe logger implementation
pub struct Logger {
    inner: Mutex<()>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Creates a new logger instance
    pub const fn new() -> Logger {
        Logger {
            inner: Mutex::new(()),
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    /// Formats messages as "[LEVEL] message"
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _guard = self.inner.lock();
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Level used when the command line does not pick one:
/// `Debug` in debug builds, `Info` in release builds
pub fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Installs the logger. Fails if another logger is already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}
