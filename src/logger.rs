//! Process-wide logging sink
//!
//! [`RingLogger`] forwards records to an `env_logger` console logger and
//! keeps the formatted lines in a bounded in-memory ring that can be written
//! to a file at any time, e.g. when the application exits or crashes.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};

static GLOBAL: OnceLock<&'static RingLogger> = OnceLock::new();

/// Leveled logger with an in-memory ring of formatted entries
pub struct RingLogger {
    console: env_logger::Logger,
    ring: Mutex<Ring>,
    enabled: AtomicBool,
    min_level: AtomicUsize,
    installed: AtomicBool,
}

struct Ring {
    entries: VecDeque<String>,
    capacity: usize,
}

impl Ring {
    fn push(&mut self, entry: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// Install a [`RingLogger`] built from `config` as the global `log` logger
pub fn init(config: &Config) -> Result<&'static RingLogger> {
    let logger: &'static RingLogger = Box::leak(Box::new(RingLogger::new(config)));
    log::set_logger(logger).map_err(|_| Error::LoggerAlreadySet)?;
    log::set_max_level(logger.min_level());
    logger.installed.store(true, Ordering::Relaxed);
    // set_logger succeeded, so nothing else can have filled the cell
    let _ = GLOBAL.set(logger);
    Ok(logger)
}

/// The logger installed by [`init`], if any
pub fn get() -> Option<&'static RingLogger> {
    GLOBAL.get().copied()
}

impl RingLogger {
    /// Create a logger without installing it
    pub fn new(config: &Config) -> Self {
        let console = env_logger::Builder::new()
            .parse_filters(&config.log_filter)
            .build();
        let min_level = console.filter();

        Self {
            console,
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(config.log_capacity.min(4096)),
                capacity: config.log_capacity.max(1),
            }),
            enabled: AtomicBool::new(true),
            min_level: AtomicUsize::new(min_level as usize),
            installed: AtomicBool::new(false),
        }
    }

    /// Enable or disable all output
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether output is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Drop records less severe than `level`
    pub fn set_min_level(&self, level: LevelFilter) {
        self.min_level.store(level as usize, Ordering::Relaxed);
        if self.installed.load(Ordering::Relaxed) {
            log::set_max_level(level);
        }
    }

    /// Current minimum level
    pub fn min_level(&self) -> LevelFilter {
        level_filter_from_usize(self.min_level.load(Ordering::Relaxed))
    }

    /// Snapshot of the stored entries, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.ring.lock().entries.iter().cloned().collect()
    }

    /// Forget all stored entries
    pub fn clear(&self) {
        self.ring.lock().entries.clear();
    }

    /// Write the stored entries to `path`, one per line
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for entry in self.ring.lock().entries.iter() {
            writeln!(out, "{}", entry)?;
        }
        out.flush()
    }

    /// Record how long `label` took, as a debug entry under `METRICS`
    pub fn record_timing(&self, label: &str, elapsed: Duration) {
        self.log(
            &Record::builder()
                .args(format_args!(
                    "{} took {:.9} seconds",
                    label,
                    elapsed.as_secs_f64()
                ))
                .level(Level::Debug)
                .target("METRICS")
                .build(),
        );
    }

    /// Run `f` and record its duration under `label`
    pub fn time<T>(&self, label: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = f();
        self.record_timing(label, start.elapsed());
        value
    }

    fn format_entry(record: &Record) -> String {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        match (record.file(), record.line()) {
            (Some(file), Some(line)) => format!(
                "[{}] {} [{}:{}] {}: {}",
                timestamp,
                record.level(),
                file,
                line,
                record.target(),
                record.args()
            ),
            _ => format!(
                "[{}] {} {}: {}",
                timestamp,
                record.level(),
                record.target(),
                record.args()
            ),
        }
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.is_enabled() && metadata.level() <= self.min_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        self.ring.lock().push(Self::format_entry(record));

        if self.console.matches(record) {
            self.console.log(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

fn level_filter_from_usize(value: usize) -> LevelFilter {
    match value {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger(capacity: usize) -> RingLogger {
        let config = Config {
            log_capacity: capacity,
            log_filter: "off".to_string(),
            ..Config::default()
        };
        let logger = RingLogger::new(&config);
        logger.set_min_level(LevelFilter::Info);
        logger
    }

    fn emit(logger: &RingLogger, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .args(format_args!("{}", message))
                .level(level)
                .target("test")
                .file(Some("window.rs"))
                .line(Some(42))
                .build(),
        );
    }

    #[test]
    fn test_entry_format() {
        let logger = logger(8);
        emit(&logger, Level::Error, "window creation failed");

        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].starts_with('['));
        assert!(entries[0].ends_with("ERROR [window.rs:42] test: window creation failed"));
    }

    #[test]
    fn test_ring_drops_oldest() {
        let logger = logger(2);
        emit(&logger, Level::Info, "one");
        emit(&logger, Level::Info, "two");
        emit(&logger, Level::Info, "three");

        let entries = logger.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("two"));
        assert!(entries[1].ends_with("three"));
    }

    #[test]
    fn test_min_level_and_disable() {
        let logger = logger(8);
        emit(&logger, Level::Debug, "hidden");
        assert!(logger.entries().is_empty());

        logger.set_min_level(LevelFilter::Warn);
        emit(&logger, Level::Info, "hidden too");
        emit(&logger, Level::Warn, "shown");
        assert_eq!(logger.entries().len(), 1);

        logger.set_enabled(false);
        emit(&logger, Level::Error, "muted");
        assert_eq!(logger.entries().len(), 1);
    }

    #[test]
    fn test_record_timing() {
        let logger = logger(8);
        logger.record_timing("swap_buffers", Duration::from_millis(5));
        assert!(logger.entries().is_empty());

        logger.set_min_level(LevelFilter::Debug);
        logger.record_timing("swap_buffers", Duration::from_millis(5));
        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("DEBUG"));
        assert!(entries[0].contains("METRICS: swap_buffers took 0.005000000 seconds"));
    }

    #[test]
    fn test_time_returns_value() {
        let logger = logger(8);
        logger.set_min_level(LevelFilter::Debug);
        let value = logger.time("compute", || 21 * 2);
        assert_eq!(value, 42);
        assert_eq!(logger.entries().len(), 1);
    }

    #[test]
    fn test_save_and_clear() {
        let logger = logger(8);
        emit(&logger, Level::Info, "first");
        emit(&logger, Level::Warn, "second");

        let file = tempfile::NamedTempFile::new().unwrap();
        logger.save(file.path()).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].ends_with("second"));

        logger.clear();
        assert!(logger.entries().is_empty());
    }
}
