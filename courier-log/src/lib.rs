//! Structured logging for the Courier services.
//!
//! Every record carries a severity, a target (a `::`-separated tag path such
//! as `courier::scheduler`), and a formatted message. The default output is
//! one JSON object per line on stderr, suitable for log shippers; a pretty
//! single-line format is available for local development.
//!
//! # Usage
//!
//! ```rust
//! use courier_log::{debug, error, info, warn};
//!
//! info!("queue ready");
//! warn!(target: "courier::queue", "connection pool low");
//! let job_id = "job-42";
//! error!(target: "courier::worker", "job {} failed", job_id);
//! # let _ = job_id;
//! ```
//!
//! # Environment Variables
//!
//! - `COURIER_DEBUG=1` - enable debug logging
//! - `COURIER_LOG_LEVEL=trace|debug|info|warn|error|off` - set the filter
//! - `COURIER_LOG_FORMAT=json|pretty` - set output format

use once_cell::sync::Lazy;
use serde_json::json;
use std::env;
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

/// Filter value meaning "suppress everything".
const SILENT: u8 = Level::Error as u8 + 1;

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }

    /// Uppercase label as emitted in records.
    pub fn label(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output encoding for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One JSON object per line (default)
    Json,
    /// Human-readable single line for development
    Pretty,
}

impl Format {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "json" => Some(Format::Json),
            "pretty" => Some(Format::Pretty),
            _ => None,
        }
    }
}

/// Minimum severity that gets emitted; `SILENT` suppresses everything.
static FILTER: AtomicU8 = AtomicU8::new(Level::Info as u8);

struct Output {
    format: Format,
    timestamps: bool,
}

static OUTPUT: Lazy<Output> = Lazy::new(|| {
    let debug = flag("COURIER_DEBUG");

    let filter = match env::var("COURIER_LOG_LEVEL") {
        Ok(raw) if matches!(raw.trim().to_lowercase().as_str(), "off" | "none") => SILENT,
        Ok(raw) => Level::parse(&raw)
            .map(|level| level as u8)
            .unwrap_or(Level::Info as u8),
        Err(_) if debug => Level::Debug as u8,
        Err(_) => Level::Info as u8,
    };
    FILTER.store(filter, Ordering::SeqCst);

    Output {
        format: env::var("COURIER_LOG_FORMAT")
            .ok()
            .and_then(|raw| Format::parse(&raw))
            .unwrap_or(Format::Json),
        timestamps: !matches!(
            env::var("COURIER_LOG_TIMESTAMPS").as_deref(),
            Ok("0") | Ok("false")
        ),
    }
});

/// Resolve the environment configuration now instead of on first use.
pub fn init() {
    Lazy::force(&OUTPUT);
}

/// Whether records at `level` currently pass the filter.
#[inline]
pub fn enabled(level: Level) -> bool {
    Lazy::force(&OUTPUT);
    level as u8 >= FILTER.load(Ordering::Relaxed)
}

/// The current filter, or `None` when logging is silenced.
pub fn filter() -> Option<Level> {
    match FILTER.load(Ordering::Relaxed) {
        0 => Some(Level::Trace),
        1 => Some(Level::Debug),
        2 => Some(Level::Info),
        3 => Some(Level::Warn),
        4 => Some(Level::Error),
        _ => None,
    }
}

/// Lower or raise the filter at runtime.
pub fn set_filter(level: Level) {
    FILTER.store(level as u8, Ordering::SeqCst);
}

/// Suppress all output.
pub fn silence() {
    FILTER.store(SILENT, Ordering::SeqCst);
}

/// Emit one record. Macro plumbing; use the level macros instead.
#[doc(hidden)]
pub fn emit(level: Level, target: &str, args: fmt::Arguments<'_>) {
    match OUTPUT.format {
        Format::Json => {
            let record = json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "level": level.label(),
                "target": target,
                "message": args.to_string(),
            });
            eprintln!("{}", record);
        }
        Format::Pretty => {
            let mut stderr = std::io::stderr().lock();
            if OUTPUT.timestamps {
                let _ = write!(
                    stderr,
                    "{} ",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
                );
            }
            let _ = writeln!(stderr, "{:5} [{}] {}", level.label(), target, args);
        }
    }
}

/// Log at an explicit level. The level macros below are the usual entry
/// points; both forms accept an optional leading `target:`.
#[macro_export]
macro_rules! log {
    ($level:expr, target: $target:expr, $($arg:tt)+) => {
        if $crate::enabled($level) {
            $crate::emit($level, $target, format_args!($($arg)+));
        }
    };
    ($level:expr, $($arg:tt)+) => {
        $crate::log!($level, target: module_path!(), $($arg)+)
    };
}

/// Log a trace message.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::log!($crate::Level::Trace, $($arg)+) };
}

/// Log a debug message.
///
/// Enabled when `COURIER_DEBUG=1` or `COURIER_LOG_LEVEL=debug`.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { $crate::log!($crate::Level::Debug, $($arg)+) };
}

/// Log an info message.
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::log!($crate::Level::Info, $($arg)+) };
}

/// Log a warning message.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::log!($crate::Level::Warn, $($arg)+) };
}

/// Log an error message.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::log!($crate::Level::Error, $($arg)+) };
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|raw| raw == "1" || raw.to_lowercase() == "true")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("debug"), Some(Level::Debug));
        assert_eq!(Level::parse("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::parse("warn"), Some(Level::Warn));
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("loud"), None);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(Format::parse("json"), Some(Format::Json));
        assert_eq!(Format::parse("Pretty"), Some(Format::Pretty));
        assert_eq!(Format::parse("xml"), None);
    }

    // Filter mutations share one global atomic, so they live in a single
    // test to keep the harness from racing them.
    #[test]
    fn test_runtime_filter() {
        init();
        let original = filter();

        set_filter(Level::Error);
        assert!(enabled(Level::Error));
        assert!(!enabled(Level::Warn));
        assert_eq!(filter(), Some(Level::Error));

        silence();
        assert!(!enabled(Level::Error));
        assert_eq!(filter(), None);

        match original {
            Some(level) => set_filter(level),
            None => silence(),
        }
    }

    #[test]
    fn test_macros_compile() {
        trace!("trace message");
        debug!("debug message");
        info!("info message");
        warn!("warn message");
        error!("error message");

        trace!(target: "test", "with target");
        debug!(target: "test", "with target");
        info!(target: "test", "with target");
        warn!(target: "test", "with target");
        error!(target: "test", "with target");

        let x = 42;
        debug!("formatted: {}", x);
    }
}
