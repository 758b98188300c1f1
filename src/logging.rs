//! Provides logging utilities, used by the `duet` binary.
//!
//! Library code logs through the [`log`] facade only, so the application
//! decides where records go.

use std::{env, io};

use chrono::Local;
use slog::{
    o, Drain, Duplicate, FilterLevel, FnValue, Fuse, Level, Logger,
    PushFnValue, Record,
};
use slog_async::Async;
use slog_json::Json;
use slog_scope::GlobalLoggerGuard;

/// Builds JSON [`Logger`] which prints all its log records to `w_out` writer,
/// but WARN level (and higher) to `w_err` writer. Records less severe than
/// `level` are dropped, all of them if `level` is [`None`]. The `RUST_LOG`
/// environment variable refines the filter per module.
///
/// Created [`Logger`] produces log records with `fqn`, `lvl`, `time` and `msg`
/// fields by default.
pub fn new_dual_logger<W1, W2>(
    w_out: W1,
    w_err: W2,
    level: Option<Level>,
) -> Logger
where
    W1: io::Write + Send + 'static,
    W2: io::Write + Send + 'static,
{
    let drain_out = Json::new(w_out).build();
    let drain_err = Json::new(w_err).build();
    let drain = Duplicate(
        drain_out.filter(|r| !r.level().is_at_least(Level::Warning)),
        drain_err.filter_level(Level::Warning),
    )
    .map(Fuse);
    let mut filter = slog_envlogger::LogBuilder::new(drain)
        .filter(None, level.map_or(FilterLevel::Off, filter_level));
    if let Ok(directives) = env::var("RUST_LOG") {
        filter = filter.parse(&directives);
    }
    let drain = filter.build().fuse();
    let drain = Async::new(drain).chan_size(2048).build().fuse();
    add_default_keys(&Logger::root(drain, o!()))
}

/// Installs [`new_dual_logger`] writing to stdout and stderr as the global
/// logger, and routes the [`log`] facade into it.
///
/// The returned guard must be held for the whole lifetime of the
/// application.
///
/// # Errors
///
/// If a [`log`] facade logger has been installed already.
pub fn init(
    level: Option<Level>,
) -> Result<GlobalLoggerGuard, log::SetLoggerError> {
    let logger = new_dual_logger(io::stdout(), io::stderr(), level);
    let guard = slog_scope::set_global_logger(logger);
    let max_level = level.map_or(log::Level::Error, stdlog_level);
    slog_stdlog::init_with_level(max_level)?;
    Ok(guard)
}

fn filter_level(level: Level) -> FilterLevel {
    match level {
        Level::Critical => FilterLevel::Critical,
        Level::Error => FilterLevel::Error,
        Level::Warning => FilterLevel::Warning,
        Level::Info => FilterLevel::Info,
        Level::Debug => FilterLevel::Debug,
        Level::Trace => FilterLevel::Trace,
    }
}

/// Converts a [`slog::Level`] into the matching [`log::Level`].
fn stdlog_level(level: Level) -> log::Level {
    match level {
        Level::Critical | Level::Error => log::Level::Error,
        Level::Warning => log::Level::Warn,
        Level::Info => log::Level::Info,
        Level::Debug => log::Level::Debug,
        Level::Trace => log::Level::Trace,
    }
}

/// Adds default log record data (key-value pairs) to specified [`Logger`]:
/// - `msg`: log record message.
/// - `fqn`: path to code line that called log function.
/// - `time`: creation date and time of log record in [RFC 3339] format.
/// - `lvl`: logging level of log record.
///
/// [RFC 3339]: https://www.ietf.org/rfc/rfc3339.txt
fn add_default_keys(logger: &Logger) -> Logger {
    logger.new(o!(
        "msg" => PushFnValue(move |record : &Record, ser| {
            ser.emit(record.msg())
        }),
        "fqn" => PushFnValue(move |record : &Record, ser| {
             ser.emit(format_args!("{}:{}", record.module(), record.line()))
        }),
        "time" => PushFnValue(move |_ : &Record, ser| {
            ser.emit(Local::now().to_rfc3339())
        }),
        "lvl" => FnValue(move |rinfo : &Record| {
            rinfo.level().as_str()
        }),
    ))
}
