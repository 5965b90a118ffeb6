use crate::config::LoggingConfig;
use anyhow::Context;
use console::Term;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Keeps the background log writer alive; dropping it flushes the file sink.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Console on stderr plus a daily-rolling file under `config.directory`.
///
/// `RUST_LOG` overrides the configured level. `-v` raises the default to
/// debug, `-q` limits the console sink to warnings while the file keeps
/// everything.
pub fn init_logging(config: &LoggingConfig, verbose: u8, quiet: bool) -> anyhow::Result<LoggingGuard> {
    let appender = build_file_appender(config)?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level, verbose)));

    let console_level = if quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::TRACE
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(console_colors())
                .with_target(true)
                .with_filter(console_level),
        )
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

pub fn build_file_appender(config: &LoggingConfig) -> anyhow::Result<RollingFileAppender> {
    let directory: &Path = &config.directory;
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.file_prefix.as_str())
        .max_log_files(config.max_files)
        .build(directory)
        .with_context(|| format!("Failed to open log file in {}", directory.display()))
}

fn console_colors() -> bool {
    Term::stderr().features().colors_supported()
}

fn default_directive(level: &str, verbose: u8) -> String {
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    format!("dumpsift={}", level)
}
