use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct LoggingArgs {
    /// Console log format. Defaults to json when APP_ENV=production.
    #[arg(long, env = "LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Directory for combined.log and error.log. File logging is off when unset.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Rotated files kept per log.
    #[arg(long, env = "LOG_MAX_FILES", default_value_t = 14)]
    pub log_max_files: usize,
}

impl LoggingArgs {
    pub fn format(&self, app_env: Option<&str>) -> LogFormat {
        match (self.log_format, app_env) {
            (Some(format), _) => format,
            (None, Some(env)) if env.eq_ignore_ascii_case("production") => LogFormat::Json,
            (None, _) => LogFormat::Pretty,
        }
    }
}

/// Keeps the file writers flushing; drop it only on shutdown.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

pub fn init_logging(args: &LoggingArgs) -> anyhow::Result<LogGuards> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let app_env = std::env::var("APP_ENV").ok();

    let console = match args.format(app_env.as_deref()) {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().with_target(false).boxed(),
    };

    let mut guards = Vec::new();
    let files = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (combined, combined_guard) =
                tracing_appender::non_blocking(rolling_file(dir, "combined", args.log_max_files)?);
            let (errors, errors_guard) =
                tracing_appender::non_blocking(rolling_file(dir, "error", args.log_max_files)?);
            guards.push(combined_guard);
            guards.push(errors_guard);

            let combined_layer = fmt::layer().json().with_ansi(false).with_writer(combined);
            let error_layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(errors)
                .with_filter(LevelFilter::ERROR);
            Some(combined_layer.and_then(error_layer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(files)
        .try_init()?;

    Ok(LogGuards { _guards: guards })
}

fn rolling_file(dir: &Path, prefix: &str, max_files: usize) -> anyhow::Result<RollingFileAppender> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(max_files.max(1))
        .build(dir)?;
    Ok(appender)
}
