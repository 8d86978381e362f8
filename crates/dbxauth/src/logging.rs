//! Tracing setup: human-readable console layer plus a daily JSON log file.

use std::path::Path;

use dbxauth_config::LoggingSection;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const CONSOLE_FILTER: &str = "dbxauth=info,dbxauth_oauth=info,dbxauth_config=info,warn";
const VERBOSE_FILTER: &str =
    "dbxauth=debug,dbxauth_oauth=debug,dbxauth_config=debug,tower_http=debug,info";
const FILE_FILTER: &str = "dbxauth=trace,dbxauth_oauth=trace,dbxauth_config=trace,info";

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the console filter. The returned guard flushes the
/// file writer on drop and must be held while the command runs.
pub fn init(
    verbose: bool,
    settings: &LoggingSection,
    config_dir: Option<&Path>,
) -> Option<WorkerGuard> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { CONSOLE_FILTER })
    });
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let log_dir = settings
        .directory
        .clone()
        .or_else(|| config_dir.map(|d| d.join("logs")));

    let appender = match (settings.file_enabled(), log_dir) {
        (true, Some(dir)) => match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("dbxauth")
            .filename_suffix("log")
            .build(&dir)
        {
            Ok(appender) => Some(appender),
            Err(e) => {
                eprintln!("(File logging disabled: {}: {})", dir.display(), e);
                None
            }
        },
        _ => None,
    };

    let Some(appender) = appender else {
        tracing_subscriber::registry().with(console).init();
        return None;
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(FILE_FILTER)),
        )
        .init();

    Some(guard)
}
