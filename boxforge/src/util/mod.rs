pub mod process;
pub mod wait;

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub use process::{Invocation, ProcessRunner, ProcessStatus, SystemRunner};
pub use wait::{WaitPolicy, wait_until};

/// Log file written when a log directory is configured.
pub const LOG_FILE: &str = "boxforge.log";

/// Install the global tracing subscriber.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `info`). When
/// `log_dir` is given, the same events are also appended to
/// `{log_dir}/boxforge.log` through a non-blocking writer; keep the returned
/// guard alive until exit so buffered lines are flushed.
pub fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .try_init();

    guard
}
