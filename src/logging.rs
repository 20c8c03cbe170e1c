use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes console logging plus a daily-rolling JSON file log under
/// `log_dir`. The returned guard must stay alive for the life of the process
/// so buffered file output is flushed on exit.
pub fn init_logging(app_name: &str, log_dir: impl AsRef<Path>) -> WorkerGuard {
    let log_dir = log_dir.as_ref();
    let _ = fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, format!("{app_name}.log"));
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(default_directive(app_name).parse().unwrap()),
        )
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}

/// Info-level directive for the application's own target; RUST_LOG still
/// overrides it.
fn default_directive(app_name: &str) -> String {
    format!("{app_name}=info")
}
