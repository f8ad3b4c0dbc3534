//! Logging initialization and command log sinks.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "ssh_session=info";

/// Initialize the logging system. Logs go to stderr.
///
/// Uses the `RUST_LOG` environment variable for filtering. If not set,
/// defaults to `ssh_session=info`.
///
/// # Panics
///
/// Panics if called more than once, or if another tracing subscriber
/// has already been set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Ok(())` if successful, or `Err` if logging has already been
/// initialized.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    try_init_with(None)
}

/// Like [`try_init`], with an explicit filter taking precedence over `RUST_LOG`.
pub fn try_init_with(level: Option<&str>) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
}

/// Sink receiving a one-line summary of every command a session runs.
pub trait CommandLogger: Send {
    fn log(&self, summary: &str);
}

impl<F> CommandLogger for F
where
    F: Fn(&str) + Send,
{
    fn log(&self, summary: &str) {
        self(summary)
    }
}

/// Forwards command summaries to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl CommandLogger for TracingLogger {
    fn log(&self, summary: &str) {
        tracing::info!(target: "ssh_session::commands", "{}", summary);
    }
}
