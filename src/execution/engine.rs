//! Command execution engine.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, trace, warn};

use super::result::{CommandResult, FAILURE_EXIT_CODE};
use crate::error::SessionError;
use crate::transport::{ProcessObserver, RemoteShell};
use crate::Result;

/// Default interval between pumps of the shell.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Drives one command at a time to completion against a [`RemoteShell`].
///
/// Commands are submitted verbatim. The engine does no quoting or escaping;
/// callers building commands from untrusted input must quote it themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionEngine {
    timeout: Option<Duration>,
    tick: Duration,
}

impl ExecutionEngine {
    /// Create an engine with an optional deadline per command.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            tick: DEFAULT_TICK,
        }
    }

    /// Set the pump interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Run `command` to completion.
    ///
    /// Every output chunk is forwarded to `on_output` as it arrives. If the
    /// deadline passes, the process is aborted and [`SessionError::Timeout`]
    /// is returned; its exit status is unknown and no result is produced.
    pub fn execute(
        &self,
        shell: &mut dyn RemoteShell,
        command: &str,
        on_output: Option<&mut dyn FnMut(&str)>,
    ) -> Result<CommandResult> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut collector = Collector {
            output: String::new(),
            exit_status: None,
            on_output,
        };

        debug!(command, "submitting command");
        let started_at = Utc::now();
        let start = Instant::now();
        shell.execute(command)?;

        while collector.exit_status.is_none() {
            if let (Some(deadline), Some(timeout)) = (deadline, self.timeout) {
                if Instant::now() >= deadline {
                    if let Err(e) = shell.abort() {
                        warn!(command, "abort after timeout failed: {}", e);
                    }
                    warn!(command, timeout_secs = timeout.as_secs(), "command timed out");
                    return Err(SessionError::Timeout {
                        command: command.to_string(),
                        after: timeout,
                    });
                }
            }
            shell.pump(self.tick, &mut collector)?;
        }

        let elapsed = start.elapsed().as_secs_f64();
        let finished_at = Utc::now();

        let result = match collector.exit_status.flatten() {
            Some(raw) => {
                CommandResult::new(command, Some(collector.output), Some(&raw), elapsed)
            }
            None => CommandResult::new(command, Some(collector.output), None, elapsed)
                .with_exit_code(FAILURE_EXIT_CODE),
        }
        .with_times(started_at, finished_at);

        debug!(
            command,
            exit_code = ?result.exit_code(),
            duration_secs = elapsed,
            "command finished"
        );
        Ok(result)
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Merges both output streams and captures the exit status.
struct Collector<'a> {
    output: String,
    exit_status: Option<Option<String>>,
    on_output: Option<&'a mut dyn FnMut(&str)>,
}

impl Collector<'_> {
    fn push(&mut self, chunk: &str) {
        trace!(bytes = chunk.len(), "output chunk");
        self.output.push_str(chunk);
        if let Some(callback) = self.on_output.as_deref_mut() {
            callback(chunk);
        }
    }
}

impl ProcessObserver for Collector<'_> {
    fn on_output(&mut self, chunk: &str) {
        self.push(chunk);
    }

    fn on_error_output(&mut self, chunk: &str) {
        self.push(chunk);
    }

    fn on_finish(&mut self, exit_status: Option<&str>) {
        self.exit_status = Some(exit_status.map(str::to_string));
    }
}
