//! # ssh-session
//!
//! Run commands over a remote shell session and get structured results.
//!
//! A [`Session`] opens one connection and one shell, then runs commands one
//! at a time. Every run produces a [`CommandResult`] with the merged output,
//! the exit code and timing, and is recorded in the session [`History`].
//!
//! ## Features
//!
//! - **Structured results**: exit code, merged stdout/stderr, timestamps
//! - **Timeouts**: per-command deadline, enforced while the shell is pumped
//! - **History**: on by default, overridable per call with [`HistoryPolicy`]
//! - **Helpers**: file and process checks, environment, `sudo` ([`SessionHelpers`])
//! - **Pluggable transport**: the [`Connector`] traits, with a PTY-backed
//!   [`PtyConnector`] driving the system `ssh` client or a local shell
//!
//! ## Quick Start
//!
//! ```no_run
//! use ssh_session::{MultiRunOptions, Session, SessionHelpers};
//!
//! fn main() -> ssh_session::Result<()> {
//!     ssh_session::logging::try_init().ok();
//!
//!     let mut session = Session::builder("example.com", "deploy")
//!         .timeout_secs(60)
//!         .build()?;
//!     session.open()?;
//!
//!     let results = session.run_multiple(
//!         ["cd /srv/app", "git pull", "make"],
//!         MultiRunOptions::new().break_on_failure(true),
//!     )?;
//!     for result in &results {
//!         println!("{}", result);
//!     }
//!
//!     if session.file_exists("/srv/app/VERSION")? {
//!         println!("version {}", session.capture("cat /srv/app/VERSION")?);
//!     }
//!
//!     session.close()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod helpers;
pub mod logging;
pub mod output;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use error::{Result, SessionError};
pub use execution::{CommandResult, ExecutionEngine, HistoryPolicy, MultiRunOptions, RunOptions};
pub use helpers::{with_timeout, CommandRunner, SessionHelpers};
pub use logging::{CommandLogger, TracingLogger};
pub use output::OutputSanitizer;
pub use session::{ConnectionState, History, Session, SessionBuilder};
pub use transport::{
    Connection, Connector, Credentials, Launcher, ProcessObserver, PtyConnector, RemoteShell,
    ShellMode, Target,
};
