//! Remote shell transport.
//!
//! The session core never talks to a wire protocol directly. It drives the
//! collaborator traits defined here:
//!
//! - [`Connector`] authenticates and returns a [`Connection`]
//! - [`Connection`] opens a [`RemoteShell`]
//! - [`RemoteShell`] spawns processes and is pumped for their events, which
//!   it reports to a [`ProcessObserver`]
//!
//! [`PtyConnector`] implements them over a pseudo-terminal running either the
//! system `ssh` client or a local shell.

mod marker;
mod prompt;
mod pty;
mod reader;
mod shell;

pub use pty::{default_shell, Launcher, PtyConnector, ShellMode};

use std::path::PathBuf;
use std::time::Duration;

use secrecy::Secret;

use crate::Result;

/// Credentials and connection options, passed through to the transport as is.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Password answered at the authentication prompt.
    pub password: Option<Secret<String>>,
    /// Private key file.
    pub identity_file: Option<PathBuf>,
    /// Extra `key=value` transport options, in order.
    pub options: Vec<(String, String)>,
}

impl Credentials {
    /// No password, no key file, no options.
    pub fn none() -> Self {
        Self::default()
    }

    /// Password authentication.
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(Secret::new(password.into())),
            ..Self::default()
        }
    }

    /// Key file authentication.
    pub fn identity_file(path: impl Into<PathBuf>) -> Self {
        Self {
            identity_file: Some(path.into()),
            ..Self::default()
        }
    }

    /// Add a transport option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }
}

/// Where to connect and as whom.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub credentials: Credentials,
}

impl Target {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: user.into(),
            credentials: Credentials::default(),
        }
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Receives the events of one spawned process.
pub trait ProcessObserver {
    /// A chunk of standard output.
    fn on_output(&mut self, chunk: &str);

    /// A chunk of standard error.
    fn on_error_output(&mut self, chunk: &str);

    /// The process terminated. `None` if it never reported a status.
    fn on_finish(&mut self, exit_status: Option<&str>);
}

/// An open shell able to run one process at a time.
pub trait RemoteShell: Send {
    /// Spawn `command` exactly as given. Nothing is quoted or escaped.
    fn execute(&mut self, command: &str) -> Result<()>;

    /// Drain pending I/O once, reporting events to `observer`.
    ///
    /// Waits up to `tick` when nothing is pending.
    fn pump(&mut self, tick: Duration, observer: &mut dyn ProcessObserver) -> Result<()>;

    /// Abandon the process in flight.
    fn abort(&mut self) -> Result<()>;

    /// Release the shell.
    fn close(&mut self) -> Result<()>;
}

/// An authenticated connection.
pub trait Connection: Send {
    /// Open the shell commands will run in.
    fn open_shell(&mut self) -> Result<Box<dyn RemoteShell>>;

    /// Release the connection.
    fn close(&mut self) -> Result<()>;
}

/// Establishes connections.
pub trait Connector: Send + Sync {
    fn connect(&self, target: &Target) -> Result<Box<dyn Connection>>;
}
