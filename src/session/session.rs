//! The session: one connection, one shell, one command at a time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ConnectionState, History};
use crate::error::SessionError;
use crate::execution::{
    CommandResult, ExecutionEngine, MultiRunOptions, RunOptions, DEFAULT_TICK, FAILURE_EXIT_CODE,
};
use crate::helpers::{with_timeout, CommandRunner};
use crate::logging::CommandLogger;
use crate::transport::{Connection, Connector, Credentials, PtyConnector, RemoteShell, Target};
use crate::Result;

/// Callback receiving the output of every command run by a session.
type OutputStream = Box<dyn FnMut(&str) + Send>;

/// Builder for [`Session`].
///
/// Nothing is validated until [`build`](Self::build).
pub struct SessionBuilder {
    target: Target,
    timeout_secs: Option<u64>,
    connect_timeout: Option<Duration>,
    tick: Duration,
    track_history: bool,
    connector: Option<Arc<dyn Connector>>,
    logger: Option<Box<dyn CommandLogger>>,
    stream: Option<OutputStream>,
}

impl SessionBuilder {
    fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            target: Target::new(host, user),
            timeout_secs: None,
            connect_timeout: None,
            tick: DEFAULT_TICK,
            track_history: true,
            connector: None,
            logger: None,
            stream: None,
        }
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.target.credentials = credentials;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.target.port = Some(port);
        self
    }

    /// Deadline for every command, in whole seconds. Must be positive.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Deadline for [`Session::open`].
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Interval at which the shell is pumped while a command runs.
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Whether results are recorded by default. On unless disabled.
    pub fn history(mut self, track: bool) -> Self {
        self.track_history = track;
        self
    }

    /// Transport used by `open`. Defaults to [`PtyConnector::ssh`].
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sink receiving the summary line of every command.
    pub fn logger(mut self, logger: impl CommandLogger + 'static) -> Self {
        self.logger = Some(Box::new(logger));
        self
    }

    /// Callback receiving every output chunk of every `run*` call.
    pub fn stream(mut self, stream: impl FnMut(&str) + Send + 'static) -> Self {
        self.stream = Some(Box::new(stream));
        self
    }

    /// Validate the settings and create a closed session.
    pub fn build(self) -> Result<Session> {
        if self.target.host.trim().is_empty() {
            return Err(SessionError::Configuration("host must not be empty".into()));
        }
        if self.target.user.trim().is_empty() {
            return Err(SessionError::Configuration("user must not be empty".into()));
        }
        let timeout = match self.timeout_secs {
            Some(0) => {
                return Err(SessionError::Configuration(
                    "timeout must be a positive number of seconds".into(),
                ))
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };
        if self.tick.is_zero() {
            return Err(SessionError::Configuration("tick must be positive".into()));
        }
        if self.connect_timeout.is_some_and(|t| t.is_zero()) {
            return Err(SessionError::Configuration(
                "connect timeout must be positive".into(),
            ));
        }

        Ok(Session {
            target: self.target,
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(PtyConnector::ssh())),
            connection: None,
            shell: None,
            state: ConnectionState::default(),
            engine: ExecutionEngine::new(timeout).with_tick(self.tick),
            connect_timeout: self.connect_timeout,
            history: History::new(),
            track_history: self.track_history,
            logger: self.logger,
            stream: self.stream,
        })
    }
}

/// A remote shell session.
///
/// Holds at most one connection and one shell, and runs one command at a
/// time. Results are appended to the session [`History`] unless tracking is
/// turned off for the session or the call.
///
/// ```no_run
/// use ssh_session::{Session, SessionHelpers};
///
/// let mut session = Session::builder("example.com", "deploy")
///     .timeout_secs(30)
///     .build()?;
/// session.open()?;
/// let result = session.run("uname -a")?;
/// println!("{}", result);
/// let home = session.env("HOME")?;
/// session.close()?;
/// # Ok::<(), ssh_session::SessionError>(())
/// ```
pub struct Session {
    target: Target,
    connector: Arc<dyn Connector>,
    connection: Option<Box<dyn Connection>>,
    shell: Option<Box<dyn RemoteShell>>,
    state: ConnectionState,
    engine: ExecutionEngine,
    connect_timeout: Option<Duration>,
    history: History,
    track_history: bool,
    logger: Option<Box<dyn CommandLogger>>,
    stream: Option<OutputStream>,
}

impl Session {
    pub fn builder(host: impl Into<String>, user: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(host, user)
    }

    /// Session with default settings.
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Result<Self> {
        Self::builder(host, user).build()
    }

    pub fn host(&self) -> &str {
        &self.target.host
    }

    pub fn user(&self) -> &str {
        &self.target.user
    }

    pub fn port(&self) -> Option<u16> {
        self.target.port
    }

    /// Per-command deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.engine.timeout()
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.can_execute()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn track_history(&self) -> bool {
        self.track_history
    }

    pub fn set_track_history(&mut self, track: bool) {
        self.track_history = track;
    }

    /// Hand every output chunk of later `run*` calls to `stream`.
    pub fn set_stream(&mut self, stream: impl FnMut(&str) + Send + 'static) {
        self.stream = Some(Box::new(stream));
    }

    pub fn clear_stream(&mut self) {
        self.stream = None;
    }

    /// Most recently recorded result.
    pub fn last_command(&self) -> Option<&CommandResult> {
        self.history.last()
    }

    /// Open the connection and shell, bounded by the configured connect
    /// timeout if any.
    pub fn open(&mut self) -> Result<()> {
        match self.connect_timeout {
            Some(timeout) => self.open_with_timeout(timeout),
            None => {
                self.ensure_closed()?;
                let (connection, shell) = connect(self.connector.as_ref(), &self.target)?;
                self.attach(connection, shell)
            }
        }
    }

    /// Open the connection and shell, giving up after `timeout`.
    ///
    /// The deadline covers connecting only, not later commands.
    pub fn open_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.ensure_closed()?;
        let connector = Arc::clone(&self.connector);
        let target = self.target.clone();
        let (connection, shell) =
            with_timeout(timeout, move || connect(connector.as_ref(), &target)).map_err(|e| {
                match e {
                    SessionError::Elapsed(after) => SessionError::ConnectTimeout(after),
                    other => other,
                }
            })?;
        self.attach(connection, shell)
    }

    /// Release the shell and the connection.
    ///
    /// Returns `Ok(false)` if the session was not open.
    pub fn close(&mut self) -> Result<bool> {
        if !self.state.can_execute() {
            return Ok(false);
        }

        let shell_closed = self.shell.take().map_or(Ok(()), |mut shell| shell.close());
        let connection_closed = self
            .connection
            .take()
            .map_or(Ok(()), |mut connection| connection.close());
        self.state.transition_to(ConnectionState::Closed)?;
        info!(host = %self.target.host, "session closed");

        shell_closed.and(connection_closed)?;
        Ok(true)
    }

    /// Run `command` with default options.
    pub fn run(&mut self, command: &str) -> Result<CommandResult> {
        self.execute(command, RunOptions::default(), None)
    }

    /// Run `command` with explicit options.
    pub fn run_with(&mut self, command: &str, options: RunOptions) -> Result<CommandResult> {
        self.execute(command, options, None)
    }

    /// Run `command`, handing every output chunk to `on_output` as it arrives.
    pub fn run_streaming<F>(
        &mut self,
        command: &str,
        options: RunOptions,
        mut on_output: F,
    ) -> Result<CommandResult>
    where
        F: FnMut(&str),
    {
        let on_output: &mut dyn FnMut(&str) = &mut on_output;
        self.execute(command, options, Some(on_output))
    }

    /// Run `command` and return its exit status.
    ///
    /// Output goes to `on_output` only: nothing is recorded in the history
    /// and neither the logger nor the session stream sees it.
    pub fn exec<F>(&mut self, command: &str, mut on_output: F) -> Result<i32>
    where
        F: FnMut(&str),
    {
        if !self.state.can_execute() {
            return Err(SessionError::NotConnected);
        }
        let shell = self.shell.as_deref_mut().ok_or(SessionError::NotConnected)?;
        let on_output: &mut dyn FnMut(&str) = &mut on_output;
        let result = self.engine.execute(shell, command, Some(on_output))?;
        Ok(result.exit_code().unwrap_or(FAILURE_EXIT_CODE))
    }

    /// Run `commands` in order and collect their results.
    pub fn run_multiple<I, S>(&mut self, commands: I, options: MultiRunOptions) -> Result<Vec<CommandResult>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.run_multiple_with(commands, options, |_| {})
    }

    /// Like [`run_multiple`](Self::run_multiple), calling `on_result` after
    /// each command.
    ///
    /// With `break_on_failure`, the first failing command is the last one
    /// run and its result is the last one returned.
    pub fn run_multiple_with<I, S, F>(
        &mut self,
        commands: I,
        options: MultiRunOptions,
        mut on_result: F,
    ) -> Result<Vec<CommandResult>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&CommandResult),
    {
        let mut results = Vec::new();
        for command in commands {
            let result = self.execute(command.as_ref(), options.run_options(), None)?;
            on_result(&result);
            let failed = result.failure();
            results.push(result);
            if failed && options.break_on_failure {
                debug!(command = command.as_ref(), "stopping after failed command");
                break;
            }
        }
        Ok(results)
    }

    /// Run `name` followed by `args`, joined with single spaces.
    ///
    /// See also the [`remote!`](crate::remote) macro.
    pub fn invoke<I, S>(&mut self, name: &str, args: I) -> Result<CommandResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut command = name.to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg.as_ref());
        }
        self.run(command.trim())
    }

    fn ensure_closed(&self) -> Result<()> {
        if self.state.can_execute() {
            Err(SessionError::AlreadyConnected)
        } else {
            Ok(())
        }
    }

    fn attach(&mut self, connection: Box<dyn Connection>, shell: Box<dyn RemoteShell>) -> Result<()> {
        self.state.transition_to(ConnectionState::Connected)?;
        self.connection = Some(connection);
        self.shell = Some(shell);
        info!(host = %self.target.host, user = %self.target.user, "session opened");
        Ok(())
    }

    fn execute(
        &mut self,
        command: &str,
        options: RunOptions,
        on_output: Option<&mut dyn FnMut(&str)>,
    ) -> Result<CommandResult> {
        if !self.state.can_execute() {
            return Err(SessionError::NotConnected);
        }
        let shell = self.shell.as_deref_mut().ok_or(SessionError::NotConnected)?;
        let result = match (self.stream.as_mut(), on_output) {
            (Some(stream), Some(on_output)) => {
                let both: &mut dyn FnMut(&str) = &mut |chunk: &str| {
                    stream(chunk);
                    on_output(chunk);
                };
                self.engine.execute(shell, command, Some(both))
            }
            (Some(stream), None) => {
                let stream: &mut dyn FnMut(&str) = &mut **stream;
                self.engine.execute(shell, command, Some(stream))
            }
            (None, on_output) => self.engine.execute(shell, command, on_output),
        }?;

        if options.history.resolve(self.track_history) {
            self.history.push(result.clone());
        }
        if let Some(logger) = &self.logger {
            logger.log(&result.to_string());
        }
        Ok(result)
    }
}

fn connect(
    connector: &dyn Connector,
    target: &Target,
) -> Result<(Box<dyn Connection>, Box<dyn RemoteShell>)> {
    debug!(host = %target.host, port = ?target.port, "connecting");
    let mut connection = connector.connect(target)?;
    match connection.open_shell() {
        Ok(shell) => Ok((connection, shell)),
        Err(e) => {
            if let Err(close_err) = connection.close() {
                warn!("closing connection after shell failure: {}", close_err);
            }
            Err(e)
        }
    }
}

impl CommandRunner for Session {
    fn run_command(&mut self, command: &str, options: RunOptions) -> Result<CommandResult> {
        self.run_with(command, options)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("state", &self.state)
            .field("engine", &self.engine)
            .field("history", &self.history.len())
            .field("track_history", &self.track_history)
            .field("stream", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(host = %self.target.host, "error closing session on drop: {}", e);
        }
    }
}

/// Run a remote command written as a method call.
///
/// `remote!(session.uname("-a"))` is `session.invoke("uname", ["-a"])`.
/// Arguments may be any `Display` value.
///
/// ```no_run
/// use ssh_session::{remote, Session};
///
/// let mut session = Session::new("example.com", "deploy")?;
/// session.open()?;
/// let result = remote!(session.ls("-la", "/tmp"))?;
/// # Ok::<(), ssh_session::SessionError>(())
/// ```
#[macro_export]
macro_rules! remote {
    ($session:ident . $name:ident ( $($arg:expr),* $(,)? )) => {
        $session.invoke(
            stringify!($name),
            ::std::vec::Vec::<::std::string::String>::from([
                $(::std::string::ToString::to_string(&$arg)),*
            ]),
        )
    };
}
