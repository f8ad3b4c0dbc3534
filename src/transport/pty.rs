//! PTY transport using portable-pty.

use std::io::Write;
use std::time::Duration;

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::reader::{Drained, PtyReader};
use super::shell::{OneShotShell, PersistentShell};
use super::{Connection, Connector, Credentials, RemoteShell, Target};
use crate::error::SessionError;
use crate::Result;

/// Default bound on the shell startup handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Get the shell used for local sessions.
pub fn default_shell() -> &'static str {
    #[cfg(unix)]
    {
        "/bin/sh"
    }
    #[cfg(windows)]
    {
        "cmd.exe"
    }
}

/// How commands map onto shell processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellMode {
    /// One interactive shell for the whole session. Working directory and
    /// exported variables carry over between commands.
    ///
    /// Commands share the shell's stdin with the completion marker line
    /// written after them. A command that reads stdin (`sudo` asking for a
    /// password, a bare `cat`) swallows that line and never completes, so
    /// set a session timeout or pick [`ShellMode::PerCommand`] for those.
    #[default]
    Persistent,
    /// A fresh process per command. Nothing carries over, so `cd` and
    /// `export` have no lasting effect.
    PerCommand,
}

/// The program a PTY session drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// The system OpenSSH client.
    Ssh { program: String },
    /// A shell on this machine. Host and user are ignored.
    Local { shell: String },
}

impl Launcher {
    pub fn ssh() -> Self {
        Self::Ssh {
            program: "ssh".to_string(),
        }
    }

    pub fn local() -> Self {
        Self::Local {
            shell: default_shell().to_string(),
        }
    }

    /// Command for an interactive shell.
    pub(crate) fn interactive(&self, target: &Target) -> CommandBuilder {
        match self {
            Self::Ssh { program } => {
                let mut cmd = CommandBuilder::new(program);
                cmd.args(ssh_args(target));
                cmd
            }
            Self::Local { shell } => CommandBuilder::new(shell),
        }
    }

    /// Command running `command_line` once.
    pub(crate) fn one_shot(&self, target: &Target, command_line: &str) -> CommandBuilder {
        match self {
            Self::Ssh { program } => {
                let mut cmd = CommandBuilder::new(program);
                cmd.args(ssh_args(target));
                cmd.arg("--");
                cmd.arg(command_line);
                cmd
            }
            Self::Local { shell } => {
                let mut cmd = CommandBuilder::new(shell);
                #[cfg(windows)]
                cmd.arg("/c");
                #[cfg(not(windows))]
                cmd.arg("-c");
                cmd.arg(command_line);
                cmd
            }
        }
    }
}

/// OpenSSH arguments for a target. Options are passed through untouched.
pub(crate) fn ssh_args(target: &Target) -> Vec<String> {
    let creds = &target.credentials;
    let mut args = vec!["-tt".to_string()];

    if let Some(port) = target.port {
        args.push("-p".to_string());
        args.push(port.to_string());
    }

    if let Some(ref identity) = creds.identity_file {
        args.push("-i".to_string());
        args.push(identity.display().to_string());
    }

    for (key, value) in &creds.options {
        args.push("-o".to_string());
        args.push(format!("{}={}", key, value));
    }

    if creds.password.is_some() {
        args.push("-o".to_string());
        args.push("NumberOfPasswordPrompts=1".to_string());
    } else {
        args.push("-o".to_string());
        args.push("BatchMode=yes".to_string());
    }

    if !target.user.is_empty() {
        args.push("-l".to_string());
        args.push(target.user.clone());
    }

    args.push(target.host.clone());
    args
}

/// Connector running shells inside a pseudo-terminal.
#[derive(Debug, Clone)]
pub struct PtyConnector {
    launcher: Launcher,
    mode: ShellMode,
    handshake_timeout: Duration,
}

impl PtyConnector {
    pub fn new(launcher: Launcher) -> Self {
        Self {
            launcher,
            mode: ShellMode::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Connector using the system `ssh` client.
    pub fn ssh() -> Self {
        Self::new(Launcher::ssh())
    }

    /// Connector running commands on this machine.
    pub fn local() -> Self {
        Self::new(Launcher::local())
    }

    /// Set the shell mode.
    pub fn mode(mut self, mode: ShellMode) -> Self {
        self.mode = mode;
        self
    }

    /// Bound the persistent shell startup (authentication included).
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub fn shell_mode(&self) -> ShellMode {
        self.mode
    }
}

impl Connector for PtyConnector {
    fn connect(&self, target: &Target) -> Result<Box<dyn Connection>> {
        if target.host.is_empty() && matches!(self.launcher, Launcher::Ssh { .. }) {
            return Err(SessionError::Configuration("host must not be empty".into()));
        }

        debug!(host = %target.host, user = %target.user, mode = ?self.mode, "PTY connect");

        Ok(Box::new(PtyConnection {
            connector: self.clone(),
            target: target.clone(),
            open: true,
        }))
    }
}

struct PtyConnection {
    connector: PtyConnector,
    target: Target,
    open: bool,
}

impl Connection for PtyConnection {
    fn open_shell(&mut self) -> Result<Box<dyn RemoteShell>> {
        if !self.open {
            return Err(SessionError::NotConnected);
        }

        let launcher = self.connector.launcher.clone();
        match self.connector.mode {
            ShellMode::Persistent => {
                let credentials = match launcher {
                    Launcher::Ssh { .. } => self.target.credentials.clone(),
                    Launcher::Local { .. } => Credentials::none(),
                };
                let process = PtyProcess::spawn(launcher.interactive(&self.target))?;
                let shell = PersistentShell::start(
                    process,
                    &credentials,
                    self.connector.handshake_timeout,
                )?;
                Ok(Box::new(shell))
            }
            ShellMode::PerCommand => Ok(Box::new(OneShotShell::new(
                launcher,
                self.target.clone(),
            ))),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

/// A process running in its own PTY.
pub(crate) struct PtyProcess {
    _master: Box<dyn portable_pty::MasterPty + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    reader: PtyReader,
}

impl PtyProcess {
    pub fn spawn(cmd: CommandBuilder) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 200,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        // The reader only sees EOF once every slave handle is gone.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        debug!(pid = ?child.process_id(), "PTY process spawned");

        Ok(Self {
            _master: pair.master,
            child,
            writer,
            reader: PtyReader::spawn(reader)?,
        })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn drain(&mut self) -> Drained {
        self.reader.drain()
    }

    /// Exit code if the process has terminated.
    pub fn try_exit_code(&mut self) -> Result<Option<u32>> {
        Ok(self.child.try_wait()?.map(|status| status.exit_code()))
    }

    pub fn kill(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_none() {
            self.child.kill()?;
        }
        Ok(())
    }
}
