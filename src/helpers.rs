//! Convenience operations composed from plain command runs.
//!
//! Every helper is a thin wrapper that builds a shell command, runs it and
//! interprets the result. Arguments are interpolated verbatim; quote paths
//! and values that may contain shell metacharacters.

use std::fmt::Display;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::SessionError;
use crate::execution::{CommandResult, RunOptions};
use crate::Result;

/// Anything that can run a single command and hand back its result.
pub trait CommandRunner {
    fn run_command(&mut self, command: &str, options: RunOptions) -> Result<CommandResult>;
}

/// Helper operations available on every [`CommandRunner`].
pub trait SessionHelpers: CommandRunner {
    /// Run `command` and return its output with surrounding whitespace removed.
    fn capture(&mut self, command: &str) -> Result<String> {
        let result = self.run_command(command, RunOptions::default())?;
        Ok(result.output_trimmed().to_string())
    }

    /// Contents of `path`, or an empty string if it cannot be read.
    fn read_file(&mut self, path: &str) -> Result<String> {
        let result = self.run_command(&format!("cat {}", path), RunOptions::default())?;
        if result.success() {
            Ok(result.output().to_string())
        } else {
            Ok(String::new())
        }
    }

    fn directory_exists(&mut self, path: &str) -> Result<bool> {
        self.succeeds(&format!("test -d {}", path))
    }

    fn file_exists(&mut self, path: &str) -> Result<bool> {
        self.succeeds(&format!("test -f {}", path))
    }

    fn symlink_exists(&mut self, path: &str) -> Result<bool> {
        self.succeeds(&format!("test -h {}", path))
    }

    fn process_exists(&mut self, pid: impl Display) -> Result<bool> {
        self.succeeds(&format!("ps -p {}", pid))
    }

    /// Send `signal` to `pid`. True if the process is gone afterwards.
    fn kill_process(&mut self, pid: impl Display, signal: impl Display) -> Result<bool> {
        self.run_command(&format!("kill -{} {}", signal, pid), RunOptions::default())?;
        Ok(!self.process_exists(pid)?)
    }

    fn has_user(&mut self, name: &str) -> Result<bool> {
        self.succeeds(&format!("id {}", name))
    }

    fn has_group(&mut self, name: &str) -> Result<bool> {
        self.succeeds(&format!("id -g {}", name))
    }

    /// Export an environment variable in the remote shell.
    fn export(&mut self, key: &str, value: &str) -> Result<bool> {
        self.succeeds(&format!("export {}={}", key, value))
    }

    /// Export every pair in order. True only if all of them succeeded.
    fn export_all<I, K, V>(&mut self, pairs: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut all = true;
        for (key, value) in pairs {
            all &= self.export(key.as_ref(), value.as_ref())?;
        }
        Ok(all)
    }

    /// Value of an environment variable, empty if unset.
    fn env(&mut self, key: &str) -> Result<String> {
        self.capture(&format!("echo ${}", key))
    }

    /// Exit status of the previous command in the remote shell.
    ///
    /// Only meaningful with a persistent shell.
    fn last_exit_code(&mut self) -> Result<i32> {
        let raw = self.capture("echo $?")?;
        raw.parse::<i32>()
            .map_err(|_| SessionError::Parse(format!("exit code is not an integer: {:?}", raw)))
    }

    /// Change the working directory of the remote shell.
    fn chdir(&mut self, path: &str) -> Result<bool> {
        self.succeeds(&format!("cd {}", path))
    }

    fn pwd(&mut self) -> Result<String> {
        self.capture("pwd")
    }

    /// Run `command` through `sudo`.
    ///
    /// Nothing answers a sudo password prompt. In a persistent shell the
    /// prompt reads the line that marks the end of the command, so the run
    /// only returns through the session timeout. Use passwordless sudo, or
    /// bound the run with a timeout.
    fn sudo(&mut self, command: &str, options: RunOptions) -> Result<CommandResult> {
        self.run_command(&format!("sudo {}", command), options)
    }

    #[doc(hidden)]
    fn succeeds(&mut self, command: &str) -> Result<bool> {
        Ok(self.run_command(command, RunOptions::default())?.success())
    }
}

impl<T: CommandRunner + ?Sized> SessionHelpers for T {}

/// Run a blocking closure on a worker thread, giving up after `timeout`.
///
/// On expiry [`SessionError::Elapsed`] is returned and the worker is left to
/// finish on its own; whatever it produces is dropped.
pub fn with_timeout<T, F>(timeout: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("ssh-session-timeout".into())
        .spawn(move || {
            let _ = tx.send(f());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(SessionError::Elapsed(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(SessionError::Transport(
            "worker thread exited without a result".into(),
        )),
    }
}
