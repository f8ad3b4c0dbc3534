//! Shells over a PTY process.

use std::thread;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, Secret};
use tracing::{debug, trace, warn};

use super::marker::{Marker, MarkerScanner};
use super::prompt::PromptWatcher;
use super::pty::{Launcher, PtyProcess};
use super::{Credentials, ProcessObserver, RemoteShell, Target};
use crate::error::SessionError;
use crate::output::OutputSanitizer;
use crate::Result;

/// Setup sent once the shell is reachable: no echo, no prompts.
const INIT_LINE: &str =
    "stty -echo 2>/dev/null; unset PROMPT_COMMAND 2>/dev/null; PS1=''; PS2=''; export PS1 PS2";

/// Time allowed for a shell to resynchronize after an aborted command.
const RESYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between polls while waiting outside of a pump.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Keep this much of the handshake output for error messages.
const HANDSHAKE_TAIL: usize = 512;

/// How long a persistent shell waits for a password prompt before
/// starting the handshake without one.
const PROMPT_WINDOW: Duration = Duration::from_secs(2);

/// One interactive shell reused for every command.
pub(crate) struct PersistentShell {
    process: PtyProcess,
    sanitizer: OutputSanitizer,
    current: Option<MarkerScanner>,
    needs_resync: bool,
    closed: bool,
}

impl PersistentShell {
    /// Wait for the shell to come up, answering a password prompt if needed.
    ///
    /// A prompt is optional: agent or key authentication never shows one.
    /// The ready marker goes out once a prompt is answered or
    /// [`PROMPT_WINDOW`] passes, and is sent again if a prompt shows up late.
    pub fn start(
        mut process: PtyProcess,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut sanitizer = OutputSanitizer::new();
        let mut seen = String::new();
        let mut watcher = credentials.password.as_ref().map(|_| PromptWatcher::new());
        let mut scanner: Option<MarkerScanner> = None;

        loop {
            let awaiting_prompt = watcher.as_ref().is_some_and(|w| !w.answered())
                && started.elapsed() < PROMPT_WINDOW;
            if scanner.is_none() && !awaiting_prompt {
                scanner = Some(send_ready(&mut process)?);
            }

            let drained = process.drain();
            let mut text = sanitizer.feed(&drained.data);
            remember_tail(&mut seen, &text);

            if let (Some(watcher), Some(password)) =
                (watcher.as_mut(), credentials.password.as_ref())
            {
                if !watcher.answered() {
                    let watched = watcher.feed(&text);
                    text = watched.output;
                    if watched.prompt {
                        debug!("answering password prompt");
                        answer(&mut process, password)?;
                        // typed-ahead input is flushed when the prompt is shown
                        scanner = None;
                    }
                }
            }

            if let Some(ref mut scanner) = scanner {
                if scanner.feed(&text).status.is_some() {
                    break;
                }
            }
            if drained.eof {
                return Err(handshake_failed(&seen));
            }
            if Instant::now() >= deadline {
                return Err(SessionError::ConnectTimeout(timeout));
            }
            if drained.data.is_empty() {
                thread::sleep(POLL_INTERVAL);
            }
        }

        debug!("persistent shell ready");

        Ok(Self {
            process,
            sanitizer,
            current: None,
            needs_resync: false,
            closed: false,
        })
    }

    /// Discard output left over from an aborted command.
    fn resync(&mut self) -> Result<()> {
        let marker = Marker::new();
        self.process
            .write(format!("\n{}\n", marker.ready_line()).as_bytes())?;

        let mut scanner = MarkerScanner::new(&marker);
        let deadline = Instant::now() + RESYNC_TIMEOUT;
        loop {
            let drained = self.process.drain();
            let text = self.sanitizer.feed(&drained.data);
            if scanner.feed(&text).status.is_some() {
                self.needs_resync = false;
                return Ok(());
            }
            if drained.eof {
                return Err(SessionError::Transport("remote shell closed".into()));
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Transport(
                    "remote shell unresponsive after abort".into(),
                ));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl RemoteShell for PersistentShell {
    fn execute(&mut self, command: &str) -> Result<()> {
        if self.closed {
            return Err(SessionError::NotConnected);
        }
        if self.current.is_some() {
            return Err(SessionError::Transport(
                "a command is already running in this shell".into(),
            ));
        }
        if self.needs_resync {
            self.resync()?;
        }

        let marker = Marker::new();
        self.process
            .write(format!("{}\n{}\n", command, marker.status_line()).as_bytes())?;
        self.current = Some(MarkerScanner::new(&marker));
        Ok(())
    }

    fn pump(&mut self, tick: Duration, observer: &mut dyn ProcessObserver) -> Result<()> {
        let Some(scanner) = self.current.as_mut() else {
            return Ok(());
        };

        let drained = self.process.drain();
        if drained.data.is_empty() && !drained.eof {
            thread::sleep(tick);
            return Ok(());
        }

        trace!(bytes = drained.data.len(), "pumped");
        let text = self.sanitizer.feed(&drained.data);
        let scanned = scanner.feed(&text);
        if !scanned.output.is_empty() {
            observer.on_output(&scanned.output);
        }

        if let Some(status) = scanned.status {
            self.current = None;
            observer.on_finish(Some(&status));
        } else if drained.eof {
            self.current = None;
            self.closed = true;
            return Err(SessionError::Transport(
                "remote shell closed before the command finished".into(),
            ));
        }

        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        if self.current.take().is_some() {
            // Ctrl-C to the foreground process
            self.process.write(b"\x03")?;
            self.needs_resync = true;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;
        if let Err(e) = self.process.write(b"exit\n") {
            debug!("exit not delivered: {}", e);
        }
        self.process.kill()
    }
}

/// A fresh PTY process for every command.
pub(crate) struct OneShotShell {
    launcher: Launcher,
    target: Target,
    running: Option<Running>,
    closed: bool,
}

struct Running {
    process: PtyProcess,
    sanitizer: OutputSanitizer,
    login: Option<Login>,
    eof: bool,
}

/// Password handling for a one-shot `ssh` run.
///
/// The remote command line starts by printing a ready marker. A prompt is
/// only answered before that marker shows up, so a command asking for a
/// password of its own never gets the login password.
struct Login {
    watcher: PromptWatcher,
    scanner: MarkerScanner,
}

/// What [`Login::screen`] let through.
#[derive(Debug, PartialEq, Eq)]
struct Screened {
    output: String,
    prompt: bool,
    started: bool,
}

impl Login {
    fn new(marker: &Marker) -> Self {
        Self {
            watcher: PromptWatcher::new(),
            scanner: MarkerScanner::new(marker),
        }
    }

    /// Screen output produced before the command started. At `eof` every
    /// held byte is released.
    fn screen(&mut self, text: &str, eof: bool) -> Screened {
        let scanned = self.scanner.feed(text);
        let started = scanned.status.is_some();
        let mut before = scanned.output;
        if eof && !started {
            before.push_str(&self.scanner.finish());
        }

        let watched = self.watcher.feed(&before);
        let mut output = watched.output;
        if started || eof {
            output.push_str(&self.watcher.flush());
        }
        if started {
            output.push_str(&scanned.rest);
        }

        Screened {
            output,
            prompt: watched.prompt,
            started,
        }
    }
}

impl OneShotShell {
    pub fn new(launcher: Launcher, target: Target) -> Self {
        Self {
            launcher,
            target,
            running: None,
            closed: false,
        }
    }
}

impl RemoteShell for OneShotShell {
    fn execute(&mut self, command: &str) -> Result<()> {
        if self.closed {
            return Err(SessionError::NotConnected);
        }
        if self.running.is_some() {
            return Err(SessionError::Transport(
                "a command is already running in this shell".into(),
            ));
        }

        let (cmd, login) = match self.launcher {
            Launcher::Ssh { .. } if self.target.credentials.password.is_some() => {
                let marker = Marker::new();
                let line = format!("{}; {}", marker.ready_line(), command);
                (self.launcher.one_shot(&self.target, &line), Some(Login::new(&marker)))
            }
            _ => (self.launcher.one_shot(&self.target, command), None),
        };

        self.running = Some(Running {
            process: PtyProcess::spawn(cmd)?,
            sanitizer: OutputSanitizer::new(),
            login,
            eof: false,
        });
        Ok(())
    }

    fn pump(&mut self, tick: Duration, observer: &mut dyn ProcessObserver) -> Result<()> {
        let Some(running) = self.running.as_mut() else {
            return Ok(());
        };

        if !running.eof {
            let drained = running.process.drain();
            running.eof = drained.eof;

            let mut text = running.sanitizer.feed(&drained.data);
            if let Some(ref mut login) = running.login {
                let screened = login.screen(&text, running.eof);
                if screened.prompt {
                    if let Some(ref password) = self.target.credentials.password {
                        debug!("answering password prompt");
                        answer(&mut running.process, password)?;
                    }
                }
                if screened.started {
                    running.login = None;
                }
                text = screened.output;
            }
            if !text.is_empty() {
                trace!(bytes = drained.data.len(), "pumped");
                observer.on_output(&text);
            }

            if !running.eof {
                if drained.data.is_empty() {
                    thread::sleep(tick);
                }
                return Ok(());
            }
        }

        match running.process.try_exit_code()? {
            Some(code) => {
                let status = code.to_string();
                self.running = None;
                observer.on_finish(Some(&status));
            }
            None => thread::sleep(tick),
        }

        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        match self.running.take() {
            Some(mut running) => running.process.kill(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.abort()
    }
}

/// Send the setup line and a ready marker, returning the scanner waiting for it.
fn send_ready(process: &mut PtyProcess) -> Result<MarkerScanner> {
    let marker = Marker::new();
    process.write(format!("{}\n{}\n", INIT_LINE, marker.ready_line()).as_bytes())?;
    Ok(MarkerScanner::new(&marker))
}

fn answer(process: &mut PtyProcess, password: &Secret<String>) -> Result<()> {
    process.write(format!("{}\n", password.expose_secret()).as_bytes())
}

fn remember_tail(seen: &mut String, text: &str) {
    seen.push_str(text);
    if seen.len() > HANDSHAKE_TAIL {
        let mut cut = seen.len() - HANDSHAKE_TAIL;
        while !seen.is_char_boundary(cut) {
            cut += 1;
        }
        seen.drain(..cut);
    }
}

fn handshake_failed(seen: &str) -> SessionError {
    let detail = seen.trim();
    warn!("shell exited during startup: {}", detail);
    if detail.is_empty() {
        SessionError::Transport("shell exited during startup".into())
    } else {
        SessionError::Transport(format!("shell exited during startup: {}", detail))
    }
}
