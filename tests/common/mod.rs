//! Scripted transport shared by the integration tests.
//!
//! Each command maps to a canned [`Reply`]. Output is delivered one chunk per
//! pump, followed by the exit status, so the engine sees it arrive in pieces.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ssh_session::{
    Connection, Connector, ProcessObserver, RemoteShell, Result, SessionError, Target,
};

/// One piece of process output.
#[derive(Debug, Clone)]
pub enum Chunk {
    Out(String),
    Err(String),
}

/// What a scripted command does.
#[derive(Debug, Clone)]
pub struct Reply {
    chunks: Vec<Chunk>,
    status: Option<String>,
    hang: bool,
}

impl Reply {
    /// Prints `output` and exits 0.
    pub fn ok(output: &str) -> Self {
        Self::exit(output, "0")
    }

    /// Prints `output` and reports `status`.
    pub fn exit(output: &str, status: &str) -> Self {
        Self {
            chunks: vec![Chunk::Out(output.to_string())],
            status: Some(status.to_string()),
            hang: false,
        }
    }

    /// Prints `output` and finishes without a status.
    pub fn no_status(output: &str) -> Self {
        Self {
            chunks: vec![Chunk::Out(output.to_string())],
            status: None,
            hang: false,
        }
    }

    /// Never finishes.
    pub fn hang() -> Self {
        Self {
            chunks: Vec::new(),
            status: None,
            hang: true,
        }
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.chunks.push(Chunk::Out(text.to_string()));
        self
    }

    pub fn stderr(mut self, text: &str) -> Self {
        self.chunks.push(Chunk::Err(text.to_string()));
        self
    }
}

/// Everything the fake transport saw.
#[derive(Debug, Default)]
pub struct Log {
    pub submitted: Vec<String>,
    pub connects: usize,
    pub aborts: usize,
    pub shells_closed: usize,
    pub connections_closed: usize,
}

/// Connector handing out scripted shells. Clones share their log.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    log: Arc<Mutex<Log>>,
    connect_delay: Option<Duration>,
    refuse: bool,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, command: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(command.to_string(), reply);
        self
    }

    /// Sleep this long in `connect`.
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Fail every `connect`.
    pub fn refuse(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn submitted(&self) -> Vec<String> {
        self.log.lock().unwrap().submitted.clone()
    }

    pub fn with_log<T>(&self, f: impl FnOnce(&Log) -> T) -> T {
        f(&self.log.lock().unwrap())
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _target: &Target) -> Result<Box<dyn Connection>> {
        if let Some(delay) = self.connect_delay {
            thread::sleep(delay);
        }
        if self.refuse {
            return Err(SessionError::Transport("connection refused".into()));
        }
        self.log.lock().unwrap().connects += 1;
        Ok(Box::new(ScriptedConnection {
            replies: Arc::clone(&self.replies),
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedConnection {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    log: Arc<Mutex<Log>>,
}

impl Connection for ScriptedConnection {
    fn open_shell(&mut self) -> Result<Box<dyn RemoteShell>> {
        Ok(Box::new(ScriptedShell {
            replies: Arc::clone(&self.replies),
            log: Arc::clone(&self.log),
            pending: VecDeque::new(),
            finish: None,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().connections_closed += 1;
        Ok(())
    }
}

struct ScriptedShell {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    log: Arc<Mutex<Log>>,
    pending: VecDeque<Chunk>,
    /// `Some` once a command is in flight and will finish.
    finish: Option<Option<String>>,
}

impl RemoteShell for ScriptedShell {
    fn execute(&mut self, command: &str) -> Result<()> {
        self.log.lock().unwrap().submitted.push(command.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_else(|| {
                Reply::exit(&format!("sh: {}: command not found\n", command), "127")
            });

        self.pending = reply.chunks.into_iter().collect();
        self.finish = if reply.hang { None } else { Some(reply.status) };
        Ok(())
    }

    fn pump(&mut self, tick: Duration, observer: &mut dyn ProcessObserver) -> Result<()> {
        if let Some(chunk) = self.pending.pop_front() {
            match chunk {
                Chunk::Out(text) => observer.on_output(&text),
                Chunk::Err(text) => observer.on_error_output(&text),
            }
            return Ok(());
        }
        match self.finish.take() {
            Some(status) => observer.on_finish(status.as_deref()),
            None => thread::sleep(tick),
        }
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        self.log.lock().unwrap().aborts += 1;
        self.pending.clear();
        self.finish = None;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().shells_closed += 1;
        Ok(())
    }
}
