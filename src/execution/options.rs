//! Per-call execution options.

/// Whether a single call records its result in the session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPolicy {
    /// Follow the session default.
    #[default]
    Inherit,
    /// Record even if the session default is off.
    ForceOn,
    /// Skip recording even if the session default is on.
    ForceOff,
}

impl HistoryPolicy {
    /// Resolve against the session default.
    pub fn resolve(self, session_default: bool) -> bool {
        match self {
            Self::Inherit => session_default,
            Self::ForceOn => true,
            Self::ForceOff => false,
        }
    }
}

impl From<bool> for HistoryPolicy {
    fn from(record: bool) -> Self {
        if record {
            Self::ForceOn
        } else {
            Self::ForceOff
        }
    }
}

/// Options for a single `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// History recording for this call.
    pub history: HistoryPolicy,
}

impl RunOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the history policy.
    pub fn history(mut self, policy: impl Into<HistoryPolicy>) -> Self {
        self.history = policy.into();
        self
    }
}

/// Options for `run_multiple`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultiRunOptions {
    /// Stop right after the first failing command.
    pub break_on_failure: bool,
    /// History recording for every command in the batch.
    pub history: HistoryPolicy,
}

impl MultiRunOptions {
    /// Create default options (run everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to stop at the first failure.
    pub fn break_on_failure(mut self, stop: bool) -> Self {
        self.break_on_failure = stop;
        self
    }

    /// Set the history policy.
    pub fn history(mut self, policy: impl Into<HistoryPolicy>) -> Self {
        self.history = policy.into();
        self
    }

    /// Options applied to each individual command.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            history: self.history,
        }
    }
}
