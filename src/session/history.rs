//! Execution history.

use std::ops::Index;

use crate::execution::CommandResult;

/// Append-only log of command results, in execution order.
///
/// Entries are never modified or removed once recorded.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<CommandResult>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, result: CommandResult) {
        self.entries.push(result);
    }

    /// Most recently recorded result.
    pub fn last(&self) -> Option<&CommandResult> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandResult> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[CommandResult] {
        &self.entries
    }

    /// Results of commands that failed.
    pub fn failures(&self) -> impl Iterator<Item = &CommandResult> {
        self.entries.iter().filter(|r| r.failure())
    }

    /// Structured projection of every entry, oldest first.
    pub fn to_structured(&self) -> serde_json::Value {
        serde_json::Value::Array(self.entries.iter().map(|r| r.to_structured()).collect())
    }
}

impl Index<usize> for History {
    type Output = CommandResult;

    fn index(&self, index: usize) -> &CommandResult {
        &self.entries[index]
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a CommandResult;
    type IntoIter = std::slice::Iter<'a, CommandResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
