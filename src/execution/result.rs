//! Command result types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Exit code substituted when a reported status cannot be parsed.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Outcome of one executed command.
///
/// Built once, when execution completes. Only the two timestamps can be
/// changed afterwards, and only before the result is recorded in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    command: String,
    output: String,
    exit_code: Option<i32>,
    start_time: Option<DateTime<Utc>>,
    finish_time: Option<DateTime<Utc>>,
    duration: f64,
}

impl CommandResult {
    /// Create a result from raw values.
    ///
    /// `exit_code` is coerced to an integer; anything unparseable becomes
    /// [`FAILURE_EXIT_CODE`]. `None` leaves the code unknown until
    /// [`with_exit_code`](Self::with_exit_code) supplies it.
    pub fn new(
        command: impl Into<String>,
        output: Option<String>,
        exit_code: Option<&str>,
        duration: f64,
    ) -> Self {
        Self {
            command: command.into(),
            output: output.unwrap_or_default(),
            exit_code: exit_code.map(parse_exit_code),
            start_time: None,
            finish_time: None,
            duration,
        }
    }

    /// Set the exit code.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Set both timestamps.
    pub fn with_times(mut self, start: DateTime<Utc>, finish: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.finish_time = Some(finish);
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Merged stdout and stderr, in arrival order.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Execution time in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<DateTime<Utc>> {
        self.finish_time
    }

    /// Backfill the start timestamp.
    pub fn set_start_time(&mut self, time: DateTime<Utc>) {
        self.start_time = Some(time);
    }

    /// Backfill the finish timestamp.
    pub fn set_finish_time(&mut self, time: DateTime<Utc>) {
        self.finish_time = Some(time);
    }

    /// Check if command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Check if command failed. Always the complement of [`success`](Self::success).
    pub fn failure(&self) -> bool {
        !self.success()
    }

    /// Alias of [`failure`](Self::failure).
    pub fn is_error(&self) -> bool {
        self.failure()
    }

    /// Get output as string, trimmed.
    pub fn output_trimmed(&self) -> &str {
        self.output.trim()
    }

    /// Get output lines.
    pub fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    /// Key/value projection of every field, for logging and persistence.
    pub fn to_structured(&self) -> serde_json::Value {
        serde_json::json!({
            "command": self.command,
            "output": self.output,
            "exit_code": self.exit_code,
            "start_time": self.start_time.map(|t| t.to_rfc3339()),
            "finish_time": self.finish_time.map(|t| t.to_rfc3339()),
            "duration": self.duration,
        })
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] => ", self.command)?;
        match self.exit_code {
            Some(code) => write!(f, "{}", code)?,
            None => f.write_str("?")?,
        }
        write!(
            f,
            ", {} bytes, {:?} seconds",
            self.output.len(),
            self.duration
        )
    }
}

/// Coerce a raw exit status to an integer, substituting the generic failure code.
pub fn parse_exit_code(raw: &str) -> i32 {
    raw.trim().parse().unwrap_or(FAILURE_EXIT_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: &str) -> CommandResult {
        CommandResult::new("cmd", Some("output".into()), Some(exit_code), 0.0)
    }

    #[test]
    fn test_new_assigns_attributes() {
        let cmd = CommandResult::new("cmd", Some("output".into()), Some("128"), 1.5);
        assert_eq!(cmd.command(), "cmd");
        assert_eq!(cmd.output(), "output");
        assert_eq!(cmd.exit_code(), Some(128));
        assert_eq!(cmd.duration(), 1.5);
        assert!(cmd.start_time().is_none());
        assert!(cmd.finish_time().is_none());
    }

    #[test]
    fn test_invalid_exit_code_becomes_failure() {
        let cmd = result("ohai");
        assert_eq!(cmd.exit_code(), Some(1));
        assert!(cmd.failure());
    }

    #[test]
    fn test_missing_output_is_empty() {
        let cmd = CommandResult::new("date", None, Some("0"), 0.0);
        assert_eq!(cmd.output(), "");
    }

    #[test]
    fn test_absent_exit_code_stays_unknown() {
        let cmd = CommandResult::new("cmd", None, None, 0.0);
        assert_eq!(cmd.exit_code(), None);
        assert!(!cmd.success());
        assert!(cmd.failure());

        let cmd = cmd.with_exit_code(0);
        assert!(cmd.success());
    }

    #[test]
    fn test_success_and_failure_are_complements() {
        for code in ["0", "1", "2", "128", "255", "-1", "garbage", ""] {
            let cmd = result(code);
            assert_eq!(cmd.success(), !cmd.failure(), "exit code {:?}", code);
            assert_eq!(cmd.is_error(), cmd.failure());
        }
        assert!(result("0").success());
        assert!(result("1").failure());
        assert!(result("128").failure());
    }

    #[test]
    fn test_display() {
        let cmd = CommandResult::new("cmd", Some("output".into()), Some("128"), 1.5);
        assert_eq!(cmd.to_string(), "[cmd] => 128, 6 bytes, 1.5 seconds");

        let cmd = CommandResult::new("cmd", Some("output".into()), Some("0"), 1.234);
        assert_eq!(cmd.to_string(), "[cmd] => 0, 6 bytes, 1.234 seconds");
    }

    #[test]
    fn test_display_counts_bytes() {
        let cmd = CommandResult::new("echo", Some("héllo".into()), Some("0"), 2.0);
        assert_eq!(cmd.to_string(), "[echo] => 0, 6 bytes, 2.0 seconds");
    }

    #[test]
    fn test_to_structured() {
        let start = Utc::now();
        let cmd = result("0").with_times(start, start);
        let value = cmd.to_structured();
        let map = value.as_object().unwrap();

        for key in [
            "command",
            "output",
            "exit_code",
            "start_time",
            "finish_time",
            "duration",
        ] {
            assert!(map.contains_key(key), "missing {}", key);
        }
        assert_eq!(value["exit_code"], 0);
        assert_eq!(value["command"], "cmd");
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_value(result("3")).unwrap();
        assert_eq!(json["exit_code"], 3);
        assert!(json["start_time"].is_null());
    }

    #[test]
    fn test_backfill_timestamps() {
        let mut cmd = result("0");
        let now = Utc::now();
        cmd.set_start_time(now);
        cmd.set_finish_time(now);
        assert_eq!(cmd.start_time(), Some(now));
        assert_eq!(cmd.finish_time(), Some(now));
    }

    #[test]
    fn test_output_trimmed() {
        let cmd = CommandResult::new("uname", Some("Linux\r\n".into()), Some("0"), 0.0);
        assert_eq!(cmd.output_trimmed(), "Linux");
        assert_eq!(cmd.output_lines().count(), 1);
    }
}
