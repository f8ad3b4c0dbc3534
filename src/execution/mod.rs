//! Command execution.
//!
//! - [`CommandResult`]: structured outcome of one command
//! - [`ExecutionEngine`]: drives a command to completion with an optional
//!   deadline, streaming output as it arrives
//! - [`RunOptions`] / [`MultiRunOptions`]: per-call settings
//!
//! # Example
//!
//! ```
//! use ssh_session::execution::CommandResult;
//!
//! let result = CommandResult::new("cmd", Some("output".into()), Some("128"), 1.5);
//! assert!(result.failure());
//! assert_eq!(result.to_string(), "[cmd] => 128, 6 bytes, 1.5 seconds");
//! ```

mod engine;
mod options;
mod result;

pub use engine::{ExecutionEngine, DEFAULT_TICK};
pub use options::{HistoryPolicy, MultiRunOptions, RunOptions};
pub use result::{parse_exit_code, CommandResult, FAILURE_EXIT_CODE};
