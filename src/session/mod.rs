//! Session management.
//!
//! A [`Session`] owns one connection and one shell, runs commands through an
//! [`ExecutionEngine`](crate::execution::ExecutionEngine) and records their
//! results in a [`History`].

mod history;
#[allow(clippy::module_inception)]
mod session;
mod state;

pub use history::History;
pub use session::{Session, SessionBuilder};
pub use state::ConnectionState;
