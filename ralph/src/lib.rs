//! Autonomous driver for an external coding agent.
//!
//! The driver renders a prompt from a requirements document and a progress log,
//! runs the agent CLI, and repeats until the agent prints the completion marker
//! or a duration / iteration bound is reached.
//!
//! - **[`core`]**: Pure logic (bounds, cancellation, template rendering,
//!   completion detection). No I/O.
//! - **[`io`]**: Side-effecting operations (config and document reads, file
//!   scaffolding, process execution).
//!
//! [`looping`] coordinates the two to implement the driver loop.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
