//! Deterministic logic shared by the driver loop.
//!
//! Core modules perform no I/O. They operate on in-memory values and return
//! deterministic outputs suitable for tests.

pub mod budget;
pub mod completion;
pub mod template;
pub mod types;
