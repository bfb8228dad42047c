//! I/O helpers for the driver.

pub mod config;
pub mod documents;
pub mod init;
pub mod invoker;
pub mod process;
