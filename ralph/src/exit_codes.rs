//! Stable exit codes for the `ralph` binary.

/// The tool reported completion, or `--init` succeeded.
pub const OK: i32 = 0;
/// Bad config, unreadable required file, template error, or tool failure.
pub const FATAL: i32 = 1;
/// The timeout or iteration cap was reached without completion.
pub const BOUND_REACHED: i32 = 2;
