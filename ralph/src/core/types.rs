//! Shared value types for the driver loop.

use serde::{Deserialize, Serialize};

/// Verbosity of the driver's own logging.
///
/// Parsed leniently from the config's `loglevel` string: `debug`, `warn` and
/// `error` are recognized case-insensitively, anything else (including an empty
/// string) means `info`. The external tool receives the raw string instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Directive used for the `tracing` filter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Ordered tool allow/deny lists forwarded to the external tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPermissions {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}
