//! Typed errors for the driver.
//!
//! - `DriverError`: everything that ends a run with the fatal exit code.
//! - `InvokeError`: failures of a single external tool invocation.
//! - `TemplateError`: prompt template syntax or undefined placeholders.
//!
//! An exhausted bound is not an error; see [`crate::looping::LoopStop`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid config {}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("read {label} {}", path.display())]
    RequiredFile {
        label: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read progress log {}", path.display())]
    ProgressRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("tool invocation failed in iteration {iteration}")]
    ToolInvocation {
        iteration: u32,
        #[source]
        source: InvokeError,
    },
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to launch {program}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited abnormally. Captured output is kept for diagnosis.
    #[error("{program} exited with status {code:?}")]
    Execution {
        program: String,
        code: Option<i32>,
        output: String,
    },

    /// The cancellation token fired before or during the invocation.
    #[error("invocation cancelled")]
    Cancelled { output: String },

    #[error("supervise {program}")]
    Supervise {
        program: String,
        #[source]
        source: anyhow::Error,
    },
}

impl InvokeError {
    /// Output captured before the failure, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Execution { output, .. } | Self::Cancelled { output } => Some(output),
            Self::Launch { .. } | Self::Supervise { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("render prompt template")]
pub struct TemplateError(#[from] minijinja::Error);
