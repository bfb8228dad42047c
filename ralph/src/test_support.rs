//! Test-only helpers: a scripted tool invoker and a scratch workspace.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::budget::{Bound, CancelToken};
use crate::core::types::ToolPermissions;
use crate::error::{DriverError, InvokeError};
use crate::io::config::DriverConfig;
use crate::io::invoker::{InvokeRequest, ToolInvoker, ToolOutput};
use crate::looping::Session;

/// Template used by [`TestWorkspace`]; keeps rendered prompts easy to assert on.
pub const TEST_TEMPLATE: &str = "PRD:\n{{ PRD }}\nPROGRESS:\n{{ PROGRESS }}\n";
pub const TEST_PRD: &str = "build the thing";

/// What a scripted invocation returns.
#[derive(Debug, Clone)]
pub enum ScriptedResult {
    Output(String),
    Failure { code: i32, output: String },
    LaunchFailure,
    /// Block until the token fires, then report cancellation.
    WaitForCancel,
}

/// One queued invocation, optionally appending to the progress log as the real tool would.
#[derive(Debug, Clone)]
pub struct ScriptedCall {
    pub result: ScriptedResult,
    pub progress_append: Option<(PathBuf, String)>,
}

impl ScriptedCall {
    pub fn output(text: impl Into<String>) -> Self {
        Self::from_result(ScriptedResult::Output(text.into()))
    }

    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        Self::from_result(ScriptedResult::Failure {
            code,
            output: output.into(),
        })
    }

    pub fn launch_failure() -> Self {
        Self::from_result(ScriptedResult::LaunchFailure)
    }

    pub fn wait_for_cancel() -> Self {
        Self::from_result(ScriptedResult::WaitForCancel)
    }

    pub fn with_progress(mut self, path: PathBuf, text: impl Into<String>) -> Self {
        self.progress_append = Some((path, text.into()));
        self
    }

    fn from_result(result: ScriptedResult) -> Self {
        Self {
            result,
            progress_append: None,
        }
    }
}

/// Invoker that replays queued results and records every request it receives.
pub struct ScriptedInvoker {
    calls: RefCell<VecDeque<ScriptedCall>>,
    requests: RefCell<Vec<InvokeRequest>>,
}

impl ScriptedInvoker {
    pub fn new(calls: Vec<ScriptedCall>) -> Self {
        Self {
            calls: RefCell::new(calls.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<InvokeRequest> {
        self.requests.borrow().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.prompt.clone())
            .collect()
    }

    pub fn assert_drained(&self) -> Result<()> {
        let remaining = self.calls.borrow().len();
        if remaining > 0 {
            return Err(anyhow!("{remaining} scripted calls were not consumed"));
        }
        Ok(())
    }
}

impl ToolInvoker for ScriptedInvoker {
    fn invoke(
        &self,
        request: &InvokeRequest,
        cancel: &CancelToken,
    ) -> Result<ToolOutput, InvokeError> {
        self.requests.borrow_mut().push(request.clone());
        let call = self
            .calls
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| InvokeError::Supervise {
                program: "scripted".to_string(),
                source: anyhow!("scripted invoker has no calls left"),
            })?;

        if let Some((path, text)) = &call.progress_append {
            append(path, text).map_err(|source| InvokeError::Supervise {
                program: "scripted".to_string(),
                source,
            })?;
        }

        match call.result {
            ScriptedResult::Output(text) => Ok(ToolOutput { text }),
            ScriptedResult::Failure { code, output } => Err(InvokeError::Execution {
                program: "scripted".to_string(),
                code: Some(code),
                output,
            }),
            ScriptedResult::LaunchFailure => Err(InvokeError::Launch {
                program: "scripted".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted launch failure"),
            }),
            ScriptedResult::WaitForCancel => {
                let give_up = Instant::now() + Duration::from_secs(10);
                while !cancel.is_cancelled() {
                    if Instant::now() >= give_up {
                        return Err(InvokeError::Supervise {
                            program: "scripted".to_string(),
                            source: anyhow!("token never fired"),
                        });
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(InvokeError::Cancelled {
                    output: String::new(),
                })
            }
        }
    }
}

fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("append {}", path.display()))
}

/// Scratch directory holding a requirements document and prompt template.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let ws = Self { dir };
        fs::write(ws.prd_path(), TEST_PRD).context("write prd")?;
        ws.write_prompt(TEST_TEMPLATE)?;
        Ok(ws)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn prd_path(&self) -> PathBuf {
        self.path().join("prd.md")
    }

    pub fn prompt_path(&self) -> PathBuf {
        self.path().join("prompt.md")
    }

    pub fn progress_path(&self) -> PathBuf {
        self.path().join("progress.txt")
    }

    pub fn write_prompt(&self, template: &str) -> Result<()> {
        fs::write(self.prompt_path(), template).context("write prompt")
    }

    /// Config pointing at this workspace, bounded to one iteration.
    pub fn config(&self) -> DriverConfig {
        DriverConfig {
            prd: self.prd_path(),
            progress: self.progress_path(),
            prompt: self.prompt_path(),
            model: "test-model".to_string(),
            tools: ToolPermissions {
                allow: vec!["write".to_string()],
                deny: vec!["shell(rm)".to_string()],
            },
            timeout: None,
            max_iterations: Some(1),
            log_level: "debug".to_string(),
            command: "copilot".to_string(),
        }
    }

    pub fn session(&self, bound: Bound) -> Result<Session, DriverError> {
        Session::load(self.config(), bound)
    }
}
