//! External tool abstraction.
//!
//! The [`ToolInvoker`] trait decouples the loop from the actual coding agent
//! (currently the `copilot` CLI). Tests use scripted invokers that return
//! predetermined outputs without spawning processes.

use std::process::Command;

use tracing::{debug, info, instrument, warn};

use crate::core::budget::CancelToken;
use crate::core::types::ToolPermissions;
use crate::error::InvokeError;
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, spawn_piped, wait_cancellable};

pub const DEFAULT_COMMAND: &str = "copilot";

/// Parameters for a single tool invocation.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Rendered prompt text.
    pub prompt: String,
    pub model: String,
    /// Forwarded to `--log-level` unchanged.
    pub log_level: String,
    pub tools: ToolPermissions,
    /// Cap on captured output kept in memory.
    pub output_limit_bytes: usize,
}

impl InvokeRequest {
    pub fn new(
        prompt: String,
        model: impl Into<String>,
        log_level: impl Into<String>,
        tools: ToolPermissions,
    ) -> Self {
        Self {
            prompt,
            model: model.into(),
            log_level: log_level.into(),
            tools,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

/// Successful invocation: the process exited zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Combined stdout and stderr.
    pub text: String,
}

/// Abstraction over coding-agent backends.
pub trait ToolInvoker {
    /// Run the tool once. Must return `InvokeError::Cancelled` when `cancel` fires
    /// before or during the run, and must not leave the process running.
    fn invoke(&self, request: &InvokeRequest, cancel: &CancelToken)
    -> Result<ToolOutput, InvokeError>;
}

/// Invoker that spawns the `copilot` CLI (or a compatible binary).
#[derive(Debug, Clone)]
pub struct CopilotInvoker {
    program: String,
}

impl CopilotInvoker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ToolInvoker for CopilotInvoker {
    #[instrument(skip_all, fields(program = %self.program, model = %request.model))]
    fn invoke(
        &self,
        request: &InvokeRequest,
        cancel: &CancelToken,
    ) -> Result<ToolOutput, InvokeError> {
        if cancel.is_cancelled() {
            debug!("token already fired, not launching");
            return Err(InvokeError::Cancelled {
                output: String::new(),
            });
        }

        let args = build_args(request);
        debug!(args = ?args, "running external tool");
        let mut cmd = Command::new(&self.program);
        cmd.args(&args);

        let child = spawn_piped(&mut cmd).map_err(|source| InvokeError::Launch {
            program: self.program.clone(),
            source,
        })?;
        info!(pid = child.id(), "external tool started");

        let output = wait_cancellable(child, cancel, request.output_limit_bytes).map_err(
            |source| InvokeError::Supervise {
                program: self.program.clone(),
                source,
            },
        )?;
        let text = output.text();

        // A kill also produces a failed status, so a fired token wins over the exit code.
        if output.cancelled || (!output.status.success() && cancel.is_cancelled()) {
            warn!("external tool cancelled");
            return Err(InvokeError::Cancelled { output: text });
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "external tool failed");
            return Err(InvokeError::Execution {
                program: self.program.clone(),
                code: output.status.code(),
                output: text,
            });
        }

        debug!(bytes = text.len(), "external tool finished");
        Ok(ToolOutput { text })
    }
}

/// Full argument list for one invocation.
pub fn build_args(request: &InvokeRequest) -> Vec<String> {
    let args = vec![
        "--prompt".to_string(),
        request.prompt.clone(),
        "--model".to_string(),
        request.model.clone(),
        "--log-level".to_string(),
        request.log_level.clone(),
        "--share".to_string(),
        "--silent".to_string(),
    ];
    build_tool_args(args, &request.tools)
}

/// Append one `--allow-tool` pair per allowed tool, then one `--deny-tool` pair per denied tool.
pub fn build_tool_args(mut args: Vec<String>, tools: &ToolPermissions) -> Vec<String> {
    for tool in &tools.allow {
        args.push("--allow-tool".to_string());
        args.push(tool.clone());
    }
    for tool in &tools.deny {
        args.push("--deny-tool".to_string());
        args.push(tool.clone());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(allow: &[&str], deny: &[&str]) -> ToolPermissions {
        ToolPermissions {
            allow: allow.iter().map(|s| s.to_string()).collect(),
            deny: deny.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn tool_args_follow_existing_args_in_order() {
        let args = build_tool_args(vec!["test".to_string()], &tools(&["a", "b"], &["c"]));
        assert_eq!(
            args,
            vec![
                "test",
                "--allow-tool",
                "a",
                "--allow-tool",
                "b",
                "--deny-tool",
                "c"
            ]
        );
    }

    #[test]
    fn empty_permissions_add_nothing() {
        let args = build_tool_args(vec!["x".to_string()], &ToolPermissions::default());
        assert_eq!(args, vec!["x"]);
    }

    #[test]
    fn deny_only_permissions() {
        let args = build_tool_args(Vec::new(), &tools(&[], &["shell(rm)", "write"]));
        assert_eq!(
            args,
            vec!["--deny-tool", "shell(rm)", "--deny-tool", "write"]
        );
    }

    #[test]
    fn full_args_match_tool_contract() {
        let request = InvokeRequest::new(
            "do the thing".to_string(),
            "claude-sonnet-4.5",
            "warning",
            tools(&["shell"], &["fetch"]),
        );
        assert_eq!(
            build_args(&request),
            vec![
                "--prompt",
                "do the thing",
                "--model",
                "claude-sonnet-4.5",
                "--log-level",
                "warning",
                "--share",
                "--silent",
                "--allow-tool",
                "shell",
                "--deny-tool",
                "fetch",
            ]
        );
    }

    #[test]
    fn log_level_is_forwarded_verbatim() {
        let request = InvokeRequest::new(
            "p".to_string(),
            "m",
            "none",
            ToolPermissions::default(),
        );
        let args = build_args(&request);
        assert_eq!(args[4..6], ["--log-level", "none"]);
    }

    #[test]
    fn missing_binary_is_a_launch_error() {
        let invoker = CopilotInvoker::new("/nonexistent/ralph-test-copilot");
        let request = InvokeRequest::new(
            "prompt".to_string(),
            "model",
            "info",
            ToolPermissions::default(),
        );
        let err = invoker
            .invoke(&request, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, InvokeError::Launch { .. }), "got {err:?}");
    }

    #[test]
    fn fired_token_skips_launch() {
        let invoker = CopilotInvoker::new("/nonexistent/ralph-test-copilot");
        let request = InvokeRequest::new(
            "prompt".to_string(),
            "model",
            "info",
            ToolPermissions::default(),
        );
        let token = CancelToken::new();
        token.cancel();
        let err = invoker.invoke(&request, &token).unwrap_err();
        assert!(matches!(err, InvokeError::Cancelled { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;
        use std::time::{Duration, Instant};

        fn write_script(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-copilot");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
            let mut perms = fs::metadata(&path).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).expect("chmod");
            path.display().to_string()
        }

        fn request() -> InvokeRequest {
            InvokeRequest::new(
                "hello prompt".to_string(),
                "gpt-test",
                "debug",
                tools(&["shell"], &[]),
            )
        }

        #[test]
        fn passes_arguments_and_merges_output() {
            let temp = tempfile::tempdir().expect("tempdir");
            let script = write_script(temp.path(), r#"echo "args: $*"; echo "warn" >&2"#);
            let output = CopilotInvoker::new(script)
                .invoke(&request(), &CancelToken::new())
                .expect("invoke");

            assert!(output.text.contains(
                "args: --prompt hello prompt --model gpt-test --log-level debug --share --silent --allow-tool shell"
            ));
            assert!(output.text.contains("warn"));
        }

        #[test]
        fn nonzero_exit_keeps_output() {
            let temp = tempfile::tempdir().expect("tempdir");
            let script = write_script(temp.path(), "echo 'partial work'; exit 7");
            let err = CopilotInvoker::new(script)
                .invoke(&request(), &CancelToken::new())
                .unwrap_err();

            match &err {
                InvokeError::Execution { code, output, .. } => {
                    assert_eq!(*code, Some(7));
                    assert!(output.contains("partial work"));
                }
                other => panic!("expected execution error, got {other:?}"),
            }
            assert_eq!(err.output(), Some("partial work\n"));
        }

        #[test]
        fn leftover_helper_does_not_extend_invocation() {
            let temp = tempfile::tempdir().expect("tempdir");
            let script = write_script(temp.path(), "sleep 30 &\necho done\nexit 0");

            let start = Instant::now();
            let token = CancelToken::with_deadline(Instant::now() + Duration::from_millis(500));
            let output = CopilotInvoker::new(script)
                .invoke(&request(), &token)
                .expect("invoke");

            assert!(output.text.contains("done"));
            assert!(start.elapsed() < Duration::from_secs(5), "took {:?}", start.elapsed());
        }

        #[test]
        fn deadline_cancels_and_kills_tool() {
            let temp = tempfile::tempdir().expect("tempdir");
            let pid_path = temp.path().join("pid");
            let script = write_script(
                temp.path(),
                &format!("echo $$ > {}; exec sleep 30", pid_path.display()),
            );

            let start = Instant::now();
            let token = CancelToken::with_deadline(Instant::now() + Duration::from_millis(500));
            let err = CopilotInvoker::new(script)
                .invoke(&request(), &token)
                .unwrap_err();

            assert!(matches!(err, InvokeError::Cancelled { .. }), "got {err:?}");
            assert!(start.elapsed() < Duration::from_secs(10));

            if let Ok(pid) = fs::read_to_string(&pid_path)
                && !pid.trim().is_empty()
                && Path::new("/proc/self").exists()
            {
                let proc_dir = Path::new("/proc").join(pid.trim());
                assert!(!proc_dir.exists(), "tool process still running");
            }
        }
    }
}
