//! The driver loop: render, invoke, check for completion, repeat until a bound is hit.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::core::budget::{Bound, CancelToken};
use crate::core::completion::is_complete;
use crate::core::template::render_prompt;
use crate::error::{DriverError, InvokeError};
use crate::exit_codes;
use crate::io::config::DriverConfig;
use crate::io::documents::{read_progress, read_required};
use crate::io::invoker::{InvokeRequest, ToolInvoker};

/// Reason why `run_loop` stopped without a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The tool printed the completion marker.
    Completed,
    /// The wall-clock budget ran out before completion.
    TimedOut { budget: Duration },
    /// The iteration cap was reached before completion.
    Exhausted { max_iterations: u32 },
}

impl LoopStop {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed => exit_codes::OK,
            Self::TimedOut { .. } | Self::Exhausted { .. } => exit_codes::BOUND_REACHED,
        }
    }
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Tool invocations started, including one that was cancelled.
    pub iterations: u32,
    pub stop: LoopStop,
}

/// Everything loaded once before the first iteration.
#[derive(Debug, Clone)]
pub struct Session {
    pub config: DriverConfig,
    pub bound: Bound,
    pub requirements: String,
    pub template: String,
}

impl Session {
    /// Read the requirements document and prompt template named by `config`.
    ///
    /// The progress log is not read here; it may not exist until the tool writes it.
    pub fn load(config: DriverConfig, bound: Bound) -> Result<Self, DriverError> {
        let requirements = read_required("requirements document", &config.prd)?;
        let template = read_required("prompt template", &config.prompt)?;
        Ok(Self {
            config,
            bound,
            requirements,
            template,
        })
    }

    fn request(&self, prompt: String) -> InvokeRequest {
        InvokeRequest::new(
            prompt,
            self.config.model.as_str(),
            self.config.log_level.as_str(),
            self.config.tools.clone(),
        )
    }
}

/// Run the loop with a deadline (if any) starting now.
pub fn run_loop<I: ToolInvoker>(invoker: &I, session: &Session) -> Result<LoopOutcome, DriverError> {
    let cancel = session.bound.cancel_token(Instant::now());
    run_loop_until(invoker, session, &cancel)
}

/// Run the loop until completion, the session's bound, or `cancel` fires.
///
/// Iterations run strictly one after another. A fired token stops the loop as a
/// reached bound, never as a failure. Any other invocation failure, or a prompt
/// that fails to render, is fatal.
pub fn run_loop_until<I: ToolInvoker>(
    invoker: &I,
    session: &Session,
    cancel: &CancelToken,
) -> Result<LoopOutcome, DriverError> {
    let bound = session.bound;
    let mut iterations = 0u32;
    info!(bound = ?bound, "starting implementation");

    loop {
        if bound.iterations_exhausted(iterations) || cancel.is_cancelled() {
            return Ok(bound_reached(bound, iterations));
        }
        iterations += 1;
        info!(iteration = iterations, "starting iteration");

        let progress = match read_progress(&session.config.progress) {
            Ok(progress) => progress,
            Err(err) => {
                let err = anyhow::Error::new(err);
                warn!(err = %format!("{err:#}"), "could not load progress, continuing without it");
                String::new()
            }
        };
        let prompt = render_prompt(&session.template, &session.requirements, &progress)?;

        let output = match invoker.invoke(&session.request(prompt), cancel) {
            Ok(output) => output,
            Err(InvokeError::Cancelled { output }) => {
                debug!(iteration = iterations, result = %output, "output before cancellation");
                return Ok(bound_reached(bound, iterations));
            }
            Err(source) => {
                if let Some(output) = source.output() {
                    debug!(iteration = iterations, result = %output, "output before failure");
                }
                return Err(DriverError::ToolInvocation {
                    iteration: iterations,
                    source,
                });
            }
        };
        debug!(iteration = iterations, result = %output.text, "tool output");

        if is_complete(&output.text) {
            info!(iterations, "implementation completed");
            return Ok(LoopOutcome {
                iterations,
                stop: LoopStop::Completed,
            });
        }
    }
}

fn bound_reached(bound: Bound, iterations: u32) -> LoopOutcome {
    let stop = match bound {
        Bound::Duration(budget) => {
            warn!(iterations, budget_secs = budget.as_secs(), "reached timeout without completion");
            LoopStop::TimedOut { budget }
        }
        Bound::Iterations(max_iterations) => {
            warn!(iterations, max_iterations, "reached max iterations without completion");
            LoopStop::Exhausted { max_iterations }
        }
    };
    LoopOutcome { iterations, stop }
}
