use crate::config::ExecutionConfig;
use crate::error::ToolError;
use crate::tools::{ExecOptions, Tool, ToolOutput, ToolRegistry};
use crate::types::{ActionStep, ExecutionResult, Plan, StepResult, StepStatus};
use std::{
    any::Any,
    sync::{mpsc, Arc},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

/// Extra time given to a tool to report its own timeout before the executor stops waiting.
const TIMEOUT_GRACE: Duration = Duration::from_secs(1);

enum Invocation {
    Finished(Result<ToolOutput, ToolError>),
    Panicked(String),
    TimedOut,
}

/// Runs approved plans step by step, stopping at the first step that does not succeed.
pub struct PlanExecutor<'a> {
    registry: &'a ToolRegistry,
    execution: &'a ExecutionConfig,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(registry: &'a ToolRegistry, execution: &'a ExecutionConfig) -> Self {
        Self {
            registry,
            execution,
        }
    }

    pub fn execute(&self, plan: &Plan, dry_run: bool) -> ExecutionResult {
        if dry_run {
            return simulate(plan);
        }

        let mut result = ExecutionResult {
            success: false,
            steps_completed: 0,
            total_steps: plan.steps.len(),
            step_results: Vec::new(),
            error: None,
        };

        for step in &plan.steps {
            let tool = match self
                .registry
                .resolve(&step.tool_name, &step.command)
                .filter(|t| t.is_available())
            {
                Some(tool) => tool,
                None => {
                    warn!(step = step.id, tool = %step.tool_name, "no available tool");
                    result.error = Some(format!("Tool '{}' not available", step.tool_name));
                    break;
                }
            };

            info!(step = step.id, tool = tool.name(), "executing step");
            let timeout = self.execution.timeout_for(tool.kind());
            let start = Instant::now();
            let invocation = invoke(tool, &step.command, timeout);
            let elapsed = start.elapsed();

            if let Invocation::Finished(Err(ToolError::Unavailable(reason))) = &invocation {
                result.error = Some(format!("Tool '{}' not available: {}", step.tool_name, reason));
                break;
            }

            let step_result = record(step, invocation, timeout, elapsed);
            let succeeded = step_result.status == StepStatus::Success;
            if succeeded {
                result.steps_completed += 1;
            } else {
                result.error = step_result.error.clone();
            }
            debug!(step = step.id, status = ?step_result.status, "step finished");
            result.step_results.push(step_result);
            if !succeeded {
                break;
            }
        }

        result.success = result.steps_completed == result.total_steps && result.error.is_none();
        result
    }
}

fn simulate(plan: &Plan) -> ExecutionResult {
    let step_results: Vec<StepResult> = plan
        .steps
        .iter()
        .map(|step| StepResult {
            step_id: step.id,
            status: StepStatus::Simulated,
            output: format!("[DRY RUN] Would execute: {}", step.command),
            error: None,
            duration_ms: 0,
        })
        .collect();
    ExecutionResult {
        success: true,
        steps_completed: step_results.len(),
        total_steps: plan.steps.len(),
        step_results,
        error: None,
    }
}

/// Runs the tool on its own thread so a hung call or a panic cannot take the pipeline with it.
///
/// On timeout the worker is detached, not killed. Tools are expected to honour
/// `ExecOptions::timeout` themselves (the shell kills its child, file search stops
/// walking); a single blocking filesystem call such as a large recursive delete
/// may still complete after the step was reported as timed out.
fn invoke(tool: Arc<dyn Tool>, command: &str, timeout: Duration) -> Invocation {
    let (tx, rx) = mpsc::channel();
    let command = command.to_string();
    let handle = thread::spawn(move || {
        let options = ExecOptions { timeout };
        let _ = tx.send(tool.execute(&command, &options));
    });

    match rx.recv_timeout(timeout + TIMEOUT_GRACE) {
        Ok(result) => Invocation::Finished(result),
        Err(mpsc::RecvTimeoutError::Timeout) => Invocation::TimedOut,
        Err(mpsc::RecvTimeoutError::Disconnected) => match handle.join() {
            Err(payload) => Invocation::Panicked(panic_message(payload)),
            Ok(()) => Invocation::Panicked("tool exited without a result".to_string()),
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "tool panicked".to_string())
}

fn record(
    step: &ActionStep,
    invocation: Invocation,
    timeout: Duration,
    elapsed: Duration,
) -> StepResult {
    let duration_ms = elapsed.as_millis() as u64;
    let (status, output, error) = match invocation {
        Invocation::Finished(Ok(out)) if out.success => (StepStatus::Success, out.output, None),
        Invocation::Finished(Ok(out)) => {
            let reason = out.error.unwrap_or_else(|| "tool reported failure".to_string());
            (
                StepStatus::Failed,
                out.output,
                Some(format!("Step {} failed: {}", step.id, reason)),
            )
        }
        Invocation::Finished(Err(ToolError::InvalidCommand(reason))) => (
            StepStatus::Failed,
            String::new(),
            Some(format!("Step {} failed: invalid command: {}", step.id, reason)),
        ),
        Invocation::Finished(Err(ToolError::Timeout(limit))) => (
            StepStatus::Failed,
            String::new(),
            Some(format!("Step {} timed out after {}s", step.id, limit.as_secs())),
        ),
        Invocation::TimedOut => (
            StepStatus::Failed,
            String::new(),
            Some(format!("Step {} timed out after {}s", step.id, timeout.as_secs())),
        ),
        Invocation::Finished(Err(e)) => (
            StepStatus::Error,
            String::new(),
            Some(format!("Step {} execution error: {}", step.id, e)),
        ),
        Invocation::Panicked(detail) => (
            StepStatus::Error,
            String::new(),
            Some(format!("Step {} execution error: {}", step.id, detail)),
        ),
    };

    StepResult {
        step_id: step.id,
        status,
        output,
        error,
        duration_ms,
    }
}
