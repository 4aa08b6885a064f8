use oscar::audit::read_entries;
use oscar::config::Config;
use oscar::confirm::{PromptKind, Scripted, ScriptedPort};
use oscar::error::{PlannerError, ToolError};
use oscar::pipeline::Pipeline;
use oscar::planner::Planner;
use oscar::tools::{ExecOptions, Tool, ToolKind, ToolOutput, ToolRegistry};
use oscar::types::{ActionStep, Plan, RiskLevel, Stage, StepStatus};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

enum Script {
    Plan(Plan),
    NoJson,
    Panic,
}

struct FakePlanner(Script);

impl Planner for FakePlanner {
    fn create_plan(&self, _user_input: &str, _context: &str) -> Result<Plan, PlannerError> {
        match &self.0 {
            Script::Plan(plan) => Ok(plan.clone()),
            Script::NoJson => Err(PlannerError::NoJson),
            Script::Panic => panic!("planner blew up"),
        }
    }
}

/// Shell stand-in that records every command and fails any containing "fail".
#[derive(Clone, Default)]
struct RecordingShell {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Tool for RecordingShell {
    fn kind(&self) -> ToolKind {
        ToolKind::Shell
    }

    fn description(&self) -> &str {
        "records commands"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn execute(&self, command: &str, _options: &ExecOptions) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(command.to_string());
        if command.contains("fail") {
            Ok(ToolOutput::failed("exit status 1"))
        } else {
            Ok(ToolOutput::ok(format!("ran {}", command)))
        }
    }
}

fn plan(overall: RiskLevel, steps: &[(u32, &str, RiskLevel)]) -> Plan {
    Plan {
        reasoning: "because the user asked".to_string(),
        steps: steps
            .iter()
            .map(|(id, cmd, risk)| ActionStep {
                id: *id,
                tool_name: "shell".to_string(),
                command: cmd.to_string(),
                risk_level: *risk,
                explanation: String::new(),
            })
            .collect(),
        overall_risk: overall,
        confirmation_prompt: "Proceed with this plan?".to_string(),
    }
}

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.audit.path = Some(dir.join("audit.jsonl"));
    config
}

fn pipeline(
    config: Config,
    script: Script,
    replies: Vec<Scripted>,
) -> (Pipeline<FakePlanner, ScriptedPort>, RecordingShell) {
    let shell = RecordingShell::default();
    let mut registry = ToolRegistry::new();
    registry.register(shell.clone());
    let pipeline = Pipeline::new(config, FakePlanner(script), registry, ScriptedPort::new(replies))
        .expect("default config is valid");
    (pipeline, shell)
}

#[test]
fn low_risk_rejection_is_audited_and_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let audit_path = config.audit_log_path();
    let (mut p, shell) = pipeline(
        config,
        Script::Plan(plan(RiskLevel::Low, &[(1, "ls", RiskLevel::Low)])),
        vec![Scripted::No],
    );

    let outcome = p.process_request("list files");

    assert_eq!(outcome.stage, Stage::Rejected);
    assert!(!outcome.success);
    assert!(outcome.execution.is_none());
    assert!(shell.calls.lock().unwrap().is_empty());

    let entries = read_entries(&audit_path).unwrap();
    assert_eq!(entries.len(), 1);
    let safety = entries[0].safety_summary.as_ref().unwrap();
    assert!(!safety.approved);
    assert_eq!(safety.reason, "User rejected");
}

#[test]
fn approved_low_risk_plan_runs_every_step() {
    let dir = TempDir::new().unwrap();
    let (mut p, shell) = pipeline(
        config_in(dir.path()),
        Script::Plan(plan(
            RiskLevel::Medium,
            &[(1, "echo one", RiskLevel::Low), (2, "echo two", RiskLevel::Medium)],
        )),
        vec![Scripted::Yes],
    );

    let outcome = p.process_request("say things");

    assert_eq!(outcome.stage, Stage::Completed);
    assert!(outcome.success);
    let exec = outcome.execution.unwrap();
    assert_eq!(exec.steps_completed, 2);
    assert_eq!(*shell.calls.lock().unwrap(), vec!["echo one", "echo two"]);
    assert_eq!(p.session().len(), 1);
}

#[test]
fn rejecting_a_flagged_step_stops_further_prompts() {
    let dir = TempDir::new().unwrap();
    let (mut p, shell) = pipeline(
        config_in(dir.path()),
        Script::Plan(plan(
            RiskLevel::High,
            &[
                (1, "echo a", RiskLevel::Low),
                (2, "rm old.txt", RiskLevel::High),
                (3, "rm older.txt", RiskLevel::High),
            ],
        )),
        vec![Scripted::No],
    );

    let outcome = p.process_request("clean up");

    assert_eq!(outcome.stage, Stage::Rejected);
    assert_eq!(outcome.decision.unwrap().reason, "User rejected step 2");
    assert_eq!(
        p.port().prompts_of(PromptKind::YesNo),
        vec!["Approve step 2: rm old.txt?"]
    );
    assert!(shell.calls.lock().unwrap().is_empty());
}

#[test]
fn wrong_token_never_reaches_the_password_prompt() {
    let dir = TempDir::new().unwrap();
    let (mut p, _shell) = pipeline(
        config_in(dir.path()),
        Script::Plan(plan(
            RiskLevel::Dangerous,
            &[(1, "dd if=/dev/zero of=/dev/sda", RiskLevel::Dangerous)],
        )),
        vec![Scripted::Text("confirm".to_string())],
    );

    let outcome = p.process_request("wipe the disk");

    assert_eq!(outcome.stage, Stage::Rejected);
    assert_eq!(outcome.decision.unwrap().reason, "User failed to type CONFIRM");
    assert!(p.port().prompts_of(PromptKind::Secret).is_empty());
}

#[test]
fn dry_run_simulates_every_step() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.execution.dry_run = true;
    let (mut p, shell) = pipeline(
        config,
        Script::Plan(plan(
            RiskLevel::Dangerous,
            &[
                (1, "echo a", RiskLevel::Low),
                (2, "rm -rf /tmp/x", RiskLevel::Dangerous),
                (3, "echo b", RiskLevel::Low),
            ],
        )),
        vec![Scripted::Text("CONFIRM".to_string()), Scripted::Yes],
    );

    let outcome = p.process_request("pretend");

    assert_eq!(outcome.stage, Stage::Completed);
    assert!(p.port().prompts_of(PromptKind::Secret).is_empty());
    let exec = outcome.execution.unwrap();
    assert_eq!(exec.steps_completed, 3);
    assert!(exec
        .step_results
        .iter()
        .all(|r| r.status == StepStatus::Simulated));
    assert_eq!(exec.step_results[1].output, "[DRY RUN] Would execute: rm -rf /tmp/x");
    assert!(shell.calls.lock().unwrap().is_empty());
}

#[test]
fn failing_step_halts_the_plan() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let audit_path = config.audit_log_path();
    let (mut p, shell) = pipeline(
        config,
        Script::Plan(plan(
            RiskLevel::Low,
            &[
                (1, "echo a", RiskLevel::Low),
                (2, "fail here", RiskLevel::Low),
                (3, "echo c", RiskLevel::Low),
            ],
        )),
        vec![Scripted::Yes],
    );

    let outcome = p.process_request("do three things");

    assert_eq!(outcome.stage, Stage::ExecutionFailed);
    assert!(!outcome.success);
    let exec = outcome.execution.unwrap();
    assert_eq!(exec.steps_completed, 1);
    assert_eq!(exec.step_results.len(), 2);
    assert_eq!(exec.step_results[1].status, StepStatus::Failed);
    assert_eq!(exec.error.as_deref(), Some("Step 2 failed: exit status 1"));
    assert!(!shell.calls.lock().unwrap().iter().any(|c| c == "echo c"));

    let entries = read_entries(&audit_path).unwrap();
    assert_eq!(entries[0].stage_reached, Stage::ExecutionFailed);
}

#[test]
fn every_request_appends_one_line() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let audit_path = config.audit_log_path();
    let (mut p, _shell) = pipeline(
        config,
        Script::Plan(plan(RiskLevel::Low, &[(1, "echo hi", RiskLevel::Low)])),
        vec![Scripted::Yes, Scripted::No, Scripted::Yes, Scripted::Interrupt],
    );

    for i in 0..4 {
        p.process_request(&format!("request {}", i));
    }

    let raw = std::fs::read_to_string(&audit_path).unwrap();
    assert_eq!(raw.lines().count(), 4);
    let entries = read_entries(&audit_path).unwrap();
    let inputs: Vec<_> = entries.iter().map(|e| e.user_input.as_str()).collect();
    assert_eq!(inputs, vec!["request 0", "request 1", "request 2", "request 3"]);
    assert_eq!(
        entries[3].safety_summary.as_ref().unwrap().reason,
        "cancelled"
    );
}

#[test]
fn planner_failure_is_recorded_as_error_stage() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let audit_path = config.audit_log_path();
    let (mut p, _shell) = pipeline(config, Script::NoJson, vec![]);

    let outcome = p.process_request("anything");

    assert_eq!(outcome.stage, Stage::Error);
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().unwrap().contains("no JSON object"));
    assert_eq!(p.port().presented, 0);

    let entries = read_entries(&audit_path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].stage_reached, Stage::Error);
    assert!(entries[0].plan_summary.is_none());
    assert!(entries[0].error.is_some());
}

#[test]
fn invalid_plan_never_reaches_confirmation() {
    let dir = TempDir::new().unwrap();
    let (mut p, _shell) = pipeline(
        config_in(dir.path()),
        Script::Plan(plan(
            RiskLevel::Low,
            &[(1, "echo a", RiskLevel::Low), (1, "echo b", RiskLevel::Low)],
        )),
        vec![Scripted::Yes],
    );

    let outcome = p.process_request("duplicate ids");

    assert_eq!(outcome.stage, Stage::Error);
    assert!(outcome.error.unwrap().contains("appears more than once"));
    assert!(p.port().asked.is_empty());
}

#[test]
fn planner_panic_is_contained() {
    let dir = TempDir::new().unwrap();
    let (mut p, _shell) = pipeline(config_in(dir.path()), Script::Panic, vec![]);

    let outcome = p.process_request("boom");

    assert_eq!(outcome.stage, Stage::Error);
    assert!(outcome.error.unwrap().contains("planner blew up"));
    assert_eq!(p.session().len(), 1);
}

#[test]
fn unwritable_audit_log_does_not_change_the_outcome() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    // A directory cannot be opened for append.
    config.audit.path = Some(dir.path().to_path_buf());
    let (mut p, _shell) = pipeline(
        config,
        Script::Plan(plan(RiskLevel::Low, &[(1, "echo hi", RiskLevel::Low)])),
        vec![Scripted::Yes],
    );

    let outcome = p.process_request("still works");

    assert_eq!(outcome.stage, Stage::Completed);
    assert!(outcome.success);
}

#[test]
fn session_keeps_only_the_newest_records() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.session.capacity = 2;
    let (mut p, _shell) = pipeline(
        config,
        Script::Plan(plan(RiskLevel::Low, &[(1, "echo hi", RiskLevel::Low)])),
        vec![Scripted::Yes, Scripted::Yes, Scripted::Yes],
    );

    for input in ["first", "second", "third"] {
        p.process_request(input);
    }

    let kept: Vec<_> = p.session().records().map(|r| r.user_input.clone()).collect();
    assert_eq!(kept, vec!["second", "third"]);
    assert!(p.session().context().contains("- third: completed"));
}
