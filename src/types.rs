use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Dangerous,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Dangerous => "dangerous",
        }
    }

    /// High and dangerous steps are confirmed individually.
    pub fn is_flagged(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Dangerous)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub id: u32,
    #[serde(alias = "tool")]
    pub tool_name: String,
    pub command: String,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, alias = "thoughts")]
    pub reasoning: String,
    #[serde(alias = "plan")]
    pub steps: Vec<ActionStep>,
    #[serde(alias = "risk_level")]
    pub overall_risk: RiskLevel,
    #[serde(default = "default_confirmation_prompt", alias = "confirm_prompt")]
    pub confirmation_prompt: String,
}

fn default_confirmation_prompt() -> String {
    "Proceed with this plan?".to_string()
}

impl Plan {
    /// Planner output is untrusted: reject empty plans and bad or duplicate ids.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.id == 0 {
                return Err(PlanError::InvalidStepId(step.id));
            }
            if !seen.insert(step.id) {
                return Err(PlanError::DuplicateStepId(step.id));
            }
            if step.command.trim().is_empty() {
                return Err(PlanError::EmptyCommand(step.id));
            }
        }
        Ok(())
    }

    pub fn step(&self, id: u32) -> Option<&ActionStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyAnalysis {
    pub overall_risk: RiskLevel,
    pub flagged_step_ids: BTreeSet<u32>,
    pub safety_flags: Vec<String>,
    pub requires_elevated_privileges: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub approved: bool,
    pub reason: String,
}

impl Decision {
    pub fn approve(reason: impl Into<String>) -> Self {
        Self {
            approved: true,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    Error,
    Simulated,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step_id: u32,
    pub status: StepStatus,
    pub output: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub steps_completed: usize,
    pub total_steps: usize,
    pub step_results: Vec<StepResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    Planning,
    Safety,
    Rejected,
    Execution,
    ExecutionFailed,
    Completed,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Planning => "planning",
            Stage::Safety => "safety",
            Stage::Rejected => "rejected",
            Stage::Execution => "execution",
            Stage::ExecutionFailed => "execution_failed",
            Stage::Completed => "completed",
            Stage::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one pass through the pipeline produced, whatever stage it stopped at.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub user_input: String,
    pub success: bool,
    pub stage: Stage,
    pub plan: Option<Plan>,
    pub analysis: Option<SafetyAnalysis>,
    pub decision: Option<Decision>,
    pub execution: Option<ExecutionResult>,
    pub error: Option<String>,
}

impl RequestOutcome {
    pub fn new(user_input: &str) -> Self {
        Self {
            user_input: user_input.to_string(),
            success: false,
            stage: Stage::Input,
            plan: None,
            analysis: None,
            decision: None,
            execution: None,
            error: None,
        }
    }
}
