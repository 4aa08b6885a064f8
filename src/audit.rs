//! Append-only audit trail: one JSON object per line, one line per request.

use crate::error::AuditError;
use crate::types::{RequestOutcome, RiskLevel, Stage};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_steps: usize,
    pub overall_risk: RiskLevel,
    pub truncated_reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySummary {
    pub overall_risk: RiskLevel,
    pub approved: bool,
    pub reason: String,
    pub flagged_step_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub steps_completed: usize,
    pub total_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub user_input: String,
    pub stage_reached: Stage,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_summary: Option<PlanSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_summary: Option<SafetySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_summary: Option<ExecutionSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEntry {
    pub fn from_outcome(outcome: &RequestOutcome, reasoning_budget: usize) -> Self {
        let plan_summary = outcome.plan.as_ref().map(|plan| PlanSummary {
            total_steps: plan.steps.len(),
            overall_risk: plan.overall_risk,
            truncated_reasoning: plan.reasoning.chars().take(reasoning_budget).collect(),
        });

        let safety_summary = outcome.analysis.as_ref().map(|analysis| {
            let (approved, reason) = outcome
                .decision
                .as_ref()
                .map(|d| (d.approved, d.reason.clone()))
                .unwrap_or((false, String::new()));
            SafetySummary {
                overall_risk: analysis.overall_risk,
                approved,
                reason,
                flagged_step_count: analysis.flagged_step_ids.len(),
            }
        });

        let execution_summary = outcome.execution.as_ref().map(|exec| ExecutionSummary {
            steps_completed: exec.steps_completed,
            total_steps: exec.total_steps,
            error: exec.error.clone(),
        });

        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_input: outcome.user_input.clone(),
            stage_reached: outcome.stage,
            success: outcome.success,
            plan_summary,
            safety_summary,
            execution_summary,
            error: outcome.error.clone(),
        }
    }
}

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes the entry into a single buffer and writes it with one call
    /// on an append-mode handle, so a line is never split across writers.
    pub fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Best-effort: a failed write is logged and otherwise ignored.
    pub fn record(&self, entry: &AuditEntry) -> bool {
        match self.append(entry) {
            Ok(()) => {
                debug!(
                    path = %self.path.display(),
                    stage = %entry.stage_reached,
                    "audit entry written"
                );
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to write audit log");
                false
            }
        }
    }
}

/// Reads every entry; each line is parsed independently.
pub fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

pub fn tail(path: &Path, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
    let mut entries = read_entries(path)?;
    let skip = entries.len().saturating_sub(limit);
    Ok(entries.split_off(skip))
}
