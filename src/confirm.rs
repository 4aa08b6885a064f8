//! Tiered human confirmation.
//!
//! The tier is chosen from the analysed overall risk:
//!
//! - `low` / `medium` -> one yes/no on the plan's own prompt
//! - `high` -> each flagged step individually, then a final yes/no
//! - `dangerous` -> typed `CONFIRM`, a password in safe mode, then a final yes/no
//!
//! Every path ends in a [`Decision`]. An interrupt at any prompt rejects.

use crate::types::{Decision, Plan, RiskLevel, SafetyAnalysis};
use std::collections::VecDeque;
use tracing::{debug, info};

pub const CONFIRM_TOKEN: &str = "CONFIRM";
pub const CANCELLED: &str = "cancelled";

/// What a blocking prompt produced. `Cancelled` covers Ctrl-C, Esc and closed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Answer(T),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunMode {
    pub safe_mode: bool,
    pub dry_run: bool,
}

/// Boundary to the human. Implementations must never panic or block forever
/// on closed input; they report it as `Cancelled` or as an empty answer.
pub trait ConfirmationPort {
    fn present(&mut self, plan: &Plan, analysis: &SafetyAnalysis, mode: RunMode);
    fn notice(&mut self, message: &str);
    /// Empty input means "no".
    fn ask_yes_no(&mut self, prompt: &str) -> Reply<bool>;
    fn ask_literal(&mut self, prompt: &str) -> Reply<String>;
    fn ask_secret(&mut self, prompt: &str) -> Reply<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Standard,
    Elevated,
    Maximal,
}

impl Tier {
    pub fn for_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low | RiskLevel::Medium => Tier::Standard,
            RiskLevel::High => Tier::Elevated,
            RiskLevel::Dangerous => Tier::Maximal,
        }
    }
}

pub struct ConfirmationWorkflow {
    mode: RunMode,
}

impl ConfirmationWorkflow {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    pub fn confirm(
        &self,
        plan: &Plan,
        analysis: &SafetyAnalysis,
        port: &mut dyn ConfirmationPort,
    ) -> Decision {
        port.present(plan, analysis, self.mode);

        let tier = Tier::for_risk(analysis.overall_risk);
        debug!(?tier, risk = %analysis.overall_risk, "confirmation tier selected");

        let decision = match tier {
            Tier::Standard => self.standard(plan, port),
            Tier::Elevated => self.elevated(plan, analysis, port),
            Tier::Maximal => self.maximal(port),
        };
        info!(approved = decision.approved, reason = %decision.reason, "confirmation finished");
        decision
    }

    fn standard(&self, plan: &Plan, port: &mut dyn ConfirmationPort) -> Decision {
        if self.mode.dry_run {
            port.notice("DRY RUN MODE: commands will be simulated");
        }
        match port.ask_yes_no(&plan.confirmation_prompt) {
            Reply::Answer(true) => Decision::approve("User approved"),
            Reply::Answer(false) => Decision::reject("User rejected"),
            Reply::Cancelled => Decision::reject(CANCELLED),
        }
    }

    fn elevated(
        &self,
        plan: &Plan,
        analysis: &SafetyAnalysis,
        port: &mut dyn ConfirmationPort,
    ) -> Decision {
        port.notice("HIGH RISK OPERATION");
        if !self.mode.dry_run {
            port.notice("This will make REAL changes to your system!");
        }

        // BTreeSet iteration is ascending by id.
        for &id in &analysis.flagged_step_ids {
            let command = plan.step(id).map(|s| s.command.as_str()).unwrap_or("");
            match port.ask_yes_no(&format!("Approve step {}: {}?", id, command)) {
                Reply::Answer(true) => {}
                Reply::Answer(false) => {
                    return Decision::reject(format!("User rejected step {}", id))
                }
                Reply::Cancelled => return Decision::reject(CANCELLED),
            }
        }

        match port.ask_yes_no(&plan.confirmation_prompt) {
            Reply::Answer(true) => Decision::approve("User approved high-risk plan"),
            Reply::Answer(false) => Decision::reject("User rejected"),
            Reply::Cancelled => Decision::reject(CANCELLED),
        }
    }

    fn maximal(&self, port: &mut dyn ConfirmationPort) -> Decision {
        port.notice("DANGEROUS OPERATION DETECTED");
        port.notice("This plan contains potentially destructive commands!");
        if !self.mode.dry_run {
            port.notice("WARNING: This will make IRREVERSIBLE changes!");
        }

        let typed = match port.ask_literal(&format!(
            "Type '{}' to proceed with dangerous operation",
            CONFIRM_TOKEN
        )) {
            Reply::Answer(text) => text,
            Reply::Cancelled => return Decision::reject(CANCELLED),
        };
        if typed != CONFIRM_TOKEN {
            return Decision::reject(format!("User failed to type {}", CONFIRM_TOKEN));
        }

        if self.mode.safe_mode && !self.mode.dry_run {
            port.notice("Safe mode requires password verification");
            match port.ask_secret("Enter your system password: ") {
                Reply::Answer(secret) if secret.is_empty() => {
                    return Decision::reject("No password provided")
                }
                Reply::Answer(_) => {}
                Reply::Cancelled => return Decision::reject(CANCELLED),
            }
        }

        match port.ask_yes_no("I understand this is dangerous and irreversible. Proceed?") {
            Reply::Answer(true) => Decision::approve("User confirmed dangerous operation"),
            Reply::Answer(false) => Decision::reject("User rejected"),
            Reply::Cancelled => Decision::reject(CANCELLED),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    Yes,
    No,
    Text(String),
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    YesNo,
    Literal,
    Secret,
}

/// Deterministic port that replays canned answers and records every prompt.
/// An exhausted script behaves like empty input.
#[derive(Debug, Default)]
pub struct ScriptedPort {
    replies: VecDeque<Scripted>,
    pub asked: Vec<(PromptKind, String)>,
    pub notices: Vec<String>,
    pub presented: usize,
}

impl ScriptedPort {
    pub fn new(replies: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn prompts_of(&self, kind: PromptKind) -> Vec<&str> {
        self.asked
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    fn next_text(&mut self, kind: PromptKind, prompt: &str) -> Reply<String> {
        self.asked.push((kind, prompt.to_string()));
        match self.replies.pop_front() {
            Some(Scripted::Text(text)) => Reply::Answer(text),
            Some(Scripted::Yes) => Reply::Answer("y".to_string()),
            Some(Scripted::No) | None => Reply::Answer(String::new()),
            Some(Scripted::Interrupt) => Reply::Cancelled,
        }
    }
}

impl ConfirmationPort for ScriptedPort {
    fn present(&mut self, _plan: &Plan, _analysis: &SafetyAnalysis, _mode: RunMode) {
        self.presented += 1;
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn ask_yes_no(&mut self, prompt: &str) -> Reply<bool> {
        self.asked.push((PromptKind::YesNo, prompt.to_string()));
        match self.replies.pop_front() {
            Some(Scripted::Yes) => Reply::Answer(true),
            Some(Scripted::Text(t)) => Reply::Answer(matches!(t.trim(), "y" | "yes")),
            Some(Scripted::No) | None => Reply::Answer(false),
            Some(Scripted::Interrupt) => Reply::Cancelled,
        }
    }

    fn ask_literal(&mut self, prompt: &str) -> Reply<String> {
        self.next_text(PromptKind::Literal, prompt)
    }

    fn ask_secret(&mut self, prompt: &str) -> Reply<String> {
        self.next_text(PromptKind::Secret, prompt)
    }
}
