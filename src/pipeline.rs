use crate::audit::{AuditEntry, AuditLog};
use crate::config::Config;
use crate::confirm::{ConfirmationPort, ConfirmationWorkflow, RunMode};
use crate::error::{ConfigError, PipelineError};
use crate::executor::PlanExecutor;
use crate::planner::Planner;
use crate::safety::{analyze, SafetyRules};
use crate::session::Session;
use crate::tools::ToolRegistry;
use crate::types::{RequestOutcome, Stage};
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info, warn};

/// Drives one request at a time through
/// planning -> analysis -> confirmation -> execution -> audit -> session.
pub struct Pipeline<P: Planner, C: ConfirmationPort> {
    config: Config,
    rules: SafetyRules,
    planner: P,
    registry: ToolRegistry,
    port: C,
    audit: AuditLog,
    session: Session,
}

impl<P: Planner, C: ConfirmationPort> Pipeline<P, C> {
    pub fn new(
        config: Config,
        planner: P,
        registry: ToolRegistry,
        port: C,
    ) -> Result<Self, ConfigError> {
        let rules = SafetyRules::from_config(&config.safety)?;
        let audit = AuditLog::new(config.audit_log_path());
        let session = Session::new(config.session.capacity, config.session.context_window);
        Ok(Self {
            config,
            rules,
            planner,
            registry,
            port,
            audit,
            session,
        })
    }

    /// Uses the built-in shell, file and browser tools.
    pub fn with_default_tools(config: Config, planner: P, port: C) -> Result<Self, ConfigError> {
        let rules = SafetyRules::from_config(&config.safety)?;
        let registry = ToolRegistry::with_defaults(&config.execution, &rules);
        Self::new(config, planner, registry, port)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn port(&self) -> &C {
        &self.port
    }

    /// Never fails: every fault ends up in the returned outcome and in the audit log.
    pub fn process_request(&mut self, user_input: &str) -> RequestOutcome {
        let mut outcome = RequestOutcome::new(user_input);

        let run = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(&mut outcome)));
        let fault = match run {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => Some(PipelineError::Fault(
                payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string()),
            )),
        };

        if let Some(e) = fault {
            error!(stage = %outcome.stage, error = %e, "request failed");
            outcome.error = Some(e.to_string());
            outcome.stage = Stage::Error;
            outcome.success = false;
        }

        let entry = AuditEntry::from_outcome(&outcome, self.config.audit.reasoning_budget);
        self.audit.record(&entry);
        self.session.push(&outcome);
        outcome
    }

    fn run_stages(&mut self, outcome: &mut RequestOutcome) -> Result<(), PipelineError> {
        outcome.stage = Stage::Planning;
        info!(stage = %outcome.stage, "planning");
        let plan = self
            .planner
            .create_plan(&outcome.user_input, &self.session.context())?;
        plan.validate()?;
        outcome.plan = Some(plan.clone());

        outcome.stage = Stage::Safety;
        let analysis = analyze(&plan, &self.rules);
        info!(
            risk = %analysis.overall_risk,
            flagged = analysis.flagged_step_ids.len(),
            flags = analysis.safety_flags.len(),
            "plan analysed"
        );
        outcome.analysis = Some(analysis.clone());

        let mode = RunMode {
            safe_mode: self.config.execution.safe_mode,
            dry_run: self.config.execution.dry_run,
        };
        let decision = ConfirmationWorkflow::new(mode).confirm(&plan, &analysis, &mut self.port);
        let approved = decision.approved;
        outcome.decision = Some(decision);

        if !approved {
            warn!("plan rejected");
            outcome.stage = Stage::Rejected;
            return Ok(());
        }

        outcome.stage = Stage::Execution;
        info!(stage = %outcome.stage, dry_run = mode.dry_run, "executing");
        let execution = PlanExecutor::new(&self.registry, &self.config.execution)
            .execute(&plan, mode.dry_run);

        outcome.success = execution.success;
        outcome.stage = if execution.success {
            Stage::Completed
        } else {
            Stage::ExecutionFailed
        };
        outcome.execution = Some(execution);
        info!(stage = %outcome.stage, "request finished");
        Ok(())
    }
}
