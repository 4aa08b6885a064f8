use std::time::Duration;

/// Structural problems in planner output.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("plan has no steps")]
    Empty,
    #[error("step id {0} is not a positive integer")]
    InvalidStepId(u32),
    #[error("step id {0} appears more than once")]
    DuplicateStepId(u32),
    #[error("step {0} has an empty command")]
    EmptyCommand(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("planner unreachable: {0}")]
    Transport(String),
    #[error("no JSON object in planner response")]
    NoJson,
    #[error("invalid plan JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid plan: {0}")]
    Invalid(#[from] PlanError),
}

impl From<reqwest::Error> for PlannerError {
    fn from(e: reqwest::Error) -> Self {
        PlannerError::Transport(e.to_string())
    }
}

/// Errors a tool may return instead of a normal success/failure report.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The command is malformed or refused before anything runs.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("tool unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Fault(String),
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::Fault(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid safety pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures outside step execution. Recorded as the `error` stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("planning failed: {0}")]
    Planning(#[from] PlannerError),
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),
    #[error("internal fault: {0}")]
    Fault(String),
}
