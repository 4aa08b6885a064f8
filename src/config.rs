use crate::error::ConfigError;
use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};

const APP_NAME: &str = "oscar";
const DEFAULT_MODEL: &str = "llama3.1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Case-insensitive regexes matched against each step command.
    pub dangerous_patterns: Vec<String>,
    pub elevation_indicators: Vec<String>,
    pub protected_paths: Vec<String>,
    /// Route confirmation on the planner's declared risk. When false the
    /// routing risk is recomputed from step risks and pattern matches.
    pub trust_declared_risk: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub safe_mode: bool,
    pub dry_run: bool,
    pub shell_timeout_secs: u64,
    pub file_timeout_secs: u64,
    pub browser_timeout_secs: u64,
    pub max_output_lines: usize,
}

impl ExecutionConfig {
    pub fn timeout_for(&self, kind: ToolKind) -> Duration {
        let secs = match kind {
            ToolKind::Shell => self.shell_timeout_secs,
            ToolKind::FileOps => self.file_timeout_secs,
            ToolKind::Browser => self.browser_timeout_secs,
        };
        Duration::from_secs(secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub path: Option<PathBuf>,
    pub reasoning_budget: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub capacity: usize,
    pub context_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub safety: SafetyConfig,
    pub execution: ExecutionConfig,
    pub audit: AuditConfig,
    pub session: SessionConfig,
    #[serde(skip)]
    pub data_dir: Option<PathBuf>,
    #[serde(skip)]
    pub debug: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            dangerous_patterns: vec![
                r"rm\s+-rf\s+/",
                r"dd\s+if=",
                r"format\s+c:",
                r"del\s+/s\s+/q",
                r"rmdir\s+/s\s+/q",
                r"\bmkfs",
                r"chmod\s+-R\s+777\s+/",
                r"(curl|wget)\s+.*\|\s*(ba)?sh",
                r"> */dev/sd",
                r":\(\)\s*\{\s*:\|:&\s*\};:",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            elevation_indicators: vec!["sudo", "administrator", "runas", "admin"]
                .into_iter()
                .map(String::from)
                .collect(),
            protected_paths: vec!["/system", "/boot", "c:\\windows", "system32", "/etc"]
                .into_iter()
                .map(String::from)
                .collect(),
            trust_declared_risk: true,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            safe_mode: true,
            dry_run: false,
            shell_timeout_secs: 30,
            file_timeout_secs: 10,
            browser_timeout_secs: 60,
            max_output_lines: 100,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            reasoning_budget: 200,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            context_window: 3,
        }
    }
}

/// Command-line flags that win over both the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dry_run: bool,
    pub debug: bool,
    pub disable_safe_mode: bool,
}

impl Overrides {
    /// Debug comes only from the CLI or `OSCAR_DEBUG`, never from the file, so it
    /// is known before the file is read and logging can be set up first.
    pub fn debug_enabled(&self) -> bool {
        self.debug
            || env::var("OSCAR_DEBUG")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(false)
    }
}

impl Config {
    /// Applies `OSCAR_*` environment values, then CLI flags. Called once at start;
    /// the result is never mutated afterwards.
    pub fn resolve(mut self, overrides: &Overrides) -> Self {
        self.apply_env(|key| env::var(key).ok());
        if overrides.dry_run {
            self.execution.dry_run = true;
        }
        if overrides.debug {
            self.debug = true;
        }
        if overrides.disable_safe_mode {
            self.execution.safe_mode = false;
        }
        self
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("OSCAR_SAFE_MODE").and_then(|v| parse_flag(&v)) {
            self.execution.safe_mode = v;
        }
        if let Some(v) = lookup("OSCAR_DRY_RUN").and_then(|v| parse_flag(&v)) {
            self.execution.dry_run = v;
        }
        if let Some(v) = lookup("OSCAR_DEBUG").and_then(|v| parse_flag(&v)) {
            self.debug = v;
        }
        if let Some(dir) = lookup("OSCAR_DATA_DIR").filter(|d| !d.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(get_data_dir)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.audit
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("logs").join("audit.jsonl"))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.toml")
}

pub fn load_config() -> Config {
    let path = get_config_path();
    if path.exists() {
        match fs::read_to_string(&path)
            .map_err(ConfigError::from)
            .and_then(|content| toml::from_str(&content).map_err(ConfigError::from))
        {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config")
            }
        }
    }
    Config::default()
}

pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let path = get_config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
