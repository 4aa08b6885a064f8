use crate::config::LlmConfig;
use crate::error::PlannerError;
use crate::ollama::OllamaClient;
use crate::types::Plan;

/// Turns a natural-language request into a structured plan. Output is untrusted
/// and is validated before anything else sees it.
pub trait Planner {
    fn create_plan(&self, user_input: &str, context: &str) -> Result<Plan, PlannerError>;
}

const SYSTEM_PROMPT: &str = "You are OSCAR, a careful system automation assistant. \
You turn requests into short plans of concrete steps. You ONLY output JSON.";

fn build_prompt(user_input: &str, context: &str, cwd: &str, os: &str) -> String {
    format!(
        r#"Create a plan to accomplish the request below.

TOOLS:
- shell: a shell command for {os}
- file_ops: one of create_file <path> [content], create_directory <path>, copy <src> <dst>,
  move <src> <dst>, delete <path>, list <dir>, read <path>, write <path> <content>,
  get_info <path>, search <dir> <pattern>
- browser: browse <url>, download <url> <dest>, search <query>

RISK LEVELS: low (read-only), medium (creates or changes user files), high (deletes or
overwrites data, installs software), dangerous (system-wide or irreversible changes).

RULES:
1. Use as few steps as possible. Step ids start at 1 and increase by one.
2. Rate every step honestly and set risk_level to the highest step risk.
3. If the request is impossible, return a single low-risk step that explains why with echo.

{context}

cwd: {cwd}
request: {user_input}

Respond with ONLY this JSON structure:
{{"reasoning":"why this plan","steps":[{{"id":1,"tool_name":"shell","command":"...","risk_level":"low","explanation":"..."}}],"overall_risk":"low","confirmation_prompt":"Proceed?"}}"#,
        os = os,
        context = context,
        cwd = cwd,
        user_input = user_input
    )
}

/// Extracts the outermost JSON object from a model response and validates it.
pub fn parse_plan(response: &str) -> Result<Plan, PlannerError> {
    let response = response.trim();
    let json_str = match (response.find('{'), response.rfind('}')) {
        (Some(s), Some(e)) if e > s => &response[s..=e],
        _ => return Err(PlannerError::NoJson),
    };
    let plan: Plan = serde_json::from_str(json_str)?;
    plan.validate()?;
    Ok(plan)
}

pub struct OllamaPlanner {
    client: OllamaClient,
}

impl OllamaPlanner {
    pub fn new(config: &LlmConfig) -> Result<Self, PlannerError> {
        Ok(Self {
            client: OllamaClient::new(config)?,
        })
    }

    pub fn is_available(&self) -> bool {
        self.client.is_available()
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }
}

impl Planner for OllamaPlanner {
    fn create_plan(&self, user_input: &str, context: &str) -> Result<Plan, PlannerError> {
        let cwd = std::env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| ".".to_string());
        let prompt = build_prompt(user_input, context, &cwd, std::env::consts::OS);
        tracing::debug!(model = self.client.model(), "requesting plan");
        let response = self.client.generate(SYSTEM_PROMPT, &prompt)?;
        parse_plan(&response)
    }
}
