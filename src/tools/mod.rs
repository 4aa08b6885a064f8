pub mod browser;
pub mod file_ops;
pub mod shell;

use crate::config::ExecutionConfig;
use crate::error::ToolError;
use crate::safety::SafetyRules;
use std::{collections::BTreeMap, collections::HashMap, fmt, sync::Arc, time::Duration};

/// Closed set of tool implementations the executor can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Shell,
    FileOps,
    Browser,
}

impl ToolKind {
    /// Stable registration identifier.
    pub fn id(&self) -> &'static str {
        match self {
            ToolKind::Shell => "shell",
            ToolKind::FileOps => "file_ops",
            ToolKind::Browser => "browser",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn name(&self) -> &str {
        self.kind().id()
    }

    fn description(&self) -> &str;

    fn is_available(&self) -> bool;

    fn execute(&self, command: &str, options: &ExecOptions) -> Result<ToolOutput, ToolError>;
}

#[derive(Debug, Clone, Copy)]
enum Match {
    /// First word of the command, lowercased.
    Leading(&'static [&'static str]),
    /// First word as in `Leading`, and the second word looks like a filesystem path.
    LeadingWithPath(&'static [&'static str]),
    /// Substring anywhere in the lowercased command.
    Contains(&'static [&'static str]),
}

fn looks_like_path(word: &str) -> bool {
    word.starts_with(['/', '.', '~']) || word.contains('/') || word.contains('\\')
}

impl Match {
    fn matches(&self, lowered: &str) -> bool {
        let mut words = lowered.split_whitespace();
        let first = words.next().unwrap_or("");
        match self {
            Match::Leading(verbs) => verbs.contains(&first),
            Match::LeadingWithPath(verbs) => {
                verbs.contains(&first) && words.next().is_some_and(looks_like_path)
            }
            Match::Contains(needles) => needles.iter().any(|n| lowered.contains(n)),
        }
    }
}

const FILE_VERBS: &[&str] = &[
    "create_file",
    "create_directory",
    "copy",
    "move",
    "delete",
    "list",
    "read",
    "write",
    "get_info",
];
const FILE_PHRASES: &[&str] = &["create file", "copy file", "move file", "delete file"];
const SHELL_VERBS: &[&str] = &["mkdir", "ls", "dir", "cd", "cp", "mv", "rm"];
const WEB_VERBS: &[&str] = &["browse", "search", "web_search", "download"];
const URL_PREFIXES: &[&str] = &["http://", "https://"];

/// Evaluated in order; the first hit wins. Commands matching nothing go to the shell.
/// `search <path> <pattern>` is a file search; `search <words>` is a web search.
const INFERENCE_RULES: &[(Match, ToolKind)] = &[
    (Match::Leading(FILE_VERBS), ToolKind::FileOps),
    (Match::LeadingWithPath(&["search"]), ToolKind::FileOps),
    (Match::Contains(FILE_PHRASES), ToolKind::FileOps),
    (Match::Leading(SHELL_VERBS), ToolKind::Shell),
    (Match::Leading(WEB_VERBS), ToolKind::Browser),
    (Match::Contains(URL_PREFIXES), ToolKind::Browser),
];

pub fn infer_kind(command: &str) -> ToolKind {
    let lowered = command.to_lowercase();
    INFERENCE_RULES
        .iter()
        .find(|(rule, _)| rule.matches(&lowered))
        .map(|(_, kind)| *kind)
        .unwrap_or(ToolKind::Shell)
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(execution: &ExecutionConfig, rules: &SafetyRules) -> Self {
        let mut registry = Self::new();
        let blocked = execution.safe_mode.then(|| rules.clone());
        registry.register(shell::ShellTool::new(blocked, execution.max_output_lines));
        registry.register(file_ops::FileOpsTool::new());
        registry.register(browser::BrowserTool::new());
        registry
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Exact name first, then keyword inference on the command.
    pub fn resolve(&self, tool_name: &str, command: &str) -> Option<Arc<dyn Tool>> {
        self.get(tool_name)
            .or_else(|| self.get(infer_kind(command).id()))
    }

    pub fn available(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<_> = self
            .tools
            .values()
            .filter(|t| t.is_available())
            .cloned()
            .collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(ToolKind);

    impl Tool for Named {
        fn kind(&self) -> ToolKind {
            self.0
        }
        fn description(&self) -> &str {
            "test"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn execute(&self, _command: &str, _options: &ExecOptions) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::ok(""))
        }
    }

    #[test]
    fn inference_rules_are_ordered() {
        assert_eq!(infer_kind("create_directory reports"), ToolKind::FileOps);
        assert_eq!(infer_kind("Copy file a.txt to b.txt"), ToolKind::FileOps);
        assert_eq!(infer_kind("browse https://example.com"), ToolKind::Browser);
        assert_eq!(infer_kind("download https://x/y.tar.gz y.tar.gz"), ToolKind::Browser);
        assert_eq!(infer_kind("ls -la"), ToolKind::Shell);
        assert_eq!(infer_kind("echo listing"), ToolKind::Shell);
    }

    #[test]
    fn web_words_inside_arguments_stay_in_the_shell() {
        assert_eq!(infer_kind("rm -r webcache_old"), ToolKind::Shell);
        assert_eq!(infer_kind("mkdir webapp"), ToolKind::Shell);
        assert_eq!(infer_kind("ls ~/website"), ToolKind::Shell);
        assert_eq!(infer_kind("grep -r search src"), ToolKind::Shell);
        assert_eq!(infer_kind("open https://example.com"), ToolKind::Browser);
    }

    #[test]
    fn search_routes_on_its_first_argument() {
        assert_eq!(infer_kind("search ./src TODO"), ToolKind::FileOps);
        assert_eq!(infer_kind("search /home/me/docs report"), ToolKind::FileOps);
        assert_eq!(infer_kind("search rust async book"), ToolKind::Browser);
        assert_eq!(infer_kind("web_search rust books"), ToolKind::Browser);
    }

    #[test]
    fn exact_name_wins_over_inference() {
        let mut registry = ToolRegistry::new();
        registry.register(Named(ToolKind::Shell));
        registry.register(Named(ToolKind::Browser));
        let tool = registry.resolve("shell", "browse https://example.com").unwrap();
        assert_eq!(tool.kind(), ToolKind::Shell);
    }

    #[test]
    fn unknown_name_falls_back_to_inference() {
        let mut registry = ToolRegistry::new();
        registry.register(Named(ToolKind::Browser));
        let tool = registry.resolve("web_search", "search rust books").unwrap();
        assert_eq!(tool.kind(), ToolKind::Browser);
        assert!(registry.resolve("terminal", "ls").is_none());
    }
}
