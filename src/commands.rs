use oscar::audit::tail;
use oscar::config::{get_config_path, save_config, Config};
use oscar::pipeline::Pipeline;
use oscar::planner::OllamaPlanner;
use oscar::safety::SafetyRules;
use oscar::tools::ToolRegistry;
use oscar::types::Stage;
use oscar::ui::{print_outcome, TerminalPort};
use std::{
    env, fs,
    io::{self, BufRead, Write},
    process::Command,
};

type CmdResult = Result<(), Box<dyn std::error::Error>>;
type TerminalPipeline = Pipeline<OllamaPlanner, TerminalPort>;

fn build_pipeline(config: &Config) -> Result<TerminalPipeline, Box<dyn std::error::Error>> {
    let planner = OllamaPlanner::new(&config.llm)?;
    if !planner.is_available() {
        eprintln!("warning: cannot connect to ollama at {}", config.llm.endpoint);
        eprintln!("  start it with: ollama serve");
    }
    Ok(Pipeline::with_default_tools(config.clone(), planner, TerminalPort)?)
}

pub fn cmd_ask(config: &Config, query: &str) -> CmdResult {
    let mut pipeline = build_pipeline(config)?;
    eprint!("thinking...");
    io::stderr().flush().ok();
    let outcome = pipeline.process_request(query);
    eprint!("\r           \r");
    print_outcome(&outcome);
    if outcome.stage == Stage::Error || outcome.stage == Stage::ExecutionFailed {
        return Err(format!("request ended in stage {}", outcome.stage).into());
    }
    Ok(())
}

fn print_help() {
    println!("commands:");
    println!("  help, ?        show this message");
    println!("  config         show the active configuration");
    println!("  status         show tools and session history");
    println!("  quit, exit     leave");
    println!();
    println!("anything else is treated as a request. every plan is shown and");
    println!("confirmed before it runs; riskier plans need more confirmation.");
}

fn print_config(config: &Config) {
    println!("model:      {} ({})", config.llm.model, config.llm.endpoint);
    println!("safe mode:  {}", config.execution.safe_mode);
    println!("dry run:    {}", config.execution.dry_run);
    println!("trust risk: {}", config.safety.trust_declared_risk);
    println!("audit log:  {}", config.audit_log_path().display());
}

pub fn cmd_interactive(config: &Config) -> CmdResult {
    let mut pipeline = build_pipeline(config)?;
    println!("oscar: type 'help' for commands, or describe what you want done.");
    if config.execution.dry_run {
        println!("dry run: no actual changes will be made");
    }

    let stdin = io::stdin();
    loop {
        print!("oscar> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "help" | "?" => print_help(),
            "config" => print_config(pipeline.config()),
            "status" => {
                for tool in pipeline.registry().available() {
                    println!("  tool {:<10} {}", tool.name(), tool.description());
                }
                for record in pipeline.session().records() {
                    let mark = if record.success { "+" } else { "x" };
                    println!("  {} [{}] {}", mark, record.stage, record.user_input);
                }
            }
            request => {
                let outcome = pipeline.process_request(request);
                print_outcome(&outcome);
            }
        }
    }
    Ok(())
}

pub fn cmd_audit(config: &Config, limit: usize) -> CmdResult {
    let path = config.audit_log_path();
    let entries = tail(&path, limit)?;
    if entries.is_empty() {
        println!("no audit entries yet.");
        return Ok(());
    }
    for entry in entries {
        let mark = if entry.success { "+" } else { "x" };
        println!("{} {} [{}] {}", mark, entry.timestamp, entry.stage_reached, entry.user_input);
        if let Some(safety) = &entry.safety_summary {
            println!("    risk {}: {}", safety.overall_risk, safety.reason);
        }
        if let Some(exec) = &entry.execution_summary {
            println!("    {}/{} steps", exec.steps_completed, exec.total_steps);
        }
        if let Some(err) = entry.error.as_ref().or_else(|| {
            entry.execution_summary.as_ref().and_then(|e| e.error.as_ref())
        }) {
            println!("    error: {}", err);
        }
    }
    Ok(())
}

pub fn cmd_doctor(config: &Config) -> CmdResult {
    println!("diagnostics:");
    println!();

    print!("  ollama ... ");
    io::stdout().flush().ok();
    let planner = OllamaPlanner::new(&config.llm)?;
    if planner.is_available() {
        println!("ok ({})", planner.model());
    } else {
        println!("failed");
        println!("    url: {}", config.llm.endpoint);
        println!("    try: ollama serve");
    }

    print!("  safety patterns ... ");
    match SafetyRules::from_config(&config.safety) {
        Ok(_) => println!("ok ({})", config.safety.dangerous_patterns.len()),
        Err(e) => println!("failed: {}", e),
    }

    if let Ok(rules) = SafetyRules::from_config(&config.safety) {
        let registry = ToolRegistry::with_defaults(&config.execution, &rules);
        for name in registry.names() {
            let available = registry.get(&name).map(|t| t.is_available()).unwrap_or(false);
            println!("  tool {} ... {}", name, if available { "ok" } else { "unavailable" });
        }
    }

    print!("  audit log ... ");
    let path = config.audit_log_path();
    if path.exists() {
        let lines = fs::read_to_string(&path).map(|t| t.lines().count()).unwrap_or(0);
        println!("ok ({} entries)", lines);
    } else {
        println!("empty");
    }
    println!("    path: {}", path.display());

    print!("  config ... ");
    if get_config_path().exists() {
        println!("ok");
    } else {
        println!("using defaults");
    }

    println!();
    Ok(())
}

pub fn cmd_config_check(config: &Config) -> CmdResult {
    SafetyRules::from_config(&config.safety)?;
    print_config(config);
    println!("configuration check passed");
    Ok(())
}

pub fn cmd_config() -> CmdResult {
    let config_path = get_config_path();

    if !config_path.exists() {
        save_config(&Config::default())?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    Command::new(&editor).arg(&config_path).status()?;

    Ok(())
}
