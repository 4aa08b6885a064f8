use crate::confirm::{ConfirmationPort, Reply, RunMode};
use crate::types::{Plan, RequestOutcome, RiskLevel, SafetyAnalysis, Stage, StepStatus};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal,
};
use std::io::{self, BufRead, Write};

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

enum Key {
    Char(char),
    Enter,
    Backspace,
    Escape,
    Interrupt,
}

fn read_key() -> Option<Key> {
    loop {
        let Event::Key(k) = event::read().ok()? else {
            continue;
        };
        if k.kind != KeyEventKind::Press {
            continue;
        }
        let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);
        return Some(match k.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => Key::Interrupt,
            KeyCode::Char(c) if !ctrl => Key::Char(c),
            KeyCode::Enter => Key::Enter,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Esc => Key::Escape,
            _ => continue,
        });
    }
}

/// Cooked-mode fallback for when stdin is not a terminal. EOF counts as cancel.
fn read_plain_line() -> Reply<String> {
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => Reply::Cancelled,
        Ok(_) => Reply::Answer(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

fn read_line(echo: bool) -> Reply<String> {
    let Ok(_raw) = RawMode::enable() else {
        return read_plain_line();
    };
    let mut buf = String::new();
    let reply = loop {
        match read_key() {
            Some(Key::Char(c)) => {
                buf.push(c);
                if echo {
                    eprint!("{}", c);
                    io::stderr().flush().ok();
                }
            }
            Some(Key::Backspace) => {
                if buf.pop().is_some() && echo {
                    eprint!("\x08 \x08");
                    io::stderr().flush().ok();
                }
            }
            Some(Key::Enter) => break Reply::Answer(buf),
            Some(Key::Escape) | Some(Key::Interrupt) | None => break Reply::Cancelled,
        }
    };
    eprint!("\r\n");
    reply
}

/// Interactive confirmation on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPort;

impl ConfirmationPort for TerminalPort {
    fn present(&mut self, plan: &Plan, analysis: &SafetyAnalysis, mode: RunMode) {
        print_plan(plan, analysis, mode);
    }

    fn notice(&mut self, message: &str) {
        eprintln!("  {}", message);
    }

    fn ask_yes_no(&mut self, prompt: &str) -> Reply<bool> {
        eprint!("{} [y/N] ", prompt);
        io::stderr().flush().ok();

        let Ok(_raw) = RawMode::enable() else {
            return match read_plain_line() {
                Reply::Answer(line) => {
                    Reply::Answer(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
                }
                Reply::Cancelled => Reply::Cancelled,
            };
        };
        let reply = loop {
            match read_key() {
                Some(Key::Char('y')) | Some(Key::Char('Y')) => break Reply::Answer(true),
                Some(Key::Char('n'))
                | Some(Key::Char('N'))
                | Some(Key::Enter)
                | Some(Key::Escape) => break Reply::Answer(false),
                Some(Key::Interrupt) | None => break Reply::Cancelled,
                _ => {}
            }
        };
        match reply {
            Reply::Answer(true) => eprint!("y\r\n"),
            Reply::Answer(false) => eprint!("n\r\n"),
            Reply::Cancelled => eprint!("^C\r\n"),
        }
        reply
    }

    fn ask_literal(&mut self, prompt: &str) -> Reply<String> {
        eprint!("{}: ", prompt);
        io::stderr().flush().ok();
        read_line(true)
    }

    fn ask_secret(&mut self, prompt: &str) -> Reply<String> {
        eprint!("{}", prompt);
        io::stderr().flush().ok();
        read_line(false)
    }
}

fn risk_label(risk: RiskLevel) -> String {
    let label = risk.as_str().to_uppercase();
    if risk.is_flagged() {
        format!("! {}", label)
    } else {
        label
    }
}

pub fn print_plan(plan: &Plan, analysis: &SafetyAnalysis, mode: RunMode) {
    println!();
    println!("plan (risk: {})", analysis.overall_risk.as_str().to_uppercase());
    if !plan.reasoning.is_empty() {
        println!();
        println!("  {}", plan.reasoning);
    }
    println!();

    for step in &plan.steps {
        println!(
            "  {:>2}. [{}] {:<10} {}",
            step.id,
            risk_label(step.risk_level),
            step.tool_name,
            step.command
        );
        if !step.explanation.is_empty() {
            println!("      {}", step.explanation);
        }
    }

    if !analysis.safety_flags.is_empty() {
        println!();
        for flag in &analysis.safety_flags {
            println!("  warning: {}", flag);
        }
    }

    match analysis.overall_risk {
        RiskLevel::Dangerous => {
            println!();
            println!("  danger: this plan contains potentially destructive operations");
        }
        RiskLevel::High => {
            println!();
            println!("  high risk: review each step carefully");
        }
        _ => {}
    }
    if analysis.requires_elevated_privileges {
        println!("  note: administrative privileges required");
    }
    if mode.dry_run {
        println!("  dry run: no actual changes will be made");
    }
    println!();
}

pub fn print_outcome(outcome: &RequestOutcome) {
    if let Some(exec) = &outcome.execution {
        for r in &exec.step_results {
            let mark = match r.status {
                StepStatus::Success => "+",
                StepStatus::Simulated => "~",
                StepStatus::Pending => "-",
                StepStatus::Failed | StepStatus::Error => "x",
            };
            println!("{} step {}", mark, r.step_id);
            for line in r.output.lines() {
                println!("    {}", line);
            }
            if let Some(err) = &r.error {
                eprintln!("    {}", err);
            }
        }
    }

    match outcome.stage {
        Stage::Completed => {
            if let Some(exec) = &outcome.execution {
                println!("done: {}/{} steps", exec.steps_completed, exec.total_steps);
            }
        }
        Stage::Rejected => {
            let reason = outcome
                .decision
                .as_ref()
                .map(|d| d.reason.as_str())
                .unwrap_or("rejected");
            println!("cancelled: {}", reason);
        }
        Stage::ExecutionFailed => {
            let err = outcome
                .execution
                .as_ref()
                .and_then(|e| e.error.as_deref())
                .unwrap_or("unknown error");
            eprintln!("failed: {}", err);
        }
        Stage::Error => {
            eprintln!("error: {}", outcome.error.as_deref().unwrap_or("unknown error"));
        }
        _ => {}
    }
}
