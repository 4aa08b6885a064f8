use super::{ExecOptions, Tool, ToolKind, ToolOutput};
use crate::error::ToolError;
use crate::safety::SafetyRules;
use std::{
    io::{self, Read},
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct ShellTool {
    program: String,
    flag: &'static str,
    blocked: Option<SafetyRules>,
    max_output_lines: usize,
}

impl ShellTool {
    /// `blocked` refuses commands matching its dangerous patterns even after approval.
    pub fn new(blocked: Option<SafetyRules>, max_output_lines: usize) -> Self {
        let (program, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        Self {
            program: program.to_string(),
            flag,
            blocked,
            max_output_lines,
        }
    }

    #[cfg(test)]
    fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }
}

impl Tool for ShellTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Shell
    }

    fn description(&self) -> &str {
        "Execute system commands through the platform shell"
    }

    fn is_available(&self) -> bool {
        cfg!(windows) || std::path::Path::new("/bin/sh").exists()
    }

    fn execute(&self, command: &str, options: &ExecOptions) -> Result<ToolOutput, ToolError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(ToolError::InvalidCommand("empty command".to_string()));
        }
        if let Some(rules) = &self.blocked {
            if rules.is_dangerous(command) {
                return Err(ToolError::InvalidCommand(format!(
                    "command blocked for safety: {}",
                    command
                )));
            }
        }

        let start = Instant::now();
        debug!(command, timeout_secs = options.timeout.as_secs(), "spawning shell");
        let mut child = Command::new(&self.program)
            .arg(self.flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    ToolError::Unavailable(format!("shell not found: {}", self.program))
                }
                _ => ToolError::from(e),
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = wait_with_timeout(&mut child, options.timeout)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        let duration = start.elapsed();

        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());

        let mut result = if status.success() {
            let output = truncate_lines(stdout.trim_end(), self.max_output_lines);
            let mut out = ToolOutput::ok(if output.is_empty() {
                "Command executed successfully".to_string()
            } else {
                output
            });
            if !stderr.trim().is_empty() {
                out.error = Some(stderr.trim().to_string());
            }
            out
        } else {
            let error = if stderr.trim().is_empty() {
                format!("Command failed with exit code {}", code)
            } else {
                stderr.trim().to_string()
            };
            let mut out = ToolOutput::failed(error);
            out.output = truncate_lines(stdout.trim_end(), self.max_output_lines);
            out
        };
        result.duration = duration;
        Ok(result
            .with_meta("return_code", code)
            .with_meta("command", command))
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<std::process::ExitStatus, ToolError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(status),
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::Timeout(timeout));
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Keeps the head and tail of long output.
pub fn truncate_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if max_lines == 0 || lines.len() <= max_lines {
        return lines.join("\n");
    }
    let half = max_lines / 2;
    let mut kept: Vec<String> = lines[..half].iter().map(|s| s.to_string()).collect();
    kept.push(format!("... [{} lines truncated] ...", lines.len() - half * 2));
    kept.extend(lines[lines.len() - half..].iter().map(|s| s.to_string()));
    kept.join("\n")
}
