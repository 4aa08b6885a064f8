use super::{ExecOptions, Tool, ToolKind, ToolOutput};
use crate::error::ToolError;
use std::{fs, path::Path, time::Instant};

const MAX_BODY_CHARS: usize = 4000;
const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

#[derive(Debug, Clone, PartialEq, Eq)]
enum WebAction {
    Browse(String),
    Download { url: String, dest: String },
    Search(String),
}

fn find_url(command: &str) -> Option<String> {
    command
        .split_whitespace()
        .find(|w| w.starts_with("http://") || w.starts_with("https://"))
        .map(String::from)
}

fn parse(command: &str) -> Result<WebAction, ToolError> {
    let trimmed = command.trim();
    let (verb, rest) = trimmed
        .split_once(char::is_whitespace)
        .map(|(v, r)| (v.to_lowercase(), r.trim()))
        .unwrap_or_else(|| (trimmed.to_lowercase(), ""));

    match verb.as_str() {
        "download" => {
            let mut args = rest.split_whitespace();
            match (args.next(), args.next()) {
                (Some(url), Some(dest)) => Ok(WebAction::Download {
                    url: url.to_string(),
                    dest: dest.to_string(),
                }),
                _ => Err(ToolError::InvalidCommand(
                    "download requires a url and a destination".to_string(),
                )),
            }
        }
        "search" | "web_search" if !rest.is_empty() => Ok(WebAction::Search(rest.to_string())),
        _ => find_url(trimmed)
            .map(WebAction::Browse)
            .ok_or_else(|| ToolError::InvalidCommand(format!("no url in command: {}", trimmed))),
    }
}

/// Fetches pages and files over HTTP. No script execution or rendering.
pub struct BrowserTool;

impl BrowserTool {
    pub fn new() -> Self {
        Self
    }

    fn client(options: &ExecOptions) -> Result<reqwest::blocking::Client, ToolError> {
        reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("oscar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::Fault(e.to_string()))
    }
}

impl Default for BrowserTool {
    fn default() -> Self {
        Self::new()
    }
}

fn map_request_error(e: reqwest::Error, options: &ExecOptions) -> ToolError {
    if e.is_timeout() {
        ToolError::Timeout(options.timeout)
    } else {
        ToolError::Fault(e.to_string())
    }
}

impl Tool for BrowserTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Browser
    }

    fn description(&self) -> &str {
        "Fetch web pages, download files and run simple web searches"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn execute(&self, command: &str, options: &ExecOptions) -> Result<ToolOutput, ToolError> {
        let action = parse(command)?;
        let start = Instant::now();
        let client = Self::client(options)?;

        let request = match &action {
            WebAction::Browse(url) | WebAction::Download { url, .. } => client.get(url.as_str()),
            WebAction::Search(query) => client.get(SEARCH_ENDPOINT).query(&[("q", query.as_str())]),
        };
        let response = request.send().map_err(|e| map_request_error(e, options))?;
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            let mut out = ToolOutput::failed(format!("HTTP {}", status));
            out.duration = start.elapsed();
            return Ok(out.with_meta("url", final_url));
        }

        let mut out = match action {
            WebAction::Download { dest, .. } => {
                let bytes = response.bytes().map_err(|e| map_request_error(e, options))?;
                let dest = Path::new(&dest);
                if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                fs::write(dest, &bytes)?;
                ToolOutput::ok(format!("Downloaded {} bytes to {}", bytes.len(), dest.display()))
            }
            WebAction::Browse(_) | WebAction::Search(_) => {
                let body = response.text().map_err(|e| map_request_error(e, options))?;
                ToolOutput::ok(body.chars().take(MAX_BODY_CHARS).collect::<String>())
            }
        };
        out.duration = start.elapsed();
        Ok(out
            .with_meta("url", final_url)
            .with_meta("status", status.as_u16().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse("browse https://example.com").unwrap(),
            WebAction::Browse("https://example.com".to_string())
        );
        assert_eq!(
            parse("open the page at http://x.test/a please").unwrap(),
            WebAction::Browse("http://x.test/a".to_string())
        );
        assert_eq!(
            parse("download https://x.test/f.zip out/f.zip").unwrap(),
            WebAction::Download {
                url: "https://x.test/f.zip".to_string(),
                dest: "out/f.zip".to_string()
            }
        );
        assert_eq!(
            parse("search rust async book").unwrap(),
            WebAction::Search("rust async book".to_string())
        );
    }

    #[test]
    fn rejects_commands_without_target() {
        assert!(matches!(parse("download https://x.test"), Err(ToolError::InvalidCommand(_))));
        assert!(matches!(parse("browse somewhere"), Err(ToolError::InvalidCommand(_))));
        assert!(matches!(parse("search"), Err(ToolError::InvalidCommand(_))));
    }
}
