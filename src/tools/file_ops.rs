use super::{ExecOptions, Tool, ToolKind, ToolOutput};
use crate::error::ToolError;
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
    time::{Duration, Instant},
};

const RESTRICTED_DIRS: &[&str] = &[
    "/system",
    "/boot",
    "/etc",
    "/usr/bin",
    "/usr/sbin",
    "/applications",
    "/library",
    "c:/windows",
    "c:/program files",
];
const CRITICAL_FILES: &[&str] = &[".bashrc", ".profile", ".bash_profile", ".zshrc"];
const MAX_READ_BYTES: u64 = 1024 * 1024;
const MAX_SEARCH_RESULTS: usize = 200;
const MAX_SEARCH_DEPTH: usize = 8;
const MAX_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// Verb-based file operations: `<verb> <path> [arg]`.
pub struct FileOpsTool;

impl FileOpsTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileOpsTool {
    fn default() -> Self {
        Self::new()
    }
}

fn normalized(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut parts = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other.as_os_str()),
        }
    }
    parts.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn check_path(path: &Path, for_delete: bool) -> Result<(), ToolError> {
    let norm = normalized(path);
    for dir in RESTRICTED_DIRS {
        if norm == *dir || norm.starts_with(&format!("{}/", dir)) {
            return Err(ToolError::InvalidCommand(format!(
                "path is in restricted directory: {}",
                dir
            )));
        }
    }
    if for_delete {
        if path.parent().is_none() || norm == "/" || norm.ends_with(":/") {
            return Err(ToolError::InvalidCommand(
                "cannot delete root directory or drive".to_string(),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if CRITICAL_FILES.contains(&name.as_str()) {
            return Err(ToolError::InvalidCommand(format!(
                "cannot delete critical file: {}",
                name
            )));
        }
    }
    Ok(())
}

/// Separates refusals from IO misses so the latter can be reported as a
/// failed operation rather than a fault.
#[derive(Debug, thiserror::Error)]
enum OpError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors a user can cause by naming the wrong path. Anything else is a fault.
fn is_expected_miss(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::AlreadyExists
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidData
    )
}

fn required<'a>(arg: Option<&'a str>, what: &str, verb: &str) -> Result<&'a str, ToolError> {
    arg.filter(|a| !a.is_empty())
        .ok_or_else(|| ToolError::InvalidCommand(format!("{} requires {}", verb, what)))
}

impl Tool for FileOpsTool {
    fn kind(&self) -> ToolKind {
        ToolKind::FileOps
    }

    fn description(&self) -> &str {
        "File and directory operations with restricted-path checks"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn execute(&self, command: &str, options: &ExecOptions) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let mut parts = command.trim().splitn(3, char::is_whitespace);
        let verb = parts.next().unwrap_or("").to_lowercase();
        let first = parts.next().map(str::trim);
        let rest = parts.next().map(str::trim);

        let deadline = start + options.timeout.min(MAX_DEADLINE);
        let mut result = match operate(&verb, first, rest, deadline) {
            Ok(out) => out,
            Err(OpError::Tool(e)) => return Err(e),
            Err(OpError::Io(e)) if is_expected_miss(&e) => {
                ToolOutput::failed(format!("{} {}: {}", verb, first.unwrap_or(""), e))
            }
            Err(OpError::Io(e)) => return Err(ToolError::Fault(e.to_string())),
        };

        result.duration = start.elapsed();
        Ok(result)
    }
}

fn operate(
    verb: &str,
    first: Option<&str>,
    rest: Option<&str>,
    deadline: Instant,
) -> Result<ToolOutput, OpError> {
    let out = match verb {
        "create_file" => {
            let path = Path::new(required(first, "a path", verb)?);
            check_path(path, false)?;
            if path.exists() {
                ToolOutput::failed(format!("File already exists: {}", path.display()))
            } else {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, rest.unwrap_or(""))?;
                ToolOutput::ok(format!("Created file: {}", path.display()))
            }
        }
        "create_directory" => {
            let path = Path::new(required(first, "a path", verb)?);
            check_path(path, false)?;
            fs::create_dir_all(path)?;
            ToolOutput::ok(format!("Created directory: {}", path.display()))
        }
        "copy" | "move" => {
            let src = Path::new(required(first, "source and destination paths", verb)?);
            let dst = Path::new(required(rest, "source and destination paths", verb)?);
            check_path(src, verb == "move")?;
            check_path(dst, false)?;
            if !src.exists() {
                ToolOutput::failed(format!("Source does not exist: {}", src.display()))
            } else if verb == "copy" {
                if src.is_dir() {
                    return Err(ToolError::InvalidCommand(
                        "copy of directories is not supported".to_string(),
                    )
                    .into());
                }
                let bytes = fs::copy(src, dst)?;
                ToolOutput::ok(format!(
                    "Copied {} -> {} ({} bytes)",
                    src.display(),
                    dst.display(),
                    bytes
                ))
            } else {
                fs::rename(src, dst)?;
                ToolOutput::ok(format!("Moved {} -> {}", src.display(), dst.display()))
            }
        }
        "delete" => {
            let path = Path::new(required(first, "a path", verb)?);
            check_path(path, true)?;
            if !path.exists() {
                ToolOutput::failed(format!("Path does not exist: {}", path.display()))
            } else {
                if path.is_dir() {
                    fs::remove_dir_all(path)?;
                } else {
                    fs::remove_file(path)?;
                }
                ToolOutput::ok(format!("Deleted: {}", path.display()))
            }
        }
        "list" => {
            let path = Path::new(first.filter(|p| !p.is_empty()).unwrap_or("."));
            check_path(path, false)?;
            let mut entries: Vec<String> = fs::read_dir(path)?
                .filter_map(|e| e.ok())
                .map(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    if e.path().is_dir() {
                        format!("{}/", name)
                    } else {
                        name
                    }
                })
                .collect();
            entries.sort();
            ToolOutput::ok(entries.join("\n")).with_meta("count", entries.len().to_string())
        }
        "read" => {
            let path = Path::new(required(first, "a path", verb)?);
            check_path(path, false)?;
            let size = fs::metadata(path)?.len();
            if size > MAX_READ_BYTES {
                ToolOutput::failed(format!("File too large to read: {} bytes", size))
            } else {
                let bytes = fs::read(path)?;
                ToolOutput::ok(String::from_utf8_lossy(&bytes).into_owned())
                    .with_meta("bytes", size.to_string())
            }
        }
        "write" => {
            let path = Path::new(required(first, "a path", verb)?);
            check_path(path, false)?;
            let content = rest.unwrap_or("");
            fs::write(path, content)?;
            ToolOutput::ok(format!("Wrote {} bytes to {}", content.len(), path.display()))
        }
        "get_info" => {
            let path = Path::new(required(first, "a path", verb)?);
            check_path(path, false)?;
            let meta = fs::metadata(path)?;
            let kind = if meta.is_dir() { "directory" } else { "file" };
            ToolOutput::ok(format!(
                "{}: {} ({} bytes, readonly: {})",
                path.display(),
                kind,
                meta.len(),
                meta.permissions().readonly()
            ))
            .with_meta("type", kind)
            .with_meta("size", meta.len().to_string())
        }
        "search" => {
            let dir = Path::new(required(first, "a directory and a pattern", verb)?);
            let pattern = required(rest, "a directory and a pattern", verb)?.to_lowercase();
            check_path(dir, false)?;
            let mut found = Vec::new();
            let complete = search(dir, &pattern, 0, deadline, &mut found);
            ToolOutput::ok(found.join("\n"))
                .with_meta("count", found.len().to_string())
                .with_meta("complete", complete.to_string())
        }
        "" => return Err(ToolError::InvalidCommand("empty command".to_string()).into()),
        other => {
            return Err(ToolError::InvalidCommand(format!(
                "unknown file operation: {}",
                other
            ))
            .into())
        }
    };
    Ok(out)
}

/// Walks `dir` collecting names that contain `pattern`. Returns false when the
/// walk stopped early at the deadline; results found so far are kept.
fn search(
    dir: &Path,
    pattern: &str,
    depth: usize,
    deadline: Instant,
    found: &mut Vec<String>,
) -> bool {
    if Instant::now() >= deadline {
        return false;
    }
    if depth > MAX_SEARCH_DEPTH || found.len() >= MAX_SEARCH_RESULTS {
        return true;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return true;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if entry.file_name().to_string_lossy().to_lowercase().contains(pattern) {
            found.push(path.display().to_string());
            if found.len() >= MAX_SEARCH_RESULTS {
                return true;
            }
        }
        if path.is_dir() && !search(&path, pattern, depth + 1, deadline, found) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(command: &str) -> Result<ToolOutput, ToolError> {
        FileOpsTool::new().execute(
            command,
            &ExecOptions {
                timeout: Duration::from_secs(5),
            },
        )
    }

    #[test]
    fn create_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes").join("a.txt");
        let file = file.display();

        assert!(run(&format!("create_file {} hello world", file)).unwrap().success);
        assert!(!run(&format!("create_file {}", file)).unwrap().success);
        assert_eq!(run(&format!("read {}", file)).unwrap().output, "hello world");

        assert!(run(&format!("write {} replaced", file)).unwrap().success);
        assert_eq!(run(&format!("read {}", file)).unwrap().output, "replaced");

        assert!(run(&format!("delete {}", file)).unwrap().success);
        assert!(!run(&format!("delete {}", file)).unwrap().success);
    }

    #[test]
    fn list_and_search() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("report.md"), "x").unwrap();
        fs::write(dir.path().join("b.txt"), "x").unwrap();

        let listed = run(&format!("list {}", dir.path().display())).unwrap();
        assert_eq!(listed.output, "b.txt\nsub/");

        let found = run(&format!("search {} REPORT", dir.path().display())).unwrap();
        assert_eq!(found.metadata.get("count").map(String::as_str), Some("1"));
    }

    #[test]
    fn restricted_paths_and_bad_verbs_are_invalid() {
        assert!(matches!(run("write /etc/hosts x"), Err(ToolError::InvalidCommand(_))));
        assert!(matches!(run("delete /"), Err(ToolError::InvalidCommand(_))));
        assert!(matches!(run("copy onlyone"), Err(ToolError::InvalidCommand(_))));
        assert!(matches!(run("shred x"), Err(ToolError::InvalidCommand(_))));
    }

    #[test]
    fn reads_are_refused_in_restricted_directories() {
        for command in [
            "read /etc/hostname",
            "list /etc",
            "get_info /etc/passwd",
            "search /etc host",
        ] {
            assert!(
                matches!(run(command), Err(ToolError::InvalidCommand(_))),
                "{} should be refused",
                command
            );
        }
    }

    #[test]
    fn missing_paths_fail_instead_of_faulting() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");

        let out = run(&format!("read {}", missing.display())).unwrap();
        assert!(!out.success);
        assert!(out.error.unwrap().starts_with("read "));

        let out = run(&format!("list {}", missing.display())).unwrap();
        assert!(!out.success);
        let out = run(&format!("get_info {}", missing.display())).unwrap();
        assert!(!out.success);
    }

    #[test]
    fn search_stops_at_the_deadline() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("match.txt"), "x").unwrap();

        let mut found = Vec::new();
        let past = Instant::now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(!search(dir.path(), "match", 0, past, &mut found));
        assert!(found.is_empty());

        let later = Instant::now() + Duration::from_secs(30);
        assert!(search(dir.path(), "match", 0, later, &mut found));
        assert_eq!(found.len(), 1);
    }
}
