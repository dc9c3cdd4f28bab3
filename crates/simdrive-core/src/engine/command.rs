use super::error::EngineError;
use super::observable::Engine;
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// A short-lived helper invocation (topology preprocessing, restraint
/// generation) whose output is captured in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// What the command is for, used in error messages.
    pub purpose: &'static str,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Text written to the child's standard input, which is then closed.
    pub stdin: Option<String>,
    pub work_dir: PathBuf,
}

impl CommandSpec {
    pub fn new(purpose: &'static str, program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            purpose,
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            work_dir: work_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// The command as a shell-like line, for logs and README files.
    pub fn command_line(&self) -> String {
        let mut line = String::new();
        if let Some(input) = &self.stdin {
            line.push_str(&format!("echo {} | ", input.trim_end()));
        }
        line.push_str(&self.program.display().to_string());
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when the child was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes helper commands on behalf of an engine wrapper.
///
/// Wrappers receive a runner instead of spawning helpers themselves, so the
/// file-generation logic can be exercised without the engine installed.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        debug!("Running: {}", spec.command_line());
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.work_dir)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (&spec.stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs `spec` and turns a non-zero exit into [`EngineError::ExternalTool`].
pub fn run_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<CommandOutput, EngineError> {
    let output = runner.run(spec)?;
    if output.success() {
        Ok(output)
    } else {
        Err(EngineError::ExternalTool {
            purpose: spec.purpose,
            command: spec.command_line(),
            code: output.code,
            stderr: output.stderr,
        })
    }
}

/// Resolves the executable for `engine`.
///
/// An explicit path containing a directory component must point at a file; a
/// bare name, or each of the `candidates` when nothing is given, is searched
/// for on `PATH`.
pub fn find_executable(
    engine: Engine,
    explicit: Option<&Path>,
    candidates: &[&str],
) -> Result<PathBuf, EngineError> {
    let names: Vec<PathBuf> = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => candidates.iter().map(PathBuf::from).collect(),
    };

    for name in &names {
        if name.components().count() > 1 || name.is_absolute() {
            if is_executable(name) {
                return Ok(name.clone());
            }
            continue;
        }
        if let Some(found) = search_path(name) {
            info!("Using {} executable at {}", engine, found.display());
            return Ok(found);
        }
    }

    Err(EngineError::MissingExecutable {
        engine,
        tried: names
            .iter()
            .map(|n| n.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn search_path(name: &Path) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FailingRunner;

    impl CommandRunner for FailingRunner {
        fn run(&self, _spec: &CommandSpec) -> io::Result<CommandOutput> {
            Ok(CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "Fatal error: missing file".to_string(),
            })
        }
    }

    #[test]
    fn command_line_shows_piped_input() {
        let spec = CommandSpec::new("restraint generation", "gmx", "/tmp")
            .args(["genrestr", "-f", "tmp.gro"])
            .stdin("Backbone\n");
        assert_eq!(
            spec.command_line(),
            "echo Backbone | gmx genrestr -f tmp.gro"
        );
    }

    #[test]
    fn failed_command_reports_purpose_and_stderr() {
        let spec = CommandSpec::new("topology preprocessing", "gmx", "/tmp").arg("grompp");
        let err = run_checked(&FailingRunner, &spec).unwrap_err();
        match err {
            EngineError::ExternalTool {
                purpose,
                code,
                stderr,
                command,
            } => {
                assert_eq!(purpose, "topology preprocessing");
                assert_eq!(code, Some(1));
                assert!(stderr.contains("missing file"));
                assert_eq!(command, "gmx grompp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_feeds_stdin_and_captures_output() {
        let dir = tempdir().unwrap();
        let spec = CommandSpec::new("echo", "cat", dir.path()).stdin("hello\n");
        let output = SystemCommandRunner.run(&spec).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn explicit_executable_path_is_checked() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let exe = dir.path().join("gmx");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = find_executable(Engine::Gromacs, Some(&exe), &[]).unwrap();
        assert_eq!(found, exe);

        let missing = dir.path().join("namd2");
        assert!(matches!(
            find_executable(Engine::Namd, Some(&missing), &[]),
            Err(EngineError::MissingExecutable { .. })
        ));
    }

    #[test]
    fn unknown_candidates_are_reported() {
        let err = find_executable(Engine::Gromacs, None, &["surely-not-an-md-engine-xyz"]).unwrap_err();
        assert!(err.to_string().contains("surely-not-an-md-engine-xyz"));
    }
}
