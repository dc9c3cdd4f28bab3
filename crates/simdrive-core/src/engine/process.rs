use super::error::EngineError;
use super::observable::Engine;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const README_FILE: &str = "README.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    /// Waiting in a [`RunQueue`](crate::workflows::queue::RunQueue).
    Queued,
    Running,
    Finished,
    /// Exited with a non-zero code, or was killed (`code` is `None`).
    Failed { code: Option<i32> },
}

impl ProcessState {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    pub fn is_queued(self) -> bool {
        self == Self::Queued
    }

    /// Whether the process has exited, successfully or not.
    pub fn is_done(self) -> bool {
        matches!(self, Self::Finished | Self::Failed { .. })
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Where the child's standard error goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StderrPolicy {
    Separate,
    /// Standard error is sent to the stdout file; the stderr file only holds
    /// `marker`.
    MergeIntoStdout { marker: String },
}

/// Everything needed to launch one engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub engine: Engine,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub stderr: StderrPolicy,
}

impl LaunchSpec {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Owns at most one engine child process and tracks its lifecycle.
///
/// The exit status is observed lazily: [`state`](Self::state) polls the child
/// without blocking, [`wait`](Self::wait) polls it at a fixed interval.
#[derive(Debug)]
pub struct ProcessDriver {
    state: ProcessState,
    child: Option<Child>,
    started_at: Option<Instant>,
    runtime: Option<Duration>,
}

impl Default for ProcessDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessDriver {
    pub fn new() -> Self {
        Self {
            state: ProcessState::NotStarted,
            child: None,
            started_at: None,
            runtime: None,
        }
    }

    pub fn state(&mut self) -> ProcessState {
        self.refresh();
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Wall-clock time of the current or last run.
    pub fn runtime(&mut self) -> Option<Duration> {
        self.refresh();
        match self.state {
            ProcessState::Running => self.started_at.map(|t| t.elapsed()),
            _ => self.runtime,
        }
    }

    /// Marks the process as queued. Returns `false` if it is already queued or running.
    pub fn enqueue(&mut self) -> bool {
        self.refresh();
        if matches!(self.state, ProcessState::Queued | ProcessState::Running) {
            return false;
        }
        self.state = ProcessState::Queued;
        true
    }

    /// Launches the process unless it is queued or already running.
    ///
    /// Returns whether a child was launched.
    pub fn start(&mut self, spec: &LaunchSpec) -> Result<bool, EngineError> {
        self.refresh();
        match self.state {
            ProcessState::Queued => {
                debug!("Process is queued; start request ignored.");
                Ok(false)
            }
            ProcessState::Running => {
                debug!("Process is already running; start request ignored.");
                Ok(false)
            }
            _ => self.launch(spec).map(|_| true),
        }
    }

    /// Launches a queued process. Used by the run queue.
    pub fn dispatch(&mut self, spec: &LaunchSpec) -> Result<(), EngineError> {
        self.refresh();
        if self.state.is_running() {
            return Ok(());
        }
        self.launch(spec)
    }

    fn launch(&mut self, spec: &LaunchSpec) -> Result<(), EngineError> {
        let command_line = spec.command_line();
        fs::write(
            spec.work_dir.join(README_FILE),
            format!(
                "# {} was run with the following command:\n{}\n",
                spec.engine, command_line
            ),
        )?;

        let stdout = File::create(&spec.stdout_path)?;
        let stderr = match &spec.stderr {
            StderrPolicy::Separate => File::create(&spec.stderr_path)?,
            StderrPolicy::MergeIntoStdout { marker } => {
                let mut note = File::create(&spec.stderr_path)?;
                writeln!(note, "{}", marker)?;
                stdout.try_clone()?
            }
        };

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.work_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                self.state = ProcessState::Failed { code: None };
                return Err(e.into());
            }
        };

        info!("Started {} (pid {}): {}", spec.engine, child.id(), command_line);
        self.child = Some(child);
        self.started_at = Some(Instant::now());
        self.runtime = None;
        self.state = ProcessState::Running;
        Ok(())
    }

    /// Blocks until the process exits, polling every `poll_interval`.
    ///
    /// Returns immediately when nothing is running. If `timeout` elapses first,
    /// [`EngineError::Timeout`] is returned and the child is left running.
    pub fn wait(
        &mut self,
        timeout: Option<Duration>,
        poll_interval: Duration,
    ) -> Result<ProcessState, EngineError> {
        let deadline = timeout.map(|t| (t, Instant::now() + t));
        loop {
            self.refresh();
            if !self.state.is_running() {
                return Ok(self.state);
            }
            let mut pause = poll_interval;
            if let Some((limit, at)) = deadline {
                let now = Instant::now();
                if now >= at {
                    warn!("Process still running after {:?}.", limit);
                    return Err(EngineError::Timeout(limit));
                }
                pause = pause.min(at - now);
            }
            thread::sleep(pause);
        }
    }

    /// Terminates the running child.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotStarted`] if there is no child to kill.
    pub fn kill(&mut self) -> Result<(), EngineError> {
        self.refresh();
        if !self.state.is_running() {
            return Err(EngineError::NotStarted);
        }
        let Some(child) = self.child.as_mut() else {
            return Err(EngineError::NotStarted);
        };
        child.kill()?;
        let status = child.wait()?;
        info!("Killed process {}.", child.id());
        self.record_exit(status);
        Ok(())
    }

    fn refresh(&mut self) {
        if self.state != ProcessState::Running {
            return;
        }
        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => self.record_exit(status),
            Ok(None) => {}
            Err(e) => warn!("Could not poll process {}: {}", child.id(), e),
        }
    }

    fn record_exit(&mut self, status: ExitStatus) {
        self.runtime = self.started_at.map(|t| t.elapsed());
        self.state = if status.success() {
            ProcessState::Finished
        } else {
            ProcessState::Failed {
                code: status.code(),
            }
        };
        debug!("Process exited with {:?}.", self.state);
    }
}
