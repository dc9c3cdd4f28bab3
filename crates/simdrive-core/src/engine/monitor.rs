use super::config::{BlockMode, ProcessConfig};
use super::error::EngineError;
use super::process::{LaunchSpec, ProcessDriver, ProcessState};
use crate::core::io::tail::LogTailer;
use crate::core::parsing::LogParser;
use crate::core::records::RecordStore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Files a monitored run produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorPaths {
    /// File whose lines feed the record parser.
    pub log: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

/// Couples a [`ProcessDriver`] with the tailing and parsing of its output.
///
/// Records are refreshed on demand: every accessor first pulls whatever the
/// engine appended since the last call. The parsed log and the captured
/// stdout/stderr are followed by separate tailers, so the log may be the stdout
/// file itself.
pub struct Monitor {
    driver: ProcessDriver,
    parser: Box<dyn LogParser>,
    store: RecordStore,
    records_tailer: LogTailer,
    stream_tailer: LogTailer,
    paths: MonitorPaths,
    stdout_lines: Vec<String>,
    stderr_lines: Vec<String>,
    blocking: bool,
    wait_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl Monitor {
    pub fn new(parser: Box<dyn LogParser>, paths: MonitorPaths, config: &ProcessConfig) -> Self {
        Self {
            driver: ProcessDriver::new(),
            parser,
            store: RecordStore::new(),
            records_tailer: LogTailer::new(),
            stream_tailer: LogTailer::new(),
            paths,
            stdout_lines: Vec::new(),
            stderr_lines: Vec::new(),
            blocking: config.blocking,
            wait_timeout: config.wait_timeout,
            poll_interval: config.poll_interval,
        }
    }

    pub fn paths(&self) -> &MonitorPaths {
        &self.paths
    }

    pub fn state(&mut self) -> ProcessState {
        self.driver.state()
    }

    pub fn runtime(&mut self) -> Option<Duration> {
        self.driver.runtime()
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Launches the run unless it is queued or running; a fresh launch clears
    /// the records of any previous run.
    pub fn start(&mut self, spec: &LaunchSpec) -> Result<bool, EngineError> {
        let state = self.driver.state();
        if matches!(state, ProcessState::Queued | ProcessState::Running) {
            return self.driver.start(spec);
        }
        self.clear();
        self.driver.start(spec)
    }

    pub fn enqueue(&mut self) -> bool {
        self.driver.enqueue()
    }

    pub fn dispatch(&mut self, spec: &LaunchSpec) -> Result<(), EngineError> {
        if !self.driver.state().is_running() {
            self.clear();
        }
        self.driver.dispatch(spec)
    }

    pub fn kill(&mut self) -> Result<(), EngineError> {
        self.driver.kill()
    }

    /// Blocks until the run exits, bounded by the configured timeout.
    pub fn wait(&mut self) -> Result<ProcessState, EngineError> {
        self.driver.wait(self.wait_timeout, self.poll_interval)
    }

    /// Waits if `block` resolves to blocking, then reports the state.
    pub fn wait_for(&mut self, block: BlockMode) -> Result<ProcessState, EngineError> {
        if block.resolve(self.blocking) {
            self.wait()
        } else {
            Ok(self.driver.state())
        }
    }

    /// Pulls newly logged lines into the record store.
    pub fn refresh(&mut self) -> Result<(), EngineError> {
        let done = self.driver.state().is_done();
        let lines = if done {
            self.records_tailer.poll_to_end(&self.paths.log)?
        } else {
            self.records_tailer.poll(&self.paths.log)?
        };
        if !lines.is_empty() {
            debug!("Parsing {} new log lines.", lines.len());
        }
        self.parser.feed(lines, &mut self.store);
        if done {
            self.parser.finish(&mut self.store);
        }
        Ok(())
    }

    pub fn records(&mut self, block: BlockMode) -> Result<&RecordStore, EngineError> {
        self.wait_for(block)?;
        self.refresh()?;
        Ok(&self.store)
    }

    pub fn eta_minutes(&mut self) -> Result<Option<f64>, EngineError> {
        self.refresh()?;
        Ok(self.parser.eta_minutes())
    }

    /// The last `n` lines written to standard output.
    pub fn stdout(&mut self, n: usize) -> Result<Vec<String>, EngineError> {
        let done = self.driver.state().is_done();
        let path = self.paths.stdout.clone();
        let lines = Self::pull(&mut self.stream_tailer, &path, done)?;
        self.stdout_lines.extend(lines);
        Ok(last_lines(&self.stdout_lines, n))
    }

    /// The last `n` lines written to standard error.
    pub fn stderr(&mut self, n: usize) -> Result<Vec<String>, EngineError> {
        let done = self.driver.state().is_done();
        let path = self.paths.stderr.clone();
        let lines = Self::pull(&mut self.stream_tailer, &path, done)?;
        self.stderr_lines.extend(lines);
        Ok(last_lines(&self.stderr_lines, n))
    }

    fn pull(tailer: &mut LogTailer, path: &Path, done: bool) -> Result<Vec<String>, EngineError> {
        let lines = if done {
            tailer.poll_to_end(path)?
        } else {
            tailer.poll(path)?
        };
        Ok(lines)
    }

    fn clear(&mut self) {
        self.store = RecordStore::new();
        self.parser.reset();
        self.records_tailer.reset();
        self.stream_tailer.reset();
        self.stdout_lines.clear();
        self.stderr_lines.clear();
    }
}

fn last_lines(lines: &[String], n: usize) -> Vec<String> {
    lines[lines.len().saturating_sub(n)..].to_vec()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::parsing::NamdLogParser;
    use crate::engine::config::ProcessConfigBuilder;
    use crate::engine::observable::Engine;
    use crate::engine::process::StderrPolicy;
    use tempfile::tempdir;

    fn setup(dir: &Path, script: &str) -> (Monitor, LaunchSpec) {
        let config = ProcessConfigBuilder::new()
            .name("run")
            .work_dir(dir.to_path_buf())
            .poll_interval(Duration::from_millis(10))
            .build()
            .unwrap();
        let paths = MonitorPaths {
            log: dir.join("run.out"),
            stdout: dir.join("run.out"),
            stderr: dir.join("run.err"),
        };
        let spec = LaunchSpec {
            engine: Engine::Namd,
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            work_dir: dir.to_path_buf(),
            stdout_path: paths.stdout.clone(),
            stderr_path: paths.stderr.clone(),
            stderr: StderrPolicy::Separate,
        };
        (Monitor::new(Box::new(NamdLogParser::new()), paths, &config), spec)
    }

    const SCRIPT: &str = "printf 'ETITLE: TS BOND\\nENERGY: 0 1.5\\nENERGY: 100 2.5\\n'; echo oops 1>&2";

    #[test]
    fn blocking_records_see_the_whole_log() {
        let dir = tempdir().unwrap();
        let (mut monitor, spec) = setup(dir.path(), SCRIPT);
        assert!(monitor.start(&spec).unwrap());

        let store = monitor.records(BlockMode::Block).unwrap();
        assert_eq!(store.series("STEP").unwrap(), &["0", "100"]);
        assert_eq!(store.latest("BOND"), Some("2.5"));
        assert_eq!(monitor.state(), ProcessState::Finished);
    }

    #[test]
    fn stdout_and_stderr_return_last_lines() {
        let dir = tempdir().unwrap();
        let (mut monitor, spec) = setup(dir.path(), SCRIPT);
        monitor.start(&spec).unwrap();
        monitor.wait().unwrap();

        assert_eq!(monitor.stdout(2).unwrap(), vec!["ENERGY: 0 1.5", "ENERGY: 100 2.5"]);
        assert_eq!(monitor.stdout(0).unwrap(), Vec::<String>::new());
        assert_eq!(monitor.stdout(10).unwrap().len(), 3);
        assert_eq!(monitor.stderr(5).unwrap(), vec!["oops"]);

        let store = monitor.records(BlockMode::NonBlock).unwrap();
        assert_eq!(store.series("BOND").unwrap().len(), 2);
    }

    #[test]
    fn restart_clears_previous_records() {
        let dir = tempdir().unwrap();
        let (mut monitor, spec) = setup(dir.path(), SCRIPT);
        monitor.start(&spec).unwrap();
        monitor.records(BlockMode::Block).unwrap();

        monitor.start(&spec).unwrap();
        let store = monitor.records(BlockMode::Block).unwrap();
        assert_eq!(store.series("STEP").unwrap().len(), 2);
    }
}
