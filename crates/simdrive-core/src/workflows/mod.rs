//! # Workflows Module
//!
//! End-to-end simulation objects. Each one prepares its engine's input files in
//! a work directory when constructed, launches the engine on request, and turns
//! the engine log into typed readings.
//!
//! ## Architecture
//!
//! - **GROMACS** ([`gromacs`]) - `.mdp` generation, position restraints via `gmx genrestr`, `gmx grompp`, `gmx mdrun`
//! - **NAMD** ([`namd`]) - PSF patching, `.namd` generation, fixed-atom restraint files, `namd2`
//! - **Run Queue** ([`queue`]) - Runs several simulations one after another
//!
//! The shared accessor surface lives on the [`Simulation`] trait.

pub mod gromacs;
pub mod namd;
pub mod queue;

use crate::core::models::protocol::{Protocol, ProtocolKind};
use crate::core::records::RecordStore;
use crate::engine::config::BlockMode;
use crate::engine::error::EngineError;
use crate::engine::monitor::Monitor;
use crate::engine::observable::{Engine, Observable, Reading};
use crate::engine::process::{LaunchSpec, ProcessState};
use crate::engine::progress::{Progress, ProgressReporter};
use std::thread;
use std::time::Instant;
use tracing::info;

/// A prepared engine run.
pub trait Simulation {
    fn engine(&self) -> Engine;
    fn protocol(&self) -> &Protocol;
    fn monitor(&self) -> &Monitor;
    fn monitor_mut(&mut self) -> &mut Monitor;
    /// How the engine is launched for this run.
    fn launch_spec(&self) -> LaunchSpec;

    /// Launches the engine. A no-op returning `false` while the run is queued or running.
    fn start(&mut self) -> Result<bool, EngineError> {
        let spec = self.launch_spec();
        self.monitor_mut().start(&spec)
    }

    fn state(&mut self) -> ProcessState {
        self.monitor_mut().state()
    }

    fn is_running(&mut self) -> bool {
        self.state().is_running()
    }

    fn is_error(&mut self) -> bool {
        self.state().is_error()
    }

    fn wait(&mut self) -> Result<ProcessState, EngineError> {
        self.monitor_mut().wait()
    }

    fn kill(&mut self) -> Result<(), EngineError> {
        self.monitor_mut().kill()
    }

    fn records(&mut self, block: BlockMode) -> Result<&RecordStore, EngineError> {
        self.monitor_mut().records(block)
    }

    /// The most recent value of `observable`, decoded in the engine's native unit.
    ///
    /// `None` when the engine does not report the observable, nothing has been
    /// logged yet, or the logged value is malformed. Minimisations have no
    /// simulated time.
    fn latest(&mut self, observable: Observable, block: BlockMode) -> Result<Option<Reading>, EngineError> {
        let engine = self.engine();
        if !reports(self.protocol(), engine, observable) {
            return Ok(None);
        }
        let store = self.records(block)?;
        Ok(decode_latest(store, engine, observable))
    }

    /// Every logged value of `observable`, oldest first.
    fn time_series(
        &mut self,
        observable: Observable,
        block: BlockMode,
    ) -> Result<Option<Vec<Reading>>, EngineError> {
        let engine = self.engine();
        if !reports(self.protocol(), engine, observable) {
            return Ok(None);
        }
        let store = self.records(block)?;
        Ok(decode_series(store, engine, observable))
    }

    /// The latest raw value logged under `key`, for labels without an [`Observable`].
    fn latest_raw(&mut self, key: &str, block: BlockMode) -> Result<Option<String>, EngineError> {
        Ok(self.records(block)?.latest(key).map(str::to_string))
    }

    fn series_raw(&mut self, key: &str, block: BlockMode) -> Result<Option<Vec<String>>, EngineError> {
        Ok(self.records(block)?.series(key).map(<[String]>::to_vec))
    }

    /// The last `n` lines of standard output.
    fn stdout(&mut self, n: usize) -> Result<Vec<String>, EngineError> {
        self.monitor_mut().stdout(n)
    }

    /// The last `n` lines of standard error.
    fn stderr(&mut self, n: usize) -> Result<Vec<String>, EngineError> {
        self.monitor_mut().stderr(n)
    }

    /// Polls a started run until it exits, reporting the latest logged step.
    ///
    /// Honours the configured wait timeout the same way [`wait`](Self::wait) does.
    fn follow(&mut self, reporter: &ProgressReporter) -> Result<ProcessState, EngineError> {
        reporter.report(Progress::TaskStart {
            total_steps: self.protocol().total_steps(),
        });
        let started = Instant::now();
        let mut last_step = None;
        loop {
            let state = self.state();
            let step = self.records(BlockMode::NonBlock)?.latest_step("STEP");
            if step.is_some() && step != last_step {
                last_step = step;
                if let Some(step) = step {
                    reporter.report(Progress::TaskUpdate { step });
                }
            }
            if !state.is_running() {
                reporter.report(Progress::TaskFinish);
                info!("{} run ended in state {:?}.", self.engine(), state);
                return Ok(state);
            }
            let monitor = self.monitor();
            if let Some(limit) = monitor.wait_timeout() {
                if started.elapsed() >= limit {
                    return Err(EngineError::Timeout(limit));
                }
            }
            thread::sleep(monitor.poll_interval());
        }
    }
}

fn reports(protocol: &Protocol, engine: Engine, observable: Observable) -> bool {
    if observable == Observable::Time && protocol.kind() == ProtocolKind::Minimisation {
        return false;
    }
    observable.key(engine).is_some()
}

fn decode_latest(store: &RecordStore, engine: Engine, observable: Observable) -> Option<Reading> {
    let key = observable.key(engine)?;
    match observable.unit(engine) {
        None => store.latest_step(key).map(Reading::Step),
        Some(unit) => store.latest_quantity(key, unit).map(Reading::Quantity),
    }
}

fn decode_series(store: &RecordStore, engine: Engine, observable: Observable) -> Option<Vec<Reading>> {
    let key = observable.key(engine)?;
    match observable.unit(engine) {
        None => store
            .step_series(key)
            .map(|steps| steps.into_iter().map(Reading::Step).collect()),
        Some(unit) => store
            .quantity_series(key, unit)
            .map(|values| values.into_iter().map(Reading::Quantity).collect()),
    }
}
