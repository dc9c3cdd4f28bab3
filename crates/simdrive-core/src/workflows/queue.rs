use super::Simulation;
use crate::engine::error::EngineError;
use crate::engine::process::ProcessState;
use std::collections::VecDeque;
use tracing::{info, warn};

/// Runs prepared simulations one at a time, in the order they were pushed.
///
/// Queued simulations report [`ProcessState::Queued`] and ignore their own
/// `start` until the queue dispatches them.
#[derive(Default)]
pub struct RunQueue {
    pending: VecDeque<Box<dyn Simulation>>,
    current: Option<Box<dyn Simulation>>,
    completed: Vec<Box<dyn Simulation>>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `simulation`. A simulation that is already queued or running is
    /// handed back unchanged.
    pub fn push(&mut self, mut simulation: Box<dyn Simulation>) -> Result<(), Box<dyn Simulation>> {
        if !simulation.monitor_mut().enqueue() {
            warn!("{} run is already queued or running; not queued again.", simulation.engine());
            return Err(simulation);
        }
        self.pending.push_back(simulation);
        Ok(())
    }

    /// Number of simulations still waiting to be launched.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn current_mut(&mut self) -> Option<&mut (dyn Simulation + 'static)> {
        self.current.as_deref_mut()
    }

    pub fn completed(&self) -> &[Box<dyn Simulation>] {
        &self.completed
    }

    pub fn into_completed(self) -> Vec<Box<dyn Simulation>> {
        self.completed
    }

    /// Launches the next simulation once the current one has exited.
    ///
    /// Returns the state of the simulation now at the head of the queue, or
    /// `None` when everything has run.
    pub fn advance(&mut self) -> Result<Option<ProcessState>, EngineError> {
        if let Some(current) = self.current.as_mut() {
            let state = current.state();
            if state.is_running() {
                return Ok(Some(state));
            }
        }
        if let Some(done) = self.current.take() {
            self.completed.push(done);
        }
        let Some(mut next) = self.pending.pop_front() else {
            return Ok(None);
        };
        let spec = next.launch_spec();
        let dispatched = next.monitor_mut().dispatch(&spec);
        let state = next.state();
        self.current = Some(next);
        dispatched?;
        info!("Dispatched queued run; {} still waiting.", self.pending.len());
        Ok(Some(state))
    }

    /// Runs every queued simulation to completion, one after another.
    ///
    /// Stops at the first simulation that cannot be launched or does not finish
    /// within its wait timeout.
    pub fn run_all(&mut self) -> Result<(), EngineError> {
        while self.advance()?.is_some() {
            if let Some(current) = self.current.as_mut() {
                current.wait()?;
            }
        }
        Ok(())
    }
}
