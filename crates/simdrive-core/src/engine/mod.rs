//! # Engine Module
//!
//! Stateful machinery for driving an external MD engine: launching the child,
//! following its log, invoking helper tools and producing configuration.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Process settings, the builder that validates them, and [`BlockMode`](config::BlockMode)
//! - **Process Driver** ([`process`]) - The child process state machine and launch description
//! - **Monitoring** ([`monitor`]) - Couples a driver with log tailing and parsing into a record store
//! - **Helper Commands** ([`command`]) - The injected [`CommandRunner`](command::CommandRunner) capability and executable lookup
//! - **Config Generation** ([`generate`]) - Pure protocol-to-configuration functions per engine
//! - **Observables** ([`observable`]) - Engine-independent names for logged quantities and their units
//! - **Error Handling** ([`error`]) - The [`EngineError`](error::EngineError) type
//! - **Progress Reporting** ([`progress`]) - Callback-based progress events for front ends
//!
//! The driver is synchronous: exit status is observed by polling, and a blocking
//! wait sleeps between polls for the configured interval.

pub mod command;
pub mod config;
pub mod error;
pub mod generate;
pub mod monitor;
pub mod observable;
pub mod process;
pub mod progress;
