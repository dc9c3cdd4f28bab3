//! # simdrive Core Library
//!
//! Process-management wrappers that prepare, launch, monitor and scrape external
//! molecular-dynamics engines such as GROMACS and NAMD.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture so that the fragile parts
//! (vendor log formats, topology patching) can be tested without an engine installed.
//!
//! - **[`core`]: The Foundation.** Stateless data: the append-only [`RecordStore`](core::records::RecordStore),
//!   physical units, lightweight scanners for topology/coordinate files, protocol and system
//!   descriptions, and the engine log parsers.
//!
//! - **[`engine`]: The Logic Core.** Stateful machinery: the [`ProcessDriver`](engine::process::ProcessDriver)
//!   state machine, the injected [`CommandRunner`](engine::command::CommandRunner) capability
//!   for helper tools, configuration generators, errors and progress reporting.
//!
//! - **[`workflows`]: The Public API.** Engine-specific simulation objects ([`Gromacs`](workflows::gromacs::Gromacs),
//!   [`Namd`](workflows::namd::Namd)) that tie the layers together, plus a sequential
//!   [`RunQueue`](workflows::queue::RunQueue).

pub mod core;
pub mod engine;
pub mod workflows;
