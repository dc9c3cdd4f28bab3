//! Pure configuration generators.
//!
//! Each generator turns a [`Protocol`](crate::core::models::protocol::Protocol)
//! and a [`SystemDescription`](crate::core::models::system::SystemDescription)
//! into engine-native configuration lines, or reports that the engine cannot run
//! the protocol. They never touch the filesystem.

pub mod gromacs;
pub mod namd;
