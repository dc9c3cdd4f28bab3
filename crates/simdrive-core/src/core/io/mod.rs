//! Input/output helpers for engine files.
//!
//! This module contains the incremental [`tail::LogTailer`] used to follow engine logs,
//! and lightweight scanners for the GROMACS (`.gro`, `.top`) and NAMD/CHARMM
//! (`.pdb`, `.psf`) files that simdrive hands to an engine. The scanners only extract
//! what configuration generation needs; they are not general-purpose format libraries.

pub mod error;
pub mod gro;
pub mod pdb;
pub mod psf;
pub mod tail;
pub mod topology;

pub use error::FormatError;
