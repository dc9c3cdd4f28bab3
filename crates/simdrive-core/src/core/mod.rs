//! # Core Module
//!
//! Stateless building blocks shared by every engine wrapper.
//!
//! ## Architecture
//!
//! - **Records** ([`records`]) - Canonical record keys, the append-only record store and physical units
//! - **File I/O** ([`io`]) - Incremental log tailing and scanners for GROMACS/NAMD input formats
//! - **Models** ([`models`]) - Simulation protocols and molecular system descriptions
//! - **Parsing** ([`parsing`]) - Engine log parsers feeding the record store
//!
//! Nothing in this layer spawns processes; everything here can be exercised against
//! literal sample text.

pub mod io;
pub mod models;
pub mod parsing;
pub mod records;
