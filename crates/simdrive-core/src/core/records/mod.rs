//! Time-series records scraped from engine output.
//!
//! Engines label the same quantity in slightly different ways ("Pres. DC (bar)",
//! "PRESDC"), so every key passes through [`canonical_key`] before it touches the
//! [`RecordStore`]. Values are stored exactly as printed and only decoded on read.

mod canonical;
mod store;
pub mod units;

pub use canonical::canonical_key;
pub use store::RecordStore;
