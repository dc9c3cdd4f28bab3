//! Incremental parsers turning engine log lines into [`RecordStore`] entries.
//!
//! Parsers never fail: lines they cannot make sense of are skipped, so a
//! half-written or unexpected log degrades to fewer records rather than an error.

mod columns;
mod gromacs;
mod namd;

use crate::core::records::RecordStore;

pub use columns::{column_spans, slice_span};
pub use gromacs::GromacsLogParser;
pub use namd::NamdLogParser;

/// A stateful consumer of newly appended log lines.
pub trait LogParser: Send {
    /// Parses `lines`, which directly follow those of the previous call.
    fn feed(&mut self, lines: Vec<String>, store: &mut RecordStore);

    /// Flushes anything held back, once no more lines will arrive.
    fn finish(&mut self, _store: &mut RecordStore) {}

    /// Forgets all state, ready for a fresh log.
    fn reset(&mut self);

    /// Minutes left in the run, for engines that report an estimate.
    fn eta_minutes(&self) -> Option<f64> {
        None
    }
}
