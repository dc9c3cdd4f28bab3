use super::LogParser;
use super::columns::{column_spans, slice_span};
use crate::core::records::RecordStore;
use tracing::{debug, trace};

const ENERGY_MARKER: &str = "Energies (kJ/mol)";
const STEP_MARKER: &str = "Step";
const AVERAGES_MARKER: &str = " A V E R A G E S";

#[derive(Debug, Clone, PartialEq)]
enum ScanState {
    Scanning,
    /// Inside an energy table that started at `start`, with label/value pairs
    /// collected so far.
    InEnergyBlock {
        start: usize,
        pairs: Vec<(String, String)>,
    },
}

/// Incremental parser for GROMACS `mdrun` log files.
///
/// Each call to [`feed`](Self::feed) receives the lines appended to the log since
/// the previous call. Energy tables are read as alternating label/value lines
/// until a blank line; the step header (`Step Time` followed by two numbers)
/// yields `STEP` and `TIME` records. Parsing stops for good at the averages
/// trailer, whose values are not instantaneous.
///
/// A table or step header cut off at the end of a poll is kept and re-read with
/// the next one, so nothing is lost when the engine is mid-write.
#[derive(Debug, Clone, Default)]
pub struct GromacsLogParser {
    carry: Vec<String>,
    averages_reached: bool,
}

impl GromacsLogParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn averages_reached(&self) -> bool {
        self.averages_reached
    }

    /// Whether lines are held back waiting for the rest of a table.
    pub fn has_pending(&self) -> bool {
        !self.carry.is_empty()
    }

    fn scan(&mut self, mut lines: Vec<String>, store: &mut RecordStore, at_end: bool) {
        if self.averages_reached {
            return;
        }
        let mut buffer = std::mem::take(&mut self.carry);
        buffer.append(&mut lines);

        let mut state = ScanState::Scanning;
        let mut x = 0;

        while x < buffer.len() {
            match state {
                ScanState::Scanning => {
                    let line = &buffer[x];
                    if line.trim() == ENERGY_MARKER {
                        state = ScanState::InEnergyBlock {
                            start: x,
                            pairs: Vec::new(),
                        };
                        x += 1;
                    } else if line.contains(AVERAGES_MARKER) {
                        debug!("Reached the averages section of the GROMACS log.");
                        self.averages_reached = true;
                        return;
                    } else if line.contains(STEP_MARKER) {
                        let Some(next) = buffer.get(x + 1) else {
                            if !at_end {
                                self.carry = buffer.split_off(x);
                            }
                            return;
                        };
                        match parse_step_line(next) {
                            Some((step, time)) => {
                                store.append("STEP", step);
                                store.append("TIME", time);
                                x += 2;
                            }
                            None => x += 1,
                        }
                    } else {
                        x += 1;
                    }
                }
                ScanState::InEnergyBlock {
                    start,
                    ref mut pairs,
                } => {
                    let labels = &buffer[x];
                    if labels.trim().is_empty() {
                        commit_block(std::mem::take(pairs), store);
                        state = ScanState::Scanning;
                        x += 1;
                        continue;
                    }
                    let Some(values) = buffer.get(x + 1) else {
                        break;
                    };
                    if values.trim().is_empty() {
                        commit_block(std::mem::take(pairs), store);
                        state = ScanState::Scanning;
                        x += 2;
                        continue;
                    }
                    trace!("Energy table rows at line {} of block {}.", x, start);
                    for span in column_spans(values) {
                        let label = slice_span(labels, span).trim();
                        if label.is_empty() {
                            continue;
                        }
                        pairs.push((label.to_string(), slice_span(values, span).trim().to_string()));
                    }
                    x += 2;
                }
            }
        }

        if let ScanState::InEnergyBlock { start, pairs } = state {
            if at_end {
                commit_block(pairs, store);
            } else {
                self.carry = buffer.split_off(start);
            }
        }
    }
}

impl LogParser for GromacsLogParser {
    fn feed(&mut self, lines: Vec<String>, store: &mut RecordStore) {
        self.scan(lines, store, false);
    }

    /// Parses whatever was carried over, treating end of input as the end of
    /// any open table.
    fn finish(&mut self, store: &mut RecordStore) {
        self.scan(Vec::new(), store, true);
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

fn parse_step_line(line: &str) -> Option<(&str, &str)> {
    let mut tokens = line.split_whitespace();
    let (step, time) = (tokens.next()?, tokens.next()?);
    if tokens.next().is_some() {
        return None;
    }
    if step.parse::<u64>().is_ok() && time.parse::<f64>().is_ok() {
        Some((step, time))
    } else {
        None
    }
}

fn commit_block(pairs: Vec<(String, String)>, store: &mut RecordStore) {
    if pairs.is_empty() {
        return;
    }
    if let Some((label, value)) = pairs.iter().find(|(_, v)| v.parse::<f64>().is_err()) {
        debug!(
            "Skipping malformed energy block: '{}' has non-numeric value '{}'.",
            label, value
        );
        return;
    }
    for (label, value) in &pairs {
        store.append(label, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
Started mdrun on rank 0 Mon Jan  1 00:00:00 2024

           Step           Time
              0        0.00000

   Energies (kJ/mol)
           Bond          Angle    Proper Dih.  Improper Dih.          LJ-14
    1.02374e+02    1.11141e+01    2.95446e+01    2.42547e+01    3.98047e+02
     Coulomb-14        LJ (SR)   Coulomb (SR)   Coul. recip.      Potential
    4.02154e+03   -1.31227e+03   -1.21283e+04    5.53826e+01   -8.79813e+03
    Kinetic En.   Total Energy  Conserved En.    Temperature Pressure (bar)
    1.46281e+03   -7.33532e+03   -7.33532e+03    2.99123e+02   -3.47612e+02
   Constr. rmsd
    3.21456e-06

           Step           Time
            100        0.20000

   Energies (kJ/mol)
           Bond          Angle    Proper Dih.  Improper Dih.          LJ-14
    1.10000e+02    1.20000e+01    3.00000e+01    2.50000e+01    4.00000e+02
     Coulomb-14        LJ (SR)   Coulomb (SR)   Coul. recip.      Potential
    4.10000e+03   -1.30000e+03   -1.20000e+04    5.60000e+01   -8.60000e+03
    Kinetic En.   Total Energy  Conserved En.    Temperature Pressure (bar)
    1.50000e+03   -7.10000e+03   -7.33000e+03    3.01000e+02   -2.00000e+02
   Constr. rmsd
    3.00000e-06

	<======  ###############  ==>
	<====  A V E R A G E S  ====>
	<==  ###############  ======>

   Energies (kJ/mol)
           Bond          Angle
    9.99999e+02    9.99999e+02

";

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn parses_step_headers_and_energy_tables() {
        let mut store = RecordStore::new();
        let mut parser = GromacsLogParser::new();
        parser.feed(lines(LOG), &mut store);

        assert_eq!(store.series("STEP").unwrap(), &["0", "100"]);
        assert_eq!(store.series("TIME").unwrap(), &["0.00000", "0.20000"]);
        assert_eq!(store.latest("BOND"), Some("1.10000e+02"));
        assert_eq!(store.latest("Proper Dih."), Some("3.00000e+01"));
        assert_eq!(store.latest("IMPROPERDIH"), Some("2.50000e+01"));
        assert_eq!(store.latest("LJ (SR)"), Some("-1.30000e+03"));
        assert_eq!(store.latest("COULRECIP"), Some("5.60000e+01"));
        assert_eq!(store.latest("PRESSURE"), Some("-2.00000e+02"));
        assert_eq!(store.latest("CONSTRRMSD"), Some("3.00000e-06"));
        assert_eq!(store.series("POTENTIAL").unwrap().len(), 2);
        assert!(parser.averages_reached());
    }

    #[test]
    fn averages_section_is_ignored() {
        let mut store = RecordStore::new();
        let mut parser = GromacsLogParser::new();
        parser.feed(lines(LOG), &mut store);
        parser.feed(lines(LOG), &mut store);

        assert_eq!(store.series("BOND").unwrap().len(), 2);
        assert!(!store.series("BOND").unwrap().iter().any(|v| v == "9.99999e+02"));
    }

    #[test]
    fn header_mismatch_keeps_overlapping_prefix() {
        let text = "   Energies (kJ/mol)\n   Bond Angle\n 12.500 3.250 7.0\n\n";
        let mut store = RecordStore::new();
        GromacsLogParser::new().feed(lines(text), &mut store);

        assert_eq!(store.latest("BOND"), Some("12.500"));
        assert_eq!(store.latest("ANGLE"), Some("3.250"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unpadded_labels_are_cut_at_value_columns() {
        // Labels are sliced with the value spans, so they only line up when the
        // label line is right-aligned over the values as GROMACS prints it.
        let text = "   Energies (kJ/mol)\nBond Angle\n12.500 3.250 \n\n";
        let mut store = RecordStore::new();
        GromacsLogParser::new().feed(lines(text), &mut store);

        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["BONDA", "NGLE"]);
        assert_eq!(store.latest("BONDA"), Some("12.500"));
        assert_eq!(store.latest("NGLE"), Some("3.250"));
        assert_eq!(store.latest("BOND"), None);
    }

    #[test]
    fn block_cut_off_mid_poll_is_completed_by_next_poll() {
        let all = lines(LOG);
        let split = all
            .iter()
            .position(|l| l.contains("Coulomb-14"))
            .unwrap();
        let (first, second) = all.split_at(split);

        let mut store = RecordStore::new();
        let mut parser = GromacsLogParser::new();
        parser.feed(first.to_vec(), &mut store);
        assert!(parser.has_pending());
        assert_eq!(store.latest("BOND"), None);
        assert_eq!(store.series("STEP").unwrap(), &["0"]);

        parser.feed(second.to_vec(), &mut store);
        assert!(!parser.has_pending());
        assert_eq!(store.series("BOND").unwrap().len(), 2);
        assert_eq!(store.series("KINETICEN").unwrap().len(), 2);
    }

    #[test]
    fn marker_as_last_line_terminates() {
        let mut store = RecordStore::new();
        let mut parser = GromacsLogParser::new();
        parser.feed(lines("   Energies (kJ/mol)"), &mut store);
        assert!(parser.has_pending());
        assert!(store.is_empty());

        parser.finish(&mut store);
        assert!(!parser.has_pending());
        assert!(store.is_empty());
    }

    #[test]
    fn finish_flushes_unterminated_block() {
        let text = "   Energies (kJ/mol)\n           Bond\n    1.00000e+00";
        let mut store = RecordStore::new();
        let mut parser = GromacsLogParser::new();
        parser.feed(lines(text), &mut store);
        assert_eq!(store.latest("BOND"), None);

        parser.finish(&mut store);
        assert_eq!(store.latest("BOND"), Some("1.00000e+00"));
    }

    #[test]
    fn step_header_without_numbers_is_skipped() {
        let text = "Step Time\nnot numbers here\nStep Time\n 50 0.1\n";
        let mut store = RecordStore::new();
        GromacsLogParser::new().feed(lines(text), &mut store);
        assert_eq!(store.series("STEP").unwrap(), &["50"]);
    }

    #[test]
    fn malformed_block_is_skipped() {
        let text = "   Energies (kJ/mol)\n    Bond   Angle\n     1.0    ****\n\n";
        let mut store = RecordStore::new();
        GromacsLogParser::new().feed(lines(text), &mut store);
        assert!(store.is_empty());
    }
}
