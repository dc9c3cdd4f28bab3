use super::LogParser;
use crate::core::records::RecordStore;
use tracing::debug;

/// Incremental parser for NAMD standard output.
///
/// `ETITLE:` lines name the columns of the `ENERGY:` lines that follow them.
/// The `TS` column is stored under `STEP`. `TIMING:` lines update the estimate of
/// the time left.
#[derive(Debug, Clone, Default)]
pub struct NamdLogParser {
    titles: Vec<String>,
    eta_minutes: Option<f64>,
}

impl NamdLogParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogParser for NamdLogParser {
    fn feed(&mut self, lines: Vec<String>, store: &mut RecordStore) {
        for line in &lines {
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("ETITLE:") => {
                    self.titles = tokens.map(str::to_string).collect();
                }
                Some("ENERGY:") => {
                    let values: Vec<&str> = tokens.collect();
                    if values.len() != self.titles.len() {
                        debug!(
                            "Skipping NAMD energy line with {} values for {} titles.",
                            values.len(),
                            self.titles.len()
                        );
                        continue;
                    }
                    for (title, value) in self.titles.iter().zip(values) {
                        let key = if title == "TS" { "STEP" } else { title.as_str() };
                        store.append(key, value);
                    }
                }
                Some("TIMING:") => {
                    let tokens: Vec<&str> = tokens.collect();
                    self.eta_minutes = tokens
                        .iter()
                        .position(|&t| t == "hours")
                        .and_then(|idx| idx.checked_sub(1))
                        .and_then(|idx| tokens[idx].parse::<f64>().ok())
                        .map(|hours| hours * 60.0);
                }
                _ => {}
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Minutes remaining according to the most recent `TIMING:` line.
    fn eta_minutes(&self) -> Option<f64> {
        self.eta_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
Info: NAMD 2.14 for Linux-x86_64-multicore
ETITLE:      TS           BOND          ANGLE          DIHED          IMPRP               ELECT            VDW       BOUNDARY           MISC        KINETIC               TOTAL           TEMP      POTENTIAL         TOTAL3        TEMPAVG
ENERGY:       0       412.3961      1200.1150      1611.0983        80.6493         -14563.6127      1110.6226         0.0000         0.0000         0.0000         -10148.7314         0.0000    -10148.7314    -10148.7314         0.0000
TIMING: 500  CPU: 12.34, 0.0236/step  Wall: 12.5, 0.0241/step, 0.25 hours remaining, 320.5 MB of memory in use.
ENERGY:     500       390.0000      1190.0000      1600.0000        80.0000         -14600.0000      1100.0000         0.0000         0.0000       150.0000         -10000.0000       300.0000    -10150.0000    -10000.0000       299.0000
ENERGY:     600 truncated
";

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn energy_lines_follow_titles() {
        let mut store = RecordStore::new();
        let mut parser = NamdLogParser::new();
        parser.feed(lines(OUTPUT), &mut store);

        assert_eq!(store.series("STEP").unwrap(), &["0", "500"]);
        assert_eq!(store.series("TS"), None);
        assert_eq!(store.latest("BOND"), Some("390.0000"));
        assert_eq!(store.latest("temp"), Some("300.0000"));
        assert_eq!(store.series("TEMPAVG").unwrap().len(), 2);
    }

    #[test]
    fn eta_comes_from_hours_remaining() {
        let mut store = RecordStore::new();
        let mut parser = NamdLogParser::new();
        assert_eq!(parser.eta_minutes(), None);
        parser.feed(lines(OUTPUT), &mut store);
        assert_eq!(parser.eta_minutes(), Some(15.0));
    }

    #[test]
    fn energy_before_titles_is_ignored() {
        let mut store = RecordStore::new();
        NamdLogParser::new().feed(lines("ENERGY: 0 1.0 2.0\n"), &mut store);
        assert!(store.is_empty());
    }

    #[test]
    fn timing_without_hours_clears_estimate() {
        let mut store = RecordStore::new();
        let mut parser = NamdLogParser::new();
        parser.feed(lines(OUTPUT), &mut store);
        parser.feed(lines("TIMING: 1000  CPU: 20.0\n"), &mut store);
        assert_eq!(parser.eta_minutes(), None);
    }
}
