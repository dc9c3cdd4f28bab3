use super::canonical::canonical_key;
use super::units::{Quantity, Unit};
use std::collections::HashMap;
use std::io::Write;

/// An append-only, insertion-ordered multi-valued map from canonical record key
/// to the sequence of values printed by an engine.
///
/// Values are kept as the strings the engine printed; numeric decoding happens on
/// read so that a malformed entry only affects the caller that asks for it. Keys
/// passed to any method are run through [`canonical_key`] first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    /// Canonical keys in first-seen order.
    order: Vec<String>,
    /// Accumulated values for each canonical key, in chronological order.
    values: HashMap<String, Vec<String>>,
}

impl RecordStore {
    /// Creates a new, empty record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value under the canonical form of `label`.
    ///
    /// Labels that canonicalize to an empty key are ignored.
    ///
    /// # Arguments
    ///
    /// * `label` - The raw record label.
    /// * `value` - The value as printed by the engine; surrounding whitespace is removed.
    pub fn append(&mut self, label: &str, value: &str) {
        let key = canonical_key(label);
        if key.is_empty() {
            return;
        }
        let value = value.trim().to_string();
        match self.values.get_mut(&key) {
            Some(series) => series.push(value),
            None => {
                self.order.push(key.clone());
                self.values.insert(key, vec![value]);
            }
        }
    }

    /// Returns the most recent raw value recorded for `label`.
    pub fn latest(&self, label: &str) -> Option<&str> {
        self.series(label)
            .and_then(|series| series.last())
            .map(String::as_str)
    }

    /// Returns every raw value recorded for `label`, oldest first.
    pub fn series(&self, label: &str) -> Option<&[String]> {
        self.values.get(&canonical_key(label)).map(Vec::as_slice)
    }

    /// Returns an independent copy of the current contents.
    pub fn snapshot(&self) -> RecordStore {
        self.clone()
    }

    /// Canonical keys in the order they were first observed.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Decodes the most recent value for `label` as a floating point number.
    ///
    /// # Return
    ///
    /// `None` if the key was never observed or the latest value is malformed.
    pub fn latest_value(&self, label: &str) -> Option<f64> {
        self.latest(label).and_then(|raw| raw.parse().ok())
    }

    /// Decodes the most recent value for `label` as an integer step count.
    pub fn latest_step(&self, label: &str) -> Option<u64> {
        self.latest(label).and_then(parse_step)
    }

    /// Decodes the most recent value for `label` and tags it with `unit`.
    pub fn latest_quantity(&self, label: &str, unit: Unit) -> Option<Quantity> {
        self.latest_value(label)
            .map(|value| Quantity::new(value, unit))
    }

    /// Decodes every value for `label` as floating point numbers.
    ///
    /// # Return
    ///
    /// `None` if the key was never observed or any entry is malformed.
    pub fn value_series(&self, label: &str) -> Option<Vec<f64>> {
        self.series(label)?
            .iter()
            .map(|raw| raw.parse().ok())
            .collect()
    }

    /// Decodes every value for `label` as integer step counts.
    pub fn step_series(&self, label: &str) -> Option<Vec<u64>> {
        self.series(label)?
            .iter()
            .map(|raw| parse_step(raw))
            .collect()
    }

    /// Decodes every value for `label` and tags each with `unit`, preserving order.
    pub fn quantity_series(&self, label: &str, unit: Unit) -> Option<Vec<Quantity>> {
        self.value_series(label)
            .map(|values| values.into_iter().map(|v| Quantity::new(v, unit)).collect())
    }

    /// Writes the store as CSV: one column per key, one row per append index.
    ///
    /// Keys with fewer values than the longest series leave trailing cells empty.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.order)?;

        let rows = self.values.values().map(Vec::len).max().unwrap_or(0);
        for row in 0..rows {
            let record = self.order.iter().map(|key| {
                self.values[key]
                    .get(row)
                    .map(String::as_str)
                    .unwrap_or("")
            });
            csv_writer.write_record(record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

fn parse_step(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> RecordStore {
        let mut store = RecordStore::new();
        store.append("Step", "0");
        store.append("Bond", "12.500");
        store.append("Step", "100");
        store.append("Bond", "13.000");
        store
    }

    #[test]
    fn latest_returns_most_recent_append() {
        let store = sample_store();
        assert_eq!(store.latest("BOND"), Some("13.000"));
        assert_eq!(store.latest_step("step"), Some(100));
        assert_eq!(store.latest_value("Bond"), Some(13.0));
    }

    #[test]
    fn lookup_is_insensitive_to_label_formatting() {
        let mut store = RecordStore::new();
        store.append("Pres. DC (bar)", "-253.779");
        assert_eq!(store.latest("PRESDC"), Some("-253.779"));
        assert_eq!(store.latest("pres. dc"), Some("-253.779"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn keys_keep_first_seen_order() {
        let store = sample_store();
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["STEP", "BOND"]);
    }

    #[test]
    fn absent_key_yields_none_in_every_mode() {
        let store = sample_store();
        assert_eq!(store.latest("ANGLE"), None);
        assert_eq!(store.series("ANGLE"), None);
        assert_eq!(store.latest_value("ANGLE"), None);
        assert_eq!(store.latest_step("ANGLE"), None);
        assert_eq!(store.value_series("ANGLE"), None);
        assert_eq!(store.quantity_series("ANGLE", Unit::KJ_PER_MOL), None);
    }

    #[test]
    fn malformed_value_yields_none() {
        let mut store = RecordStore::new();
        store.append("Temperature", "3.00e+02");
        store.append("Temperature", "nan?");
        assert_eq!(store.latest_value("TEMPERATURE"), None);
        assert_eq!(store.value_series("TEMPERATURE"), None);
        assert_eq!(store.series("TEMPERATURE").unwrap().len(), 2);
    }

    #[test]
    fn unit_series_scales_each_value_in_order() {
        let mut store = RecordStore::new();
        for raw in ["1.0", "2.5", "-4.0"] {
            store.append("POTENTIAL", raw);
        }
        let series = store
            .quantity_series("POTENTIAL", Unit::KCAL_PER_MOL)
            .unwrap();
        let scaled: Vec<f64> = series.iter().map(Quantity::base_value).collect();
        assert_eq!(scaled, vec![1.0 * 4.184, 2.5 * 4.184, -4.0 * 4.184]);
        assert!(series.iter().all(|q| q.unit == Unit::KCAL_PER_MOL));
    }

    #[test]
    fn step_series_decodes_integers() {
        let store = sample_store();
        assert_eq!(store.step_series("STEP"), Some(vec![0, 100]));
    }

    #[test]
    fn snapshot_is_independent() {
        let mut store = sample_store();
        let snapshot = store.snapshot();
        store.append("Bond", "14.0");
        assert_eq!(snapshot.latest("BOND"), Some("13.000"));
        assert_eq!(store.latest("BOND"), Some("14.0"));
    }

    #[test]
    fn csv_export_pads_short_series() {
        let mut store = sample_store();
        store.append("Angle", "3.25");
        let mut buffer = Vec::new();
        store.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "STEP,BOND,ANGLE\n0,12.500,3.25\n100,13.000,\n");
    }

    #[test]
    fn empty_labels_are_ignored() {
        let mut store = RecordStore::new();
        store.append("  ", "1.0");
        assert!(store.is_empty());
    }
}
