/// Unit suffix removed from the end of a canonical key, e.g. `Pressure (bar)`.
const UNIT_SUFFIX: &str = "BAR";

/// Maps an engine-specific record label onto its canonical key.
///
/// The label is upper-cased and stripped of whitespace, periods, hyphens and
/// parentheses. A trailing `BAR` unit suffix is dropped afterwards, so
/// `"Pres. DC (bar)"`, `"Pres. DC"` and `"PRESDC"` all map to `"PRESDC"`.
///
/// # Arguments
///
/// * `label` - The raw label as printed by the engine or requested by a caller.
///
/// # Return
///
/// The canonical key. An empty string is returned for labels made only of
/// formatting characters.
pub fn canonical_key(label: &str) -> String {
    let key: String = label
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '.' | '-' | '(' | ')'))
        .flat_map(char::to_uppercase)
        .collect();

    match key.strip_suffix(UNIT_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_case_variants_share_a_key() {
        assert_eq!(canonical_key("Pres. DC (bar)"), "PRESDC");
        assert_eq!(canonical_key("Pres. DC"), "PRESDC");
        assert_eq!(canonical_key("PRESDC"), "PRESDC");
        assert_eq!(canonical_key("pres-dc"), "PRESDC");
    }

    #[test]
    fn gromacs_energy_labels_are_canonicalized() {
        assert_eq!(canonical_key("   Proper Dih."), "PROPERDIH");
        assert_eq!(canonical_key("Improper Dih."), "IMPROPERDIH");
        assert_eq!(canonical_key("LJ (SR)"), "LJSR");
        assert_eq!(canonical_key("Coulomb-14"), "COULOMB14");
        assert_eq!(canonical_key("Coul. recip."), "COULRECIP");
        assert_eq!(canonical_key("Kinetic En."), "KINETICEN");
        assert_eq!(canonical_key("Pressure (bar)"), "PRESSURE");
        assert_eq!(canonical_key("Constr. rmsd"), "CONSTRRMSD");
    }

    #[test]
    fn bare_unit_label_is_kept() {
        assert_eq!(canonical_key("bar"), "BAR");
        assert_eq!(canonical_key(" .() "), "");
    }
}
