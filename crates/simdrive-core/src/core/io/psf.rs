use super::error::FormatError;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Sections NAMD insists on finding in a PSF file, with the title written for
/// an empty placeholder. They have no effect on the dynamics.
const REQUIRED_SECTIONS: [(&str, &str); 3] = [
    ("!NDON", "donors"),
    ("!NACC", "acceptors"),
    ("!NNB", "excluded"),
];

/// Returns `text` with an empty record appended for every required section
/// that is missing.
pub fn patch_required_sections(text: &str) -> String {
    let mut patched = text.to_string();
    for (tag, title) in REQUIRED_SECTIONS {
        if !text.lines().any(|line| line.contains(tag)) {
            debug!("PSF has no {} section; appending an empty one.", tag);
            if !patched.is_empty() && !patched.ends_with('\n') {
                patched.push('\n');
            }
            patched.push_str(&format!("\n{:8} {}: {}\n", 0, tag, title));
        }
    }
    patched
}

/// Applies [`patch_required_sections`] to a PSF file in place.
pub fn patch_file<P: AsRef<Path>>(path: P) -> Result<(), FormatError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let patched = patch_required_sections(&text);
    if patched != text {
        fs::write(path, patched)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_all_missing_sections() {
        let patched = patch_required_sections("PSF\n\n       1 !NTITLE\n");
        assert!(patched.contains("\n       0 !NDON: donors\n"));
        assert!(patched.contains("\n       0 !NACC: acceptors\n"));
        assert!(patched.contains("\n       0 !NNB: excluded\n"));
    }

    #[test]
    fn existing_sections_are_left_alone() {
        let text = "PSF\n\n       2 !NDON: donors\n       0 !NNB\n";
        let patched = patch_required_sections(text);
        assert_eq!(patched.matches("!NDON").count(), 1);
        assert_eq!(patched.matches("!NNB").count(), 1);
        assert_eq!(patched.matches("!NACC").count(), 1);
        assert!(patched.starts_with(text));
    }

    #[test]
    fn complete_file_is_unchanged() {
        let text = "       0 !NDON: donors\n       0 !NACC: acceptors\n       0 !NNB\n";
        assert_eq!(patch_required_sections(text), text);
    }
}
