/// Splits a fixed-width value line into column spans.
///
/// A column ends wherever a non-space character is followed by a space or by the
/// end of the line; the next column starts right after it. Leading padding thus
/// belongs to the column it precedes, which is how GROMACS right-aligns both the
/// labels and the values of its energy tables. The same spans are applied to the
/// label line above the values.
pub fn column_spans(line: &str) -> Vec<(usize, usize)> {
    let bytes = line.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;

    for idx in 0..bytes.len() {
        let closes = bytes[idx] != b' ' && bytes.get(idx + 1).is_none_or(|&next| next == b' ');
        if closes {
            spans.push((start, idx + 1));
            start = idx + 1;
        }
    }

    spans
}

/// The slice of `line` covered by `span`, clipped to the line; empty when the
/// line is shorter than the span's start.
pub fn slice_span(line: &str, (start, end): (usize, usize)) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("")
}
