use super::error::FormatError;
use nalgebra::{Point3, Vector3};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

const FORMAT: &str = "GRO";

#[derive(Debug, Clone, PartialEq)]
pub struct GroAtom {
    pub residue_number: i64,
    pub residue_name: String,
    pub atom_name: String,
    pub position: Point3<f64>,
    pub velocity: Option<Vector3<f64>>,
    /// The atom line exactly as read, used when slicing molecules out of the file.
    pub raw: String,
}

/// A GROMACS `.gro` coordinate file.
///
/// Positions are in nanometers and velocities in nm/ps, as written by GROMACS.
#[derive(Debug, Clone, PartialEq)]
pub struct GroStructure {
    pub title: String,
    pub atoms: Vec<GroAtom>,
    /// Diagonal box edge lengths in nanometers.
    pub box_lengths: Vector3<f64>,
    raw_box_line: String,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_float(line: &str, start: usize, end: usize, line_num: usize) -> Result<f64, FormatError> {
    let field = slice_and_trim(line, start, end);
    field.parse().map_err(|_| {
        FormatError::parse(
            FORMAT,
            line_num,
            format!("invalid float in columns {}-{}: '{}'", start + 1, end, field),
        )
    })
}

impl GroStructure {
    pub fn read_from(reader: &mut impl BufRead) -> Result<Self, FormatError> {
        let mut lines = reader.lines();

        let title = lines
            .next()
            .transpose()?
            .ok_or_else(|| FormatError::parse(FORMAT, 1, "missing title line"))?;
        let count_line = lines
            .next()
            .transpose()?
            .ok_or_else(|| FormatError::parse(FORMAT, 2, "missing atom count line"))?;
        let num_atoms: usize = count_line.trim().parse().map_err(|_| {
            FormatError::parse(FORMAT, 2, format!("invalid atom count '{}'", count_line.trim()))
        })?;

        let mut atoms = Vec::with_capacity(num_atoms);
        for idx in 0..num_atoms {
            let line_num = idx + 3;
            let line = lines.next().transpose()?.ok_or_else(|| {
                FormatError::inconsistent(
                    FORMAT,
                    format!("expected {} atoms but file ended after {}", num_atoms, idx),
                )
            })?;
            if line.len() < 44 {
                return Err(FormatError::parse(
                    FORMAT,
                    line_num,
                    "atom line is too short (must be at least 44 chars)",
                ));
            }

            let residue_number = slice_and_trim(&line, 0, 5).parse().map_err(|_| {
                FormatError::parse(FORMAT, line_num, "invalid residue number in columns 1-5")
            })?;
            let position = Point3::new(
                parse_float(&line, 20, 28, line_num)?,
                parse_float(&line, 28, 36, line_num)?,
                parse_float(&line, 36, 44, line_num)?,
            );
            let velocity = if line.trim_end().len() >= 68 {
                Some(Vector3::new(
                    parse_float(&line, 44, 52, line_num)?,
                    parse_float(&line, 52, 60, line_num)?,
                    parse_float(&line, 60, 68, line_num)?,
                ))
            } else {
                None
            };

            atoms.push(GroAtom {
                residue_number,
                residue_name: slice_and_trim(&line, 5, 10).to_string(),
                atom_name: slice_and_trim(&line, 10, 15).to_string(),
                position,
                velocity,
                raw: line,
            });
        }

        let box_line_num = num_atoms + 3;
        let raw_box_line = lines
            .next()
            .transpose()?
            .ok_or_else(|| FormatError::parse(FORMAT, box_line_num, "missing box line"))?;
        let edges: Vec<f64> = raw_box_line
            .split_whitespace()
            .take(3)
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| FormatError::parse(FORMAT, box_line_num, "invalid box vector"))?;
        if edges.len() != 3 {
            return Err(FormatError::parse(
                FORMAT,
                box_line_num,
                "box line needs at least three values",
            ));
        }

        Ok(Self {
            title,
            atoms,
            box_lengths: Vector3::new(edges[0], edges[1], edges[2]),
            raw_box_line,
        })
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let file = File::open(path)?;
        Self::read_from(&mut BufReader::new(file))
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Whether every atom carries a velocity.
    pub fn has_velocities(&self) -> bool {
        !self.atoms.is_empty() && self.atoms.iter().all(|a| a.velocity.is_some())
    }

    /// Whether the box line describes a non-degenerate periodic box.
    pub fn has_box(&self) -> bool {
        self.box_lengths.iter().all(|&edge| edge > 0.0)
    }

    /// Renders the atoms in `range` as a standalone `.gro` file, keeping the
    /// original atom lines and box line untouched.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Inconsistent`] if the range extends past the last atom.
    pub fn subset_to_string(&self, range: Range<usize>) -> Result<String, FormatError> {
        let atoms = self.atoms.get(range.clone()).ok_or_else(|| {
            FormatError::inconsistent(
                FORMAT,
                format!(
                    "atom range {}..{} exceeds the {} atoms in the file",
                    range.start,
                    range.end,
                    self.atoms.len()
                ),
            )
        })?;

        let mut out = String::new();
        out.push_str(&self.title);
        out.push('\n');
        out.push_str(&format!("{:5}\n", atoms.len()));
        for atom in atoms {
            out.push_str(&atom.raw);
            out.push('\n');
        }
        out.push_str(&self.raw_box_line);
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
Alanine dipeptide in water
    6
    1ACE    CH3    1   1.227   1.295   0.999  0.1227 -0.0580  0.0434
    1ACE      C    2   1.337   1.387   1.049 -0.3456  0.2134  0.1100
    2ALA      N    3   1.318   1.519   1.052  0.0012  0.4401 -0.0990
    3SOL     OW    4   0.126   1.624   1.679  0.0000  0.0000  0.0000
    3SOL    HW1    5   0.190   1.661   1.747  0.1000  0.2000  0.3000
    3SOL    HW2    6   0.177   1.568   1.613 -0.1000 -0.2000 -0.3000
   3.01000   3.02000   3.03000
";

    fn parse(text: &str) -> Result<GroStructure, FormatError> {
        GroStructure::read_from(&mut Cursor::new(text))
    }

    #[test]
    fn reads_atoms_box_and_velocities() {
        let gro = parse(SAMPLE).unwrap();
        assert_eq!(gro.title, "Alanine dipeptide in water");
        assert_eq!(gro.num_atoms(), 6);
        assert_eq!(gro.atoms[0].residue_name, "ACE");
        assert_eq!(gro.atoms[3].atom_name, "OW");
        assert_eq!(gro.atoms[2].residue_number, 2);
        assert!((gro.atoms[1].position.x - 1.337).abs() < 1e-9);
        assert!(gro.has_velocities());
        assert!(gro.has_box());
        assert!((gro.box_lengths.z - 3.03).abs() < 1e-9);
    }

    #[test]
    fn subset_keeps_raw_lines_and_box() {
        let gro = parse(SAMPLE).unwrap();
        let subset = gro.subset_to_string(0..3).unwrap();
        let lines: Vec<&str> = subset.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "    3");
        assert_eq!(lines[2], gro.atoms[0].raw);
        assert_eq!(lines[5], "   3.01000   3.02000   3.03000");
    }

    #[test]
    fn subset_out_of_range_is_rejected() {
        let gro = parse(SAMPLE).unwrap();
        assert!(matches!(
            gro.subset_to_string(4..9),
            Err(FormatError::Inconsistent { .. })
        ));
    }

    #[test]
    fn truncated_file_is_reported() {
        let text = "title\n    3\n    1SOL     OW    1   0.126   1.624   1.679\n";
        assert!(matches!(parse(text), Err(FormatError::Inconsistent { .. })));
    }

    #[test]
    fn positions_without_velocities() {
        let text = "t\n    1\n    1NA      NA    1   0.100   0.200   0.300\n   0.00000   0.00000   0.00000\n";
        let gro = parse(text).unwrap();
        assert!(!gro.has_velocities());
        assert!(!gro.has_box());
    }
}
