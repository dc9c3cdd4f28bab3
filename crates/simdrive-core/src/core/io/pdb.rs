use super::error::FormatError;
use nalgebra::{Point3, Vector3};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const FORMAT: &str = "PDB";

#[derive(Debug, Clone, PartialEq)]
pub struct PdbAtom {
    pub serial: usize,
    pub name: String,
    pub residue_name: String,
    pub chain_id: char,
    pub residue_number: i64,
    pub position: Point3<f64>,
    pub raw: String,
}

impl PdbAtom {
    /// Whether the atom is a hydrogen, judged from the element column or the atom name.
    pub fn is_hydrogen(&self) -> bool {
        let element = self.raw.get(76..78).map(str::trim).unwrap_or("");
        if !element.is_empty() {
            return element.eq_ignore_ascii_case("H");
        }
        self.name
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .starts_with('H')
    }
}

/// ATOM/HETATM records of a PDB file (or a NAMD `.coor` file, which uses the same
/// layout), with the CRYST1 cell when present. Coordinates are in Ångström.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdbStructure {
    pub atoms: Vec<PdbAtom>,
    pub cell: Option<Vector3<f64>>,
    /// Every line of the source, so that derived files can keep non-atom records.
    lines: Vec<String>,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_coord(line: &str, start: usize, end: usize, line_num: usize) -> Result<f64, FormatError> {
    let field = slice_and_trim(line, start, end);
    field.parse().map_err(|_| {
        FormatError::parse(
            FORMAT,
            line_num,
            format!("invalid float in columns {}-{}: '{}'", start + 1, end, field),
        )
    })
}

impl PdbStructure {
    pub fn read_from(reader: &mut impl BufRead) -> Result<Self, FormatError> {
        let mut structure = PdbStructure::default();

        for (idx, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = idx + 1;
            let record = slice_and_trim(&line, 0, 6);

            match record {
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(FormatError::parse(
                            FORMAT,
                            line_num,
                            "ATOM/HETATM record is too short (must be at least 54 chars)",
                        ));
                    }
                    let serial_str = slice_and_trim(&line, 6, 11);
                    let serial = serial_str.parse().unwrap_or(structure.atoms.len() + 1);
                    let residue_number = slice_and_trim(&line, 22, 26).parse().map_err(|_| {
                        FormatError::parse(FORMAT, line_num, "invalid residue number in columns 23-26")
                    })?;
                    let position = Point3::new(
                        parse_coord(&line, 30, 38, line_num)?,
                        parse_coord(&line, 38, 46, line_num)?,
                        parse_coord(&line, 46, 54, line_num)?,
                    );
                    structure.atoms.push(PdbAtom {
                        serial,
                        name: slice_and_trim(&line, 12, 16).to_string(),
                        residue_name: slice_and_trim(&line, 17, 21).to_string(),
                        chain_id: line[21..22].chars().next().unwrap_or(' '),
                        residue_number,
                        position,
                        raw: line.clone(),
                    });
                }
                "CRYST1" => {
                    let a = parse_coord(&line, 6, 15, line_num)?;
                    let b = parse_coord(&line, 15, 24, line_num)?;
                    let c = parse_coord(&line, 24, 33, line_num)?;
                    if a > 1.0 && b > 1.0 && c > 1.0 {
                        structure.cell = Some(Vector3::new(a, b, c));
                    }
                }
                _ => {}
            }
            structure.lines.push(line);
        }

        Ok(structure)
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let file = File::open(path)?;
        Self::read_from(&mut BufReader::new(file))
    }

    /// Axis-aligned bounding box of all atoms as `(min, max)` corners.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.atoms.first()?.position;
        Some(self.atoms.iter().fold((first, first), |(min, max), atom| {
            (min.inf(&atom.position), max.sup(&atom.position))
        }))
    }

    /// Renders the file with the occupancy column (55-60) set to `1.00` for atoms
    /// whose flag is true and `0.00` otherwise. NAMD reads such a file to select
    /// fixed atoms. Non-atom records are copied unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Inconsistent`] if `flags` does not cover every atom.
    pub fn render_with_occupancy(&self, flags: &[bool]) -> Result<String, FormatError> {
        if flags.len() != self.atoms.len() {
            return Err(FormatError::inconsistent(
                FORMAT,
                format!(
                    "{} occupancy flags supplied for {} atoms",
                    flags.len(),
                    self.atoms.len()
                ),
            ));
        }

        let mut out = String::new();
        let mut atom_idx = 0;
        for line in &self.lines {
            let record = slice_and_trim(line, 0, 6);
            if record == "ATOM" || record == "HETATM" {
                let occupancy = if flags[atom_idx] { "  1.00" } else { "  0.00" };
                let mut padded = format!("{:<60}", line);
                padded.replace_range(54..60, occupancy);
                out.push_str(padded.trim_end());
                atom_idx += 1;
            } else {
                out.push_str(line);
            }
            out.push('\n');
        }
        Ok(out)
    }
}
