use super::error::FormatError;
use std::fs;
use std::path::Path;

const FORMAT: &str = "GROMACS topology";

/// One `[ moleculetype ]` block of a GROMACS topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoleculeTypeBlock {
    pub name: String,
    /// Line index of the `[ moleculetype ]` directive.
    pub start: usize,
    /// Line index of the boundary that closes the block (the next
    /// `[ moleculetype ]`, `[ system ]` or `[ molecules ]` directive, or an
    /// `#include` outside any `#ifdef`), or the number of lines when the block
    /// runs to the end of the file.
    pub end: usize,
    /// Number of entries in the block's `[ atoms ]` section.
    pub num_atoms: usize,
}

/// A GROMACS `.top` file, kept line-for-line with an index of its molecule types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroTopology {
    lines: Vec<String>,
    molecule_types: Vec<MoleculeTypeBlock>,
    /// `(molecule type name, count)` pairs from the `[ molecules ]` section.
    molecules: Vec<(String, usize)>,
    /// Molecule types listed in `[ molecules ]` but defined in an `#include`d file.
    external_types: Vec<String>,
}

fn directive_name(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('[')?;
    let close = inner.find(']')?;
    Some(inner[..close].trim().to_ascii_lowercase())
}

fn data_content(line: &str) -> Option<&str> {
    let content = line.split(';').next().unwrap_or("").trim();
    if content.is_empty() || content.starts_with('#') {
        None
    } else {
        Some(content)
    }
}

impl GroTopology {
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        Self::from_lines(lines)
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn from_lines(lines: Vec<String>) -> Result<Self, FormatError> {
        let mut molecule_types: Vec<MoleculeTypeBlock> = Vec::new();
        let mut molecules = Vec::new();
        let mut section = String::new();
        let mut open_block: Option<MoleculeTypeBlock> = None;
        let mut has_includes = false;
        let mut conditional_depth = 0usize;

        for (idx, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("#ifdef") || trimmed.starts_with("#ifndef") || trimmed.starts_with("#if ") {
                conditional_depth += 1;
                continue;
            }
            if trimmed.starts_with("#endif") {
                conditional_depth = conditional_depth.saturating_sub(1);
                continue;
            }
            if trimmed.starts_with("#include") {
                has_includes = true;
                // An unconditional include may define further molecule types, so
                // it ends the current one.
                if conditional_depth == 0 {
                    if let Some(mut block) = open_block.take() {
                        block.end = idx;
                        molecule_types.push(block);
                    }
                }
                continue;
            }
            if let Some(name) = directive_name(line) {
                match name.as_str() {
                    "moleculetype" | "system" | "molecules" => {
                        if let Some(mut block) = open_block.take() {
                            block.end = idx;
                            molecule_types.push(block);
                        }
                        if name == "moleculetype" {
                            open_block = Some(MoleculeTypeBlock {
                                name: String::new(),
                                start: idx,
                                end: idx,
                                num_atoms: 0,
                            });
                        }
                    }
                    _ => {}
                }
                section = name;
                continue;
            }

            let Some(content) = data_content(line) else {
                continue;
            };

            match section.as_str() {
                "moleculetype" => {
                    if let Some(block) = open_block.as_mut() {
                        if block.name.is_empty() {
                            block.name = content
                                .split_whitespace()
                                .next()
                                .unwrap_or_default()
                                .to_string();
                        }
                    }
                }
                "atoms" => {
                    if let Some(block) = open_block.as_mut() {
                        block.num_atoms += 1;
                    }
                }
                "molecules" => {
                    let mut parts = content.split_whitespace();
                    let (Some(name), Some(count)) = (parts.next(), parts.next()) else {
                        return Err(FormatError::parse(
                            FORMAT,
                            idx + 1,
                            "[ molecules ] entry needs a name and a count",
                        ));
                    };
                    let count: usize = count.parse().map_err(|_| {
                        FormatError::parse(
                            FORMAT,
                            idx + 1,
                            format!("invalid molecule count '{}'", count),
                        )
                    })?;
                    molecules.push((name.to_string(), count));
                }
                _ => {}
            }
        }

        if let Some(mut block) = open_block.take() {
            block.end = lines.len();
            molecule_types.push(block);
        }

        if let Some(block) = molecule_types.iter().find(|b| b.name.is_empty()) {
            return Err(FormatError::parse(
                FORMAT,
                block.start + 1,
                "[ moleculetype ] block has no name",
            ));
        }
        let mut external_types: Vec<String> = Vec::new();
        for (name, _) in &molecules {
            if molecule_types.iter().any(|b| &b.name == name) || external_types.contains(name) {
                continue;
            }
            // Force-field water and ion types usually live in included .itp files.
            if !has_includes {
                return Err(FormatError::inconsistent(
                    FORMAT,
                    format!("[ molecules ] references unknown molecule type '{}'", name),
                ));
            }
            external_types.push(name.clone());
        }

        Ok(Self {
            lines,
            molecule_types,
            molecules,
            external_types,
        })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn molecule_types(&self) -> &[MoleculeTypeBlock] {
        &self.molecule_types
    }

    pub fn molecules(&self) -> &[(String, usize)] {
        &self.molecules
    }

    /// Molecule types used in `[ molecules ]` whose definition is not in this
    /// file, in order of first use.
    pub fn external_types(&self) -> &[String] {
        &self.external_types
    }

    /// Atoms in one molecule of type `name`; `None` for types defined elsewhere.
    pub fn atoms_per_molecule(&self, name: &str) -> Option<usize> {
        self.molecule_types
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.num_atoms)
    }

    /// Returns the topology lines with each `(type_index, include_path)` spliced in
    /// as an `#include` directive followed by a blank line, immediately before the
    /// boundary that closes that molecule type's block.
    ///
    /// Every existing line is kept unchanged and in order. Insertion points are
    /// computed against the original line indices, so earlier insertions never
    /// shift later ones.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Inconsistent`] for an unknown type index or a
    /// molecule type listed twice.
    pub fn splice_includes(&self, includes: &[(usize, String)]) -> Result<Vec<String>, FormatError> {
        let mut insertions: Vec<(usize, &str)> = Vec::with_capacity(includes.len());
        for (type_index, path) in includes {
            let block = self.molecule_types.get(*type_index).ok_or_else(|| {
                FormatError::inconsistent(
                    FORMAT,
                    format!("no molecule type with index {}", type_index),
                )
            })?;
            if insertions.iter().any(|(end, _)| *end == block.end) {
                return Err(FormatError::inconsistent(
                    FORMAT,
                    format!("molecule type '{}' already has an include", block.name),
                ));
            }
            insertions.push((block.end, path.as_str()));
        }
        insertions.sort_by_key(|(end, _)| *end);

        let mut out = Vec::with_capacity(self.lines.len() + 2 * insertions.len());
        let mut pending = insertions.into_iter().peekable();
        for (idx, line) in self.lines.iter().enumerate() {
            while let Some((_, path)) = pending.next_if(|(end, _)| *end == idx) {
                out.push(format!("#include \"{}\"", path));
                out.push(String::new());
            }
            out.push(line.clone());
        }
        for (_, path) in pending {
            out.push(format!("#include \"{}\"", path));
            out.push(String::new());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
; generated topology
[ defaults ]
; nbfunc  comb-rule  gen-pairs  fudgeLJ  fudgeQQ
1  2  yes  0.5  0.8333

[ moleculetype ]
; name  nrexcl
LIG  3

[ atoms ]
; nr type resnr res atom cgnr charge mass
1  c3  1  LIG  C1  1  -0.1  12.01
2  hc  1  LIG  H1  2   0.1   1.008

[ bonds ]
1  2  1  0.109  282001.6

[ moleculetype ]
NA  1

[ atoms ]
1  Na+  1  NA  NA  1  1.0  22.99

[ moleculetype ]
SOL  2

[ atoms ]
1  OW  1  SOL  OW  1  -0.834  16.0
2  HW  1  SOL  HW1 1   0.417   1.008
3  HW  1  SOL  HW2 1   0.417   1.008

[ system ]
Ligand in water

[ molecules ]
; name count
LIG  1
NA   2
SOL  10
";

    #[test]
    fn indexes_molecule_type_blocks() {
        let top = GroTopology::parse(SAMPLE).unwrap();
        let types = top.molecule_types();
        assert_eq!(types.len(), 3);
        assert_eq!(types[0].name, "LIG");
        assert_eq!(types[0].num_atoms, 2);
        assert_eq!(types[0].end, types[1].start);
        assert_eq!(types[1].name, "NA");
        assert_eq!(types[2].name, "SOL");
        assert_eq!(types[2].num_atoms, 3);
        assert!(top.lines()[types[2].end].contains("[ system ]"));
        assert_eq!(top.molecules(), &[
            ("LIG".to_string(), 1),
            ("NA".to_string(), 2),
            ("SOL".to_string(), 10)
        ]);
        assert_eq!(top.atoms_per_molecule("SOL"), Some(3));
        assert_eq!(top.atoms_per_molecule("K"), None);
        assert!(top.external_types().is_empty());
    }

    #[test]
    fn included_molecule_types_are_kept_as_external() {
        let text = "\
#include \"amber99sb.ff/forcefield.itp\"

[ moleculetype ]
Protein  3

[ atoms ]
1  N   1  ALA  N   1  -0.4  14.01
2  CA  1  ALA  CA  1   0.4  12.01

#include \"amber99sb.ff/tip3p.itp\"
#include \"amber99sb.ff/ions.itp\"

[ system ]
Protein in water

[ molecules ]
Protein  1
SOL      100
NA       2
SOL      5
";
        let top = GroTopology::parse(text).unwrap();
        assert_eq!(top.molecule_types().len(), 1);
        assert_eq!(top.external_types(), &["SOL".to_string(), "NA".to_string()]);
        assert_eq!(top.atoms_per_molecule("Protein"), Some(2));
        assert_eq!(top.atoms_per_molecule("SOL"), None);
        assert!(top.lines()[top.molecule_types()[0].end].contains("tip3p.itp"));
    }

    #[test]
    fn conditional_include_stays_inside_its_block() {
        let text = "\
[ moleculetype ]
Protein  3

[ atoms ]
1  N   1  ALA  N   1  -0.4  14.01

#ifdef POSRES
#include \"posre.itp\"
#endif

[ moleculetype ]
LIG  3
";
        let top = GroTopology::parse(text).unwrap();
        let types = top.molecule_types();
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].end, types[1].start);
        assert!(top.external_types().is_empty());
    }

    #[test]
    fn splice_inserts_before_each_closing_boundary_only() {
        let top = GroTopology::parse(SAMPLE).unwrap();
        let spliced = top
            .splice_includes(&[(2, "posre_0002.itp".into()), (0, "posre_0001.itp".into())])
            .unwrap();

        let includes: Vec<usize> = spliced
            .iter()
            .enumerate()
            .filter(|(_, l)| l.starts_with("#include"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(includes.len(), 2);
        assert_eq!(spliced[includes[0]], "#include \"posre_0001.itp\"");
        assert_eq!(spliced[includes[0] + 1], "");
        assert_eq!(spliced[includes[0] + 2], "[ moleculetype ]");
        assert_eq!(spliced[includes[0] + 3], "NA  1");
        assert_eq!(spliced[includes[1]], "#include \"posre_0002.itp\"");
        assert_eq!(spliced[includes[1] + 2], "[ system ]");

        let mut without: Vec<String> = spliced.clone();
        for idx in includes.iter().rev() {
            without.drain(*idx..*idx + 2);
        }
        assert_eq!(without, top.lines());
    }

    #[test]
    fn splice_at_end_of_file_appends() {
        let text = "[ moleculetype ]\nLIG 3\n[ atoms ]\n1 c3 1 LIG C1 1 0.0 12.0\n";
        let top = GroTopology::parse(text).unwrap();
        let spliced = top.splice_includes(&[(0, "posre.itp".into())]).unwrap();
        assert_eq!(spliced.len(), 6);
        assert_eq!(spliced[4], "#include \"posre.itp\"");
        assert_eq!(spliced[5], "");
    }

    #[test]
    fn splice_rejects_unknown_or_duplicate_types() {
        let top = GroTopology::parse(SAMPLE).unwrap();
        assert!(top.splice_includes(&[(5, "x.itp".into())]).is_err());
        assert!(top
            .splice_includes(&[(1, "a.itp".into()), (1, "b.itp".into())])
            .is_err());
    }

    #[test]
    fn unknown_molecule_reference_is_rejected() {
        let text = "[ moleculetype ]\nLIG 3\n[ molecules ]\nPROT 1\n";
        assert!(matches!(
            GroTopology::parse(text),
            Err(FormatError::Inconsistent { .. })
        ));
    }
}
