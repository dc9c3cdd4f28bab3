use crate::core::io::FormatError;
use crate::core::io::gro::GroStructure;
use crate::core::io::pdb::{PdbAtom, PdbStructure};
use crate::core::io::topology::GroTopology;
use nalgebra::{Point3, Vector3};
use phf::{Set, phf_set};
use std::collections::HashMap;

/// Residue and molecule type names treated as solvent water.
static WATER_NAMES: Set<&'static str> = phf_set! {
    "SOL", "WAT", "HOH", "H2O", "TIP3", "TIP3P", "TIP4", "TIP4P", "TIP5P", "SPC", "SPCE", "T3P", "T4P",
};

/// Residue names of monatomic ions as written by common force fields.
static ION_NAMES: Set<&'static str> = phf_set! {
    "NA", "CL", "K", "MG", "ZN", "LI", "CS", "RB", "BR", "IOD", "SOD", "CLA", "POT", "CAL", "CES", "NA+", "CL-", "K+",
};

pub fn is_water_name(name: &str) -> bool {
    WATER_NAMES.contains(name.trim().to_ascii_uppercase().as_str())
}

pub fn is_ion_name(name: &str) -> bool {
    ION_NAMES.contains(name.trim().to_ascii_uppercase().as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoleculeKind {
    Solute,
    Water,
    Ion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    pub name: String,
    pub num_atoms: usize,
    pub kind: MoleculeKind,
    /// Index of the molecule's first atom in the coordinate file, if it occurs.
    /// Always `None` for GROMACS types defined in an included file.
    pub first_atom: Option<usize>,
}

impl Molecule {
    /// Whether a positional restraint can be generated for this molecule.
    pub fn is_restrainable(&self) -> bool {
        self.kind == MoleculeKind::Solute && self.num_atoms > 1 && self.first_atom.is_some()
    }
}

/// What the configuration generators need to know about a molecular system.
///
/// For GROMACS inputs each [`Molecule`] is a molecule *type* from the topology;
/// for NAMD inputs it is a contiguous run of atoms in the coordinate file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemDescription {
    pub molecules: Vec<Molecule>,
    /// Periodic box edge lengths in Ångström.
    pub box_angstrom: Option<Vector3<f64>>,
    /// Centre of the box (or of the coordinates when there is no box) in Ångström.
    pub origin_angstrom: Option<Point3<f64>>,
    /// Axis-aligned coordinate bounds in Ångström.
    pub bounds_angstrom: Option<(Point3<f64>, Point3<f64>)>,
    pub has_velocities: bool,
}

impl SystemDescription {
    /// Describes a GROMACS system from its topology and coordinate file.
    ///
    /// Molecule types defined in the topology come first, in topology order, so
    /// a molecule's index is also its `[ moleculetype ]` index. Types defined in
    /// included files follow; their size is taken from the residue found at their
    /// first position in the coordinate file, and they are never restrained.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Inconsistent`] if the topology and the coordinates
    /// disagree on the number of atoms.
    pub fn from_gromacs(topology: &GroTopology, gro: &GroStructure) -> Result<Self, FormatError> {
        let mut first_atoms: HashMap<&str, usize> = HashMap::new();
        let mut external_sizes: HashMap<&str, usize> = HashMap::new();
        let mut offset = 0;
        for (name, count) in topology.molecules() {
            let per_molecule = match topology.atoms_per_molecule(name) {
                Some(n) => n,
                None if *count == 0 => 0,
                None => match external_sizes.get(name.as_str()) {
                    Some(n) => *n,
                    None => {
                        let n = residue_length(gro, offset).ok_or_else(|| {
                            FormatError::inconsistent(
                                "GROMACS system",
                                format!(
                                    "coordinate file has no atoms left for molecule type '{}'",
                                    name
                                ),
                            )
                        })?;
                        external_sizes.insert(name.as_str(), n);
                        n
                    }
                },
            };
            if *count > 0 {
                first_atoms.entry(name.as_str()).or_insert(offset);
            }
            offset += count * per_molecule;
        }

        if offset != gro.num_atoms() {
            return Err(FormatError::inconsistent(
                "GROMACS system",
                format!(
                    "topology describes {} atoms but the coordinate file has {}",
                    offset,
                    gro.num_atoms()
                ),
            ));
        }

        let classify = |name: &str, num_atoms: usize, first_atom: Option<usize>| {
            let residues_are_water = first_atom.is_some_and(|start| {
                gro.atoms[start..start + num_atoms]
                    .iter()
                    .all(|a| is_water_name(&a.residue_name))
            });
            if is_water_name(name) || (num_atoms > 0 && residues_are_water) {
                MoleculeKind::Water
            } else if num_atoms == 1 {
                MoleculeKind::Ion
            } else {
                MoleculeKind::Solute
            }
        };

        let mut molecules: Vec<Molecule> = topology
            .molecule_types()
            .iter()
            .map(|block| {
                let first_atom = first_atoms.get(block.name.as_str()).copied();
                Molecule {
                    name: block.name.clone(),
                    num_atoms: block.num_atoms,
                    kind: classify(&block.name, block.num_atoms, first_atom),
                    first_atom,
                }
            })
            .collect();
        for name in topology.external_types() {
            let num_atoms = external_sizes.get(name.as_str()).copied().unwrap_or(0);
            let first_atom = first_atoms.get(name.as_str()).copied();
            molecules.push(Molecule {
                name: name.clone(),
                num_atoms,
                kind: classify(name, num_atoms, first_atom),
                first_atom: None,
            });
        }

        let bounds = gro.atoms.first().map(|first| {
            gro.atoms.iter().fold((first.position, first.position), |(min, max), a| {
                (min.inf(&a.position), max.sup(&a.position))
            })
        });
        let bounds_angstrom = bounds.map(|(min, max)| (min * 10.0, max * 10.0));
        let box_angstrom = gro.has_box().then(|| gro.box_lengths * 10.0);
        let origin_angstrom = box_angstrom
            .map(|b| Point3::from(b / 2.0))
            .or_else(|| bounds_angstrom.map(|(min, max)| nalgebra::center(&min, &max)));

        Ok(Self {
            molecules,
            box_angstrom,
            origin_angstrom,
            bounds_angstrom,
            has_velocities: gro.has_velocities(),
        })
    }

    /// Describes a NAMD system from its PDB coordinates. Consecutive atoms sharing
    /// a chain identifier form one solute molecule; each water residue and each
    /// ion residue is its own molecule.
    pub fn from_pdb(pdb: &PdbStructure, has_velocities: bool) -> Self {
        let mut molecules: Vec<Molecule> = Vec::new();
        let mut previous: Option<&PdbAtom> = None;

        for (idx, atom) in pdb.atoms.iter().enumerate() {
            let kind = classify_pdb_atom(atom);
            let continues = previous.is_some_and(|prev| match kind {
                MoleculeKind::Solute => {
                    classify_pdb_atom(prev) == MoleculeKind::Solute && prev.chain_id == atom.chain_id
                }
                _ => {
                    classify_pdb_atom(prev) == kind
                        && prev.residue_number == atom.residue_number
                        && prev.residue_name == atom.residue_name
                }
            });
            match molecules.last_mut() {
                Some(last) if continues => last.num_atoms += 1,
                _ => molecules.push(Molecule {
                    name: match kind {
                        MoleculeKind::Solute if atom.chain_id != ' ' => atom.chain_id.to_string(),
                        _ => atom.residue_name.clone(),
                    },
                    num_atoms: 1,
                    kind,
                    first_atom: Some(idx),
                }),
            }
            previous = Some(atom);
        }

        let bounds_angstrom = pdb.bounding_box();
        let origin_angstrom = bounds_angstrom.map(|(min, max)| nalgebra::center(&min, &max));

        Self {
            molecules,
            box_angstrom: pdb.cell,
            origin_angstrom,
            bounds_angstrom,
            has_velocities,
        }
    }

    pub fn num_atoms(&self) -> usize {
        self.molecules.iter().map(|m| m.num_atoms).sum()
    }

    pub fn has_water(&self) -> bool {
        self.molecules.iter().any(|m| m.kind == MoleculeKind::Water)
    }

    pub fn has_box(&self) -> bool {
        self.box_angstrom.is_some()
    }

    /// Molecules that receive positional restraints, with their index.
    pub fn restrainable(&self) -> impl Iterator<Item = (usize, &Molecule)> {
        self.molecules
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_restrainable())
    }

    /// The periodic box, or one spanning the coordinates when there is none.
    pub fn box_or_extent(&self) -> Option<Vector3<f64>> {
        self.box_angstrom
            .or_else(|| self.bounds_angstrom.map(|(min, max)| max - min))
    }
}

/// Number of consecutive atoms from `start` sharing the residue of atom `start`.
fn residue_length(gro: &GroStructure, start: usize) -> Option<usize> {
    let first = gro.atoms.get(start)?;
    Some(
        gro.atoms[start..]
            .iter()
            .take_while(|a| {
                a.residue_number == first.residue_number && a.residue_name == first.residue_name
            })
            .count(),
    )
}

pub(crate) fn classify_pdb_atom(atom: &PdbAtom) -> MoleculeKind {
    if is_water_name(&atom.residue_name) {
        MoleculeKind::Water
    } else if is_ion_name(&atom.residue_name) {
        MoleculeKind::Ion
    } else {
        MoleculeKind::Solute
    }
}
