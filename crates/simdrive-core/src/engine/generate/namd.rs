use crate::core::io::pdb::PdbStructure;
use crate::core::models::protocol::{Protocol, RestraintSelection};
use crate::core::models::system::{MoleculeKind, SystemDescription, classify_pdb_atom};
use crate::engine::error::EngineError;
use crate::engine::observable::Engine;
use phf::{Set, phf_set};

/// Minimum box edge (Å) for which an explicit cutoff is used with solvent.
const CUTOFF_MIN_BOX: f64 = 26.0;

static BACKBONE_ATOMS: Set<&'static str> = phf_set! { "N", "CA", "C" };

/// File names the configuration refers to, relative to the work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamdInputs {
    pub name: String,
    /// Whether the parameter file uses the CHARMM format.
    pub charmm_params: bool,
    /// Whether a `<name>.vel` velocity file accompanies the coordinates.
    pub velocities: bool,
}

impl NamdInputs {
    pub fn psf_file(&self) -> String {
        format!("{}.psf", self.name)
    }
    pub fn pdb_file(&self) -> String {
        format!("{}.pdb", self.name)
    }
    pub fn params_file(&self) -> String {
        format!("{}.params", self.name)
    }
    pub fn velocity_file(&self) -> String {
        format!("{}.vel", self.name)
    }
    pub fn restraint_file(&self) -> String {
        format!("{}.restrained", self.name)
    }
    pub fn config_file(&self) -> String {
        format!("{}.namd", self.name)
    }
    pub fn output_name(&self) -> String {
        format!("{}_out", self.name)
    }
}

fn directive(key: &str, value: impl std::fmt::Display) -> String {
    format!("{:<21} {}", key, value)
}

/// Builds the NAMD configuration lines for `protocol`.
///
/// Only minimisation, equilibration and custom protocols are supported.
pub fn generate(
    protocol: &Protocol,
    system: &SystemDescription,
    inputs: &NamdInputs,
    seed: Option<u64>,
) -> Result<Vec<String>, EngineError> {
    protocol.validate()?;
    match protocol {
        Protocol::Custom(lines) => return Ok(lines.clone()),
        Protocol::Production(_) | Protocol::FreeEnergy(_) => {
            return Err(EngineError::unsupported(Engine::Namd, protocol.kind()));
        }
        Protocol::Minimisation(_) | Protocol::Equilibration(_) => {}
    }

    let mut config = Vec::new();

    config.push(directive("structure", inputs.psf_file()));
    config.push(directive("coordinates", inputs.pdb_file()));
    if inputs.velocities {
        config.push(directive("velocities", inputs.velocity_file()));
    }
    if inputs.charmm_params {
        config.push(directive("paraTypeCharmm", "on"));
    }
    config.push(directive("parameters", inputs.params_file()));
    if let Some(seed) = seed {
        config.push(directive("seed", seed));
    }
    config.push(directive("exclude", "scaled1-4"));

    let has_water = system.has_water();
    let box_size = system.box_or_extent();

    if !has_water {
        config.push(directive("cutoff", "999."));
        config.push(directive("zeroMomentum", "yes"));
        config.push(directive("switching", "off"));
    } else if box_size.is_some_and(|b| b.min() > CUTOFF_MIN_BOX) {
        config.push(directive("cutoff", "12."));
        config.push(directive("pairlistdist", "14."));
        config.push(directive("switching", "on"));
        config.push(directive("switchdist", "10."));
    }

    if system.has_box() || has_water {
        if let (Some(b), Some(o)) = (box_size, system.origin_angstrom) {
            config.push(directive("cellBasisVector1", format!("{:.1} 0. 0.", b.x)));
            config.push(directive("cellBasisVector2", format!("0. {:.1} 0.", b.y)));
            config.push(directive("cellBasisVector3", format!("0. 0. {:.1}", b.z)));
            config.push(directive(
                "cellOrigin",
                format!("{:.1} {:.1} {:.1}", o.x, o.y, o.z),
            ));
            config.push(directive("wrapAll", "on"));
            config.push(directive("PME", "yes"));
            config.push(directive("PMEGridSpacing", "1."));
        }
    }

    config.push(directive("outputName", inputs.output_name()));
    config.push(directive("binaryOutput", "no"));
    config.push(directive("binaryRestart", "no"));

    let (restart_freq, energy_freq) = match protocol {
        Protocol::Equilibration(p) => (p.restart_interval, p.report_interval),
        _ => (500, 100),
    };
    config.push(directive("restartfreq", restart_freq));
    config.push(directive("dcdunitcell", "no"));
    config.push(directive("xstFreq", restart_freq));
    config.push(directive("outputEnergies", energy_freq));
    config.push(directive("outputTiming", 1000));

    match protocol {
        Protocol::Minimisation(p) => {
            config.push(directive("temperature", p.temperature_k));
            config.push(directive("minimize", p.steps));
        }
        Protocol::Equilibration(p) => {
            config.push(directive("set temperature", p.temperature_end_k));
            config.push(directive("temperature", "$temperature"));

            config.push(directive("timestep", format!("{:.1}", p.timestep_fs)));
            config.push(directive("rigidBonds", "all"));
            config.push(directive("nonbondedFreq", 1));
            config.push(directive("fullElectFrequency", 2));

            config.push(directive("langevin", "on"));
            config.push(directive(
                "langevinDamping",
                format!("{:.1}", 1.0 / p.thermostat_time_constant_ps),
            ));
            config.push(directive("langevinTemp", "$temperature"));
            config.push(directive("langevinHydrogen", "no"));

            if let Some(pressure) = p.pressure_atm {
                config.push(directive("langevinPiston", "on"));
                config.push(directive("langevinPistonTarget", pressure * 1.01325));
                config.push(directive("langevinPistonPeriod", "100."));
                config.push(directive("langevinPistonDecay", "50."));
                config.push(directive("langevinPistonTemp", "$temperature"));
                config.push(directive("useGroupPressure", "yes"));
                config.push(directive("useFlexibleCell", "no"));
                config.push(directive("useConstantArea", "no"));
            }

            if p.restraint.is_some() {
                config.push(directive("fixedAtoms", "yes"));
                config.push(directive("fixedAtomsFile", inputs.restraint_file()));
            }

            let steps = p.steps();
            if !p.is_constant_temperature() {
                let delta = (p.temperature_end_k - p.temperature_start_k).abs();
                let freq = ((steps as f64 / delta).floor() as u64).max(1);
                let increment = if p.temperature_end_k > p.temperature_start_k {
                    "1."
                } else {
                    "-1."
                };
                config.push(directive("reassignFreq", freq));
                config.push(directive("reassignTemp", p.temperature_start_k));
                config.push(directive("reassignIncr", increment));
                config.push(directive("reassignHold", p.temperature_end_k));
            }

            config.push(directive("run", steps));
        }
        Protocol::Production(_) | Protocol::FreeEnergy(_) | Protocol::Custom(_) => {}
    }

    Ok(config)
}

/// Per-atom flags marking which atoms of `pdb` are held fixed by `selection`.
///
/// Water and ions are never selected by the named selections.
pub fn restraint_flags(
    pdb: &PdbStructure,
    selection: &RestraintSelection,
) -> Result<Vec<bool>, EngineError> {
    let solute = |idx: usize| classify_pdb_atom(&pdb.atoms[idx]) == MoleculeKind::Solute;
    let n = pdb.atoms.len();
    let flags = match selection {
        RestraintSelection::Backbone => (0..n)
            .map(|i| solute(i) && BACKBONE_ATOMS.contains(pdb.atoms[i].name.as_str()))
            .collect(),
        RestraintSelection::Heavy => (0..n)
            .map(|i| solute(i) && !pdb.atoms[i].is_hydrogen())
            .collect(),
        RestraintSelection::All => (0..n).map(solute).collect(),
        RestraintSelection::Atoms(indices) => {
            let mut flags = vec![false; n];
            for &idx in indices {
                let slot = flags.get_mut(idx).ok_or_else(|| {
                    EngineError::InvalidRestraint(format!(
                        "atom index {} is out of range for {} atoms",
                        idx, n
                    ))
                })?;
                *slot = true;
            }
            flags
        }
    };
    Ok(flags)
}
