use crate::core::models::protocol::{
    Equilibration, FreeEnergy, PerturbationType, Production, Protocol, ProtocolKind, Restraint,
    RestraintSelection,
};
use crate::core::models::system::SystemDescription;
use crate::engine::error::EngineError;
use crate::engine::observable::Engine;
use tracing::warn;

/// `gmx` compressibility of water, bar⁻¹.
const WATER_COMPRESSIBILITY: f64 = 4.5e-5;
const BAR_PER_ATM: f64 = 1.01325;

fn directive(key: &str, value: impl std::fmt::Display) -> String {
    format!("{} = {}", key, value)
}

/// Index group that `gmx genrestr` should restrain for `restraint`.
///
/// # Errors
///
/// Explicit atom lists cannot be expressed as a `genrestr` group and yield
/// [`EngineError::InvalidRestraint`].
pub fn restraint_group(restraint: &Restraint) -> Result<&'static str, EngineError> {
    match restraint.selection {
        RestraintSelection::Backbone => Ok("Backbone"),
        RestraintSelection::Heavy => Ok("Protein-H"),
        RestraintSelection::All => Ok("System"),
        RestraintSelection::Atoms(_) => Err(EngineError::InvalidRestraint(
            "GROMACS restraints must name an index group; explicit atom lists are not supported"
                .to_string(),
        )),
    }
}

/// Builds the `.mdp` lines for `protocol`.
///
/// Nothing is written to disk; the caller persists the lines once generation
/// succeeds.
pub fn generate(
    protocol: &Protocol,
    system: &SystemDescription,
    seed: Option<u64>,
) -> Result<Vec<String>, EngineError> {
    protocol.validate()?;
    if !system.has_box() {
        warn!("No simulation box found. Assuming gas phase simulation.");
    }

    let mut config = Vec::new();
    match protocol {
        Protocol::Minimisation(p) => {
            config.push(directive("integrator", "steep"));
            config.push(directive("nsteps", p.steps));
            config.push(directive("nstxout", p.steps));
            push_nonbonded(&mut config, system);
        }
        Protocol::Equilibration(p) => {
            push_equilibration(&mut config, p, system, seed)?;
        }
        Protocol::Production(p) => {
            push_production(&mut config, p, system, seed, ProtocolKind::Production)?;
        }
        Protocol::FreeEnergy(p) => {
            push_free_energy(&mut config, p, system, seed)?;
        }
        Protocol::Custom(lines) => {
            config.extend(lines.iter().cloned());
        }
    }
    if let Some(restraint) = protocol.restraint() {
        restraint_group(restraint)?;
    }
    Ok(config)
}

fn push_nonbonded(config: &mut Vec<String>, system: &SystemDescription) {
    config.push(directive("cutoff-scheme", "Verlet"));
    config.push(directive("ns-type", "grid"));
    if system.has_box() {
        config.push(directive("pbc", "xyz"));
    }
    config.push(directive("coulombtype", "PME"));
    config.push(directive("DispCorr", "EnerPres"));
}

struct Dynamics {
    timestep_fs: f64,
    steps: u64,
    report_interval: u64,
    restart_interval: u64,
}

fn push_dynamics(config: &mut Vec<String>, d: &Dynamics, seed: Option<u64>) {
    config.push(directive("integrator", "md"));
    config.push(directive("dt", d.timestep_fs / 1000.0));
    config.push(directive("nsteps", d.steps));
    config.push(directive("nstlog", d.report_interval));
    config.push(directive("nstenergy", d.report_interval));
    config.push(directive("nstcalcenergy", d.report_interval));
    config.push(directive("nstxout", d.restart_interval));
    config.push(directive("nstvout", d.restart_interval));
    config.push(directive("constraints", "h-bonds"));
    if let Some(seed) = seed {
        config.push(directive("ld-seed", seed));
    }
}

fn push_thermostat(config: &mut Vec<String>, tau_ps: f64, temperature_k: f64) {
    config.push(directive("tcoupl", "v-rescale"));
    config.push(directive("tc-grps", "System"));
    config.push(directive("tau-t", tau_ps));
    config.push(directive("ref-t", temperature_k));
}

fn push_barostat(
    config: &mut Vec<String>,
    pressure_atm: Option<f64>,
    restrained: bool,
    system: &SystemDescription,
    kind: ProtocolKind,
) -> Result<(), EngineError> {
    let Some(pressure) = pressure_atm else {
        return Ok(());
    };
    if !system.has_box() {
        return Err(EngineError::unsupported_because(
            Engine::Gromacs,
            kind,
            "pressure control requires a periodic box",
        ));
    }
    config.push(directive("pcoupl", "C-rescale"));
    config.push(directive("pcoupltype", "isotropic"));
    config.push(directive("tau-p", 1.0));
    config.push(directive("ref-p", pressure * BAR_PER_ATM));
    config.push(directive("compressibility", WATER_COMPRESSIBILITY));
    if restrained {
        config.push(directive("refcoord-scaling", "com"));
    }
    Ok(())
}

fn push_velocities(
    config: &mut Vec<String>,
    generate: bool,
    temperature_k: f64,
    seed: Option<u64>,
) {
    if generate {
        config.push(directive("gen-vel", "yes"));
        config.push(directive("gen-temp", temperature_k));
        config.push(directive(
            "gen-seed",
            seed.map_or_else(|| "-1".to_string(), |s| s.to_string()),
        ));
    } else {
        config.push(directive("gen-vel", "no"));
    }
}

fn push_equilibration(
    config: &mut Vec<String>,
    p: &Equilibration,
    system: &SystemDescription,
    seed: Option<u64>,
) -> Result<(), EngineError> {
    let dynamics = Dynamics {
        timestep_fs: p.timestep_fs,
        steps: p.steps(),
        report_interval: p.report_interval,
        restart_interval: p.restart_interval,
    };
    push_dynamics(config, &dynamics, seed);
    push_nonbonded(config, system);
    push_thermostat(
        config,
        p.thermostat_time_constant_ps,
        p.temperature_end_k,
    );

    if !p.is_constant_temperature() {
        let runtime_ps = p.runtime_ns * 1000.0;
        config.push(directive("annealing", "single"));
        config.push(directive("annealing-npoints", 2));
        config.push(directive("annealing-time", format!("0 {}", runtime_ps)));
        config.push(directive(
            "annealing-temp",
            format!("{} {}", p.temperature_start_k, p.temperature_end_k),
        ));
    }

    push_barostat(
        config,
        p.pressure_atm,
        p.restraint.is_some(),
        system,
        ProtocolKind::Equilibration,
    )?;
    push_velocities(config, !system.has_velocities, p.temperature_start_k, seed);
    Ok(())
}

fn push_production(
    config: &mut Vec<String>,
    p: &Production,
    system: &SystemDescription,
    seed: Option<u64>,
    kind: ProtocolKind,
) -> Result<(), EngineError> {
    let dynamics = Dynamics {
        timestep_fs: p.timestep_fs,
        steps: p.steps(),
        report_interval: p.report_interval,
        restart_interval: p.restart_interval,
    };
    push_dynamics(config, &dynamics, seed);
    push_nonbonded(config, system);
    push_thermostat(config, p.thermostat_time_constant_ps, p.temperature_k);
    push_barostat(config, p.pressure_atm, p.restraint.is_some(), system, kind)?;

    if p.restart {
        config.push(directive("continuation", "yes"));
        config.push(directive("gen-vel", "no"));
    } else {
        push_velocities(config, !system.has_velocities, p.temperature_k, seed);
    }
    Ok(())
}

fn push_free_energy(
    config: &mut Vec<String>,
    p: &FreeEnergy,
    system: &SystemDescription,
    seed: Option<u64>,
) -> Result<(), EngineError> {
    if p.perturbation != PerturbationType::Full {
        return Err(EngineError::unsupported_because(
            Engine::Gromacs,
            ProtocolKind::FreeEnergy,
            format!("perturbation type '{}'", p.perturbation),
        ));
    }
    push_production(config, &p.dynamics, system, seed, ProtocolKind::FreeEnergy)?;

    let lambdas = p
        .schedule
        .values()
        .iter()
        .map(|l| format!("{:.4}", l))
        .collect::<Vec<_>>()
        .join(" ");
    config.push(directive("free-energy", "yes"));
    config.push(directive("init-lambda-state", p.lambda_index()?));
    config.push(directive("fep-lambdas", lambdas));
    config.push(directive("calc-lambda-neighbors", -1));
    config.push(directive("nstdhdl", p.dynamics.report_interval));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::protocol::{LambdaSchedule, Minimisation};
    use crate::core::models::system::{Molecule, MoleculeKind};
    use nalgebra::Vector3;

    fn solvated() -> SystemDescription {
        SystemDescription {
            molecules: vec![
                Molecule {
                    name: "Protein".into(),
                    num_atoms: 100,
                    kind: MoleculeKind::Solute,
                    first_atom: Some(0),
                },
                Molecule {
                    name: "SOL".into(),
                    num_atoms: 3,
                    kind: MoleculeKind::Water,
                    first_atom: Some(100),
                },
            ],
            box_angstrom: Some(Vector3::new(40.0, 40.0, 40.0)),
            ..SystemDescription::default()
        }
    }

    fn vacuum() -> SystemDescription {
        SystemDescription {
            box_angstrom: None,
            ..solvated()
        }
    }

    fn has(config: &[String], line: &str) -> bool {
        config.iter().any(|l| l == line)
    }

    #[test]
    fn minimisation_matches_expected_directives() {
        let protocol = Protocol::Minimisation(Minimisation {
            steps: 500,
            ..Minimisation::default()
        });
        let config = generate(&protocol, &solvated(), None).unwrap();
        assert_eq!(
            config,
            vec![
                "integrator = steep",
                "nsteps = 500",
                "nstxout = 500",
                "cutoff-scheme = Verlet",
                "ns-type = grid",
                "pbc = xyz",
                "coulombtype = PME",
                "DispCorr = EnerPres",
            ]
        );
    }

    #[test]
    fn minimisation_without_box_omits_pbc() {
        let config = generate(
            &Protocol::Minimisation(Minimisation::default()),
            &vacuum(),
            Some(7),
        )
        .unwrap();
        assert!(!config.iter().any(|l| l.starts_with("pbc")));
        assert!(!config.iter().any(|l| l.starts_with("ld-seed")));
    }

    #[test]
    fn heating_equilibration_uses_annealing() {
        let protocol = Protocol::Equilibration(Equilibration {
            runtime_ns: 0.1,
            temperature_start_k: 100.0,
            temperature_end_k: 300.0,
            ..Equilibration::default()
        });
        let config = generate(&protocol, &solvated(), Some(42)).unwrap();
        assert!(has(&config, "integrator = md"));
        assert!(has(&config, "dt = 0.002"));
        assert!(has(&config, "nsteps = 50000"));
        assert!(has(&config, "tcoupl = v-rescale"));
        assert!(has(&config, "annealing = single"));
        assert!(has(&config, "annealing-time = 0 100"));
        assert!(has(&config, "annealing-temp = 100 300"));
        assert!(has(&config, "gen-vel = yes"));
        assert!(has(&config, "gen-temp = 100"));
        assert!(has(&config, "gen-seed = 42"));
        assert!(has(&config, "ld-seed = 42"));
        assert!(!config.iter().any(|l| l.starts_with("pcoupl")));
    }

    #[test]
    fn pressure_requires_a_box() {
        let protocol = Protocol::Equilibration(Equilibration {
            pressure_atm: Some(1.0),
            ..Equilibration::default()
        });
        let config = generate(&protocol, &solvated(), None).unwrap();
        assert!(has(&config, "pcoupl = C-rescale"));
        assert!(has(&config, "ref-p = 1.01325"));

        assert!(matches!(
            generate(&protocol, &vacuum(), None),
            Err(EngineError::UnsupportedProtocol { .. })
        ));
    }

    #[test]
    fn production_restart_continues() {
        let protocol = Protocol::Production(Production {
            restart: true,
            ..Production::default()
        });
        let config = generate(&protocol, &solvated(), None).unwrap();
        assert!(has(&config, "continuation = yes"));
        assert!(has(&config, "gen-vel = no"));
        assert!(has(&config, "nsteps = 500000"));
    }

    #[test]
    fn free_energy_adds_lambda_directives() {
        let protocol = Protocol::FreeEnergy(FreeEnergy {
            lambda: 0.5,
            schedule: LambdaSchedule::linear(0.0, 1.0, 5).unwrap(),
            ..FreeEnergy::default()
        });
        let config = generate(&protocol, &solvated(), None).unwrap();
        assert!(has(&config, "free-energy = yes"));
        assert!(has(&config, "init-lambda-state = 2"));
        assert!(has(
            &config,
            "fep-lambdas = 0.0000 0.2500 0.5000 0.7500 1.0000"
        ));
        assert!(has(&config, "nstdhdl = 200"));
    }

    #[test]
    fn soft_core_perturbations_are_unsupported() {
        let protocol = Protocol::FreeEnergy(FreeEnergy {
            perturbation: PerturbationType::VanishSoft,
            ..FreeEnergy::default()
        });
        let err = generate(&protocol, &solvated(), None).unwrap_err();
        assert!(err.to_string().contains("vanish-soft"));
    }

    #[test]
    fn custom_lines_are_verbatim() {
        let lines = vec!["integrator = sd".to_string(), "; comment".to_string()];
        let config = generate(&Protocol::Custom(lines.clone()), &vacuum(), None).unwrap();
        assert_eq!(config, lines);
    }

    #[test]
    fn atom_list_restraints_are_rejected() {
        let protocol = Protocol::Equilibration(Equilibration {
            restraint: Some(Restraint::new(RestraintSelection::Atoms(vec![1, 2]))),
            ..Equilibration::default()
        });
        assert!(matches!(
            generate(&protocol, &solvated(), None),
            Err(EngineError::InvalidRestraint(_))
        ));
    }

    #[test]
    fn restraint_groups() {
        assert_eq!(
            restraint_group(&Restraint::new(RestraintSelection::Heavy)).unwrap(),
            "Protein-H"
        );
        assert_eq!(
            restraint_group(&Restraint::new(RestraintSelection::All)).unwrap(),
            "System"
        );
    }
}
