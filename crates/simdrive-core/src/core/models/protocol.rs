use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const LAMBDA_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Invalid lambda schedule: {0}")]
    LambdaSchedule(String),
    #[error("Lambda value {0} is not part of the lambda schedule")]
    LambdaNotInSchedule(f64),
}

fn ensure_positive(field: &'static str, value: f64) -> Result<(), ProtocolError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ProtocolError::InvalidValue {
            field,
            reason: format!("must be a positive number, got {}", value),
        })
    }
}

fn ensure_nonzero(field: &'static str, value: u64) -> Result<(), ProtocolError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ProtocolError::InvalidValue {
            field,
            reason: "must be greater than zero".to_string(),
        })
    }
}

/// Which atoms a positional restraint applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestraintSelection {
    /// Protein backbone atoms, matched by atom name.
    Backbone,
    /// All non-hydrogen atoms outside water molecules and free ions.
    Heavy,
    /// All atoms outside water molecules and free ions.
    All,
    /// Explicit zero-based atom indices.
    Atoms(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Restraint {
    pub selection: RestraintSelection,
    pub force_constant_kcal_mol_a2: f64,
}

impl Restraint {
    pub const DEFAULT_FORCE_CONSTANT: f64 = 10.0;

    pub fn new(selection: RestraintSelection) -> Self {
        Self {
            selection,
            force_constant_kcal_mol_a2: Self::DEFAULT_FORCE_CONSTANT,
        }
    }

    /// Force constant converted to GROMACS units (kJ mol⁻¹ nm⁻²).
    pub fn force_constant_kj_mol_nm2(&self) -> f64 {
        self.force_constant_kcal_mol_a2 * 4.184 * 100.0
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        ensure_positive("restraint.force_constant", self.force_constant_kcal_mol_a2)?;
        if let RestraintSelection::Atoms(indices) = &self.selection {
            if indices.is_empty() {
                return Err(ProtocolError::InvalidValue {
                    field: "restraint.atoms",
                    reason: "atom index list is empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PerturbationType {
    /// Perturb every term.
    #[default]
    Full,
    DischargeSoft,
    VanishSoft,
    Flip,
    GrowSoft,
    ChargeSoft,
}

impl fmt::Display for PerturbationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Full => "full",
            Self::DischargeSoft => "discharge-soft",
            Self::VanishSoft => "vanish-soft",
            Self::Flip => "flip",
            Self::GrowSoft => "grow-soft",
            Self::ChargeSoft => "charge-soft",
        };
        f.write_str(name)
    }
}

/// Ordered lambda values for an alchemical free-energy calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaSchedule {
    values: Vec<f64>,
}

impl LambdaSchedule {
    /// `num` evenly spaced values from `min` to `max` inclusive.
    pub fn linear(min: f64, max: f64, num: usize) -> Result<Self, ProtocolError> {
        if num < 2 {
            return Err(ProtocolError::LambdaSchedule(
                "at least two lambda values are required".to_string(),
            ));
        }
        if min >= max {
            return Err(ProtocolError::LambdaSchedule(format!(
                "minimum lambda {} must be below maximum {}",
                min, max
            )));
        }
        let step = (max - min) / (num - 1) as f64;
        let values = (0..num).map(|i| min + step * i as f64).collect();
        Self::explicit(values)
    }

    /// An explicit list of values; must be strictly increasing within `[0, 1]`.
    pub fn explicit(values: Vec<f64>) -> Result<Self, ProtocolError> {
        if values.is_empty() {
            return Err(ProtocolError::LambdaSchedule("schedule is empty".to_string()));
        }
        if let Some(v) = values.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(ProtocolError::LambdaSchedule(format!(
                "value {} lies outside [0, 1]",
                v
            )));
        }
        if values.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ProtocolError::LambdaSchedule(
                "values must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn index_of(&self, lambda: f64) -> Option<usize> {
        self.values
            .iter()
            .position(|v| (v - lambda).abs() < LAMBDA_TOLERANCE)
    }
}

impl Default for LambdaSchedule {
    fn default() -> Self {
        let values = (0..11).map(|i| i as f64 / 10.0).collect();
        Self { values }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimisation {
    pub steps: u64,
    pub temperature_k: f64,
}

impl Default for Minimisation {
    fn default() -> Self {
        Self {
            steps: 10_000,
            temperature_k: 300.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Equilibration {
    pub timestep_fs: f64,
    pub runtime_ns: f64,
    pub temperature_start_k: f64,
    pub temperature_end_k: f64,
    /// Target pressure; `None` runs at constant volume.
    pub pressure_atm: Option<f64>,
    pub thermostat_time_constant_ps: f64,
    pub report_interval: u64,
    pub restart_interval: u64,
    pub restraint: Option<Restraint>,
}

impl Default for Equilibration {
    fn default() -> Self {
        Self {
            timestep_fs: 2.0,
            runtime_ns: 0.2,
            temperature_start_k: 300.0,
            temperature_end_k: 300.0,
            pressure_atm: None,
            thermostat_time_constant_ps: 1.0,
            report_interval: 100,
            restart_interval: 500,
            restraint: None,
        }
    }
}

impl Equilibration {
    pub fn is_constant_temperature(&self) -> bool {
        (self.temperature_start_k - self.temperature_end_k).abs() < f64::EPSILON
    }

    pub fn steps(&self) -> u64 {
        steps_for(self.runtime_ns, self.timestep_fs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Production {
    pub timestep_fs: f64,
    pub runtime_ns: f64,
    pub temperature_k: f64,
    pub pressure_atm: Option<f64>,
    pub thermostat_time_constant_ps: f64,
    pub report_interval: u64,
    pub restart_interval: u64,
    /// Whether this run continues a previous simulation.
    pub restart: bool,
    pub restraint: Option<Restraint>,
}

impl Default for Production {
    fn default() -> Self {
        Self {
            timestep_fs: 2.0,
            runtime_ns: 1.0,
            temperature_k: 300.0,
            pressure_atm: Some(1.0),
            thermostat_time_constant_ps: 1.0,
            report_interval: 100,
            restart_interval: 100,
            restart: false,
            restraint: None,
        }
    }
}

impl Production {
    pub fn steps(&self) -> u64 {
        steps_for(self.runtime_ns, self.timestep_fs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeEnergy {
    pub dynamics: Production,
    pub lambda: f64,
    pub schedule: LambdaSchedule,
    pub perturbation: PerturbationType,
}

impl Default for FreeEnergy {
    fn default() -> Self {
        Self {
            dynamics: Production {
                runtime_ns: 4.0,
                report_interval: 200,
                restart_interval: 1000,
                ..Production::default()
            },
            lambda: 0.0,
            schedule: LambdaSchedule::default(),
            perturbation: PerturbationType::Full,
        }
    }
}

impl FreeEnergy {
    /// Index of [`lambda`](Self::lambda) within the schedule.
    pub fn lambda_index(&self) -> Result<usize, ProtocolError> {
        self.schedule
            .index_of(self.lambda)
            .ok_or(ProtocolError::LambdaNotInSchedule(self.lambda))
    }
}

fn steps_for(runtime_ns: f64, timestep_fs: f64) -> u64 {
    (runtime_ns * 1.0e6 / timestep_fs).ceil() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Minimisation,
    Equilibration,
    Production,
    FreeEnergy,
    Custom,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Minimisation => "minimisation",
            Self::Equilibration => "equilibration",
            Self::Production => "production",
            Self::FreeEnergy => "free-energy",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// The simulation a caller wants an engine to run. Read-only once handed to a
/// simulation object.
#[derive(Debug, Clone, PartialEq)]
pub enum Protocol {
    Minimisation(Minimisation),
    Equilibration(Equilibration),
    Production(Production),
    FreeEnergy(FreeEnergy),
    /// Engine-native configuration lines used verbatim.
    Custom(Vec<String>),
}

impl Protocol {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            Self::Minimisation(_) => ProtocolKind::Minimisation,
            Self::Equilibration(_) => ProtocolKind::Equilibration,
            Self::Production(_) => ProtocolKind::Production,
            Self::FreeEnergy(_) => ProtocolKind::FreeEnergy,
            Self::Custom(_) => ProtocolKind::Custom,
        }
    }

    /// The restraint requested by the protocol, if any.
    pub fn restraint(&self) -> Option<&Restraint> {
        match self {
            Self::Equilibration(p) => p.restraint.as_ref(),
            Self::Production(p) => p.restraint.as_ref(),
            Self::FreeEnergy(p) => p.dynamics.restraint.as_ref(),
            Self::Minimisation(_) | Self::Custom(_) => None,
        }
    }

    /// Number of integration (or minimisation) steps the protocol asks for.
    pub fn total_steps(&self) -> Option<u64> {
        match self {
            Self::Minimisation(p) => Some(p.steps),
            Self::Equilibration(p) => Some(p.steps()),
            Self::Production(p) => Some(p.steps()),
            Self::FreeEnergy(p) => Some(p.dynamics.steps()),
            Self::Custom(_) => None,
        }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::Minimisation(p) => {
                ensure_nonzero("steps", p.steps)?;
                ensure_positive("temperature", p.temperature_k)
            }
            Self::Equilibration(p) => {
                ensure_positive("timestep", p.timestep_fs)?;
                ensure_positive("runtime", p.runtime_ns)?;
                ensure_positive("temperature_start", p.temperature_start_k)?;
                ensure_positive("temperature_end", p.temperature_end_k)?;
                ensure_positive("thermostat_time_constant", p.thermostat_time_constant_ps)?;
                if let Some(pressure) = p.pressure_atm {
                    ensure_positive("pressure", pressure)?;
                }
                ensure_nonzero("report_interval", p.report_interval)?;
                ensure_nonzero("restart_interval", p.restart_interval)?;
                p.restraint.as_ref().map_or(Ok(()), Restraint::validate)
            }
            Self::Production(p) => validate_production(p),
            Self::FreeEnergy(p) => {
                validate_production(&p.dynamics)?;
                if !(0.0..=1.0).contains(&p.lambda) {
                    return Err(ProtocolError::InvalidValue {
                        field: "lambda",
                        reason: format!("must lie in [0, 1], got {}", p.lambda),
                    });
                }
                p.lambda_index().map(|_| ())
            }
            Self::Custom(lines) => {
                if lines.iter().all(|l| l.trim().is_empty()) {
                    Err(ProtocolError::InvalidValue {
                        field: "config",
                        reason: "custom configuration is empty".to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}

fn validate_production(p: &Production) -> Result<(), ProtocolError> {
    ensure_positive("timestep", p.timestep_fs)?;
    ensure_positive("runtime", p.runtime_ns)?;
    ensure_positive("temperature", p.temperature_k)?;
    ensure_positive("thermostat_time_constant", p.thermostat_time_constant_ps)?;
    if let Some(pressure) = p.pressure_atm {
        ensure_positive("pressure", pressure)?;
    }
    ensure_nonzero("report_interval", p.report_interval)?;
    ensure_nonzero("restart_interval", p.restart_interval)?;
    p.restraint.as_ref().map_or(Ok(()), Restraint::validate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_round_up_to_cover_runtime() {
        let eq = Equilibration {
            runtime_ns: 0.0011,
            timestep_fs: 2.0,
            ..Equilibration::default()
        };
        assert_eq!(eq.steps(), 550);
        let eq = Equilibration {
            runtime_ns: 0.001,
            timestep_fs: 3.0,
            ..Equilibration::default()
        };
        assert_eq!(eq.steps(), 334);
    }

    #[test]
    fn linear_schedule_is_evenly_spaced() {
        let schedule = LambdaSchedule::linear(0.0, 1.0, 5).unwrap();
        assert_eq!(schedule.values(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(schedule.index_of(0.75), Some(3));
        assert_eq!(schedule.index_of(0.3), None);
    }

    #[test]
    fn explicit_schedule_is_validated() {
        assert!(LambdaSchedule::explicit(vec![0.0, 0.5, 0.4]).is_err());
        assert!(LambdaSchedule::explicit(vec![0.0, 1.5]).is_err());
        assert!(LambdaSchedule::explicit(vec![]).is_err());
        assert!(LambdaSchedule::linear(1.0, 0.0, 3).is_err());
        assert!(LambdaSchedule::linear(0.0, 1.0, 1).is_err());
    }

    #[test]
    fn free_energy_lambda_must_be_on_schedule() {
        let fe = FreeEnergy {
            lambda: 0.35,
            ..FreeEnergy::default()
        };
        assert_eq!(
            Protocol::FreeEnergy(fe).validate(),
            Err(ProtocolError::LambdaNotInSchedule(0.35))
        );
        let fe = FreeEnergy {
            lambda: 0.3,
            ..FreeEnergy::default()
        };
        assert_eq!(fe.lambda_index(), Ok(3));
        assert!(Protocol::FreeEnergy(fe).validate().is_ok());
    }

    #[test]
    fn free_energy_defaults_match_long_production() {
        let fe = FreeEnergy::default();
        assert_eq!(fe.dynamics.runtime_ns, 4.0);
        assert_eq!(fe.dynamics.report_interval, 200);
        assert_eq!(fe.schedule.values().len(), 11);
        assert_eq!(Protocol::FreeEnergy(fe).total_steps(), Some(2_000_000));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let min = Protocol::Minimisation(Minimisation {
            steps: 0,
            ..Minimisation::default()
        });
        assert!(matches!(
            min.validate(),
            Err(ProtocolError::InvalidValue { field: "steps", .. })
        ));

        let eq = Protocol::Equilibration(Equilibration {
            restraint: Some(Restraint::new(RestraintSelection::Atoms(vec![]))),
            ..Equilibration::default()
        });
        assert!(eq.validate().is_err());

        assert!(Protocol::Custom(vec!["  ".into()]).validate().is_err());
    }

    #[test]
    fn force_constant_converts_to_gromacs_units() {
        let restraint = Restraint::new(RestraintSelection::Backbone);
        assert!((restraint.force_constant_kj_mol_nm2() - 4184.0).abs() < 1e-9);
    }

    #[test]
    fn perturbation_type_deserializes_from_kebab_case() {
        use serde::de::IntoDeserializer;
        use serde::de::value::{Error, StrDeserializer};

        let de: StrDeserializer<'_, Error> = "grow-soft".into_deserializer();
        assert_eq!(
            PerturbationType::deserialize(de).unwrap(),
            PerturbationType::GrowSoft
        );
        assert_eq!(PerturbationType::DischargeSoft.to_string(), "discharge-soft");
    }
}
