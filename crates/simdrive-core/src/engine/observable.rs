use crate::core::records::units::{Quantity, Unit};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Gromacs,
    Namd,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gromacs => f.write_str("GROMACS"),
            Self::Namd => f.write_str("NAMD"),
        }
    }
}

/// A thermodynamic quantity that an engine reports in its log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Observable {
    Step,
    Time,
    Bond,
    Angle,
    ProperDihedral,
    ImproperDihedral,
    Lj14,
    LjShortRange,
    Coulomb14,
    CoulombShortRange,
    CoulombReciprocal,
    DispersionCorrection,
    PositionRestraint,
    Electrostatic,
    VanDerWaals,
    Boundary,
    Misc,
    Potential,
    Kinetic,
    Total,
    ConservedEnergy,
    Temperature,
    AverageTemperature,
    Pressure,
    AveragePressure,
    PressureDc,
    ConstraintRmsd,
    Volume,
}

impl Observable {
    pub const ALL: [Observable; 28] = [
        Self::Step,
        Self::Time,
        Self::Bond,
        Self::Angle,
        Self::ProperDihedral,
        Self::ImproperDihedral,
        Self::Lj14,
        Self::LjShortRange,
        Self::Coulomb14,
        Self::CoulombShortRange,
        Self::CoulombReciprocal,
        Self::DispersionCorrection,
        Self::PositionRestraint,
        Self::Electrostatic,
        Self::VanDerWaals,
        Self::Boundary,
        Self::Misc,
        Self::Potential,
        Self::Kinetic,
        Self::Total,
        Self::ConservedEnergy,
        Self::Temperature,
        Self::AverageTemperature,
        Self::Pressure,
        Self::AveragePressure,
        Self::PressureDc,
        Self::ConstraintRmsd,
        Self::Volume,
    ];

    /// Canonical record key under which `engine` reports this observable.
    pub fn key(self, engine: Engine) -> Option<&'static str> {
        use Observable::*;
        match engine {
            Engine::Gromacs => match self {
                Step => Some("STEP"),
                Time => Some("TIME"),
                Bond => Some("BOND"),
                Angle => Some("ANGLE"),
                ProperDihedral => Some("PROPERDIH"),
                ImproperDihedral => Some("IMPROPERDIH"),
                Lj14 => Some("LJ14"),
                LjShortRange => Some("LJSR"),
                Coulomb14 => Some("COULOMB14"),
                CoulombShortRange => Some("COULOMBSR"),
                CoulombReciprocal => Some("COULRECIP"),
                DispersionCorrection => Some("DISPERCORR"),
                PositionRestraint => Some("POSITIONREST"),
                Potential => Some("POTENTIAL"),
                Kinetic => Some("KINETICEN"),
                Total => Some("TOTALENERGY"),
                ConservedEnergy => Some("CONSERVEDEN"),
                Temperature => Some("TEMPERATURE"),
                Pressure => Some("PRESSURE"),
                PressureDc => Some("PRESDC"),
                ConstraintRmsd => Some("CONSTRRMSD"),
                Volume => Some("VOLUME"),
                Electrostatic | VanDerWaals | Boundary | Misc | AverageTemperature
                | AveragePressure => None,
            },
            Engine::Namd => match self {
                Step => Some("STEP"),
                Bond => Some("BOND"),
                Angle => Some("ANGLE"),
                ProperDihedral => Some("DIHED"),
                ImproperDihedral => Some("IMPRP"),
                Electrostatic => Some("ELECT"),
                VanDerWaals => Some("VDW"),
                Boundary => Some("BOUNDARY"),
                Misc => Some("MISC"),
                Potential => Some("POTENTIAL"),
                Kinetic => Some("KINETIC"),
                Total => Some("TOTAL"),
                Temperature => Some("TEMP"),
                AverageTemperature => Some("TEMPAVG"),
                Pressure => Some("PRESSURE"),
                AveragePressure => Some("PRESSAVG"),
                Volume => Some("VOLUME"),
                Time | Lj14 | LjShortRange | Coulomb14 | CoulombShortRange | CoulombReciprocal
                | DispersionCorrection | PositionRestraint | ConservedEnergy | PressureDc
                | ConstraintRmsd => None,
            },
        }
    }

    /// Unit the engine prints the value in; `None` for the integer step counter.
    pub fn unit(self, engine: Engine) -> Option<Unit> {
        use Observable::*;
        match self {
            Step => None,
            Time => Some(Unit::PICOSECOND),
            Temperature | AverageTemperature => Some(Unit::KELVIN),
            Pressure | AveragePressure | PressureDc => Some(Unit::BAR),
            ConstraintRmsd => Some(Unit::NANOMETER),
            Volume => Some(match engine {
                Engine::Gromacs => Unit::CUBIC_NANOMETER,
                Engine::Namd => Unit::CUBIC_ANGSTROM,
            }),
            _ => Some(match engine {
                Engine::Gromacs => Unit::KJ_PER_MOL,
                Engine::Namd => Unit::KCAL_PER_MOL,
            }),
        }
    }

    /// Looks an observable up by its snake_case name (`"potential"`,
    /// `"improper_dihedral"`).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|o| o.name() == name.trim().to_ascii_lowercase())
    }

    pub fn name(self) -> &'static str {
        use Observable::*;
        match self {
            Step => "step",
            Time => "time",
            Bond => "bond",
            Angle => "angle",
            ProperDihedral => "proper_dihedral",
            ImproperDihedral => "improper_dihedral",
            Lj14 => "lj14",
            LjShortRange => "lj_short_range",
            Coulomb14 => "coulomb14",
            CoulombShortRange => "coulomb_short_range",
            CoulombReciprocal => "coulomb_reciprocal",
            DispersionCorrection => "dispersion_correction",
            PositionRestraint => "position_restraint",
            Electrostatic => "electrostatic",
            VanDerWaals => "van_der_waals",
            Boundary => "boundary",
            Misc => "misc",
            Potential => "potential",
            Kinetic => "kinetic",
            Total => "total",
            ConservedEnergy => "conserved_energy",
            Temperature => "temperature",
            AverageTemperature => "average_temperature",
            Pressure => "pressure",
            AveragePressure => "average_pressure",
            PressureDc => "pressure_dc",
            ConstraintRmsd => "constraint_rmsd",
            Volume => "volume",
        }
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded record value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Step(u64),
    Quantity(Quantity),
}

impl Reading {
    pub fn as_step(&self) -> Option<u64> {
        match self {
            Self::Step(step) => Some(*step),
            Self::Quantity(_) => None,
        }
    }

    pub fn as_quantity(&self) -> Option<Quantity> {
        match self {
            Self::Quantity(q) => Some(*q),
            Self::Step(_) => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(step) => write!(f, "{}", step),
            Self::Quantity(q) => write!(f, "{}", q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::canonical_key;

    #[test]
    fn keys_are_already_canonical() {
        for engine in [Engine::Gromacs, Engine::Namd] {
            for observable in Observable::ALL {
                if let Some(key) = observable.key(engine) {
                    assert_eq!(canonical_key(key), key, "{:?} on {}", observable, engine);
                }
            }
        }
    }

    #[test]
    fn engines_use_their_native_energy_units() {
        assert_eq!(
            Observable::Potential.unit(Engine::Gromacs),
            Some(Unit::KJ_PER_MOL)
        );
        assert_eq!(
            Observable::Potential.unit(Engine::Namd),
            Some(Unit::KCAL_PER_MOL)
        );
        assert_eq!(Observable::Step.unit(Engine::Namd), None);
        assert_eq!(Observable::Time.key(Engine::Namd), None);
    }

    #[test]
    fn names_round_trip() {
        for observable in Observable::ALL {
            assert_eq!(Observable::from_name(observable.name()), Some(observable));
        }
        assert_eq!(Observable::from_name("Potential"), Some(Observable::Potential));
        assert_eq!(Observable::from_name("entropy"), None);
    }
}
