use simdrive::core::models::protocol::Protocol;
use simdrive::engine::config::ProcessConfig;
use simdrive::engine::observable::Engine;
use simdrive::workflows::gromacs::GromacsInputs;
use simdrive::workflows::namd::NamdFiles;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineInputs {
    Gromacs(GromacsInputs),
    Namd(NamdFiles),
}

impl EngineInputs {
    pub fn engine(&self) -> Engine {
        match self {
            Self::Gromacs(_) => Engine::Gromacs,
            Self::Namd(_) => Engine::Namd,
        }
    }
}

/// Everything needed to prepare one run, after file values, CLI flags and
/// defaults have been merged.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub inputs: EngineInputs,
    pub protocol: Protocol,
    pub process: ProcessConfig,
}
