pub mod defaults;
pub mod models;

use crate::cli::RunFileArgs;
use crate::error::{CliError, Result};
use defaults::DefaultsConfig;
use models::{AppConfig, EngineInputs};
use serde::Deserialize;
use simdrive::core::models::protocol::{
    Equilibration, FreeEnergy, LambdaSchedule, Minimisation, PerturbationType, Production,
    Protocol, Restraint, RestraintSelection,
};
use simdrive::engine::config::ProcessConfigBuilder;
use simdrive::engine::observable::Engine;
use simdrive::workflows::gromacs::GromacsInputs;
use simdrive::workflows::namd::NamdFiles;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialEngineConfig {
    #[serde(rename = "type")]
    kind: Option<Engine>,
    executable: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSystemConfig {
    coordinates: Option<PathBuf>,
    topology: Option<PathBuf>,
    psf: Option<PathBuf>,
    pdb: Option<PathBuf>,
    params: Option<PathBuf>,
    velocities: Option<PathBuf>,
    charmm_params: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum ProtocolType {
    Minimisation,
    Equilibration,
    Production,
    FreeEnergy,
    Custom,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialRestraintSelection {
    Backbone,
    Heavy,
    All,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialProtocolConfig {
    #[serde(rename = "type")]
    kind: Option<ProtocolType>,
    steps: Option<u64>,
    timestep_fs: Option<f64>,
    runtime_ns: Option<f64>,
    temperature_k: Option<f64>,
    temperature_start_k: Option<f64>,
    temperature_end_k: Option<f64>,
    pressure_atm: Option<f64>,
    /// Runs at constant volume even when the protocol default sets a pressure.
    constant_volume: Option<bool>,
    thermostat_time_constant_ps: Option<f64>,
    report_interval: Option<u64>,
    restart_interval: Option<u64>,
    restart: Option<bool>,
    restraint: Option<PartialRestraintSelection>,
    restraint_atoms: Option<Vec<usize>>,
    restraint_force_constant: Option<f64>,
    lambda: Option<f64>,
    lambda_values: Option<Vec<f64>>,
    perturbation: Option<PerturbationType>,
    lines: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialProcessConfig {
    name: Option<String>,
    work_dir: Option<PathBuf>,
    seed: Option<u64>,
    /// Kept untyped so that a malformed value can fall back to the default.
    blocking: Option<toml::Value>,
    wait_timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    engine: Option<PartialEngineConfig>,
    system: Option<PartialSystemConfig>,
    protocol: Option<PartialProtocolConfig>,
    process: Option<PartialProcessConfig>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merges the file values with CLI flags and defaults.
    ///
    /// Relative input paths in the file are resolved against `base_dir`, the
    /// directory holding the config file.
    pub fn merge_with_cli(
        mut self,
        args: &RunFileArgs,
        base_dir: &Path,
        wait_timeout: Option<Duration>,
    ) -> Result<AppConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let engine_config = self.engine.take().unwrap_or_default();
        let system_config = self.system.take().unwrap_or_default();
        let protocol_config = self.protocol.take().unwrap_or_default();
        let process_config = self.process.take().unwrap_or_default();

        let engine = args
            .engine
            .map(Engine::from)
            .or(engine_config.kind)
            .ok_or_else(|| {
                CliError::Config(
                    "An engine is required either as `engine.type` in the config file or via --engine."
                        .to_string(),
                )
            })?;

        let inputs = Self::merge_inputs(engine, system_config, base_dir, &defaults)?;
        let protocol = Self::merge_protocol(protocol_config, &defaults)?;

        let mut builder = ProcessConfigBuilder::new()
            .name(
                args.name
                    .clone()
                    .or(process_config.name)
                    .unwrap_or(defaults.name),
            )
            .work_dir(
                args.work_dir
                    .clone()
                    .or(process_config.work_dir)
                    .unwrap_or(defaults.work_dir),
            )
            .blocking(Self::merge_blocking(
                process_config.blocking,
                defaults.blocking,
            ))
            .poll_interval(Duration::from_millis(
                process_config
                    .poll_interval_ms
                    .unwrap_or(defaults.poll_interval_ms),
            ));
        if let Some(executable) = args.executable.clone().or(engine_config.executable) {
            builder = builder.executable(executable);
        }
        if let Some(seed) = args.seed.or(process_config.seed) {
            builder = builder.seed(seed);
        }
        if let Some(timeout) =
            wait_timeout.or(process_config.wait_timeout_secs.map(Duration::from_secs))
        {
            builder = builder.wait_timeout(timeout);
        }
        let process = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(AppConfig {
            inputs,
            protocol,
            process,
        })
    }

    fn merge_blocking(value: Option<toml::Value>, default: bool) -> bool {
        match value {
            None => default,
            Some(toml::Value::Boolean(b)) => b,
            Some(other) => {
                warn!(
                    "`process.blocking` must be true or false, got {}; using the default ({}).",
                    other, default
                );
                default
            }
        }
    }

    fn merge_inputs(
        engine: Engine,
        system: PartialSystemConfig,
        base_dir: &Path,
        defaults: &DefaultsConfig,
    ) -> Result<EngineInputs> {
        let require = |value: Option<PathBuf>, key: &str| -> Result<PathBuf> {
            let path = value.ok_or_else(|| {
                CliError::Config(format!("`system.{}` is required for {} runs.", key, engine))
            })?;
            Ok(resolve_path(base_dir, path))
        };

        match engine {
            Engine::Gromacs => Ok(EngineInputs::Gromacs(GromacsInputs {
                coordinates: require(system.coordinates, "coordinates")?,
                topology: require(system.topology, "topology")?,
            })),
            Engine::Namd => Ok(EngineInputs::Namd(NamdFiles {
                psf: require(system.psf, "psf")?,
                pdb: require(system.pdb, "pdb")?,
                params: require(system.params, "params")?,
                velocities: system.velocities.map(|p| resolve_path(base_dir, p)),
                charmm_params: system.charmm_params.unwrap_or(defaults.charmm_params),
            })),
        }
    }

    fn merge_restraint(
        partial: &PartialProtocolConfig,
        defaults: &DefaultsConfig,
    ) -> Result<Option<Restraint>> {
        let selection = match (partial.restraint, &partial.restraint_atoms) {
            (Some(_), Some(_)) => {
                return Err(CliError::Config(
                    "`protocol.restraint` and `protocol.restraint-atoms` are mutually exclusive."
                        .to_string(),
                ));
            }
            (Some(PartialRestraintSelection::Backbone), None) => RestraintSelection::Backbone,
            (Some(PartialRestraintSelection::Heavy), None) => RestraintSelection::Heavy,
            (Some(PartialRestraintSelection::All), None) => RestraintSelection::All,
            (None, Some(atoms)) => RestraintSelection::Atoms(atoms.clone()),
            (None, None) => return Ok(None),
        };
        Ok(Some(Restraint {
            selection,
            force_constant_kcal_mol_a2: partial
                .restraint_force_constant
                .unwrap_or(defaults.restraint_force_constant),
        }))
    }

    fn merge_production(partial: &PartialProtocolConfig, base: Production) -> Production {
        let mut p = base;
        set(&mut p.timestep_fs, partial.timestep_fs);
        set(&mut p.runtime_ns, partial.runtime_ns);
        set(&mut p.temperature_k, partial.temperature_k);
        if partial.pressure_atm.is_some() {
            p.pressure_atm = partial.pressure_atm;
        }
        if partial.constant_volume == Some(true) {
            p.pressure_atm = None;
        }
        set(&mut p.thermostat_time_constant_ps, partial.thermostat_time_constant_ps);
        set(&mut p.report_interval, partial.report_interval);
        set(&mut p.restart_interval, partial.restart_interval);
        set(&mut p.restart, partial.restart);
        p
    }

    fn merge_protocol(partial: PartialProtocolConfig, defaults: &DefaultsConfig) -> Result<Protocol> {
        let kind = partial.kind.ok_or_else(|| {
            CliError::Config("`protocol.type` is required.".to_string())
        })?;
        let restraint = Self::merge_restraint(&partial, defaults)?;

        let protocol = match kind {
            ProtocolType::Minimisation => {
                let mut p = Minimisation::default();
                set(&mut p.steps, partial.steps);
                set(&mut p.temperature_k, partial.temperature_k);
                if restraint.is_some() {
                    warn!("Restraints are ignored for minimisation protocols.");
                }
                Protocol::Minimisation(p)
            }
            ProtocolType::Equilibration => {
                let mut p = Equilibration::default();
                set(&mut p.timestep_fs, partial.timestep_fs);
                set(&mut p.runtime_ns, partial.runtime_ns);
                if let Some(t) = partial.temperature_k {
                    p.temperature_start_k = t;
                    p.temperature_end_k = t;
                }
                set(&mut p.temperature_start_k, partial.temperature_start_k);
                set(&mut p.temperature_end_k, partial.temperature_end_k);
                p.pressure_atm = partial.pressure_atm;
                set(&mut p.thermostat_time_constant_ps, partial.thermostat_time_constant_ps);
                set(&mut p.report_interval, partial.report_interval);
                set(&mut p.restart_interval, partial.restart_interval);
                p.restraint = restraint;
                Protocol::Equilibration(p)
            }
            ProtocolType::Production => {
                let mut p = Self::merge_production(&partial, Production::default());
                p.restraint = restraint;
                Protocol::Production(p)
            }
            ProtocolType::FreeEnergy => {
                let mut fe = FreeEnergy::default();
                fe.dynamics = Self::merge_production(&partial, fe.dynamics);
                fe.dynamics.restraint = restraint;
                set(&mut fe.lambda, partial.lambda);
                if let Some(values) = partial.lambda_values.clone() {
                    fe.schedule = LambdaSchedule::explicit(values)
                        .map_err(|e| CliError::Config(e.to_string()))?;
                }
                set(&mut fe.perturbation, partial.perturbation);
                Protocol::FreeEnergy(fe)
            }
            ProtocolType::Custom => Protocol::Custom(partial.lines.clone().ok_or_else(|| {
                CliError::Config("`protocol.lines` is required for custom protocols.".to_string())
            })?),
        };

        protocol
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(protocol)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let parts: Vec<_> = kv_pair.splitn(2, '=').collect();
            if parts.len() != 2 {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            }
            let key = parts[0];
            let value_str = parts[1];

            match key {
                "engine.executable" => {
                    self.engine.get_or_insert_with(Default::default).executable =
                        Some(PathBuf::from(value_str));
                }
                "process.name" => {
                    self.process.get_or_insert_with(Default::default).name =
                        Some(value_str.to_string());
                }
                "process.work-dir" => {
                    self.process.get_or_insert_with(Default::default).work_dir =
                        Some(PathBuf::from(value_str));
                }
                "process.seed" => {
                    self.process.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "process.blocking" => {
                    self.process.get_or_insert_with(Default::default).blocking =
                        Some(match value_str.parse::<bool>() {
                            Ok(b) => toml::Value::Boolean(b),
                            Err(_) => toml::Value::String(value_str.to_string()),
                        });
                }
                "process.wait-timeout-secs" => {
                    self.process
                        .get_or_insert_with(Default::default)
                        .wait_timeout_secs = Some(parse_value(key, value_str, "integer")?);
                }
                "process.poll-interval-ms" => {
                    self.process
                        .get_or_insert_with(Default::default)
                        .poll_interval_ms = Some(parse_value(key, value_str, "integer")?);
                }
                "protocol.steps" => {
                    self.protocol.get_or_insert_with(Default::default).steps =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "protocol.timestep-fs" => {
                    self.protocol.get_or_insert_with(Default::default).timestep_fs =
                        Some(parse_value(key, value_str, "float")?);
                }
                "protocol.runtime-ns" => {
                    self.protocol.get_or_insert_with(Default::default).runtime_ns =
                        Some(parse_value(key, value_str, "float")?);
                }
                "protocol.temperature-k" => {
                    self.protocol.get_or_insert_with(Default::default).temperature_k =
                        Some(parse_value(key, value_str, "float")?);
                }
                "protocol.temperature-start-k" => {
                    self.protocol.get_or_insert_with(Default::default).temperature_start_k =
                        Some(parse_value(key, value_str, "float")?);
                }
                "protocol.temperature-end-k" => {
                    self.protocol.get_or_insert_with(Default::default).temperature_end_k =
                        Some(parse_value(key, value_str, "float")?);
                }
                "protocol.pressure-atm" => {
                    self.protocol.get_or_insert_with(Default::default).pressure_atm =
                        Some(parse_value(key, value_str, "float")?);
                }
                "protocol.report-interval" => {
                    self.protocol.get_or_insert_with(Default::default).report_interval =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "protocol.restart-interval" => {
                    self.protocol.get_or_insert_with(Default::default).restart_interval =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "protocol.lambda" => {
                    self.protocol.get_or_insert_with(Default::default).lambda =
                        Some(parse_value(key, value_str, "float")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn resolve_path(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
