pub mod records;
pub mod run;
pub mod setup;

use crate::cli::RunFileArgs;
use crate::config::PartialRunConfig;
use crate::config::models::{AppConfig, EngineInputs};
use crate::error::{CliError, Result};
use simdrive::core::records::RecordStore;
use simdrive::engine::command::SystemCommandRunner;
use simdrive::engine::observable::{Engine, Observable, Reading};
use simdrive::workflows::Simulation;
use simdrive::workflows::gromacs::Gromacs;
use simdrive::workflows::namd::Namd;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Loads the run file and merges it with the command line.
fn load_config(args: &RunFileArgs, wait_timeout: Option<Duration>) -> Result<AppConfig> {
    let partial_config = PartialRunConfig::from_file(&args.config)?;
    let base_dir = args
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    info!("Merging configuration from file and CLI arguments...");
    partial_config.merge_with_cli(args, base_dir, wait_timeout)
}

/// Writes the engine inputs into the work directory.
fn prepare(config: AppConfig) -> Result<Box<dyn Simulation>> {
    info!(
        "Preparing {} {} run '{}'.",
        config.inputs.engine(),
        config.protocol.kind(),
        config.process.name
    );
    let simulation: Box<dyn Simulation> = match config.inputs {
        EngineInputs::Gromacs(inputs) => Box::new(Gromacs::new(
            &inputs,
            config.protocol,
            config.process,
            Arc::new(SystemCommandRunner),
        )?),
        EngineInputs::Namd(files) => {
            Box::new(Namd::new(&files, config.protocol, config.process)?)
        }
    };
    Ok(simulation)
}

/// Resolves observable names given on the command line; every observable when empty.
fn resolve_observables(names: &[String]) -> Result<Vec<Observable>> {
    if names.is_empty() {
        return Ok(Observable::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            Observable::from_name(name)
                .ok_or_else(|| CliError::Argument(format!("Unknown observable '{}'", name)))
        })
        .collect()
}

/// Latest decoded reading of `observable` in `store`.
fn latest_reading(store: &RecordStore, engine: Engine, observable: Observable) -> Option<Reading> {
    let key = observable.key(engine)?;
    match observable.unit(engine) {
        None => store.latest_step(key).map(Reading::Step),
        Some(unit) => store.latest_quantity(key, unit).map(Reading::Quantity),
    }
}

fn print_readings(readings: &[(Observable, Reading)]) {
    for (observable, reading) in readings {
        println!("  {:<24} {}", observable.name(), reading);
    }
}

fn write_csv(store: &RecordStore, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    store.write_csv(file).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    println!("✓ Records written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simdrive::core::records::units::Unit;

    #[test]
    fn empty_observable_list_selects_everything() {
        assert_eq!(resolve_observables(&[]).unwrap().len(), Observable::ALL.len());
    }

    #[test]
    fn unknown_observable_is_an_argument_error() {
        let names = vec!["potential".to_string(), "enthalpy".to_string()];
        assert!(matches!(
            resolve_observables(&names),
            Err(CliError::Argument(msg)) if msg.contains("enthalpy")
        ));
    }

    #[test]
    fn latest_reading_decodes_in_engine_units() {
        let mut store = RecordStore::new();
        store.append("STEP", "1000");
        store.append("POTENTIAL", "-512.25");

        assert_eq!(
            latest_reading(&store, Engine::Namd, Observable::Step),
            Some(Reading::Step(1000))
        );
        let potential = latest_reading(&store, Engine::Namd, Observable::Potential)
            .and_then(|r| r.as_quantity())
            .unwrap();
        assert_eq!(potential.unit, Unit::KCAL_PER_MOL);
        assert_eq!(latest_reading(&store, Engine::Namd, Observable::Time), None);
    }
}
