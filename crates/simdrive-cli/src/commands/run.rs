use super::{latest_reading, load_config, prepare, print_readings, write_csv};
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use simdrive::engine::config::BlockMode;
use simdrive::engine::observable::Observable;
use simdrive::engine::progress::ProgressReporter;
use simdrive::workflows::Simulation;
use std::time::Duration;
use tracing::{info, warn};

const FAILURE_TAIL_LINES: usize = 20;

pub async fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.run_file, args.timeout.map(Duration::from_secs))?;
    let engine = config.inputs.engine();

    let mut simulation = tokio::task::block_in_place(|| prepare(config))?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting {} run...", engine);
    if !simulation.start()? {
        warn!("The run was already active; following it instead of relaunching.");
    }

    info!("Following the engine log until the run ends...");
    let state = tokio::task::block_in_place(|| simulation.follow(&reporter))?;

    if state.is_error() {
        let tail = simulation.stderr(FAILURE_TAIL_LINES)?;
        for line in &tail {
            eprintln!("  {}", line);
        }
        return Err(CliError::Other(anyhow::anyhow!(
            "{} exited with state {:?}",
            engine,
            state
        )));
    }

    let store = simulation.records(BlockMode::NonBlock)?.snapshot();
    let readings: Vec<_> = Observable::ALL
        .into_iter()
        .filter_map(|o| latest_reading(&store, engine, o).map(|r| (o, r)))
        .collect();
    if readings.is_empty() {
        warn!("The run finished but its log contained no energy records.");
        println!("Warning: no energy records were found in the {} log.", engine);
    } else {
        println!("Run complete. Final readings:");
        print_readings(&readings);
    }

    if let Some(path) = &args.csv {
        write_csv(&store, path)?;
    }
    Ok(())
}
