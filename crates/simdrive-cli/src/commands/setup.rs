use super::{load_config, prepare};
use crate::cli::SetupArgs;
use crate::error::Result;
use simdrive::workflows::Simulation;
use tracing::info;

pub async fn run(args: SetupArgs) -> Result<()> {
    let config = load_config(&args.run_file, None)?;
    let engine = config.inputs.engine();
    let name = config.process.name.clone();
    let work_dir = config.process.work_dir.clone();

    let simulation = tokio::task::block_in_place(|| prepare(config))?;
    info!(
        "{} inputs for '{}' written to {:?}.",
        engine, name, &work_dir
    );
    println!(
        "✓ {} {} run '{}' prepared in: {}",
        engine,
        simulation.protocol().kind(),
        name,
        work_dir.display()
    );
    Ok(())
}
