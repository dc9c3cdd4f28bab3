use super::{latest_reading, print_readings, resolve_observables, write_csv};
use crate::cli::RecordsArgs;
use crate::error::{CliError, Result};
use simdrive::core::io::tail::LogTailer;
use simdrive::core::parsing::{GromacsLogParser, LogParser, NamdLogParser};
use simdrive::core::records::RecordStore;
use simdrive::engine::observable::Engine;
use std::path::Path;
use tracing::{info, warn};

pub async fn run(args: RecordsArgs) -> Result<()> {
    let engine = Engine::from(args.engine);
    let observables = resolve_observables(&args.observables)?;

    let store = parse_log(engine, &args.log)?;
    info!(
        "Parsed {} record key(s) from {:?}.",
        store.len(),
        &args.log
    );

    if store.is_empty() {
        warn!("No energy records found in {:?}.", &args.log);
        println!("Warning: no energy records found in {}.", args.log.display());
        return Ok(());
    }

    let mut readings = Vec::new();
    for observable in observables {
        match latest_reading(&store, engine, observable) {
            Some(reading) => readings.push((observable, reading)),
            None if !args.observables.is_empty() => {
                println!("  {:<24} (not reported)", observable.name());
            }
            None => {}
        }
    }
    print_readings(&readings);

    if let Some(path) = &args.csv {
        write_csv(&store, path)?;
    }
    Ok(())
}

/// Reads a complete engine log into a record store.
fn parse_log(engine: Engine, path: &Path) -> Result<RecordStore> {
    if !path.is_file() {
        return Err(CliError::Argument(format!(
            "Log file not found: {}",
            path.display()
        )));
    }
    let mut parser: Box<dyn LogParser> = match engine {
        Engine::Gromacs => Box::new(GromacsLogParser::new()),
        Engine::Namd => Box::new(NamdLogParser::new()),
    };
    let mut tailer = LogTailer::new();
    let mut store = RecordStore::new();
    parser.feed(tailer.poll_to_end(path)?, &mut store);
    parser.finish(&mut store);
    Ok(store)
}
