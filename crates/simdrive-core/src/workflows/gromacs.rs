use super::Simulation;
use crate::core::io::gro::GroStructure;
use crate::core::io::topology::GroTopology;
use crate::core::models::protocol::Protocol;
use crate::core::models::system::SystemDescription;
use crate::core::parsing::GromacsLogParser;
use crate::engine::command::{CommandRunner, CommandSpec, find_executable, run_checked};
use crate::engine::config::{BlockMode, ProcessConfig};
use crate::engine::error::EngineError;
use crate::engine::generate::gromacs::{generate, restraint_group};
use crate::engine::monitor::{Monitor, MonitorPaths};
use crate::engine::observable::Engine;
use crate::engine::process::{LaunchSpec, StderrPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const EXECUTABLE_NAMES: [&str; 2] = ["gmx", "gmx_mpi"];

/// Written to `<name>.err`, since `mdrun` output is merged into `<name>.out`.
pub const STDERR_MARKER: &str = "All output has been redirected to the stdout stream!";

/// Caller-supplied GROMACS inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GromacsInputs {
    /// Coordinate file (`.gro`).
    pub coordinates: PathBuf,
    /// Topology file (`.top`).
    pub topology: PathBuf,
}

/// A GROMACS run prepared in its work directory.
///
/// Construction copies the inputs to `<name>.gro` and `<name>.top`, writes
/// position restraint includes when the protocol asks for them, writes
/// `<name>.mdp` and preprocesses everything into `<name>.tpr` with `gmx grompp`.
pub struct Gromacs {
    config: ProcessConfig,
    protocol: Protocol,
    system: SystemDescription,
    executable: PathBuf,
    runner: Arc<dyn CommandRunner>,
    mdp: Vec<String>,
    monitor: Monitor,
}

impl Gromacs {
    #[instrument(skip_all, name = "gromacs_setup", fields(name = %config.name))]
    pub fn new(
        inputs: &GromacsInputs,
        protocol: Protocol,
        config: ProcessConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, EngineError> {
        let executable = find_executable(
            Engine::Gromacs,
            config.executable.as_deref(),
            &EXECUTABLE_NAMES,
        )?;

        let topology = GroTopology::read_from_path(&inputs.topology)?;
        let gro = GroStructure::read_from_path(&inputs.coordinates)?;
        let system = SystemDescription::from_gromacs(&topology, &gro)?;
        let mdp = generate(&protocol, &system, config.seed)?;
        let group = protocol.restraint().map(restraint_group).transpose()?;

        fs::create_dir_all(&config.work_dir)?;
        info!(
            "Preparing GROMACS {} run in {}.",
            protocol.kind(),
            config.work_dir.display()
        );

        let name = config.name.clone();
        let paths = MonitorPaths {
            log: config.work_dir.join(format!("{}.log", name)),
            stdout: config.work_dir.join(format!("{}.out", name)),
            stderr: config.work_dir.join(format!("{}.err", name)),
        };
        let monitor = Monitor::new(Box::new(GromacsLogParser::new()), paths, &config);
        let mut gromacs = Self {
            config,
            protocol,
            system,
            executable,
            runner,
            mdp,
            monitor,
        };

        fs::copy(&inputs.coordinates, gromacs.file("gro"))?;
        let topology_lines = match (group, gromacs.protocol.restraint()) {
            (Some(group), Some(restraint)) => {
                let force_constant = restraint.force_constant_kj_mol_nm2();
                let includes = gromacs.write_restraints(&gro, group, force_constant)?;
                topology.splice_includes(&includes)?
            }
            _ => topology.lines().to_vec(),
        };
        fs::write(gromacs.file("top"), join_lines(&topology_lines))?;

        gromacs.write_mdp()?;
        gromacs.preprocess()?;
        Ok(gromacs)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn work_dir(&self) -> &Path {
        &self.config.work_dir
    }

    pub fn system(&self) -> &SystemDescription {
        &self.system
    }

    /// Current `.mdp` lines.
    pub fn config_lines(&self) -> &[String] {
        &self.mdp
    }

    /// Replaces the `.mdp` with `lines` and preprocesses again.
    pub fn set_config(&mut self, lines: Vec<String>) -> Result<(), EngineError> {
        self.mdp = lines;
        self.write_mdp()?;
        self.preprocess()
    }

    /// Appends `lines` to the `.mdp` and preprocesses again.
    pub fn add_to_config(&mut self, lines: Vec<String>) -> Result<(), EngineError> {
        self.mdp.extend(lines);
        self.write_mdp()?;
        self.preprocess()
    }

    /// Regenerates the `.mdp` from the protocol and preprocesses again.
    pub fn reset_config(&mut self) -> Result<(), EngineError> {
        self.mdp = generate(&self.protocol, &self.system, self.config.seed)?;
        self.write_mdp()?;
        self.preprocess()
    }

    /// The final coordinates written by `mdrun`, if it has produced them.
    pub fn latest_structure(&mut self, block: BlockMode) -> Result<Option<GroStructure>, EngineError> {
        self.monitor.wait_for(block)?;
        let path = self.config.work_dir.join(format!("{}_out.gro", self.config.name));
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(GroStructure::read_from_path(path)?))
    }

    fn file(&self, extension: &str) -> PathBuf {
        self.config
            .work_dir
            .join(format!("{}.{}", self.config.name, extension))
    }

    fn write_mdp(&self) -> Result<(), EngineError> {
        fs::write(self.file("mdp"), join_lines(&self.mdp))?;
        Ok(())
    }

    fn gmx(&self, purpose: &'static str, subcommand: &str) -> CommandSpec {
        CommandSpec::new(purpose, &self.executable, &self.config.work_dir).arg(subcommand)
    }

    /// Generates one `posre_NNNN.itp` per restrainable molecule type and returns
    /// the `(type index, include file)` pairs to splice into the topology.
    fn write_restraints(
        &self,
        gro: &GroStructure,
        group: &str,
        force_constant: f64,
    ) -> Result<Vec<(usize, String)>, EngineError> {
        let tmp_gro = self.config.work_dir.join("tmp.gro");
        let mut includes = Vec::new();
        for (type_index, molecule) in self.system.restrainable() {
            let Some(first) = molecule.first_atom else {
                continue;
            };
            let include = format!("posre_{:04}.itp", type_index);
            debug!(
                "Restraining '{}' ({} atoms from {}) with group {}.",
                molecule.name, molecule.num_atoms, first, group
            );
            fs::write(&tmp_gro, gro.subset_to_string(first..first + molecule.num_atoms)?)?;

            let fc = format!("{}", force_constant);
            let spec = self
                .gmx("position restraint generation", "genrestr")
                .args(["-f", "tmp.gro", "-o", include.as_str(), "-fc"])
                .args([fc.as_str(), fc.as_str(), fc.as_str()])
                .stdin(format!("{}\n", group));
            let result = run_checked(self.runner.as_ref(), &spec);
            fs::remove_file(&tmp_gro)?;
            result?;
            includes.push((type_index, include));
        }
        Ok(includes)
    }

    fn preprocess(&self) -> Result<(), EngineError> {
        let name = &self.config.name;
        let spec = self.gmx("topology preprocessing", "grompp").args([
            "-f".to_string(),
            format!("{}.mdp", name),
            "-po".to_string(),
            format!("{}.out.mdp", name),
            "-c".to_string(),
            format!("{}.gro", name),
            "-p".to_string(),
            format!("{}.top", name),
            "-r".to_string(),
            format!("{}.gro", name),
            "-o".to_string(),
            format!("{}.tpr", name),
        ]);
        run_checked(self.runner.as_ref(), &spec)?;
        debug!("Wrote {}.tpr.", name);
        Ok(())
    }
}

impl Simulation for Gromacs {
    fn engine(&self) -> Engine {
        Engine::Gromacs
    }

    fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    fn monitor_mut(&mut self) -> &mut Monitor {
        &mut self.monitor
    }

    fn launch_spec(&self) -> LaunchSpec {
        let name = &self.config.name;
        let paths = self.monitor.paths();
        LaunchSpec {
            engine: Engine::Gromacs,
            program: self.executable.clone(),
            args: vec![
                "mdrun".to_string(),
                "-v".to_string(),
                "-deffnm".to_string(),
                name.clone(),
                "-c".to_string(),
                format!("{}_out.gro", name),
            ],
            work_dir: self.config.work_dir.clone(),
            stdout_path: paths.stdout.clone(),
            stderr_path: paths.stderr.clone(),
            stderr: StderrPolicy::MergeIntoStdout {
                marker: STDERR_MARKER.to_string(),
            },
        }
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
