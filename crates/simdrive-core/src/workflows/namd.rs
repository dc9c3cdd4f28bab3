use super::Simulation;
use crate::core::io::pdb::PdbStructure;
use crate::core::io::psf;
use crate::core::models::protocol::Protocol;
use crate::core::models::system::SystemDescription;
use crate::core::parsing::NamdLogParser;
use crate::engine::command::find_executable;
use crate::engine::config::{BlockMode, ProcessConfig};
use crate::engine::error::EngineError;
use crate::engine::generate::namd::{NamdInputs, generate, restraint_flags};
use crate::engine::monitor::{Monitor, MonitorPaths};
use crate::engine::observable::Engine;
use crate::engine::process::{LaunchSpec, StderrPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

const EXECUTABLE_NAMES: [&str; 3] = ["namd2", "namd3", "namd"];

/// Caller-supplied NAMD inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamdFiles {
    pub psf: PathBuf,
    pub pdb: PathBuf,
    pub params: PathBuf,
    pub velocities: Option<PathBuf>,
    /// Whether `params` is a CHARMM parameter file.
    pub charmm_params: bool,
}

/// A NAMD run prepared in its work directory.
///
/// Construction copies the inputs to `<name>.psf`, `<name>.pdb`,
/// `<name>.params` (and `<name>.vel`), adds the PSF records NAMD requires,
/// writes the fixed-atom file `<name>.restrained` for restrained protocols, and
/// writes `<name>.namd`.
pub struct Namd {
    config: ProcessConfig,
    protocol: Protocol,
    system: SystemDescription,
    inputs: NamdInputs,
    executable: PathBuf,
    namd_config: Vec<String>,
    monitor: Monitor,
}

impl Namd {
    #[instrument(skip_all, name = "namd_setup", fields(name = %config.name))]
    pub fn new(files: &NamdFiles, protocol: Protocol, config: ProcessConfig) -> Result<Self, EngineError> {
        let executable = find_executable(Engine::Namd, config.executable.as_deref(), &EXECUTABLE_NAMES)?;

        let pdb = PdbStructure::read_from_path(&files.pdb)?;
        let system = SystemDescription::from_pdb(&pdb, files.velocities.is_some());
        let inputs = NamdInputs {
            name: config.name.clone(),
            charmm_params: files.charmm_params,
            velocities: files.velocities.is_some(),
        };
        let namd_config = generate(&protocol, &system, &inputs, config.seed)?;
        let restrained = match protocol.restraint() {
            Some(restraint) => {
                let flags = restraint_flags(&pdb, &restraint.selection)?;
                debug!(
                    "Fixing {} of {} atoms.",
                    flags.iter().filter(|&&f| f).count(),
                    flags.len()
                );
                Some(pdb.render_with_occupancy(&flags)?)
            }
            None => None,
        };

        fs::create_dir_all(&config.work_dir)?;
        info!(
            "Preparing NAMD {} run in {}.",
            protocol.kind(),
            config.work_dir.display()
        );
        let work_dir = &config.work_dir;

        let psf_path = work_dir.join(inputs.psf_file());
        fs::copy(&files.psf, &psf_path)?;
        psf::patch_file(&psf_path)?;
        fs::copy(&files.pdb, work_dir.join(inputs.pdb_file()))?;
        fs::copy(&files.params, work_dir.join(inputs.params_file()))?;
        if let Some(velocities) = &files.velocities {
            fs::copy(velocities, work_dir.join(inputs.velocity_file()))?;
        }
        if let Some(text) = restrained {
            fs::write(work_dir.join(inputs.restraint_file()), text)?;
        }

        let paths = MonitorPaths {
            log: work_dir.join(format!("{}.out", config.name)),
            stdout: work_dir.join(format!("{}.out", config.name)),
            stderr: work_dir.join(format!("{}.err", config.name)),
        };
        let monitor = Monitor::new(Box::new(NamdLogParser::new()), paths, &config);
        let namd = Self {
            config,
            protocol,
            system,
            inputs,
            executable,
            namd_config,
            monitor,
        };
        namd.write_config()?;
        Ok(namd)
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

    pub fn config_lines(&self) -> &[String] {
        &self.namd_config
    }

    pub fn set_config(&mut self, lines: Vec<String>) -> Result<(), EngineError> {
        self.namd_config = lines;
        self.write_config()
    }

    pub fn add_to_config(&mut self, lines: Vec<String>) -> Result<(), EngineError> {
        self.namd_config.extend(lines);
        self.write_config()
    }

    pub fn reset_config(&mut self) -> Result<(), EngineError> {
        self.namd_config = generate(&self.protocol, &self.system, &self.inputs, self.config.seed)?;
        self.write_config()
    }

    /// Estimated minutes until the run completes, from the latest `TIMING:` line.
    pub fn eta(&mut self) -> Result<Option<f64>, EngineError> {
        self.monitor.eta_minutes()
    }

    /// The final coordinates, or the latest restart coordinates while running.
    pub fn latest_structure(&mut self, block: BlockMode) -> Result<Option<PdbStructure>, EngineError> {
        self.monitor.wait_for(block)?;
        let output = self.inputs.output_name();
        for candidate in [format!("{}.coor", output), format!("{}.restart.coor", output)] {
            let path = self.config.work_dir.join(candidate);
            if path.exists() {
                return Ok(Some(PdbStructure::read_from_path(path)?));
            }
        }
        Ok(None)
    }

    fn write_config(&self) -> Result<(), EngineError> {
        let mut text = self.namd_config.join("\n");
        text.push('\n');
        fs::write(self.config.work_dir.join(self.inputs.config_file()), text)?;
        Ok(())
    }
}

impl Simulation for Namd {
    fn engine(&self) -> Engine {
        Engine::Namd
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
        let paths = self.monitor.paths();
        LaunchSpec {
            engine: Engine::Namd,
            program: self.executable.clone(),
            args: vec![self.inputs.config_file()],
            work_dir: self.config.work_dir.clone(),
            stdout_path: paths.stdout.clone(),
            stderr_path: paths.stderr.clone(),
            stderr: StderrPolicy::Separate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::protocol::{Equilibration, Minimisation, Production, Restraint, RestraintSelection};
    use crate::engine::config::ProcessConfigBuilder;
    use tempfile::{TempDir, tempdir};

    const PDB: &str = "\
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00           C
ATOM      3  HA  ALA A   1      12.000   7.000  -5.000  1.00  0.00           H
ATOM      4  CB  ALA A   1      12.500   5.000  -4.000  1.00  0.00           C
END
";

    const PSF: &str = "PSF\n\n       1 !NTITLE\n REMARKS test\n\n       4 !NATOM\n";

    fn fixture() -> (TempDir, NamdFiles) {
        let dir = tempdir().unwrap();
        let files = NamdFiles {
            psf: dir.path().join("in.psf"),
            pdb: dir.path().join("in.pdb"),
            params: dir.path().join("par_all36.prm"),
            velocities: None,
            charmm_params: true,
        };
        fs::write(&files.psf, PSF).unwrap();
        fs::write(&files.pdb, PDB).unwrap();
        fs::write(&files.params, "BONDS\n").unwrap();
        (dir, files)
    }

    fn config(dir: &Path) -> ProcessConfig {
        ProcessConfigBuilder::new()
            .name("namd")
            .work_dir(dir.join("run"))
            .executable(PathBuf::from("/bin/sh"))
            .build()
            .unwrap()
    }

    #[test]
    fn setup_copies_and_patches_inputs() {
        let (dir, files) = fixture();
        let namd = Namd::new(&files, Protocol::Minimisation(Minimisation::default()), config(dir.path())).unwrap();

        let work = namd.work_dir();
        let psf = fs::read_to_string(work.join("namd.psf")).unwrap();
        assert!(psf.starts_with(PSF));
        assert!(psf.contains("!NDON"));
        assert!(psf.contains("!NNB"));
        assert_eq!(fs::read_to_string(work.join("namd.pdb")).unwrap(), PDB);
        assert!(work.join("namd.params").exists());
        assert!(!work.join("namd.restrained").exists());

        let namd_file = fs::read_to_string(work.join("namd.namd")).unwrap();
        assert!(namd_file.contains("structure             namd.psf\n"));
        assert!(namd_file.contains("minimize              10000\n"));
    }

    #[test]
    fn restrained_equilibration_writes_occupancy_flags() {
        let (dir, files) = fixture();
        let protocol = Protocol::Equilibration(Equilibration {
            restraint: Some(Restraint::new(RestraintSelection::Backbone)),
            ..Equilibration::default()
        });
        let namd = Namd::new(&files, protocol, config(dir.path())).unwrap();

        let restrained = fs::read_to_string(namd.work_dir().join("namd.restrained")).unwrap();
        let occupancies: Vec<&str> = restrained
            .lines()
            .filter(|l| l.starts_with("ATOM"))
            .map(|l| l[54..60].trim())
            .collect();
        assert_eq!(occupancies, vec!["1.00", "1.00", "0.00", "0.00"]);
        assert!(namd.config_lines().iter().any(|l| l.starts_with("fixedAtomsFile")));
    }

    #[test]
    fn production_is_rejected_before_writing() {
        let (dir, files) = fixture();
        let result = Namd::new(&files, Protocol::Production(Production::default()), config(dir.path()));
        assert!(matches!(
            result,
            Err(EngineError::UnsupportedProtocol { engine: Engine::Namd, .. })
        ));
        assert!(!dir.path().join("run").exists());
    }

    #[test]
    fn launch_runs_the_config_file() {
        let (dir, files) = fixture();
        let namd = Namd::new(&files, Protocol::Minimisation(Minimisation::default()), config(dir.path())).unwrap();
        let spec = namd.launch_spec();
        assert_eq!(spec.args, vec!["namd.namd"]);
        assert_eq!(spec.stderr, StderrPolicy::Separate);
        assert_eq!(spec.stderr_path, namd.work_dir().join("namd.err"));
        assert_eq!(namd.monitor().paths().log, namd.work_dir().join("namd.out"));
    }

    #[test]
    fn latest_structure_prefers_final_coordinates() {
        let (dir, files) = fixture();
        let mut namd = Namd::new(&files, Protocol::Minimisation(Minimisation::default()), config(dir.path())).unwrap();
        assert!(namd.latest_structure(BlockMode::NonBlock).unwrap().is_none());

        let restart = PDB.replace("11.104", "99.000");
        fs::write(namd.work_dir().join("namd_out.restart.coor"), &restart).unwrap();
        let pdb = namd.latest_structure(BlockMode::NonBlock).unwrap().unwrap();
        assert_eq!(pdb.atoms[0].position.x, 99.0);

        fs::write(namd.work_dir().join("namd_out.coor"), PDB).unwrap();
        let pdb = namd.latest_structure(BlockMode::NonBlock).unwrap().unwrap();
        assert_eq!(pdb.atoms[0].position.x, 11.104);
    }

    #[cfg(unix)]
    #[test]
    fn eta_follows_timing_lines() {
        let (dir, files) = fixture();
        let mut namd = Namd::new(&files, Protocol::Minimisation(Minimisation::default()), config(dir.path())).unwrap();
        let mut spec = namd.launch_spec();
        spec.args = vec![
            "-c".to_string(),
            "echo 'TIMING: 500  CPU: 10.5, 0.02/step  Wall: 11.0, 0.02/step, 0.5 hours remaining, 0.000000 MB of memory in use.'".to_string(),
        ];
        namd.monitor_mut().start(&spec).unwrap();
        namd.monitor_mut().wait_for(BlockMode::Block).unwrap();
        assert_eq!(namd.eta().unwrap(), Some(30.0));
    }
}
