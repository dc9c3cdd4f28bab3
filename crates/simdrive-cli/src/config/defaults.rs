use std::path::PathBuf;

pub struct DefaultsConfig {
    pub name: String,
    pub work_dir: PathBuf,
    pub blocking: bool,
    pub poll_interval_ms: u64,
    pub charmm_params: bool,
    pub restraint_force_constant: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            name: "simdrive".to_string(),
            work_dir: PathBuf::from("."),
            blocking: true,
            poll_interval_ms: 200,
            charmm_params: true,
            restraint_force_constant: 10.0,
        }
    }
}
