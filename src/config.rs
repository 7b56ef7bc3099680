//! Configuration for the notebook runner

use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use crate::env::{self, EnvScope, EnvSource};
use crate::error::{Error, Result};

/// Prefix of environment variables overriding config fields (`NBRUN_INTERPRETER`, ...)
pub const ENV_PREFIX: &str = "NBRUN";

/// Batch size requested by the named cases unless configured otherwise
pub const DEFAULT_BATCH_SIZE: NonZeroU64 = match NonZeroU64::new(100_000) {
    Some(batch_size) => batch_size,
    None => panic!("default batch size must be non-zero"),
};

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Program used to execute the extracted script
    pub interpreter: String,
    /// Arguments placed before the script path
    pub interpreter_args: Vec<String>,
    /// File name of the generated script inside the work directory
    pub script_name: String,
    /// Root of the datasets the named cases read and write
    pub dataset_dir: PathBuf,
    /// Directory the named cases' notebook paths are relative to
    pub notebooks_root: PathBuf,
    /// Batch size the named cases request; zero is rejected when loading
    pub batch_size: NonZeroU64,
    /// Where resolved notebook variables are exported
    pub env_scope: EnvScope,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            interpreter_args: Vec::new(),
            script_name: "notebook.py".to_string(),
            dataset_dir: PathBuf::from("/raid/data"),
            notebooks_root: PathBuf::from("."),
            batch_size: DEFAULT_BATCH_SIZE,
            env_scope: EnvScope::Process,
        }
    }
}

impl RunnerConfig {
    /// Load configuration in layers: defaults, optional file (JSON, YAML or
    /// TOML by extension), `NBRUN_*` variables, then `DATASET_DIR`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        let config = config.with_dataset_dir_from(&env::ProcessEnv);
        config.validate()?;
        Ok(config)
    }

    /// Apply `DATASET_DIR` from an arbitrary environment source
    pub fn with_dataset_dir_from(mut self, source: &dyn EnvSource) -> Self {
        self.dataset_dir = env::dataset_dir(source, &self.dataset_dir);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.interpreter.trim().is_empty() {
            return Err(Error::config("Interpreter must not be empty"));
        }

        if self.script_name.is_empty() || self.script_name.contains(['/', '\\']) {
            return Err(Error::config(format!(
                "Script name must be a plain file name, got `{}`",
                self.script_name
            )));
        }

        Ok(())
    }

    /// Render the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::config(e.to_string()))
    }
}
