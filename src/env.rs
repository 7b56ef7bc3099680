//! Environment handed to executed notebooks
//!
//! Notebooks read their data locations and batch size from `INPUT_DATA_DIR`,
//! `OUTPUT_DATA_DIR` and `BATCH_SIZE`. Values already present in the caller's
//! environment always win over the defaults a run is given. Values are kept as
//! OS strings end to end, so paths that are not valid UTF-8 pass through intact.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Batch size variable read by the notebooks
pub const BATCH_SIZE: &str = "BATCH_SIZE";
/// Input data directory variable read by the notebooks
pub const INPUT_DATA_DIR: &str = "INPUT_DATA_DIR";
/// Output data directory variable read by the notebooks
pub const OUTPUT_DATA_DIR: &str = "OUTPUT_DATA_DIR";
/// Root of the datasets used by the named notebook cases
pub const DATASET_DIR: &str = "DATASET_DIR";

/// Read-only view of environment variables
pub trait EnvSource: Send + Sync {
    /// Look up a variable; unset and empty values both read as `None`
    fn var(&self, key: &str) -> Option<OsString>;
}

/// The harness process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key).filter(|v| !v.is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<OsString> {
        self.get(key).filter(|v| !v.is_empty()).map(OsString::from)
    }
}

impl EnvSource for HashMap<String, OsString> {
    fn var(&self, key: &str) -> Option<OsString> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Where resolved values are made visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvScope {
    /// Export into the harness process as well; values persist after the run
    /// and are seen as pre-set by later runs in the same process.
    ///
    /// Exporting calls [`std::env::set_var`] while the tokio worker threads
    /// are alive. Native code on another thread reading the environment at the
    /// same moment (`getenv` in a C library, for instance) races with it. Runs
    /// sharing a process with such code, or with other runners, should use
    /// [`EnvScope::Child`].
    #[default]
    Process,
    /// Pass to the child process only
    Child,
}

/// Resolved notebook environment for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookEnv {
    /// `BATCH_SIZE`, absent when neither pre-set nor requested
    pub batch_size: Option<OsString>,
    /// `INPUT_DATA_DIR`
    pub input_data_dir: PathBuf,
    /// `OUTPUT_DATA_DIR`
    pub output_data_dir: PathBuf,
}

impl NotebookEnv {
    /// Resolve the run environment; existing values in `source` take precedence
    pub fn resolve(
        source: &dyn EnvSource,
        input_path: &Path,
        output_path: &Path,
        batch_size: Option<NonZeroU64>,
    ) -> Self {
        let batch_size = source
            .var(BATCH_SIZE)
            .or_else(|| batch_size.map(|b| b.to_string().into()));
        let input_data_dir = source
            .var(INPUT_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| input_path.to_path_buf());
        let output_data_dir = source
            .var(OUTPUT_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| output_path.to_path_buf());

        debug!(
            batch_size = ?batch_size,
            input = %input_data_dir.display(),
            output = %output_data_dir.display(),
            "Resolved notebook environment"
        );

        Self {
            batch_size,
            input_data_dir,
            output_data_dir,
        }
    }

    /// Output directory the notebook will write to
    pub fn output_dir(&self) -> &Path {
        &self.output_data_dir
    }

    /// Variables to pass to the child process
    pub fn vars(&self) -> Vec<(&'static str, &OsStr)> {
        let mut vars = Vec::with_capacity(3);
        if let Some(batch_size) = &self.batch_size {
            vars.push((BATCH_SIZE, batch_size.as_os_str()));
        }
        vars.push((INPUT_DATA_DIR, self.input_data_dir.as_os_str()));
        vars.push((OUTPUT_DATA_DIR, self.output_data_dir.as_os_str()));
        vars
    }

    /// Export the values into the harness process environment. Never reset.
    ///
    /// See [`EnvScope::Process`] for the threading caveat.
    pub fn export(&self) {
        for (key, value) in self.vars() {
            std::env::set_var(key, value);
        }
    }
}

/// Dataset root: `DATASET_DIR` if set, else the given default
pub fn dataset_dir(source: &dyn EnvSource, default: &Path) -> PathBuf {
    source
        .var(DATASET_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| default.to_path_buf())
}
