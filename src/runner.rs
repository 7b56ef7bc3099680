//! Notebook execution
//!
//! A run resolves the notebook environment, makes sure the output directory
//! exists, extracts the code cells into a flat script inside the caller's work
//! directory and executes that script with the configured interpreter. Any
//! non-zero exit is returned as [`Error::Execution`] with the captured output.
//!
//! There is no timeout: a script that never exits blocks the run.

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::RunnerConfig;
use crate::env::{EnvScope, EnvSource, NotebookEnv, ProcessEnv};
use crate::error::{Error, Result};
use crate::notebook::Notebook;
use crate::script::{LineTransform, Script};

/// One notebook run
pub struct RunRequest {
    /// Notebook document to execute
    pub notebook_path: PathBuf,
    /// Default for `INPUT_DATA_DIR`
    pub input_path: PathBuf,
    /// Default for `OUTPUT_DATA_DIR`
    pub output_path: PathBuf,
    /// Default for `BATCH_SIZE`
    pub batch_size: Option<NonZeroU64>,
    /// Remove the output directory after a successful run
    pub clean_up: bool,
    /// Per-line rewrite applied during extraction
    pub transform: Option<Box<dyn LineTransform>>,
}

impl RunRequest {
    /// Create a request with no batch size, no cleanup and no transform
    pub fn new(
        notebook_path: impl Into<PathBuf>,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            notebook_path: notebook_path.into(),
            input_path: input_path.into(),
            output_path: output_path.into(),
            batch_size: None,
            clean_up: false,
            transform: None,
        }
    }

    /// Set the default batch size
    pub fn batch_size(mut self, batch_size: NonZeroU64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Remove the output directory after success
    pub fn clean_up(mut self, clean_up: bool) -> Self {
        self.clean_up = clean_up;
        self
    }

    /// Rewrite each extracted line
    pub fn transform(mut self, transform: impl LineTransform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }
}

impl std::fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRequest")
            .field("notebook_path", &self.notebook_path)
            .field("input_path", &self.input_path)
            .field("output_path", &self.output_path)
            .field("batch_size", &self.batch_size)
            .field("clean_up", &self.clean_up)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Notebook that was executed
    pub notebook_path: PathBuf,
    /// Generated script
    pub script_path: PathBuf,
    /// Number of lines in the generated script
    pub script_lines: usize,
    /// Environment the script ran with
    pub env: NotebookEnv,
    /// Exit code of the interpreter
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Wall-clock time of the subprocess
    pub elapsed: Duration,
    /// Whether the output directory was removed
    pub cleaned_up: bool,
}

/// Executes notebooks as flat scripts
pub struct NotebookRunner {
    config: RunnerConfig,
    env_source: Arc<dyn EnvSource>,
}

impl NotebookRunner {
    /// Create a runner reading pre-set variables from the process environment
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            env_source: Arc::new(ProcessEnv),
        }
    }

    /// Read pre-set variables from another source
    pub fn with_env_source(mut self, source: impl EnvSource + 'static) -> Self {
        self.env_source = Arc::new(source);
        self
    }

    /// Get the current configuration
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Extract the script a request would execute, without running it
    pub async fn extract(&self, request: &RunRequest) -> Result<Script> {
        let notebook = Notebook::load(&request.notebook_path).await?;
        Ok(Script::from_notebook(&notebook, request.transform.as_deref()))
    }

    /// Run a notebook, writing the generated script into `workdir`
    #[instrument(skip(self, request), fields(notebook = %request.notebook_path.display()))]
    pub async fn run(&self, request: RunRequest, workdir: &Path) -> Result<RunOutcome> {
        info!("Running notebook");

        let env = NotebookEnv::resolve(
            self.env_source.as_ref(),
            &request.input_path,
            &request.output_path,
            request.batch_size,
        );
        if self.config.env_scope == EnvScope::Process {
            env.export();
        }

        let output_dir = env.output_dir();
        debug!("Ensuring output directory {}", output_dir.display());
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| Error::io(output_dir, e))?;

        let script = self.extract(&request).await?;
        let script_path = script.write_to(workdir, &self.config.script_name).await?;

        let started = Instant::now();
        let output = Command::new(&self.config.interpreter)
            .args(&self.config.interpreter_args)
            .arg(&script_path)
            .envs(env.vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| Error::Spawn {
                program: self.config.interpreter.clone(),
                source,
            })?;
        let elapsed = started.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(
                exit_code = ?output.status.code(),
                "Notebook script failed after {:.1}s",
                elapsed.as_secs_f64()
            );
            return Err(Error::Execution {
                script: script_path,
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }

        info!("Notebook completed in {:.1}s", elapsed.as_secs_f64());

        // Cleanup is keyed on the request's output path, not the resolved one.
        let cleaned_up = if request.clean_up {
            debug!("Removing output directory {}", request.output_path.display());
            tokio::fs::remove_dir_all(&request.output_path)
                .await
                .map_err(|e| Error::io(&request.output_path, e))?;
            true
        } else {
            false
        };

        Ok(RunOutcome {
            notebook_path: request.notebook_path,
            script_path,
            script_lines: script.len(),
            env,
            exit_code: output.status.code(),
            stdout,
            stderr,
            elapsed,
            cleaned_up,
        })
    }
}
