//! Notebook Runner - execute Jupyter notebooks as tests
//!
//! This crate extracts the code cells of a notebook into a flat script,
//! points the script at its data through `INPUT_DATA_DIR`, `OUTPUT_DATA_DIR`
//! and `BATCH_SIZE`, and runs it in a subprocess. A notebook passes when the
//! subprocess exits with status 0.
//!
//! ```no_run
//! use notebook_runner::{NotebookRunner, RunRequest, RunnerConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RunnerConfig::default();
//! let batch_size = config.batch_size;
//! let runner = NotebookRunner::new(config);
//! let workdir = tempfile::tempdir()?;
//! let request = RunRequest::new(
//!     "torch/criteo-example-basedl.ipynb",
//!     "/raid/data/criteo/crit_int_pq",
//!     "/raid/data/criteo/crit_test",
//! )
//! .batch_size(batch_size);
//!
//! runner.run(request, workdir.path()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod notebook;
pub mod runner;
pub mod script;
pub mod suite;

// Re-exports
pub use crate::config::RunnerConfig;
pub use crate::env::{EnvScope, EnvSource, NotebookEnv};
pub use crate::error::{Error, Result};
pub use crate::notebook::Notebook;
pub use crate::runner::{NotebookRunner, RunOutcome, RunRequest};
pub use crate::script::{LineTransform, Script};
pub use crate::suite::{NotebookCase, CRITEO_CASES};

/// Current version of the notebook runner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
