//! Named notebook cases and a sequential suite driver
//!
//! The criteo cases all read from `<dataset>/criteo/crit_int_pq`, write to
//! `<dataset>/criteo/crit_test` and request a batch size of 100000.

use serde::Serialize;
use std::num::NonZeroU64;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::runner::{NotebookRunner, RunOutcome, RunRequest};

/// Criteo input data, relative to the dataset root
pub const CRITEO_INPUT: &str = "criteo/crit_int_pq";
/// Criteo output data, relative to the dataset root
pub const CRITEO_OUTPUT: &str = "criteo/crit_test";

/// A fixed notebook with fixed data locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotebookCase {
    /// Case name
    pub name: &'static str,
    /// Notebook path relative to the notebooks root
    pub notebook: &'static str,
    /// Input data relative to the dataset root
    pub input: &'static str,
    /// Output data relative to the dataset root
    pub output: &'static str,
}

/// Known cases, in execution order
pub static CRITEO_CASES: [NotebookCase; 5] = [
    NotebookCase {
        name: "test_criteo_basedl",
        notebook: "torch/criteo-example-basedl.ipynb",
        input: CRITEO_INPUT,
        output: CRITEO_OUTPUT,
    },
    NotebookCase {
        name: "test_criteo_nvtdl",
        notebook: "torch/criteo-example-nvtdl.ipynb",
        input: CRITEO_INPUT,
        output: CRITEO_OUTPUT,
    },
    NotebookCase {
        name: "test_criteo_petadl",
        notebook: "torch/criteo-example-petastorm.ipynb",
        input: CRITEO_INPUT,
        output: CRITEO_OUTPUT,
    },
    NotebookCase {
        name: "test_criteo_preproc",
        notebook: "torch/criteo-example-preproc.ipynb",
        input: CRITEO_INPUT,
        output: CRITEO_OUTPUT,
    },
    NotebookCase {
        name: "test_criteo_hugectr",
        notebook: "torch/hugectr/criteo-hugectr.ipynb",
        input: CRITEO_INPUT,
        output: CRITEO_OUTPUT,
    },
];

impl NotebookCase {
    /// Look up a case by name
    pub fn find(name: &str) -> Option<&'static NotebookCase> {
        CRITEO_CASES.iter().find(|case| case.name == name)
    }

    /// Build the run request for this case
    pub fn request(
        &self,
        notebooks_root: &Path,
        dataset_dir: &Path,
        batch_size: NonZeroU64,
    ) -> RunRequest {
        RunRequest::new(
            notebooks_root.join(self.notebook),
            dataset_dir.join(self.input),
            dataset_dir.join(self.output),
        )
        .batch_size(batch_size)
    }
}

/// Outcome of a single case in a suite
#[derive(Debug)]
pub struct CaseReport {
    /// Case name
    pub name: &'static str,
    /// Run result
    pub result: Result<RunOutcome>,
}

impl CaseReport {
    /// Whether the case passed
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Results of a suite run
#[derive(Debug, Default)]
pub struct SuiteReport {
    /// Per-case reports in execution order
    pub cases: Vec<CaseReport>,
    /// Total wall-clock time
    pub elapsed: Duration,
}

impl SuiteReport {
    /// Number of passed cases
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.passed()).count()
    }

    /// Number of failed cases
    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    /// Whether every case passed
    pub fn success(&self) -> bool {
        self.failed() == 0
    }
}

/// Select cases by name; an empty filter selects all of them
pub fn select_cases(names: &[String]) -> Result<Vec<&'static NotebookCase>> {
    if names.is_empty() {
        return Ok(CRITEO_CASES.iter().collect());
    }

    names
        .iter()
        .map(|name| {
            NotebookCase::find(name)
                .ok_or_else(|| Error::invalid_input(format!("unknown notebook case `{}`", name)))
        })
        .collect()
}

/// Run cases one after another, each with its own temporary work directory
pub async fn run_cases(runner: &NotebookRunner, cases: &[&NotebookCase]) -> SuiteReport {
    let config = runner.config();
    let started = std::time::Instant::now();
    let mut report = SuiteReport::default();

    for case in cases {
        info!("Starting {}", case.name);
        let request = case.request(&config.notebooks_root, &config.dataset_dir, config.batch_size);

        let result = match tempfile::tempdir() {
            Ok(workdir) => runner.run(request, workdir.path()).await,
            Err(e) => Err(Error::io(std::env::temp_dir(), e)),
        };

        match &result {
            Ok(outcome) => info!("{} passed in {:.1}s", case.name, outcome.elapsed.as_secs_f64()),
            Err(e) => error!("{} failed: {}", case.name, e),
        }

        report.cases.push(CaseReport {
            name: case.name,
            result,
        });
    }

    report.elapsed = started.elapsed();
    report
}
