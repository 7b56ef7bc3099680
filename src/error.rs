//! Error types for the notebook runner

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of captured output lines kept in an execution error's message
const OUTPUT_TAIL_LINES: usize = 20;

/// Main error type for notebook runner operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Notebook document could not be parsed
    #[error("Failed to parse notebook {path}: {source}")]
    Notebook {
        /// Notebook file
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// IO error tied to a filesystem path
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path being read, written, created or removed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The interpreter process could not be started
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        /// Interpreter program
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The generated script exited unsuccessfully
    #[error("{}", execution_message(.script, .exit_code, .stdout, .stderr))]
    Execution {
        /// Script that was executed
        script: PathBuf,
        /// Exit code, `None` when terminated by a signal
        exit_code: Option<i32>,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for notebook runner operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Wrap an IO error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from the executed script rather than the harness
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

fn execution_message(script: &Path, exit_code: &Option<i32>, stdout: &str, stderr: &str) -> String {
    let status = match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };
    let mut msg = format!("Script {} failed with {}", script.display(), status);
    for (label, output) in [("stdout", stdout), ("stderr", stderr)] {
        let tail = tail_lines(output, OUTPUT_TAIL_LINES);
        if !tail.is_empty() {
            msg.push_str(&format!("\n--- {} ---\n{}", label, tail));
        }
    }
    msg
}

/// Last `n` lines of captured output
fn tail_lines(output: &str, n: usize) -> String {
    let lines: Vec<&str> = output.trim_end().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
