//! Flat script assembly from notebook code cells

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::notebook::Notebook;

/// Prefixes of interactive-interpreter directives (magics and shell escapes)
pub const DIRECTIVE_PREFIXES: [char; 2] = ['%', '!'];

/// Rewrites one extracted line before it is added to the script
pub trait LineTransform: Send + Sync {
    /// Transform a single line; the input has no trailing whitespace
    fn transform(&self, line: &str) -> String;
}

impl<F> LineTransform for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn transform(&self, line: &str) -> String {
        self(line)
    }
}

/// Leaves lines unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl LineTransform for Identity {
    fn transform(&self, line: &str) -> String {
        line.to_string()
    }
}

/// Replaces every occurrence of a substring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    /// Text to look for
    pub from: String,
    /// Replacement text
    pub to: String,
}

impl Replace {
    /// Create a replacement transform
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl std::str::FromStr for Replace {
    type Err = Error;

    /// Parse `FROM=TO`; the first `=` separates the two halves
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((from, to)) if !from.is_empty() => Ok(Self::new(from, to)),
            _ => Err(Error::invalid_input(format!(
                "expected FROM=TO with a non-empty FROM, got `{}`",
                s
            ))),
        }
    }
}

impl LineTransform for Replace {
    fn transform(&self, line: &str) -> String {
        line.replace(&self.from, &self.to)
    }
}

/// Applies transforms left to right
#[derive(Default)]
pub struct Chain(pub Vec<Box<dyn LineTransform>>);

impl LineTransform for Chain {
    fn transform(&self, line: &str) -> String {
        self.0
            .iter()
            .fold(line.to_string(), |acc, t| t.transform(&acc))
    }
}

/// Whether a line is an interpreter directive that plain scripts cannot run
pub fn is_directive(line: &str) -> bool {
    line.starts_with(DIRECTIVE_PREFIXES)
}

/// Script extracted from a notebook
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    lines: Vec<String>,
}

impl Script {
    /// Extract the code cells of a notebook.
    ///
    /// Directive lines are dropped, trailing whitespace is trimmed from every
    /// kept line and the transform, if any, runs on the trimmed line.
    pub fn from_notebook(notebook: &Notebook, transform: Option<&dyn LineTransform>) -> Self {
        let lines = notebook
            .code_lines()
            .filter(|line| !is_directive(line))
            .map(str::trim_end)
            .map(|line| match transform {
                Some(t) => t.transform(line),
                None => line.to_string(),
            })
            .collect();

        Self { lines }
    }

    /// Script lines in order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the script has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Script text, lines joined with `\n`
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    /// Write the script into `dir` as `file_name`, returning its path
    pub async fn write_to(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        let path = dir.join(file_name);
        tokio::fs::write(&path, self.render())
            .await
            .map_err(|e| Error::io(&path, e))?;
        debug!("Wrote {} script lines to {}", self.len(), path.display());
        Ok(path)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
