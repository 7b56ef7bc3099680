//! Jupyter notebook document model
//!
//! Only the parts needed for script extraction are modelled: the ordered
//! `cells` array, each cell's `cell_type` and its `source` lines. Everything
//! else in the nbformat document is ignored.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Cell type tag of executable cells
pub const CODE_CELL: &str = "code";

/// A parsed notebook document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    /// Cells in document order
    pub cells: Vec<Cell>,
}

/// A single notebook cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Cell type tag (`code`, `markdown`, `raw`, ...)
    pub cell_type: String,
    /// Cell source
    #[serde(default)]
    pub source: CellSource,
}

/// Cell source as stored on disk
///
/// nbformat writes an array of physical lines, but a single multi-line
/// string is also valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    /// One element per physical line, trailing newline optional
    Lines(Vec<String>),
    /// Whole cell in one string
    Text(String),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Lines(Vec::new())
    }
}

impl CellSource {
    /// Physical lines of the cell, in order
    pub fn lines(&self) -> Vec<&str> {
        match self {
            CellSource::Lines(lines) => lines.iter().map(String::as_str).collect(),
            CellSource::Text(text) => text.split_inclusive('\n').collect(),
        }
    }
}

impl Cell {
    /// Whether this cell holds executable code
    pub fn is_code(&self) -> bool {
        self.cell_type == CODE_CELL
    }
}

impl Notebook {
    /// Load a notebook from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Load a notebook without blocking the async runtime
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| Error::Notebook {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Code cells in document order
    pub fn code_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|cell| cell.is_code())
    }

    /// All code cell lines, flattened in cell order then line order
    pub fn code_lines(&self) -> impl Iterator<Item = &str> {
        self.code_cells().flat_map(|cell| cell.source.lines())
    }
}

impl std::str::FromStr for Notebook {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}
