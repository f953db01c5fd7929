//! Class index to breed name table.
//!
//! The training notebook pickles a plain Python list of names. JSON arrays
//! and newline-delimited text files are accepted as well, chosen by
//! extension.

use std::path::Path;

use serde_pickle::DeOptions;
use tracing::info;

use crate::error::{VisionError, VisionResult};

/// Breed names indexed by classifier output position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreedNames {
    names: Vec<String>,
}

impl BreedNames {
    pub fn new(names: Vec<String>) -> VisionResult<Self> {
        if names.is_empty() {
            return Err(VisionError::BreedTable("table is empty".to_string()));
        }
        if let Some(i) = names.iter().position(|n| n.trim().is_empty()) {
            return Err(VisionError::BreedTable(format!("entry {} is blank", i)));
        }
        Ok(Self { names })
    }

    /// Load from a `.pickle`/`.pkl`, `.json` or text file.
    pub fn load(path: &Path) -> VisionResult<Self> {
        if !path.exists() {
            return Err(VisionError::ModelNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let names = match ext.as_str() {
            "pickle" | "pkl" => Self::parse_pickle(&bytes)?,
            "json" => Self::parse_json(&bytes)?,
            _ => Self::parse_lines(&bytes)?,
        };

        let table = Self::new(names)?;
        info!(path = %path.display(), breeds = table.len(), "Breed names loaded");
        Ok(table)
    }

    pub fn parse_pickle(bytes: &[u8]) -> VisionResult<Vec<String>> {
        serde_pickle::from_slice(bytes, DeOptions::new())
            .map_err(|e| VisionError::BreedTable(format!("pickle: {}", e)))
    }

    pub fn parse_json(bytes: &[u8]) -> VisionResult<Vec<String>> {
        serde_json::from_slice(bytes).map_err(|e| VisionError::BreedTable(format!("json: {}", e)))
    }

    pub fn parse_lines(bytes: &[u8]) -> VisionResult<Vec<String>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| VisionError::BreedTable(format!("text: {}", e)))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
