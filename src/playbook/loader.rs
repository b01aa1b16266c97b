//! Data loaders for included task files
//!
//! The compiler only needs `load_from_file`: given a path, return the
//! parsed YAML document. Relative paths are resolved against the
//! loader's base directory.

use crate::error::{PlaybookError, Result};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source of parsed task files
pub trait DataLoader: Send + Sync {
    fn load_from_file(&self, path: &str) -> Result<Value>;
}

/// Reads YAML files from disk
#[derive(Debug, Clone)]
pub struct FileLoader {
    base_dir: PathBuf,
}

impl FileLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Resolve `path` against the base directory
    pub fn path_dwim(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_dir.join(candidate)
        }
    }
}

impl DataLoader for FileLoader {
    fn load_from_file(&self, path: &str) -> Result<Value> {
        let full_path = self.path_dwim(path);
        debug!("loading task file {}", full_path.display());

        let contents = std::fs::read_to_string(&full_path).map_err(|e| PlaybookError::Load {
            path: full_path.display().to_string(),
            message: e.to_string(),
        })?;
        parse_document(path, &contents)
    }
}

/// Serves task files from memory, keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.add_file(path, contents);
        self
    }
}

impl DataLoader for MemoryLoader {
    fn load_from_file(&self, path: &str) -> Result<Value> {
        let contents = self.files.get(path).ok_or_else(|| PlaybookError::Load {
            path: path.to_string(),
            message: "no such file".to_string(),
        })?;
        parse_document(path, contents)
    }
}

fn parse_document(path: &str, contents: &str) -> Result<Value> {
    serde_yaml::from_str(contents).map_err(|e| PlaybookError::Load {
        path: path.to_string(),
        message: format!("YAML parse error: {}", e),
    })
}
