//! Configuration types for template expansion and replay

use crate::error::{FuzzyError, FuzzyResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Expansion and replay settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FuzzerConfig {
    /// Request totals above this need explicit confirmation before sending
    pub confirm_threshold: usize,
    /// Upper bound on the length of any list or string a generator builds
    pub max_sequence_len: usize,
    /// Whether `lines()` and `read()` may touch the filesystem
    pub allow_file_access: bool,
    /// Base directory for relative paths given to the file helpers
    pub file_root: Option<PathBuf>,
    /// Stop sending after this many transport errors in a row (0 = never)
    pub stop_after_consecutive_errors: u32,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        Self {
            confirm_threshold: 20,
            max_sequence_len: 1_000_000,
            allow_file_access: true,
            file_root: None,
            stop_after_consecutive_errors: 0,
        }
    }
}

impl FuzzerConfig {
    pub fn validate(&self) -> FuzzyResult<()> {
        if self.max_sequence_len == 0 {
            return Err(FuzzyError::configuration(
                "max_sequence_len",
                "must be greater than zero",
            ));
        }

        if let Some(root) = &self.file_root {
            if root.as_os_str().is_empty() {
                return Err(FuzzyError::configuration(
                    "file_root",
                    "cannot be an empty path",
                ));
            }
        }

        Ok(())
    }

    /// Whether sending `count` requests should be confirmed by the user first
    pub fn needs_confirmation(&self, count: usize) -> bool {
        count > self.confirm_threshold
    }

    /// Resolve a path handed to a file helper
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        match &self.file_root {
            Some(root) if candidate.is_relative() => root.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }
}
