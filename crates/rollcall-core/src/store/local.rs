use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::models::Dataset;

/// Fixed key the dataset is stored under
pub const STORAGE_KEY: &str = "studytrackData";

/// Single-document, single-writer store for the dataset.
#[derive(Debug, Clone)]
pub struct DataStore {
    path: PathBuf,
}

impl DataStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("{}.json", STORAGE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted dataset.
    ///
    /// A missing, unreadable or malformed blob yields the empty dataset; the
    /// bad blob is left in place until the next `save` overwrites it.
    pub fn load(&self) -> Dataset {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored dataset, starting empty");
                return Dataset::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read stored dataset");
                return Dataset::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Stored dataset is malformed, using defaults");
                Dataset::default()
            }
        }
    }

    /// Serialize and overwrite the stored blob.
    pub fn save(&self, data: &Dataset) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write dataset to {}", self.path.display()))?;
        Ok(())
    }
}
