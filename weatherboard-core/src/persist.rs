use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::debug;

use crate::{Config, store::Snapshot};

/// JSON file holding the dashboard snapshot between runs.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file in the platform data directory.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Config::state_file_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` on first run, when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read state file: {}", self.path.display())
                });
            }
        };

        let snapshot = Snapshot::from_json(&contents)
            .with_context(|| format!("Invalid state file: {}", self.path.display()))?;

        debug!(
            path = %self.path.display(),
            pinned = snapshot.pinned_locations.len(),
            "Loaded state snapshot"
        );
        Ok(Some(snapshot))
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }

        let json = snapshot.to_json()?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        debug!(path = %self.path.display(), "Saved state snapshot");
        Ok(())
    }
}
