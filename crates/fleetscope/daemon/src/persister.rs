//! JSON-lines summary persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fleetscope_aggregator::{PersistError, Persister};
use fleetscope_types::FleetSummary;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Appends each summary as one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonLinesPersister {
    path: PathBuf,
}

impl JsonLinesPersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Persister for JsonLinesPersister {
    async fn save(&self, summary: &FleetSummary) -> Result<(), PersistError> {
        let mut line =
            serde_json::to_vec(summary).map_err(|e| PersistError::Encoding(e.to_string()))?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(path = %self.path.display(), bytes = line.len(), "Fleet summary persisted");
        Ok(())
    }
}
