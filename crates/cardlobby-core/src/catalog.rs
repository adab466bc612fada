//! The additional cards catalog.
//!
//! The catalog is a JSON file written by the core binary when it is run
//! with `--additional_cards_path=<path>`. The lobby re-runs that export
//! when the file is missing or has been modified since the lobby last
//! looked at it, and keeps the parsed catalog in memory in between.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use cardlobby_protocol::AdditionalCardsResponse;

use crate::{CatalogError, CoreInfo};

pub struct CardCatalog {
    path: PathBuf,
    core: CoreInfo,
    export_timeout: Duration,
    last_seen: Option<SystemTime>,
    cached: Option<AdditionalCardsResponse>,
}

impl CardCatalog {
    /// Creates a catalog backed by `path`. A file already present counts as
    /// seen, so it is served without an export.
    pub fn new(path: impl Into<PathBuf>, core: CoreInfo, export_timeout: Duration) -> Self {
        let path = path.into();
        let last_seen = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        Self {
            path,
            core,
            export_timeout,
            last_seen,
            cached: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current catalog, exporting it first if needed.
    ///
    /// A failed export is logged and the file is read anyway. If there is
    /// still no file, the catalog is empty.
    pub async fn load(&mut self) -> Result<AdditionalCardsResponse, CatalogError> {
        let modified = modified_time(&self.path).await;
        let stale = match (modified, self.last_seen) {
            (None, _) | (Some(_), None) => true,
            (Some(now), Some(seen)) => now > seen,
        };

        if stale {
            if let Err(e) = self.export().await {
                tracing::warn!(path = %self.path.display(), error = %e, "catalog export failed");
            }
            self.cached = None;
        } else if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }

        let Some(modified) = modified_time(&self.path).await else {
            tracing::warn!(path = %self.path.display(), "no additional cards file exists");
            return Ok(AdditionalCardsResponse::default());
        };
        let catalog = self.read().await?;
        tracing::debug!(cards = catalog.cards.len(), "additional cards loaded");
        self.last_seen = Some(modified);
        self.cached = Some(catalog.clone());
        Ok(catalog)
    }

    async fn read(&self) -> Result<AdditionalCardsResponse, CatalogError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| CatalogError::Read {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| CatalogError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Runs the core in export mode and waits for it, killing it if it
    /// takes longer than the export timeout.
    async fn export(&self) -> Result<(), CatalogError> {
        let target = std::path::absolute(&self.path).map_err(CatalogError::Export)?;
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(CatalogError::Export)?;
        }

        let mut command = self.core.command();
        command.arg(format!("--additional_cards_path={}", target.display()));
        let mut child = command.spawn().map_err(CatalogError::Export)?;
        tracing::info!(path = %target.display(), "exporting additional cards");

        match tokio::time::timeout(self.export_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "catalog export finished");
                Ok(())
            }
            Ok(Err(e)) => Err(CatalogError::Export(e)),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::debug!(error = %e, "failed to kill catalog export");
                }
                Err(CatalogError::ExportTimeout(self.export_timeout))
            }
        }
    }
}

async fn modified_time(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
}
