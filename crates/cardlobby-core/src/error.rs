//! Error types for core launching and catalog export.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Why a core process could not be brought up for a match.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to create handshake pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("failed to spawn core: {0}")]
    Spawn(#[source] io::Error),

    /// The core closed the handshake pipe without writing the sentinel,
    /// usually because it exited.
    #[error("core exited before signalling readiness")]
    CoreExited,

    /// The sentinel did not arrive in time. The core has been killed.
    #[error("core did not signal readiness within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("failed to read handshake pipe: {0}")]
    Handshake(#[source] io::Error),

    #[error("launching cores is not supported on this platform")]
    Unsupported,
}

/// Failures while refreshing or reading the additional cards catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to run catalog export: {0}")]
    Export(#[source] io::Error),

    #[error("catalog export did not finish within {0:?}")]
    ExportTimeout(Duration),
}
