//! CLI error types.

use pgrls::ManifestError;
use thiserror::Error;

use crate::config::ManifestSource;

/// Errors that end the process with a failure status.
#[derive(Debug, Error)]
pub enum CliError {
    /// The manifest could not be read.
    #[error("failed to read {source_name}: {error}")]
    Read {
        source_name: ManifestSource,
        #[source]
        error: std::io::Error,
    },

    /// The manifest could not be loaded or rendered.
    #[error("{source_name}: {error}")]
    Manifest {
        source_name: ManifestSource,
        #[source]
        error: ManifestError,
    },
}
