//! CLI error types.

use mdfig_config::ConfigError;
use mdfig_diagrams::ProcessError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Process(#[from] ProcessError),
}
