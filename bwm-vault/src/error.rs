use std::path::PathBuf;

use thiserror::Error;

/// Any failure reported by, or while talking to, the vault backend.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("I/O error running {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend ran but reported failure (non-zero exit or no output).
    #[error("bw {args} failed: {stderr}")]
    Command { args: String, stderr: String },

    #[error("unexpected output from bw {args}: {source}")]
    Json {
        args: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} has no id yet")]
    MissingId(&'static str),

    #[error("vault command line is empty")]
    NoCommand,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> VaultError {
    VaultError::Io {
        path: path.into(),
        source,
    }
}
