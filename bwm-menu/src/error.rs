//! Error types for bwm-menu.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MenuError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (building tera context).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Could not start or talk to the menu or pinentry program.
    #[error("menu program {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("menu command line is empty")]
    NoCommand,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> MenuError {
    MenuError::Io {
        path: path.into(),
        source,
    }
}
