use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the rendezvous, the wire protocol and the run loop.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not encode auth file: {0}")]
    AuthEncode(#[from] toml::ser::Error),

    /// Auth file unreadable, unparsable, or rejected by the running daemon.
    #[error("session cache corrupted: {0}")]
    SessionCorrupt(String),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    /// Some vault lists failed to refresh; the previous copies are kept.
    #[error("could not refresh {}; showing cached data", failed.join(", "))]
    PartialReload { failed: Vec<&'static str> },

    /// Every configured vault candidate failed to log in or unlock.
    #[error("no vault could be unlocked")]
    NoVault,

    #[error("vault is locked")]
    NoSession,

    /// The user backed out before the vault was touched.
    #[error("cancelled")]
    Cancelled,

    /// The user backed out of a login after the vault was switched away
    /// from the previous session.
    #[error("login cancelled")]
    LoginCancelled,

    #[error("password length {length} cannot cover {sets} character sets")]
    PasswordTooShort { length: usize, sets: usize },

    #[error("no notes editor configured")]
    NoEditor,

    #[error("no characters to generate a password from")]
    EmptyCharset,

    #[error(transparent)]
    Vault(#[from] bwm_vault::VaultError),

    #[error(transparent)]
    Menu(#[from] bwm_menu::MenuError),

    #[error(transparent)]
    Autotype(#[from] bwm_autotype::AutotypeError),

    #[error(transparent)]
    Config(#[from] bwm_core::ConfigError),
}

impl DaemonError {
    /// A user cancel, which is never shown as an error.
    pub fn is_cancel(&self) -> bool {
        matches!(self, DaemonError::Cancelled | DaemonError::LoginCancelled)
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
