//! The rendezvous file: `port = N` and `authkey = "..."` in TOML, mode 0600.
//!
//! The file is published with a hard link from a private temp file, so it
//! appears complete or not at all, and only one process can create it.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, DaemonError};

pub const AUTHKEY_LEN: usize = 32;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEnvelope {
    pub port: u16,
    pub authkey: String,
}

impl fmt::Debug for AuthEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthEnvelope")
            .field("port", &self.port)
            .field("authkey", &"<redacted>")
            .finish()
    }
}

impl AuthEnvelope {
    /// Fresh envelope for a listener bound on `port`.
    pub fn generate(port: u16) -> Self {
        Self {
            port,
            authkey: Alphanumeric.sample_string(&mut rand::rng(), AUTHKEY_LEN),
        }
    }

    /// `Ok(None)` when no daemon has published a file yet. Anything present
    /// but unusable is [`DaemonError::SessionCorrupt`].
    pub fn load(path: &Path) -> Result<Option<Self>, DaemonError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(DaemonError::SessionCorrupt(format!(
                    "cannot read {}: {err}",
                    path.display()
                )))
            }
        };
        let envelope: AuthEnvelope = toml::from_str(&raw).map_err(|err| {
            DaemonError::SessionCorrupt(format!("cannot parse {}: {err}", path.display()))
        })?;
        if envelope.port == 0 || envelope.authkey.is_empty() {
            return Err(DaemonError::SessionCorrupt(format!(
                "{} holds no usable port or key",
                path.display()
            )));
        }
        Ok(Some(envelope))
    }

    /// Publish at `path` unless a file already exists there.
    /// Returns `false` when another process got there first.
    pub fn publish(&self, path: &Path) -> Result<bool, DaemonError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let tmp = temp_path(path);
        let body = toml::to_string(self)?;
        fs::write(&tmp, body).map_err(|e| io_err(&tmp, e))?;
        let linked = set_file_permissions(&tmp).and_then(|()| match fs::hard_link(&tmp, path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(io_err(path, err)),
        });
        let _ = fs::remove_file(&tmp);
        linked
    }

    /// Remove `path` only if it still holds this envelope.
    pub fn remove_if_current(&self, path: &Path) -> Result<(), DaemonError> {
        match Self::load(path) {
            Ok(Some(current)) if current == *self => remove(path),
            _ => Ok(()),
        }
    }
}

/// Delete the auth file; a missing file is fine.
pub fn remove(path: &Path) -> Result<(), DaemonError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(".bwm-auth");
    let salt: u32 = rand::random();
    path.with_file_name(format!("{name}.{}.{salt:08x}.tmp", std::process::id()))
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
