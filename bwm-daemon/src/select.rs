//! Picking a vault candidate and getting a session key for it.

use std::process::{Command, Stdio};

use bwm_core::{CommandLine, VaultCandidate};
use bwm_menu::Menu;
use bwm_vault::{LockState, SessionKey, TwoFactor, VaultBackend};
use zeroize::Zeroizing;

use crate::error::{io_err, DaemonError};

/// Order `candidates` so the one to try first is at the front: the one
/// matching `target`, else the user's pick when there is a choice.
pub fn choose_candidate(
    candidates: &mut [VaultCandidate],
    target: Option<&str>,
    menu: &dyn Menu,
) -> Result<(), DaemonError> {
    let wanted = match target {
        Some(url) => candidates
            .iter()
            .position(|c| same_server(&c.server, url)),
        None if candidates.len() > 1 => {
            let lines: Vec<String> = candidates.iter().map(|c| c.server.clone()).collect();
            let choice = menu
                .select("Select vault", &lines, false)?
                .ok_or(DaemonError::Cancelled)?;
            lines.iter().position(|line| *line == choice)
        }
        None => None,
    };
    if let Some(pos) = wanted {
        candidates[..=pos].rotate_right(1);
    }
    Ok(())
}

/// Try candidates front to back. A failed candidate is reported and moved
/// to the back; when none succeeds there is no session.
pub fn unlock_any(
    candidates: &mut [VaultCandidate],
    backend: &dyn VaultBackend,
    menu: &dyn Menu,
) -> Result<SessionKey, DaemonError> {
    for _ in 0..candidates.len() {
        match unlock_candidate(&candidates[0], backend, menu) {
            Ok(key) => {
                tracing::info!(server = %candidates[0].server, "vault unlocked");
                return Ok(key);
            }
            Err(DaemonError::Cancelled) => return Err(DaemonError::Cancelled),
            Err(err) => {
                tracing::warn!(server = %candidates[0].server, error = %err, "vault unlock failed");
                if let Err(menu_err) = menu.error(&err.to_string()) {
                    tracing::warn!(error = %menu_err, "could not show error");
                }
                candidates.rotate_left(1);
            }
        }
    }
    Err(DaemonError::NoVault)
}

/// Bring the backend to an unlocked session for `candidate`.
pub fn unlock_candidate(
    candidate: &VaultCandidate,
    backend: &dyn VaultBackend,
    menu: &dyn Menu,
) -> Result<SessionKey, DaemonError> {
    let mut status = backend.status(None)?;

    let server_matches = status
        .server_url
        .as_deref()
        .is_some_and(|url| same_server(url, &candidate.server));
    if !server_matches {
        if status.status != LockState::Unauthenticated {
            backend.logout()?;
        }
        backend.set_server(&candidate.server)?;
        status.status = LockState::Unauthenticated;
        status.user_email = None;
    }

    let email = candidate.email.as_deref().unwrap_or_default();
    let email_matches = status
        .user_email
        .as_deref()
        .is_some_and(|current| current.eq_ignore_ascii_case(email));
    if status.status != LockState::Unauthenticated && !email_matches {
        backend.logout()?;
        status.status = LockState::Unauthenticated;
    }

    let password = resolve_password(candidate, menu)?;
    match status.status {
        LockState::Unauthenticated => {
            let two_factor = match candidate.twofactor {
                Some(method) => Some(TwoFactor {
                    method,
                    code: ask_code(menu)?,
                }),
                None => None,
            };
            Ok(backend.login(email, &password, two_factor.as_ref())?)
        }
        LockState::Locked | LockState::Unlocked => Ok(backend.unlock(&password)?),
    }
}

/// Configured password, then `password_cmd` output, then a prompt (pinentry
/// when configured).
pub fn resolve_password(
    candidate: &VaultCandidate,
    menu: &dyn Menu,
) -> Result<Zeroizing<String>, DaemonError> {
    if let Some(password) = candidate.password.as_deref().filter(|p| !p.is_empty()) {
        return Ok(Zeroizing::new(password.to_string()));
    }
    if let Some(command) = &candidate.password_cmd {
        if let Some(password) = password_from_command(command)? {
            return Ok(password);
        }
    }
    let prompt = format!("Enter password for {}", candidate.server);
    menu.passphrase(&prompt)?
        .filter(|p| !p.is_empty())
        .ok_or(DaemonError::Cancelled)
}

fn password_from_command(command: &CommandLine) -> Result<Option<Zeroizing<String>>, DaemonError> {
    let Some(program) = command.program() else {
        return Ok(None);
    };
    let output = Command::new(program)
        .args(command.args())
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| io_err(program, e))?;
    let stdout = Zeroizing::new(String::from_utf8_lossy(&output.stdout).into_owned());
    if !output.status.success() {
        tracing::warn!(program, status = %output.status, "password command failed");
        return Ok(None);
    }
    Ok(stdout
        .lines()
        .next()
        .filter(|line| !line.is_empty())
        .map(|line| Zeroizing::new(line.to_string())))
}

fn ask_code(menu: &dyn Menu) -> Result<String, DaemonError> {
    menu.select("Enter two-factor code", &[], false)?
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .ok_or(DaemonError::Cancelled)
}

fn same_server(a: &str, b: &str) -> bool {
    a.trim_end_matches('/').eq_ignore_ascii_case(b.trim_end_matches('/'))
}
