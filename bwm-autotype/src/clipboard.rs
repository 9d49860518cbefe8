//! Clipboard Sink: secrets go to the system clipboard instead of being typed,
//! then get cleared after a delay.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bwm_core::{CommandLine, Config, EntryKind, VaultEntryView};

use crate::error::AutotypeError;

pub trait ClipboardProvider: Send + Sync {
    fn set(&self, contents: &str) -> Result<(), AutotypeError>;
}

/// Pipes contents into an external clipboard program (`wl-copy`, `xsel -b -i`).
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    command: CommandLine,
}

impl CommandClipboard {
    pub fn new(command: CommandLine) -> Self {
        Self { command }
    }
}

impl ClipboardProvider for CommandClipboard {
    fn set(&self, contents: &str) -> Result<(), AutotypeError> {
        let program = self
            .command
            .program()
            .ok_or_else(|| AutotypeError::Clipboard("no clipboard command configured".to_string()))?;
        let mut child = Command::new(program)
            .args(self.command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AutotypeError::Clipboard(format!("{program}: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(contents.as_bytes())
                .map_err(|e| AutotypeError::Clipboard(format!("{program}: {e}")))?;
        }
        let status = child
            .wait()
            .map_err(|e| AutotypeError::Clipboard(format!("{program}: {e}")))?;
        if !status.success() {
            return Err(AutotypeError::Clipboard(format!("{program} exited with {status}")));
        }
        Ok(())
    }
}

/// Sets the clipboard and schedules a clear. A newer copy supersedes any
/// pending clear from an older one.
#[derive(Clone)]
pub struct ClipboardSink {
    provider: Arc<dyn ClipboardProvider>,
    clear_after: Duration,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for ClipboardSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardSink")
            .field("clear_after", &self.clear_after)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl ClipboardSink {
    pub fn new(provider: Arc<dyn ClipboardProvider>, clear_after: Duration) -> Self {
        Self {
            provider,
            clear_after,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sink backed by the configured clipboard program for this session type.
    pub fn from_config(config: &Config) -> Self {
        let wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();
        let command = config.clipboard.command_for(wayland);
        Self::new(
            Arc::new(CommandClipboard::new(command)),
            config.clipboard_clear_after(),
        )
    }

    /// Copy the entry's secret: the password for logins, the number for cards.
    pub fn copy_secret(&self, entry: VaultEntryView<'_>) -> Result<(), AutotypeError> {
        let secret = match entry.kind {
            EntryKind::Login => entry.password,
            EntryKind::Card => entry.card_number,
            other => {
                return Err(AutotypeError::Clipboard(format!(
                    "{other} entries cannot be copied directly. \
                     Use 'View/Type individual entries' to copy a single field."
                )))
            }
        };
        self.copy(secret.unwrap_or(""))
    }

    /// Set the clipboard now and clear it after the configured delay.
    pub fn copy(&self, text: &str) -> Result<(), AutotypeError> {
        self.provider.set(text)?;
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(clear_after = ?self.clear_after, "clipboard set");

        let provider = Arc::clone(&self.provider);
        let generation = Arc::clone(&self.generation);
        let delay = self.clear_after;
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            if generation.load(Ordering::SeqCst) != mine {
                return;
            }
            if let Err(e) = provider.set("") {
                tracing::warn!(error = %e, "failed to clear clipboard");
            }
        });
        Ok(())
    }

    /// Clear immediately and cancel any pending clear.
    pub fn clear_now(&self) -> Result<(), AutotypeError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.provider.set("")
    }
}
