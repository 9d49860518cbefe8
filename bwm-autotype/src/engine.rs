//! Entry-level autotype: picks the sequence, honours the per-entry switch,
//! and routes output to a backend or to the clipboard.

use bwm_core::{Config, VaultItem};

use crate::backend::{dispatch, Backend, KeyInjector};
use crate::clipboard::ClipboardSink;
use crate::error::AutotypeError;

/// Where the secret output of one cycle goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Autotype,
    Clipboard,
}

#[derive(Debug, Clone)]
pub struct AutotypeEngine {
    backend: Backend,
    default_sequence: String,
}

impl AutotypeEngine {
    pub fn new(config: &Config) -> Self {
        Self::with_backend(
            Backend::from_library(config.vault.type_library),
            config.vault.autotype_default.clone(),
        )
    }

    pub fn with_backend(backend: Backend, default_sequence: impl Into<String>) -> Self {
        Self {
            backend,
            default_sequence: default_sequence.into(),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// One-shot override, then the entry's `autotype` field, then the default.
    pub fn sequence_for<'a>(&'a self, item: &'a VaultItem, one_shot: Option<&'a str>) -> &'a str {
        one_shot
            .filter(|seq| !seq.trim().is_empty())
            .or_else(|| item.autotype_sequence())
            .unwrap_or(self.default_sequence.as_str())
    }

    pub fn type_entry(
        &self,
        item: &VaultItem,
        one_shot: Option<&str>,
        injector: &mut dyn KeyInjector,
    ) -> Result<usize, AutotypeError> {
        if !item.autotype_enabled() {
            return Err(AutotypeError::Disabled);
        }
        let sequence = self.sequence_for(item, one_shot);
        dispatch(sequence, item.view(), self.backend.key_table(), injector)
    }

    /// Type one field's text verbatim, bypassing the template language.
    pub fn type_text(&self, text: &str, injector: &mut dyn KeyInjector) -> Result<(), AutotypeError> {
        if text.is_empty() {
            return Ok(());
        }
        injector.type_text(text)
    }

    /// Send an entry to the clipboard or type it. The injector factory is
    /// only called in autotype mode.
    pub fn deliver<F>(
        &self,
        item: &VaultItem,
        one_shot: Option<&str>,
        mode: OutputMode,
        clipboard: &ClipboardSink,
        make_injector: F,
    ) -> Result<(), AutotypeError>
    where
        F: FnOnce(Backend) -> Result<Box<dyn KeyInjector>, AutotypeError>,
    {
        match mode {
            OutputMode::Clipboard => clipboard.copy_secret(item.view()),
            OutputMode::Autotype => {
                if !item.autotype_enabled() {
                    return Err(AutotypeError::Disabled);
                }
                let mut injector = make_injector(self.backend)?;
                self.type_entry(item, one_shot, injector.as_mut()).map(drop)
            }
        }
    }
}
