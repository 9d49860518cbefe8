//! The daemon's unlocked-vault state. Owned by the run loop thread only.

use bwm_core::{Collection, Folder, ItemId, Organization, VaultItem};
use bwm_vault::{SessionKey, VaultBackend};

use crate::error::DaemonError;

#[derive(Debug, Default)]
pub struct DaemonSession {
    key: Option<SessionKey>,
    pub items: Vec<VaultItem>,
    pub folders: Vec<Folder>,
    pub collections: Vec<Collection>,
    pub organizations: Vec<Organization>,
    previous: Option<ItemId>,
}

impl DaemonSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    pub fn require_key(&self) -> Result<&SessionKey, DaemonError> {
        self.key.as_ref().ok_or(DaemonError::NoSession)
    }

    /// Replace the session key. Cached lists belong to the old vault, so
    /// they go too.
    pub fn set_key(&mut self, key: SessionKey) {
        self.clear();
        self.key = Some(key);
    }

    /// Refresh every list from the backend. Lists that fail keep their
    /// previous contents and are named in [`DaemonError::PartialReload`].
    pub fn reload(&mut self, backend: &dyn VaultBackend) -> Result<(), DaemonError> {
        let key = self.key.as_ref().ok_or(DaemonError::NoSession)?;
        let mut failed = Vec::new();

        match backend.list_items(key) {
            Ok(items) => self.items = items,
            Err(err) => {
                tracing::warn!(error = %err, "item reload failed");
                failed.push("items");
            }
        }
        match backend.list_folders(key) {
            Ok(folders) => self.folders = folders,
            Err(err) => {
                tracing::warn!(error = %err, "folder reload failed");
                failed.push("folders");
            }
        }
        match backend.list_collections(key, None) {
            Ok(collections) => self.collections = collections,
            Err(err) => {
                tracing::warn!(error = %err, "collection reload failed");
                failed.push("collections");
            }
        }
        match backend.list_organizations(key) {
            Ok(organizations) => self.organizations = organizations,
            Err(err) => {
                tracing::warn!(error = %err, "organization reload failed");
                failed.push("organizations");
            }
        }

        if let Some(previous) = &self.previous {
            if !self.items.iter().any(|i| i.id.as_ref() == Some(previous)) {
                self.previous = None;
            }
        }

        tracing::info!(
            items = self.items.len(),
            folders = self.folders.len(),
            "vault reloaded"
        );
        if failed.is_empty() {
            Ok(())
        } else {
            Err(DaemonError::PartialReload { failed })
        }
    }

    pub fn previous(&self) -> Option<&VaultItem> {
        let id = self.previous.as_ref()?;
        self.items.iter().find(|item| item.id.as_ref() == Some(id))
    }

    pub fn set_previous(&mut self, id: Option<ItemId>) {
        self.previous = id;
    }

    /// Drop the session key and every cached record.
    pub fn clear(&mut self) {
        self.key = None;
        self.items.clear();
        self.folders.clear();
        self.collections.clear();
        self.organizations.clear();
        self.previous = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }
}
