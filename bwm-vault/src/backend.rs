//! The operations the rest of bwm needs from a vault.

use bwm_core::{
    Collection, CollectionId, Folder, FolderId, ItemId, Organization, OrganizationId, VaultItem,
};

use crate::error::VaultError;
use crate::session::{SessionKey, TwoFactor, VaultStatus};

/// Structured access to a vault. Every call either returns records or an
/// explicit [`VaultError`]; callers never see empty-on-failure results.
pub trait VaultBackend: Send {
    fn status(&self, session: Option<&SessionKey>) -> Result<VaultStatus, VaultError>;

    fn set_server(&self, url: &str) -> Result<(), VaultError>;

    fn login(
        &self,
        email: &str,
        password: &str,
        two_factor: Option<&TwoFactor>,
    ) -> Result<SessionKey, VaultError>;

    fn unlock(&self, password: &str) -> Result<SessionKey, VaultError>;

    fn lock(&self) -> Result<(), VaultError>;

    fn logout(&self) -> Result<(), VaultError>;

    fn sync(&self, session: &SessionKey) -> Result<(), VaultError>;

    fn list_items(&self, session: &SessionKey) -> Result<Vec<VaultItem>, VaultError>;

    fn list_folders(&self, session: &SessionKey) -> Result<Vec<Folder>, VaultError>;

    /// All collections, or only those of `organization`.
    fn list_collections(
        &self,
        session: &SessionKey,
        organization: Option<&OrganizationId>,
    ) -> Result<Vec<Collection>, VaultError>;

    fn list_organizations(&self, session: &SessionKey) -> Result<Vec<Organization>, VaultError>;

    fn create_item(&self, session: &SessionKey, item: &VaultItem)
        -> Result<VaultItem, VaultError>;

    fn update_item(&self, session: &SessionKey, item: &VaultItem)
        -> Result<VaultItem, VaultError>;

    fn delete_item(&self, session: &SessionKey, id: &ItemId) -> Result<(), VaultError>;

    /// Share an item into an organization's collections.
    fn move_item(
        &self,
        session: &SessionKey,
        id: &ItemId,
        organization: &OrganizationId,
        collections: &[CollectionId],
    ) -> Result<VaultItem, VaultError>;

    /// Replace the collections of an item already in an organization.
    fn set_item_collections(
        &self,
        session: &SessionKey,
        id: &ItemId,
        collections: &[CollectionId],
    ) -> Result<(), VaultError>;

    fn create_folder(&self, session: &SessionKey, name: &str) -> Result<Folder, VaultError>;

    fn rename_folder(
        &self,
        session: &SessionKey,
        id: &FolderId,
        name: &str,
    ) -> Result<Folder, VaultError>;

    fn delete_folder(&self, session: &SessionKey, id: &FolderId) -> Result<(), VaultError>;

    fn create_collection(
        &self,
        session: &SessionKey,
        organization: &OrganizationId,
        name: &str,
    ) -> Result<Collection, VaultError>;

    fn rename_collection(
        &self,
        session: &SessionKey,
        collection: &Collection,
        name: &str,
    ) -> Result<Collection, VaultError>;

    fn delete_collection(
        &self,
        session: &SessionKey,
        organization: &OrganizationId,
        id: &CollectionId,
    ) -> Result<(), VaultError>;
}
