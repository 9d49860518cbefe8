//! bwm core library — vault record types, configuration, paths, errors.
//!
//! - [`types`] — vault items, folders, collections and the [`VaultEntryView`] projection
//! - [`config`] — the immutable [`Config`] loaded once at startup
//! - [`paths`] — XDG file locations
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{
    ClipboardConfig, CommandLine, Config, EditConfig, MenuConfig, PasswordPreset, TypeLibrary,
    VaultCandidate, VaultConfig,
};
pub use error::ConfigError;
pub use types::{
    Card, Collection, CollectionId, CustomField, EntryKind, Folder, FolderId, Identity, ItemId,
    Login, LoginUri, Organization, OrganizationId, VaultEntryView, VaultItem,
};
