//! Entry editing: the item form behind "Edit entries" and "Add entry".
//!
//! The form is a menu of `Label: value` lines; picking one edits that
//! field and the form comes back until the entry is saved, deleted or the
//! menu is cancelled (which discards the changes). Vault writes go through
//! the [`VaultBackend`]; the caller reloads the session afterwards.

use std::io::Write;
use std::process::Command;

use bwm_core::types::AUTOTYPE_FIELD;
use bwm_core::{
    Collection, CollectionId, CustomField, EditConfig, EntryKind, Folder, Login, LoginUri,
    Organization, OrganizationId, VaultItem,
};
use bwm_menu::Menu;
use bwm_vault::{SessionKey, VaultBackend, VaultError};
use zeroize::Zeroizing;

use crate::error::{io_err, DaemonError};
use crate::passgen;

pub const NO_FOLDER: &str = "No Folder";
pub const DELETE: &str = "Delete entry";
pub const SAVE: &str = "Save entry";
pub const GENERATE: &str = "Generate password";
pub const MANUAL: &str = "Manually enter password";
pub const CONFIRM_DELETE: &str = "Yes - confirm delete";
pub const MISMATCH: &str = "Passwords do not match. No changes made.";

const NONE: &str = "None";

/// What the form did to the vault.
#[derive(Debug, Clone, PartialEq)]
pub enum Edited {
    Saved(VaultItem),
    Deleted,
    Unchanged,
}

impl Edited {
    pub fn changed(&self) -> bool {
        !matches!(self, Edited::Unchanged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Name,
    Folder,
    Collections,
    Username,
    Password,
    Url,
    Autotype,
    Notes,
    Delete,
    Save,
}

/// How saving moves an item between the personal vault and collections.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CollectionChange {
    None,
    Share {
        organization: OrganizationId,
        collections: Vec<CollectionId>,
    },
    Update(Vec<CollectionId>),
    Unshare,
}

fn collection_change(original: &VaultItem, edited: &VaultItem) -> CollectionChange {
    if original.organization_id == edited.organization_id
        && original.collection_ids == edited.collection_ids
    {
        return CollectionChange::None;
    }
    match (&original.organization_id, &edited.organization_id) {
        (None, Some(organization)) if !edited.collection_ids.is_empty() => {
            CollectionChange::Share {
                organization: organization.clone(),
                collections: edited.collection_ids.clone(),
            }
        }
        (Some(_), Some(_)) if edited.collection_ids.is_empty() => CollectionChange::Unshare,
        (Some(_), Some(_)) => CollectionChange::Update(edited.collection_ids.clone()),
        _ => CollectionChange::None,
    }
}

/// Borrowed view of an unlocked session, enough to edit entries and to
/// manage folders and collections.
pub struct Editor<'a> {
    pub menu: &'a dyn Menu,
    pub backend: &'a dyn VaultBackend,
    pub key: &'a SessionKey,
    pub config: &'a EditConfig,
    pub folders: &'a [Folder],
    pub collections: &'a [Collection],
    pub organizations: &'a [Organization],
}

impl Editor<'_> {
    pub fn edit_entry(&self, item: VaultItem) -> Result<Edited, DaemonError> {
        self.edit_form(item)
    }

    /// Pick a folder, then fill in a new login.
    pub fn add_entry(&self) -> Result<Edited, DaemonError> {
        let Some(folder) = self.pick_folder("Select folder for new entry")? else {
            return Ok(Edited::Unchanged);
        };
        let mut item = VaultItem::new(EntryKind::Login, "");
        item.folder_id = folder.id;
        self.edit_form(item)
    }

    fn edit_form(&self, mut item: VaultItem) -> Result<Edited, DaemonError> {
        let original = item.clone();
        loop {
            let rows = self.form(&item);
            let lines: Vec<String> = rows.iter().map(|(_, line)| line.clone()).collect();
            let prompt = if item.id.is_some() { "Edit entry" } else { "New entry" };
            let Some(choice) = self.menu.select(prompt, &lines, false)? else {
                tracing::debug!("entry edit abandoned");
                return Ok(Edited::Unchanged);
            };
            let Some(field) = rows.iter().find(|(_, line)| *line == choice).map(|(f, _)| *f)
            else {
                continue;
            };

            match field {
                FormField::Name => {
                    let name = ask_text(self.menu, "Name", &item.name)?;
                    if let Some(name) = name.filter(|name| !name.is_empty()) {
                        item.name = name;
                    }
                }
                FormField::Folder => {
                    if let Some(folder) = self.pick_folder("Select folder")? {
                        item.folder_id = folder.id;
                    }
                }
                FormField::Collections => self.edit_collections(&mut item)?,
                FormField::Username => {
                    let login = item.login.get_or_insert_with(Login::default);
                    let current = login.username.as_deref().unwrap_or_default();
                    if let Some(username) = ask_text(self.menu, "Username", current)? {
                        login.username = none_if_blank(username);
                    }
                }
                FormField::Password => {
                    if let Some(password) = self.edit_password()? {
                        let login = item.login.get_or_insert_with(Login::default);
                        login.password = Some(password.as_str().to_string());
                    }
                }
                FormField::Url => {
                    let current = item.first_url().unwrap_or_default().to_string();
                    if let Some(url) = ask_text(self.menu, "Url", &current)? {
                        set_url(&mut item, none_if_blank(url));
                    }
                }
                FormField::Autotype => {
                    let current = item.field(AUTOTYPE_FIELD).unwrap_or_default().to_string();
                    if let Some(sequence) = ask_text(self.menu, "Autotype", &current)? {
                        set_field(&mut item, AUTOTYPE_FIELD, none_if_blank(sequence));
                    }
                }
                FormField::Notes => {
                    if let Some(notes) = self.edit_notes(item.notes.as_deref())? {
                        item.notes = none_if_blank(notes);
                    }
                }
                FormField::Delete => match self.delete_entry(&item) {
                    Ok(true) => return Ok(Edited::Deleted),
                    Ok(false) => {}
                    Err(err @ DaemonError::Vault(_)) => self.menu.error(&err.to_string())?,
                    Err(err) => return Err(err),
                },
                FormField::Save => {
                    if item.name.trim().is_empty() {
                        self.menu.error("Entry needs a name")?;
                        continue;
                    }
                    match self.save(&original, &item) {
                        Ok(saved) => {
                            tracing::info!(name = %saved.name, "entry saved");
                            return Ok(Edited::Saved(saved));
                        }
                        Err(err @ DaemonError::Vault(_)) => self.menu.error(&err.to_string())?,
                        Err(err) => return Err(err),
                    }
                }
            }
        }
    }

    fn form(&self, item: &VaultItem) -> Vec<(FormField, String)> {
        let folder = self
            .folders
            .iter()
            .find(|folder| folder.id.is_some() && folder.id == item.folder_id)
            .map_or(NO_FOLDER, |folder| folder.name.as_str());
        let collections: Vec<&str> = item
            .collection_ids
            .iter()
            .filter_map(|id| self.collection(id))
            .map(|collection| collection.name.as_str())
            .collect();
        let collections = if collections.is_empty() {
            NONE.to_string()
        } else {
            collections.join(", ")
        };

        let mut rows = vec![
            (FormField::Name, format!("Name: {}", item.name)),
            (FormField::Folder, format!("Folder: {folder}")),
            (FormField::Collections, format!("Collections: {collections}")),
        ];
        if let Some(login) = &item.login {
            let password = match login.password.as_deref() {
                Some(password) if !password.is_empty() => "*".repeat(password.chars().count()),
                _ => NONE.to_string(),
            };
            rows.push((
                FormField::Username,
                format!("Username: {}", login.username.as_deref().unwrap_or(NONE)),
            ));
            rows.push((FormField::Password, format!("Password: {password}")));
            rows.push((
                FormField::Url,
                format!("Url: {}", item.first_url().unwrap_or(NONE)),
            ));
        }
        rows.push((
            FormField::Autotype,
            format!("Autotype: {}", item.field(AUTOTYPE_FIELD).unwrap_or(NONE)),
        ));
        let notes = if item.notes.as_deref().is_some_and(|n| !n.is_empty()) {
            "<Enter to edit>"
        } else {
            NONE
        };
        rows.push((FormField::Notes, format!("Notes: {notes}")));
        if item.id.is_some() {
            rows.push((FormField::Delete, DELETE.to_string()));
        }
        rows.push((FormField::Save, SAVE.to_string()));
        rows
    }

    fn collection(&self, id: &CollectionId) -> Option<&Collection> {
        self.collections
            .iter()
            .find(|collection| collection.id.as_ref() == Some(id))
    }

    /// Folder list with the "No Folder" root first.
    pub(crate) fn folder_choices(&self) -> Vec<Folder> {
        let mut choices = vec![Folder {
            id: None,
            name: NO_FOLDER.to_string(),
        }];
        choices.extend(self.folders.iter().filter(|f| f.id.is_some()).cloned());
        choices
    }

    fn pick_folder(&self, prompt: &str) -> Result<Option<Folder>, DaemonError> {
        let choices = self.folder_choices();
        Ok(pick(self.menu, prompt, &choices, |folder| folder.name.clone())?.cloned())
    }

    pub(crate) fn pick_organization(&self) -> Result<Option<&Organization>, DaemonError> {
        match self.organizations {
            [] => {
                self.menu.error("No organizations available")?;
                Ok(None)
            }
            [only] => Ok(Some(only)),
            all => pick(self.menu, "Select organization", all, |org| org.name.clone()),
        }
    }

    /// Toggle the collections of one organization. Picking "Done" applies
    /// the marks; cancelling leaves the item untouched.
    fn edit_collections(&self, item: &mut VaultItem) -> Result<(), DaemonError> {
        let organization = match &item.organization_id {
            Some(id) => self.organizations.iter().find(|org| &org.id == id),
            None => self.pick_organization()?,
        };
        let Some(organization) = organization else {
            return Ok(());
        };
        let available: Vec<&Collection> = self
            .collections
            .iter()
            .filter(|c| c.organization_id.as_ref() == Some(&organization.id) && c.id.is_some())
            .collect();
        let mut selected: Vec<CollectionId> = item
            .collection_ids
            .iter()
            .filter(|id| available.iter().any(|c| c.id.as_ref() == Some(*id)))
            .cloned()
            .collect();

        loop {
            let mut lines = vec!["Done".to_string()];
            lines.extend(available.iter().map(|collection| {
                let marked = collection.id.as_ref().is_some_and(|id| selected.contains(id));
                format!("{} {}", if marked { "*" } else { " " }, collection.name)
            }));
            let Some(choice) = self.menu.select("Toggle collections", &lines, false)? else {
                return Ok(());
            };
            let Some(pos) = lines.iter().position(|line| *line == choice) else {
                continue;
            };
            if pos == 0 {
                break;
            }
            if let Some(id) = available[pos - 1].id.clone() {
                match selected.iter().position(|s| *s == id) {
                    Some(at) => {
                        selected.remove(at);
                    }
                    None => selected.push(id),
                }
            }
        }

        if !selected.is_empty() || item.organization_id.is_some() {
            item.organization_id = Some(organization.id.clone());
        }
        item.collection_ids = selected;
        Ok(())
    }

    fn delete_entry(&self, item: &VaultItem) -> Result<bool, DaemonError> {
        let Some(id) = &item.id else {
            return Ok(false);
        };
        if !confirm(self.menu, &format!("Delete {}?", item.name), CONFIRM_DELETE)? {
            return Ok(false);
        }
        self.backend.delete_item(self.key, id)?;
        tracing::info!(name = %item.name, "entry deleted");
        Ok(true)
    }

    /// Write the entry, then apply any collection change. Organization
    /// membership only ever changes through the share calls.
    fn save(&self, original: &VaultItem, item: &VaultItem) -> Result<VaultItem, DaemonError> {
        let mut payload = item.clone();
        payload.organization_id = original.organization_id.clone();
        payload.collection_ids = original.collection_ids.clone();

        let mut saved = if payload.id.is_some() {
            self.backend.update_item(self.key, &payload)?
        } else {
            self.backend.create_item(self.key, &payload)?
        };
        let id = saved.id.clone().ok_or(VaultError::MissingId("item"))?;

        match collection_change(original, item) {
            CollectionChange::None => {}
            CollectionChange::Share {
                organization,
                collections,
            } => {
                saved = self
                    .backend
                    .move_item(self.key, &id, &organization, &collections)?;
            }
            CollectionChange::Update(collections) => {
                self.backend
                    .set_item_collections(self.key, &id, &collections)?;
                saved.collection_ids = collections;
            }
            CollectionChange::Unshare => {
                // Items cannot leave an organization; recreate a personal copy.
                let mut personal = saved.clone();
                personal.id = None;
                personal.organization_id = None;
                personal.collection_ids.clear();
                self.backend.delete_item(self.key, &id)?;
                saved = self.backend.create_item(self.key, &personal)?;
            }
        }
        Ok(saved)
    }

    fn edit_password(&self) -> Result<Option<Zeroizing<String>>, DaemonError> {
        let lines = [GENERATE.to_string(), MANUAL.to_string()];
        match self.menu.select("Password", &lines, false)?.as_deref() {
            Some(GENERATE) => self.generate_password(),
            Some(MANUAL) => {
                let Some(first) = self.menu.passphrase("Enter password")? else {
                    return Ok(None);
                };
                let Some(second) = self.menu.passphrase("Verify password")? else {
                    return Ok(None);
                };
                if first != second {
                    self.menu.error(MISMATCH)?;
                    return Ok(None);
                }
                Ok(Some(first))
            }
            _ => Ok(None),
        }
    }

    fn generate_password(&self) -> Result<Option<Zeroizing<String>>, DaemonError> {
        let default = [self.config.password_length.to_string()];
        let Some(raw) = self.menu.select("Password Length?", &default, false)? else {
            return Ok(None);
        };
        let Ok(length) = raw.trim().parse::<usize>() else {
            self.menu.error(&format!("Not a length: {}", raw.trim()))?;
            return Ok(None);
        };

        let presets = self.config.password_presets();
        let names: Vec<String> = presets.iter().map(|preset| preset.name.clone()).collect();
        let Some(choice) = self
            .menu
            .select("Pick character set(s) to use", &names, false)?
        else {
            return Ok(None);
        };
        // Multi-select menus return one picked line per row.
        let sets: Vec<String> = choice
            .lines()
            .filter_map(|line| presets.iter().find(|preset| preset.name == line.trim()))
            .flat_map(|preset| preset.sets.iter().cloned())
            .collect();
        if sets.is_empty() {
            return Ok(None);
        }

        match passgen::generate(&sets, length) {
            Ok(password) => Ok(Some(password)),
            Err(err) => {
                self.menu.error(&err.to_string())?;
                Ok(None)
            }
        }
    }

    /// Run the notes editor on a private temp file. `None` when the editor
    /// exits unsuccessfully.
    fn edit_notes(&self, current: Option<&str>) -> Result<Option<String>, DaemonError> {
        let mut file = tempfile::Builder::new()
            .prefix("bwm-notes-")
            .suffix(".txt")
            .tempfile()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        file.write_all(current.unwrap_or_default().as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| io_err(file.path(), e))?;

        let editor = self
            .config
            .notes_editor(std::env::var("EDITOR").ok().as_deref());
        let program = editor.program().ok_or(DaemonError::NoEditor)?;
        let status = Command::new(program)
            .args(editor.args())
            .arg(file.path())
            .status()
            .map_err(|e| io_err(program, e))?;
        if !status.success() {
            tracing::warn!(%editor, ?status, "notes editor failed");
            return Ok(None);
        }

        let notes = std::fs::read_to_string(file.path()).map_err(|e| io_err(file.path(), e))?;
        Ok(Some(notes.trim_end_matches('\n').to_string()))
    }
}

// ---------------------------------------------------------------------------
// Menu helpers
// ---------------------------------------------------------------------------

/// Offer one line per option and map the choice back by position.
pub(crate) fn pick<'t, T>(
    menu: &dyn Menu,
    prompt: &str,
    options: &'t [T],
    label: impl Fn(&T) -> String,
) -> Result<Option<&'t T>, DaemonError> {
    let lines: Vec<String> = options.iter().map(label).collect();
    let Some(choice) = menu.select(prompt, &lines, false)? else {
        return Ok(None);
    };
    Ok(lines
        .iter()
        .position(|line| *line == choice)
        .map(|pos| &options[pos]))
}

/// Free text with `current` offered as the only line.
pub(crate) fn ask_text(
    menu: &dyn Menu,
    prompt: &str,
    current: &str,
) -> Result<Option<String>, DaemonError> {
    let lines = [current.to_string()];
    Ok(menu
        .select(prompt, &lines, false)?
        .map(|text| text.trim().to_string()))
}

pub(crate) fn confirm(menu: &dyn Menu, prompt: &str, yes: &str) -> Result<bool, DaemonError> {
    let lines = ["NO".to_string(), yes.to_string()];
    Ok(menu.select(prompt, &lines, false)?.as_deref() == Some(yes))
}

fn none_if_blank(value: String) -> Option<String> {
    (!value.is_empty() && value != NONE).then_some(value)
}

fn set_url(item: &mut VaultItem, url: Option<String>) {
    let login = item.login.get_or_insert_with(Login::default);
    match (login.uris.first_mut(), url) {
        (Some(first), Some(url)) => first.uri = Some(url),
        (None, Some(url)) => login.uris.push(LoginUri {
            uri: Some(url),
            match_kind: None,
        }),
        (Some(_), None) => {
            login.uris.remove(0);
        }
        (None, None) => {}
    }
}

fn set_field(item: &mut VaultItem, name: &str, value: Option<String>) {
    let existing = item
        .fields
        .iter()
        .position(|field| field.name.as_deref() == Some(name));
    match (existing, value) {
        (Some(pos), Some(value)) => item.fields[pos].value = Some(value),
        (Some(pos), None) => {
            item.fields.remove(pos);
        }
        (None, Some(value)) => item.fields.push(CustomField {
            name: Some(name.to_string()),
            value: Some(value),
            kind: 0,
        }),
        (None, None) => {}
    }
}

// ---------------------------------------------------------------------------
// Folder and collection paths
// ---------------------------------------------------------------------------

pub(crate) fn join(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}/{name}"),
        _ => name.to_string(),
    }
}

pub(crate) fn basename(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, base)| base)
}

pub(crate) fn dirname(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(dir, _)| dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(org: &str, ids: &[&str]) -> VaultItem {
        let mut item = VaultItem::new(EntryKind::Login, "x");
        item.organization_id = Some(OrganizationId::from(org));
        item.collection_ids = ids.iter().map(|id| CollectionId::from(*id)).collect();
        item
    }

    #[test]
    fn collection_changes() {
        let personal = VaultItem::new(EntryKind::Login, "x");
        assert_eq!(collection_change(&personal, &personal), CollectionChange::None);
        assert_eq!(
            collection_change(&personal, &shared("o1", &["c1"])),
            CollectionChange::Share {
                organization: OrganizationId::from("o1"),
                collections: vec![CollectionId::from("c1")],
            }
        );
        assert_eq!(
            collection_change(&shared("o1", &["c1"]), &shared("o1", &["c1", "c2"])),
            CollectionChange::Update(vec![CollectionId::from("c1"), CollectionId::from("c2")])
        );
        assert_eq!(
            collection_change(&shared("o1", &["c1"]), &shared("o1", &[])),
            CollectionChange::Unshare
        );
    }

    #[test]
    fn paths() {
        assert_eq!(join(None, "a"), "a");
        assert_eq!(join(Some("a/b"), "c"), "a/b/c");
        assert_eq!(basename("a/b/c"), "c");
        assert_eq!(basename("c"), "c");
        assert_eq!(dirname("a/b/c"), Some("a/b"));
        assert_eq!(dirname("c"), None);
    }

    #[test]
    fn autotype_field_is_replaced_then_removed() {
        let mut item = VaultItem::new(EntryKind::Login, "x");
        set_field(&mut item, AUTOTYPE_FIELD, Some("{USERNAME}".to_string()));
        set_field(&mut item, AUTOTYPE_FIELD, Some("{PASSWORD}".to_string()));
        assert_eq!(item.field(AUTOTYPE_FIELD), Some("{PASSWORD}"));
        assert_eq!(item.fields.len(), 1);
        set_field(&mut item, AUTOTYPE_FIELD, none_if_blank("None".to_string()));
        assert!(item.fields.is_empty());
    }
}
