//! "Manage folders" and "Manage collections".
//!
//! Nesting is by name: `work/clients` sits under `work`. Moving or renaming
//! a folder renames everything below it as well.

use bwm_core::{Collection, Folder, OrganizationId};

use crate::edit::{ask_text, basename, confirm, dirname, join, pick, Editor, NO_FOLDER};
use crate::error::DaemonError;

pub const CREATE_FOLDER: &str = "Create folder";
pub const MOVE_FOLDER: &str = "Move folder";
pub const RENAME_FOLDER: &str = "Rename folder";
pub const DELETE_FOLDER: &str = "Delete folder";
pub const CREATE_COLLECTION: &str = "Create collection";
pub const MOVE_COLLECTION: &str = "Move collection";
pub const RENAME_COLLECTION: &str = "Rename collection";
pub const DELETE_COLLECTION: &str = "Delete collection";
pub const NO_PARENT: &str = "No Parent";

const CONFIRM: &str = "Yes - confirm delete";

/// Position and new name of `old` and of everything nested under it.
fn descendant_renames<'n>(
    names: impl Iterator<Item = &'n str>,
    old: &str,
    new: &str,
) -> Vec<(usize, String)> {
    let prefix = format!("{old}/");
    names
        .enumerate()
        .filter_map(|(pos, name)| {
            if name == old {
                Some((pos, new.to_string()))
            } else {
                name.strip_prefix(&prefix)
                    .map(|rest| (pos, format!("{new}/{rest}")))
            }
        })
        .collect()
}

impl Editor<'_> {
    /// Returns whether anything in the vault changed.
    pub fn manage_folders(&self) -> Result<bool, DaemonError> {
        let mut folders: Vec<Folder> = self
            .folders
            .iter()
            .filter(|folder| folder.id.is_some())
            .cloned()
            .collect();
        let mut changed = false;

        loop {
            let mut lines: Vec<String> = [CREATE_FOLDER, MOVE_FOLDER, RENAME_FOLDER, DELETE_FOLDER]
                .iter()
                .map(|action| action.to_string())
                .collect();
            lines.push(String::new());
            lines.extend(folders.iter().map(|folder| folder.name.clone()));

            let Some(choice) = self.menu.select("Manage folders", &lines, false)? else {
                return Ok(changed);
            };
            let result = match choice.as_str() {
                CREATE_FOLDER => self.create_folder(&mut folders),
                MOVE_FOLDER => self.move_folder(&mut folders),
                RENAME_FOLDER => self.rename_folder(&mut folders),
                DELETE_FOLDER => self.delete_folder(&mut folders),
                _ => continue,
            };
            match result {
                Ok(done) => changed |= done,
                Err(err @ DaemonError::Vault(_)) => {
                    // Earlier steps of a multi-folder rename may have landed.
                    changed = true;
                    self.menu.error(&err.to_string())?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn parent_choices(folders: &[Folder], exclude: Option<&str>) -> Vec<Folder> {
        let mut choices = vec![Folder {
            id: None,
            name: NO_FOLDER.to_string(),
        }];
        choices.extend(
            folders
                .iter()
                .filter(|folder| !exclude.is_some_and(|ex| is_within(&folder.name, ex)))
                .cloned(),
        );
        choices
    }

    fn create_folder(&self, folders: &mut Vec<Folder>) -> Result<bool, DaemonError> {
        let choices = Self::parent_choices(folders, None);
        let Some(parent) = pick(self.menu, "Select parent folder", &choices, |f| f.name.clone())?
        else {
            return Ok(false);
        };
        let Some(name) = ask_text(self.menu, "Folder name", "")? else {
            return Ok(false);
        };
        if name.is_empty() {
            return Ok(false);
        }
        let path = join(parent.id.as_ref().map(|_| parent.name.as_str()), &name);
        let created = self.backend.create_folder(self.key, &path)?;
        tracing::info!(folder = %created.name, "folder created");
        folders.push(created);
        Ok(true)
    }

    fn move_folder(&self, folders: &mut [Folder]) -> Result<bool, DaemonError> {
        let Some(pos) = self.pick_position("Select folder to move", folders)? else {
            return Ok(false);
        };
        let old = folders[pos].name.clone();
        let choices = Self::parent_choices(folders, Some(&old));
        let Some(parent) = pick(self.menu, "Select new parent", &choices, |f| f.name.clone())?
        else {
            return Ok(false);
        };
        let new = join(parent.id.as_ref().map(|_| parent.name.as_str()), basename(&old));
        self.rename_folder_tree(folders, &old, &new)
    }

    fn rename_folder(&self, folders: &mut [Folder]) -> Result<bool, DaemonError> {
        let Some(pos) = self.pick_position("Select folder to rename", folders)? else {
            return Ok(false);
        };
        let old = folders[pos].name.clone();
        let Some(name) = ask_text(self.menu, "New folder name", basename(&old))? else {
            return Ok(false);
        };
        if name.is_empty() {
            return Ok(false);
        }
        let new = join(dirname(&old), &name);
        self.rename_folder_tree(folders, &old, &new)
    }

    fn rename_folder_tree(
        &self,
        folders: &mut [Folder],
        old: &str,
        new: &str,
    ) -> Result<bool, DaemonError> {
        if old == new {
            return Ok(false);
        }
        let renames = descendant_renames(folders.iter().map(|f| f.name.as_str()), old, new);
        for (pos, name) in renames {
            let Some(id) = folders[pos].id.clone() else {
                continue;
            };
            folders[pos] = self.backend.rename_folder(self.key, &id, &name)?;
        }
        tracing::info!(from = old, to = new, "folder renamed");
        Ok(true)
    }

    fn delete_folder(&self, folders: &mut Vec<Folder>) -> Result<bool, DaemonError> {
        let Some(pos) = self.pick_position("Select folder to delete", folders)? else {
            return Ok(false);
        };
        let folder = &folders[pos];
        if !confirm(self.menu, &format!("Delete {}?", folder.name), CONFIRM)? {
            return Ok(false);
        }
        if let Some(id) = &folder.id {
            self.backend.delete_folder(self.key, id)?;
        }
        tracing::info!(folder = %folder.name, "folder deleted");
        folders.remove(pos);
        Ok(true)
    }

    fn pick_position(&self, prompt: &str, folders: &[Folder]) -> Result<Option<usize>, DaemonError> {
        let picked = pick(self.menu, prompt, folders, |f| f.name.clone())?;
        Ok(picked.and_then(|folder| folders.iter().position(|f| std::ptr::eq(f, folder))))
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    /// Returns whether anything in the vault changed.
    pub fn manage_collections(&self) -> Result<bool, DaemonError> {
        let mut collections: Vec<Collection> = self
            .collections
            .iter()
            .filter(|collection| collection.id.is_some())
            .cloned()
            .collect();
        let mut changed = false;

        loop {
            let mut lines: Vec<String> = [
                CREATE_COLLECTION,
                MOVE_COLLECTION,
                RENAME_COLLECTION,
                DELETE_COLLECTION,
            ]
            .iter()
            .map(|action| action.to_string())
            .collect();
            lines.push(String::new());
            lines.extend(collections.iter().map(|c| self.collection_label(c)));

            let Some(choice) = self.menu.select("Manage collections", &lines, false)? else {
                return Ok(changed);
            };
            let result = match choice.as_str() {
                CREATE_COLLECTION => self.create_collection(&mut collections),
                MOVE_COLLECTION => self.move_collection(&mut collections),
                RENAME_COLLECTION => self.rename_collection(&mut collections),
                DELETE_COLLECTION => self.delete_collection(&mut collections),
                _ => continue,
            };
            match result {
                Ok(done) => changed |= done,
                Err(err @ DaemonError::Vault(_)) => {
                    changed = true;
                    self.menu.error(&err.to_string())?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// `name` alone with one organization, `org: name` with several.
    fn collection_label(&self, collection: &Collection) -> String {
        if self.organizations.len() <= 1 {
            return collection.name.clone();
        }
        let org = self
            .organizations
            .iter()
            .find(|org| collection.organization_id.as_ref() == Some(&org.id))
            .map_or("?", |org| org.name.as_str());
        format!("{org}: {}", collection.name)
    }

    fn pick_collection(
        &self,
        prompt: &str,
        collections: &[Collection],
    ) -> Result<Option<usize>, DaemonError> {
        let picked = pick(self.menu, prompt, collections, |c| self.collection_label(c))?;
        Ok(picked.and_then(|collection| {
            collections
                .iter()
                .position(|c| std::ptr::eq(c, collection))
        }))
    }

    /// `None` as a parent name stands for the top level.
    fn pick_collection_parent(
        &self,
        prompt: &str,
        collections: &[Collection],
        organization: &OrganizationId,
        exclude: Option<&str>,
    ) -> Result<Option<Option<String>>, DaemonError> {
        let mut choices = vec![NO_PARENT.to_string()];
        choices.extend(
            collections
                .iter()
                .filter(|c| c.organization_id.as_ref() == Some(organization))
                .filter(|c| !exclude.is_some_and(|ex| is_within(&c.name, ex)))
                .map(|c| c.name.clone()),
        );
        let Some(choice) = self.menu.select(prompt, &choices, false)? else {
            return Ok(None);
        };
        if !choices.contains(&choice) {
            return Ok(None);
        }
        Ok(Some((choice != NO_PARENT).then_some(choice)))
    }

    fn create_collection(&self, collections: &mut Vec<Collection>) -> Result<bool, DaemonError> {
        let Some(organization) = self.pick_organization()? else {
            return Ok(false);
        };
        let Some(parent) =
            self.pick_collection_parent("Select parent", collections, &organization.id, None)?
        else {
            return Ok(false);
        };
        let Some(name) = ask_text(self.menu, "Collection name", "")? else {
            return Ok(false);
        };
        if name.is_empty() {
            return Ok(false);
        }
        let path = join(parent.as_deref(), &name);
        let created = self
            .backend
            .create_collection(self.key, &organization.id, &path)?;
        tracing::info!(collection = %created.name, org = %organization.name, "collection created");
        collections.push(created);
        Ok(true)
    }

    fn move_collection(&self, collections: &mut [Collection]) -> Result<bool, DaemonError> {
        let Some(pos) = self.pick_collection("Select collection to move", collections)? else {
            return Ok(false);
        };
        let old = collections[pos].name.clone();
        let Some(organization) = collections[pos].organization_id.clone() else {
            return Ok(false);
        };
        let Some(parent) =
            self.pick_collection_parent("Select new parent", collections, &organization, Some(&old))?
        else {
            return Ok(false);
        };
        let new = join(parent.as_deref(), basename(&old));
        self.rename_collection_tree(collections, pos, &new)
    }

    fn rename_collection(&self, collections: &mut [Collection]) -> Result<bool, DaemonError> {
        let Some(pos) = self.pick_collection("Select collection to rename", collections)? else {
            return Ok(false);
        };
        let old = collections[pos].name.clone();
        let Some(name) = ask_text(self.menu, "New collection name", basename(&old))? else {
            return Ok(false);
        };
        if name.is_empty() {
            return Ok(false);
        }
        let new = join(dirname(&old), &name);
        self.rename_collection_tree(collections, pos, &new)
    }

    /// Rename `collections[pos]` and every collection nested below it in
    /// the same organization.
    fn rename_collection_tree(
        &self,
        collections: &mut [Collection],
        pos: usize,
        new: &str,
    ) -> Result<bool, DaemonError> {
        let old = collections[pos].name.clone();
        if old == new {
            return Ok(false);
        }
        let organization = collections[pos].organization_id.clone();
        let names = collections.iter().map(|c| {
            if c.organization_id == organization {
                c.name.as_str()
            } else {
                ""
            }
        });
        for (at, name) in descendant_renames(names, &old, new) {
            collections[at] = self
                .backend
                .rename_collection(self.key, &collections[at], &name)?;
        }
        tracing::info!(from = %old, to = new, "collection renamed");
        Ok(true)
    }

    fn delete_collection(&self, collections: &mut Vec<Collection>) -> Result<bool, DaemonError> {
        let Some(pos) = self.pick_collection("Select collection to delete", collections)? else {
            return Ok(false);
        };
        let collection = &collections[pos];
        if !confirm(self.menu, &format!("Delete {}?", collection.name), CONFIRM)? {
            return Ok(false);
        }
        if let (Some(org), Some(id)) = (&collection.organization_id, &collection.id) {
            self.backend.delete_collection(self.key, org, id)?;
        }
        tracing::info!(collection = %collection.name, "collection deleted");
        collections.remove(pos);
        Ok(true)
    }
}

/// `name` is `root` or nested somewhere below it.
fn is_within(name: &str, root: &str) -> bool {
    name == root
        || name
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}
