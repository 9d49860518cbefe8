//! Numbered entry list for the main menu, rendered with tera.
//!
//! | Kind     | Default line                                             |
//! |----------|----------------------------------------------------------|
//! | login    | `  3(l) - folder/name - username - url`                  |
//! | note     | `  3(n) - folder/name`                                   |
//! | card     | `  3(c) - folder/name - brand - holder - *1111`          |
//! | identity | `  3(i) - folder/name - last, first - email - phone`     |
//!
//! A configured `entry_format` replaces all four with one template.

use bwm_core::{EntryKind, Folder, FolderId, VaultItem};
use serde::Serialize;
use tera::Tera;

use crate::error::MenuError;

// ---------------------------------------------------------------------------
// Embedded templates
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("entry/login.tera", include_str!("templates/login.tera")),
    ("entry/note.tera", include_str!("templates/note.tera")),
    ("entry/card.tera", include_str!("templates/card.tera")),
    ("entry/identity.tera", include_str!("templates/identity.tera")),
];

const CUSTOM: &str = "entry/custom.tera";

fn template_name(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Login => "entry/login.tera",
        EntryKind::SecureNote => "entry/note.tera",
        EntryKind::Card => "entry/card.tera",
        EntryKind::Identity => "entry/identity.tera",
    }
}

/// Name of the folder with `id`; items without a folder match the
/// id-less "No Folder" record.
pub fn folder_name<'a>(folders: &'a [Folder], id: Option<&FolderId>) -> &'a str {
    folders
        .iter()
        .find(|folder| folder.id.as_ref() == id)
        .map(|folder| folder.name.as_str())
        .unwrap_or("")
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything an entry line template can reference. Missing values are
/// empty strings so templates never hit undefined variables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntryContext {
    pub index: String,
    pub tag: String,
    pub folder: String,
    pub name: String,
    pub username: String,
    pub url: String,
    pub brand: String,
    pub cardholder: String,
    pub number_hint: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl EntryContext {
    pub fn from_item(index: usize, width: usize, item: &VaultItem, folder: &str) -> Self {
        let owned = |v: Option<&String>| v.cloned().unwrap_or_default();
        let login = item.login.as_ref();
        let card = item.card.as_ref();
        let identity = item.identity.as_ref();
        EntryContext {
            index: format!("{index:>width$}"),
            tag: item.kind.tag().to_string(),
            folder: folder.to_string(),
            name: item.name.clone(),
            username: owned(login.and_then(|l| l.username.as_ref())),
            url: item.first_url().unwrap_or_default().to_string(),
            brand: owned(card.and_then(|c| c.brand.as_ref())),
            cardholder: owned(card.and_then(|c| c.cardholder_name.as_ref())),
            number_hint: card
                .and_then(|c| c.number.as_deref())
                .map(number_hint)
                .unwrap_or_default(),
            first_name: owned(identity.and_then(|i| i.first_name.as_ref())),
            last_name: owned(identity.and_then(|i| i.last_name.as_ref())),
            email: owned(identity.and_then(|i| i.email.as_ref())),
            phone: owned(identity.and_then(|i| i.phone.as_ref())),
        }
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, MenuError> {
        tera::Context::from_serialize(self).map_err(MenuError::from)
    }
}

/// `*1111` for a card number; never the full number.
fn number_hint(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(char::is_ascii_digit).collect();
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    format!("*{tail}")
}

// ---------------------------------------------------------------------------
// EntryList
// ---------------------------------------------------------------------------

/// Rendered lines plus the item index each display number points at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryList {
    pub lines: Vec<String>,
    items: Vec<usize>,
}

impl EntryList {
    /// Index into the original item slice for a selected line. Lines are
    /// matched as rendered, so any `entry_format` maps back.
    pub fn item_index(&self, selection: &str) -> Option<usize> {
        let pos = self
            .lines
            .iter()
            .position(|line| line == selection)
            .or_else(|| {
                let wanted = selection.trim();
                self.lines.iter().position(|line| line.trim() == wanted)
            })?;
        self.items.get(pos).copied()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EntryRenderer
// ---------------------------------------------------------------------------

/// Tera engine holding the embedded line templates and an optional override.
pub struct EntryRenderer {
    tera: Tera,
    custom: bool,
}

impl EntryRenderer {
    pub fn new(entry_format: Option<&str>) -> Result<Self, MenuError> {
        let mut tera = Tera::default();
        let mut templates: Vec<(&str, &str)> = TPLS.to_vec();
        if let Some(format) = entry_format {
            templates.push((CUSTOM, format));
        }
        tera.add_raw_templates(templates)?;
        Ok(EntryRenderer {
            tera,
            custom: entry_format.is_some(),
        })
    }

    pub fn render(&self, ctx: &EntryContext, kind: EntryKind) -> Result<String, MenuError> {
        let name = if self.custom { CUSTOM } else { template_name(kind) };
        let rendered = self.tera.render(name, &ctx.to_tera_context()?)?;
        Ok(rendered.trim_end_matches(['\n', '\r']).to_string())
    }

    /// One line per visible item, numbered from 0 in display order.
    /// Items in `hidden_folders` are left out.
    pub fn entry_list(
        &self,
        items: &[VaultItem],
        folders: &[Folder],
        hidden_folders: &[String],
    ) -> Result<EntryList, MenuError> {
        let visible: Vec<(usize, &VaultItem, &str)> = items
            .iter()
            .enumerate()
            .map(|(i, item)| (i, item, folder_name(folders, item.folder_id.as_ref())))
            .filter(|(_, _, folder)| !hidden_folders.iter().any(|h| h == folder))
            .collect();

        let width = visible.len().saturating_sub(1).to_string().len();
        let mut list = EntryList::default();
        for (display, (index, item, folder)) in visible.into_iter().enumerate() {
            let ctx = EntryContext::from_item(display, width, item, folder);
            list.lines.push(self.render(&ctx, item.kind)?);
            list.items.push(index);
        }
        Ok(list)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
