//! Per-field view of one entry ("View/Type individual entries").
//!
//! Each line pairs with a [`FieldAction`]. Secrets are shown masked; the
//! real value only lives in the action and is zeroized on drop.

use bwm_core::{EntryKind, VaultItem};
use zeroize::Zeroizing;

use crate::error::MenuError;
use crate::program::Menu;

const MASK: &str = "**********";

/// What selecting a field line does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldAction {
    /// Type this text verbatim.
    Type(Zeroizing<String>),
    /// Generate a code from this stored TOTP secret and type it.
    Totp(Zeroizing<String>),
    /// Open the notes line by line.
    Notes,
    Nothing,
}

/// Lines of the field menu and the action behind each one.
#[derive(Debug, Clone, Default)]
pub struct FieldView {
    pub lines: Vec<String>,
    actions: Vec<FieldAction>,
}

impl FieldView {
    fn push(&mut self, label: &str, value: Option<&str>, shown: Shown) {
        match value.filter(|v| !v.is_empty()) {
            None => {
                self.lines.push(format!("{label}: None"));
                self.actions.push(FieldAction::Nothing);
            }
            Some(value) => {
                let display = match shown {
                    Shown::Plain => value,
                    Shown::Masked => MASK,
                };
                self.lines.push(format!("{label}: {display}"));
                self.actions
                    .push(FieldAction::Type(Zeroizing::new(value.to_string())));
            }
        }
    }

    fn push_info(&mut self, label: &str, value: Option<&str>) {
        let shown = value.filter(|v| !v.is_empty()).unwrap_or("None");
        self.lines.push(format!("{label}: {shown}"));
        self.actions.push(FieldAction::Nothing);
    }

    fn push_totp(&mut self, secret: Option<&str>) {
        match secret.filter(|s| !s.is_empty()) {
            None => self.push_info("TOTP", None),
            Some(secret) => {
                self.lines.push("TOTP: ******".to_string());
                self.actions
                    .push(FieldAction::Totp(Zeroizing::new(secret.to_string())));
            }
        }
    }

    fn push_notes(&mut self, notes: Option<&str>) {
        if notes.map_or(true, str::is_empty) {
            self.push_info("Notes", None);
        } else {
            self.lines.push("Notes: <Enter to view>".to_string());
            self.actions.push(FieldAction::Notes);
        }
    }

    pub fn action_for(&self, selection: &str) -> Option<&FieldAction> {
        let pos = self.lines.iter().position(|line| line == selection)?;
        self.actions.get(pos)
    }
}

#[derive(Clone, Copy)]
enum Shown {
    Plain,
    Masked,
}

/// Build the field list for `item`, which lives in `folder`.
pub fn field_view(item: &VaultItem, folder: &str) -> FieldView {
    let mut view = FieldView::default();
    view.push("Title", Some(item.name.as_str()), Shown::Plain);
    view.push_info("Folder", Some(folder));

    match item.kind {
        EntryKind::Login => {
            let login = item.login.as_ref();
            view.push(
                "Username",
                login.and_then(|l| l.username.as_deref()),
                Shown::Plain,
            );
            view.push(
                "Password",
                login.and_then(|l| l.password.as_deref()),
                Shown::Masked,
            );
            view.push_totp(login.and_then(|l| l.totp.as_deref()));
            let uris = login.map(|l| l.uris.as_slice()).unwrap_or_default();
            if uris.is_empty() {
                view.push_info("URL", None);
            }
            for (n, uri) in uris.iter().enumerate() {
                view.push_info(&format!("URL{}", n + 1), uri.uri.as_deref());
            }
        }
        EntryKind::Card => {
            let card = item.card.as_ref();
            view.push(
                "Cardholder Name",
                card.and_then(|c| c.cardholder_name.as_deref()),
                Shown::Plain,
            );
            view.push("Number", card.and_then(|c| c.number.as_deref()), Shown::Masked);
            let expiry = card.and_then(|c| match (&c.exp_month, &c.exp_year) {
                (Some(month), Some(year)) => Some(format!("{month}/{year}")),
                _ => None,
            });
            view.push("Expiration", expiry.as_deref(), Shown::Plain);
            view.push(
                "Security Code",
                card.and_then(|c| c.code.as_deref()),
                Shown::Masked,
            );
            view.push_info("Brand", card.and_then(|c| c.brand.as_deref()));
        }
        EntryKind::Identity => {
            let id = item.identity.clone().unwrap_or_default();
            let fields = [
                ("Title", id.title),
                ("First Name", id.first_name),
                ("Middle Name", id.middle_name),
                ("Last Name", id.last_name),
                ("Address 1", id.address1),
                ("Address 2", id.address2),
                ("Address 3", id.address3),
                ("City", id.city),
                ("State", id.state),
                ("Postal Code", id.postal_code),
                ("Country", id.country),
                ("Company", id.company),
                ("Email", id.email),
                ("Phone", id.phone),
                ("SSN", id.ssn),
                ("Username", id.username),
                ("Passport Number", id.passport_number),
                ("License Number", id.license_number),
            ];
            for (label, value) in fields {
                view.push(label, value.as_deref(), Shown::Plain);
            }
        }
        EntryKind::SecureNote => {}
    }

    for field in &item.fields {
        let label = field.name.as_deref().unwrap_or("Field");
        let shown = if field.kind == 1 { Shown::Masked } else { Shown::Plain };
        view.push(label, field.value.as_deref(), shown);
    }
    view.push_notes(item.notes.as_deref());
    view
}

/// Show the field view and return the action to perform, following the
/// notes sub-menu when chosen. `None` when cancelled or the line has
/// nothing to type.
pub fn select_field(
    menu: &dyn Menu,
    item: &VaultItem,
    folder: &str,
) -> Result<Option<FieldAction>, MenuError> {
    let view = field_view(item, folder);
    let Some(choice) = menu.select("Select field", &view.lines, false)? else {
        return Ok(None);
    };
    match view.action_for(&choice) {
        Some(FieldAction::Notes) => {
            let notes: Vec<String> = item
                .notes
                .as_deref()
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect();
            let line = menu.select("Notes", &notes, false)?;
            Ok(line.map(|l| FieldAction::Type(Zeroizing::new(l))))
        }
        Some(FieldAction::Nothing) | None => Ok(None),
        Some(action) => Ok(Some(action.clone())),
    }
}
