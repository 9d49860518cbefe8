//! Vault record types, shaped after the JSON the `bw` CLI emits.
//!
//! Unknown keys are kept in `extra` maps so an item read from `bw list` can
//! be sent back through `bw edit` without dropping server-side fields.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

id_newtype!(
    /// Vault item id (UUID string assigned by the server).
    ItemId
);
id_newtype!(
    /// Folder id; the synthetic "No Folder" entry has none.
    FolderId
);
id_newtype!(
    /// Organization collection id.
    CollectionId
);
id_newtype!(
    /// Organization id.
    OrganizationId
);

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The four record kinds a vault can hold. Serialized as the numeric `type`
/// field used by the vault backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EntryKind {
    Login,
    SecureNote,
    Card,
    Identity,
}

impl EntryKind {
    /// Single-letter tag used in the numbered entry list, e.g. `3(l)`.
    pub fn tag(self) -> char {
        match self {
            EntryKind::Login => 'l',
            EntryKind::SecureNote => 'n',
            EntryKind::Card => 'c',
            EntryKind::Identity => 'i',
        }
    }
}

impl TryFrom<u8> for EntryKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EntryKind::Login),
            2 => Ok(EntryKind::SecureNote),
            3 => Ok(EntryKind::Card),
            4 => Ok(EntryKind::Identity),
            other => Err(format!("unknown vault item type {other}")),
        }
    }
}

impl From<EntryKind> for u8 {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Login => 1,
            EntryKind::SecureNote => 2,
            EntryKind::Card => 3,
            EntryKind::Identity => 4,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Login => write!(f, "login"),
            EntryKind::SecureNote => write!(f, "secure note"),
            EntryKind::Card => write!(f, "card"),
            EntryKind::Identity => write!(f, "identity"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One vault item (`bw list items` element).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub folder_id: Option<FolderId>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<CustomField>,
    #[serde(default)]
    pub login: Option<Login>,
    #[serde(default)]
    pub card: Option<Card>,
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collection_ids: Vec<CollectionId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub totp: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uris: Vec<LoginUri>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginUri {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default, rename = "match")]
    pub match_kind: Option<u8>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(default)]
    pub cardholder_name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub exp_month: Option<String>,
    #[serde(default)]
    pub exp_year: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub address3: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ssn: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub passport_number: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
}

/// Custom field attached to an item. `kind` 0 = text, 1 = hidden, 2 = boolean.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(default)]
    pub id: Option<FolderId>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(default)]
    pub id: Option<CollectionId>,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Custom field holding a per-entry autotype template.
pub const AUTOTYPE_FIELD: &str = "autotype";
/// Custom field that disables autotype for an entry when set to `false`.
pub const AUTOTYPE_ENABLED_FIELD: &str = "autotype_enabled";

impl VaultItem {
    /// Empty item of the given kind, ready to be filled in and created.
    pub fn new(kind: EntryKind, name: impl Into<String>) -> Self {
        Self {
            id: None,
            organization_id: None,
            folder_id: None,
            kind,
            name: name.into(),
            notes: None,
            favorite: false,
            fields: Vec::new(),
            login: (kind == EntryKind::Login).then(Login::default),
            card: (kind == EntryKind::Card).then(Card::default),
            identity: (kind == EntryKind::Identity).then(Identity::default),
            collection_ids: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Value of the first custom field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name.as_deref() == Some(name))
            .and_then(|field| field.value.as_deref())
    }

    /// Per-entry autotype template, if one is set and non-empty.
    pub fn autotype_sequence(&self) -> Option<&str> {
        self.field(AUTOTYPE_FIELD)
            .map(str::trim)
            .filter(|seq| !seq.is_empty() && *seq != "None")
    }

    pub fn autotype_enabled(&self) -> bool {
        !matches!(
            self.field(AUTOTYPE_ENABLED_FIELD).map(str::trim),
            Some(v) if v.eq_ignore_ascii_case("false")
        )
    }

    pub fn first_url(&self) -> Option<&str> {
        self.login
            .as_ref()
            .and_then(|login| login.uris.first())
            .and_then(|uri| uri.uri.as_deref())
    }

    /// Borrowed projection consumed by the autotype resolver.
    pub fn view(&self) -> VaultEntryView<'_> {
        let login = self.login.as_ref();
        VaultEntryView {
            kind: self.kind,
            title: &self.name,
            username: login.and_then(|l| l.username.as_deref()),
            password: login.and_then(|l| l.password.as_deref()),
            url: self.first_url(),
            notes: self.notes.as_deref(),
            totp: login.and_then(|l| l.totp.as_deref()),
            card_number: self.card.as_ref().and_then(|c| c.number.as_deref()),
        }
    }
}

/// The fields of one vault record the autotype engine can reach.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VaultEntryView<'a> {
    pub kind: EntryKind,
    pub title: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub url: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub totp: Option<&'a str>,
    pub card_number: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Redacted Debug
// ---------------------------------------------------------------------------

fn redact(value: &Option<impl AsRef<str>>) -> &'static str {
    match value {
        Some(v) if !v.as_ref().is_empty() => "<redacted>",
        _ => "<empty>",
    }
}

impl fmt::Debug for VaultItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultItem")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("folder_id", &self.folder_id)
            .field("organization_id", &self.organization_id)
            .field("notes", &redact(&self.notes))
            .field("login", &self.login)
            .field("card", &self.card)
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("totp", &redact(&self.totp))
            .field("uris", &self.uris)
            .finish()
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("brand", &self.brand)
            .field("cardholder_name", &self.cardholder_name)
            .field("number", &redact(&self.number))
            .field("code", &redact(&self.code))
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for CustomField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: &dyn fmt::Debug = if self.kind == 1 {
            &"<redacted>"
        } else {
            &self.value
        };
        f.debug_struct("CustomField")
            .field("name", &self.name)
            .field("value", value)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Debug for VaultEntryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultEntryView")
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("url", &self.url)
            .field("totp", &redact(&self.totp))
            .field("card_number", &redact(&self.card_number))
            .finish_non_exhaustive()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
