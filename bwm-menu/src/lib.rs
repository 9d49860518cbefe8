//! Menu side of bwm: talking to the dmenu-style program, rendering the
//! numbered entry list and the per-field view.
//!
//! - [`program`] — [`Menu`] trait and the [`DmenuMenu`] implementation
//! - [`entries`] — tera-rendered entry lines ([`EntryRenderer`])
//! - [`views`] — per-field view of one entry

pub mod entries;
pub mod error;
pub mod program;
pub mod views;

pub use entries::{folder_name, EntryContext, EntryList, EntryRenderer};
pub use error::MenuError;
pub use program::{parse_pinentry, DmenuMenu, Menu, MenuFlavor, MenuGate};
pub use views::{field_view, select_field, FieldAction, FieldView};
