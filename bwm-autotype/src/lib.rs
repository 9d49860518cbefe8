//! bwm autotype engine: template tokenizer, token resolver, key tables,
//! keystroke-injection backends, clipboard sink and TOTP generator.
//!
//! - [`tokenizer`] — template → lazy [`Token`] stream
//! - [`resolver`] — [`Token`] → [`Action`] against one entry and key table
//! - [`keys`] — [`NamedKey`] and the fixed per-backend tables
//! - [`backend`] — [`Backend`] variants, [`KeyInjector`] and [`dispatch`]
//! - [`clipboard`] — [`ClipboardSink`] with delayed clear
//! - [`totp`] — RFC 6238 / Steam codes
//! - [`engine`] — [`AutotypeEngine`] tying the above to a [`bwm_core::Config`]

pub mod backend;
pub mod clipboard;
pub mod engine;
pub mod error;
pub mod keys;
pub mod resolver;
pub mod tokenizer;
pub mod totp;
#[cfg(target_os = "linux")]
pub mod uinput;

pub use backend::{dispatch, Backend, KeyInjector, ProcessInjector};
pub use clipboard::{ClipboardProvider, ClipboardSink, CommandClipboard};
pub use engine::{AutotypeEngine, OutputMode};
pub use error::{AutotypeError, TokenizeError, TotpError};
pub use keys::{KeyTable, NamedKey, NativeKey};
pub use resolver::{Action, Resolver};
pub use tokenizer::{tokenize, Token, Tokenizer};
