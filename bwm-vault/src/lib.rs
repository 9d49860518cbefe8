//! bwm vault access.
//!
//! The rest of bwm talks to a vault only through [`VaultBackend`];
//! [`BwCli`] implements it by shelling out to the Bitwarden CLI.

pub mod backend;
pub mod bw;
pub mod error;
pub mod session;

pub use backend::VaultBackend;
pub use bw::{encode_payload, BwCli};
pub use error::VaultError;
pub use session::{LockState, SessionKey, TwoFactor, VaultStatus};
