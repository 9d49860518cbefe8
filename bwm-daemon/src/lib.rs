//! bwm session daemon.
//!
//! - [`rendezvous`] — become the daemon or connect to the running one
//! - [`auth`] — the `{port, authkey}` file both sides meet through
//! - [`protocol`] — challenge/response trigger over localhost TCP
//! - [`state`] — Idle/Active/Locked run loop driven by [`DaemonEvent`]s
//! - [`cycle`] — the interactive menu cycle ([`Bwm`])
//! - [`edit`] / [`manage`] — entry editing, folders and collections
//! - [`runtime`] — tokio tasks around the run loop
//! - [`recovery`] — cleanup after a corrupted auth file

pub mod auth;
pub mod cycle;
pub mod edit;
pub mod error;
pub mod log_rotation;
pub mod manage;
pub mod passgen;
pub mod protocol;
pub mod recovery;
pub mod rendezvous;
pub mod runtime;
pub mod select;
pub mod session;
pub mod state;
pub mod timer;

pub use auth::AuthEnvelope;
pub use cycle::{Bwm, InjectorFactory};
pub use edit::{Edited, Editor};
pub use error::DaemonError;
pub use protocol::{DaemonResponse, TriggerArgs};
pub use recovery::{recover_from_corruption, CORRUPTION_MESSAGE};
pub use rendezvous::{establish, BoundDaemon, ClientLink, Role};
pub use runtime::{init_file_tracing, init_stderr_tracing, start_blocking, DaemonOptions};
pub use session::DaemonSession;
pub use state::{DaemonEvent, DaemonState, Outcome, RunLoop, SessionHost};
