//! Decide whether this process is a client of a running daemon or becomes
//! the daemon itself.
//!
//! The daemon binds an ephemeral localhost port first and then publishes
//! the auth file; the exclusive publish is the only synchronization. Every
//! other process reads the file and connects.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use crate::auth::AuthEnvelope;
use crate::error::{io_err, DaemonError};
use crate::protocol::{self, DaemonResponse, TriggerArgs};

const ATTEMPTS: usize = 50;
const RETRY_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug)]
pub enum Role {
    Client(ClientLink),
    Daemon(BoundDaemon),
}

/// Open connection to the running daemon.
#[derive(Debug)]
pub struct ClientLink {
    pub stream: TcpStream,
    pub envelope: AuthEnvelope,
}

impl ClientLink {
    pub fn trigger(self, args: &TriggerArgs) -> Result<DaemonResponse, DaemonError> {
        protocol::send_trigger(self.stream, &self.envelope.authkey, args)
    }
}

/// Listener this process won the rendezvous with.
#[derive(Debug)]
pub struct BoundDaemon {
    pub listener: TcpListener,
    pub envelope: AuthEnvelope,
}

pub fn establish(auth_path: &Path) -> Result<Role, DaemonError> {
    for attempt in 0..ATTEMPTS {
        match AuthEnvelope::load(auth_path)? {
            Some(envelope) => match TcpStream::connect((Ipv4Addr::LOCALHOST, envelope.port)) {
                Ok(stream) => {
                    tracing::debug!(port = envelope.port, "connected to running daemon");
                    return Ok(Role::Client(ClientLink { stream, envelope }));
                }
                Err(err) if err.kind() == ErrorKind::ConnectionRefused => {
                    tracing::info!(port = envelope.port, "removing stale auth file");
                    envelope.remove_if_current(auth_path)?;
                }
                Err(err) => return Err(io_err(auth_path, err)),
            },
            None => {
                let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
                    .map_err(|e| io_err("127.0.0.1:0", e))?;
                let port = listener
                    .local_addr()
                    .map_err(|e| io_err("127.0.0.1:0", e))?
                    .port();
                let envelope = AuthEnvelope::generate(port);
                if envelope.publish(auth_path)? {
                    tracing::info!(port, "daemon bound");
                    return Ok(Role::Daemon(BoundDaemon { listener, envelope }));
                }
                tracing::debug!(attempt, "lost rendezvous race");
                continue;
            }
        }
        sleep(RETRY_INTERVAL);
    }
    Err(DaemonError::Protocol(
        "could not reach or become the bwm daemon".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn first_process_becomes_daemon() {
        let dir = TempDir::new().unwrap();
        let auth = dir.path().join(".bwm-auth");
        let role = establish(&auth).unwrap();
        let Role::Daemon(bound) = role else {
            panic!("expected daemon role");
        };
        assert_eq!(
            AuthEnvelope::load(&auth).unwrap(),
            Some(bound.envelope.clone())
        );

        match establish(&auth).unwrap() {
            Role::Client(link) => assert_eq!(link.envelope.port, bound.envelope.port),
            Role::Daemon(_) => panic!("second process must be a client"),
        }
    }

    #[test]
    fn stale_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let auth = dir.path().join(".bwm-auth");
        let port = {
            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            listener.local_addr().unwrap().port()
        };
        let stale = AuthEnvelope::generate(port);
        stale.publish(&auth).unwrap();

        match establish(&auth).unwrap() {
            Role::Daemon(bound) => assert_ne!(bound.envelope, stale),
            Role::Client(_) => panic!("nothing listens on the stale port"),
        }
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let auth = dir.path().join(".bwm-auth");
        fs::write(&auth, "garbage").unwrap();
        assert!(matches!(
            establish(&auth),
            Err(DaemonError::SessionCorrupt(_))
        ));
    }
}
