//! Newline-delimited JSON over a localhost TCP connection.
//!
//! ```text
//! daemon → client   {"nonce":"<hex>"}
//! client → daemon   {"mac":"<hex hmac-sha256(authkey, nonce)>","args":{...}}
//! daemon → client   {"ok":true,"data":...} | {"ok":false,"error":"..."}
//! ```
//!
//! Only the trigger and its one-shot arguments cross this boundary.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{io_err, DaemonError};

type HmacSha256 = Hmac<Sha256>;

/// Error string the daemon answers a bad MAC with.
pub const AUTH_FAILED: &str = "authentication failed";

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub nonce: String,
}

/// One-shot arguments carried with a trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autotype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault: Option<String>,
    pub lock: bool,
    pub clipboard: bool,
}

impl TriggerArgs {
    pub fn is_empty(&self) -> bool {
        *self == TriggerArgs::default()
    }

    /// Fold a later trigger into this one. Set fields of `later` win.
    pub fn merge(&mut self, later: TriggerArgs) {
        if later.autotype.is_some() {
            self.autotype = later.autotype;
        }
        if later.vault.is_some() {
            self.vault = later.vault;
        }
        self.lock |= later.lock;
        self.clipboard |= later.clipboard;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub mac: String,
    #[serde(default)]
    pub args: TriggerArgs,
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Challenge / response
// ---------------------------------------------------------------------------

pub fn new_nonce() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

pub fn sign(authkey: &str, nonce: &str) -> Result<String, DaemonError> {
    let mut mac = HmacSha256::new_from_slice(authkey.as_bytes())
        .map_err(|e| DaemonError::Protocol(format!("hmac key: {e}")))?;
    mac.update(nonce.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a client's MAC.
pub fn verify(authkey: &str, nonce: &str, mac_hex: &str) -> bool {
    let Ok(expected) = hex::decode(mac_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(authkey.as_bytes()) else {
        return false;
    };
    mac.update(nonce.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Deliver one trigger over an already connected stream.
///
/// A daemon that rejects the MAC, or a peer that does not speak the
/// handshake at all, means the auth file no longer matches the daemon.
pub fn send_trigger(
    stream: TcpStream,
    authkey: &str,
    args: &TriggerArgs,
) -> Result<DaemonResponse, DaemonError> {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "daemon".to_string());
    stream
        .set_read_timeout(Some(IO_TIMEOUT))
        .map_err(|e| io_err(&peer, e))?;
    let mut writer = stream.try_clone().map_err(|e| io_err(&peer, e))?;
    let mut reader = BufReader::new(stream);

    let line = read_line(&mut reader, &peer)?.ok_or_else(|| {
        DaemonError::SessionCorrupt("daemon closed the connection before the handshake".into())
    })?;
    let challenge: Challenge = serde_json::from_str(line.trim_end()).map_err(|e| {
        DaemonError::SessionCorrupt(format!("unexpected handshake from {peer}: {e}"))
    })?;

    let request = DaemonRequest {
        mac: sign(authkey, &challenge.nonce)?,
        args: args.clone(),
    };
    let payload = serde_json::to_string(&request)?;
    writer
        .write_all(payload.as_bytes())
        .and_then(|()| writer.write_all(b"\n"))
        .and_then(|()| writer.flush())
        .map_err(|e| io_err(&peer, e))?;

    let line = read_line(&mut reader, &peer)?.ok_or_else(|| {
        DaemonError::Protocol("daemon closed connection before responding".to_string())
    })?;
    let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
    if response.ok {
        return Ok(response);
    }
    match response.error.as_deref() {
        Some(AUTH_FAILED) => Err(DaemonError::SessionCorrupt(
            "daemon rejected the auth key".to_string(),
        )),
        other => Err(DaemonError::Protocol(
            other.unwrap_or("unknown daemon error").to_string(),
        )),
    }
}

fn read_line(reader: &mut impl BufRead, peer: &str) -> Result<Option<String>, DaemonError> {
    let mut line = String::new();
    let read = reader.read_line(&mut line).map_err(|e| io_err(peer, e))?;
    Ok((read > 0).then_some(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_round_trip() {
        let nonce = new_nonce();
        let mac = sign("key", &nonce).unwrap();
        assert!(verify("key", &nonce, &mac));
        assert!(!verify("other", &nonce, &mac));
        assert!(!verify("key", &new_nonce(), &mac));
        assert!(!verify("key", &nonce, "not hex"));
    }

    #[test]
    fn nonces_differ() {
        assert_ne!(new_nonce(), new_nonce());
        assert_eq!(new_nonce().len(), 32);
    }

    #[test]
    fn empty_args_serialize_small() {
        let json = serde_json::to_string(&TriggerArgs::default()).unwrap();
        assert_eq!(json, r#"{"lock":false,"clipboard":false}"#);
        let back: TriggerArgs = serde_json::from_str("{}").unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn merge_prefers_later_values() {
        let mut args = TriggerArgs {
            autotype: Some("{USERNAME}".into()),
            vault: Some("https://a".into()),
            ..TriggerArgs::default()
        };
        args.merge(TriggerArgs {
            autotype: Some("{PASSWORD}".into()),
            clipboard: true,
            ..TriggerArgs::default()
        });
        assert_eq!(args.autotype.as_deref(), Some("{PASSWORD}"));
        assert_eq!(args.vault.as_deref(), Some("https://a"));
        assert!(args.clipboard);
        assert!(!args.lock);
    }
}
