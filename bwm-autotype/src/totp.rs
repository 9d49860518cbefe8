//! One-time codes for the `{TOTP}` placeholder.
//!
//! The stored value is either a bare base32 secret, an
//! `otpauth://totp/...` URI, or a `steam://SECRET` shorthand. Codes are
//! computed from the wall clock at resolution time; nothing is cached.

use data_encoding::{BASE32, BASE32_NOPAD};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::error::TotpError;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

const STEAM_ALPHABET: &[u8] = b"23456789BCDFGHJKMNPQRTVWXY";
const STEAM_DIGITS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotpAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl TotpAlgorithm {
    fn parse(value: &str) -> Result<Self, TotpError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SHA1" => Ok(TotpAlgorithm::Sha1),
            "SHA256" => Ok(TotpAlgorithm::Sha256),
            "SHA512" => Ok(TotpAlgorithm::Sha512),
            other => Err(TotpError::Unsupported(format!("algorithm {other}"))),
        }
    }
}

/// How the truncated HMAC value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotpEncoding {
    Decimal,
    Steam,
}

/// Parsed generator parameters. The secret is raw key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct TotpParams {
    secret: Vec<u8>,
    pub algorithm: TotpAlgorithm,
    pub digits: u8,
    pub period: u64,
    pub encoding: TotpEncoding,
}

impl std::fmt::Debug for TotpParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpParams")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("digits", &self.digits)
            .field("period", &self.period)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl TotpParams {
    /// Parse whatever the vault stores in the `totp` field.
    pub fn parse(stored: &str) -> Result<Self, TotpError> {
        let trimmed = stored.trim();
        match trimmed.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("otpauth") => parse_otpauth(rest),
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("steam") => Ok(TotpParams {
                secret: decode_secret(rest)?,
                algorithm: TotpAlgorithm::Sha1,
                digits: STEAM_DIGITS,
                period: 30,
                encoding: TotpEncoding::Steam,
            }),
            Some((scheme, _)) => Err(TotpError::InvalidUri(format!("unknown scheme {scheme}"))),
            None => Ok(TotpParams {
                secret: decode_secret(trimmed)?,
                algorithm: TotpAlgorithm::Sha1,
                digits: 6,
                period: 30,
                encoding: TotpEncoding::Decimal,
            }),
        }
    }

    /// Code for the 30-second (or `period`) window containing `timestamp`.
    pub fn code_at(&self, timestamp: i64) -> Result<String, TotpError> {
        let counter = (timestamp.max(0) as u64) / self.period;
        let digest = hmac_digest(self.algorithm, &self.secret, &counter.to_be_bytes())?;

        let offset = usize::from(digest[digest.len() - 1] & 0x0f);
        let binary = (u32::from(digest[offset] & 0x7f) << 24)
            | (u32::from(digest[offset + 1]) << 16)
            | (u32::from(digest[offset + 2]) << 8)
            | u32::from(digest[offset + 3]);

        Ok(match self.encoding {
            TotpEncoding::Decimal => {
                let code = u64::from(binary) % 10u64.pow(u32::from(self.digits));
                format!("{:0width$}", code, width = usize::from(self.digits))
            }
            TotpEncoding::Steam => {
                let mut value = binary as usize;
                let mut code = String::with_capacity(usize::from(self.digits));
                for _ in 0..self.digits {
                    code.push(char::from(STEAM_ALPHABET[value % STEAM_ALPHABET.len()]));
                    value /= STEAM_ALPHABET.len();
                }
                code
            }
        })
    }

    /// Seconds left before the code rotates.
    pub fn seconds_remaining(&self, timestamp: i64) -> u64 {
        let period = self.period as i64;
        (period - timestamp.rem_euclid(period)) as u64
    }
}

/// Parse and generate in one step.
pub fn generate_at(stored: &str, timestamp: i64) -> Result<String, TotpError> {
    TotpParams::parse(stored)?.code_at(timestamp)
}

pub fn generate_now(stored: &str) -> Result<String, TotpError> {
    generate_at(stored, chrono::Utc::now().timestamp())
}

fn hmac_digest(algorithm: TotpAlgorithm, key: &[u8], message: &[u8]) -> Result<Vec<u8>, TotpError> {
    macro_rules! digest {
        ($mac:ty) => {{
            let mut mac =
                <$mac as Mac>::new_from_slice(key).map_err(|_| TotpError::InvalidSecret)?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }};
    }
    Ok(match algorithm {
        TotpAlgorithm::Sha1 => digest!(HmacSha1),
        TotpAlgorithm::Sha256 => digest!(HmacSha256),
        TotpAlgorithm::Sha512 => digest!(HmacSha512),
    })
}

fn parse_otpauth(rest: &str) -> Result<TotpParams, TotpError> {
    let (kind, remainder) = rest
        .split_once('/')
        .ok_or_else(|| TotpError::InvalidUri("missing type".to_string()))?;
    if !kind.eq_ignore_ascii_case("totp") {
        return Err(TotpError::Unsupported(format!("otpauth type {kind}")));
    }
    let query = remainder.split_once('?').map(|(_, q)| q).unwrap_or("");

    let mut secret = None;
    let mut algorithm = TotpAlgorithm::Sha1;
    let mut digits: u8 = 6;
    let mut period: u64 = 30;
    let mut encoding = TotpEncoding::Decimal;

    for pair in query.split('&').filter(|part| !part.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(key)?.to_ascii_lowercase();
        let value = percent_decode(value)?;
        if value.trim().is_empty() {
            continue;
        }
        match key.as_str() {
            "secret" => secret = Some(value),
            "algorithm" => algorithm = TotpAlgorithm::parse(&value)?,
            "digits" => {
                digits = value
                    .trim()
                    .parse()
                    .map_err(|_| TotpError::InvalidUri("digits must be numeric".to_string()))?;
            }
            "period" => {
                period = value
                    .trim()
                    .parse()
                    .map_err(|_| TotpError::InvalidUri("period must be numeric".to_string()))?;
            }
            "encoder" if value.eq_ignore_ascii_case("steam") => {
                encoding = TotpEncoding::Steam;
                digits = STEAM_DIGITS;
            }
            _ => {}
        }
    }

    if !(5..=10).contains(&digits) {
        return Err(TotpError::Unsupported(format!("{digits} digits")));
    }
    if period == 0 {
        return Err(TotpError::InvalidUri("period must be greater than 0".to_string()));
    }
    let secret = secret.ok_or_else(|| TotpError::InvalidUri("missing secret".to_string()))?;

    Ok(TotpParams {
        secret: decode_secret(&secret)?,
        algorithm,
        digits,
        period,
        encoding,
    })
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
    let normalized = secret
        .trim()
        .replace([' ', '-'], "")
        .to_ascii_uppercase();

    let decoded = BASE32_NOPAD
        .decode(normalized.trim_end_matches('=').as_bytes())
        .or_else(|_| BASE32.decode(normalized.as_bytes()))
        .map_err(|_| TotpError::InvalidSecret)?;
    if decoded.is_empty() {
        return Err(TotpError::InvalidSecret);
    }
    Ok(decoded)
}

fn percent_decode(input: &str) -> Result<String, TotpError> {
    fn hex(byte: u8) -> Option<u8> {
        (byte as char).to_digit(16).map(|d| d as u8)
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let pair = bytes
                    .get(i + 1..i + 3)
                    .and_then(|p| Some(hex(p[0])? << 4 | hex(p[1])?))
                    .ok_or_else(|| TotpError::InvalidUri("bad percent encoding".to_string()))?;
                out.push(pair);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| TotpError::InvalidUri("non-UTF-8 parameter".to_string()))
}
