//! Error types for bwm-autotype.

use thiserror::Error;

/// An opening brace with no matching close-brace. Tokenization stops here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to find matching right brace (}}) while tokenizing auto-type string: {fragment}")]
pub struct TokenizeError {
    /// Unconsumed template text, starting at the unmatched brace.
    pub fragment: String,
}

/// Failures while generating a one-time code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TotpError {
    #[error("invalid otpauth URI: {0}")]
    InvalidUri(String),

    #[error("TOTP secret must be valid base32")]
    InvalidSecret,

    #[error("unsupported TOTP parameter: {0}")]
    Unsupported(String),
}

/// All errors that abort an autotype dispatch or clipboard copy.
///
/// Dispatch is not transactional: anything typed before the error stays typed.
#[derive(Debug, Error)]
pub enum AutotypeError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    /// The active backend has no mapping for this token.
    #[error("unsupported auto-type token ({backend}): \"{token}\"")]
    UnsupportedToken { backend: &'static str, token: String },

    /// The injection mechanism itself is missing (program not on PATH,
    /// `/dev/uinput` not accessible).
    #[error("{backend} is not available: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// The backend was present but refused one instruction.
    #[error("{backend} failed: {reason}")]
    Injection {
        backend: &'static str,
        reason: String,
    },

    #[error("autotype disabled for this entry")]
    Disabled,

    #[error(transparent)]
    Totp(#[from] TotpError),

    #[error("clipboard: {0}")]
    Clipboard(String),
}
