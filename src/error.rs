//! Error types for token verification and configuration.
//!
//! Runtime failures are `Error` values: a comparable [`ErrorKind`] plus a
//! human-readable context message. Expiry-class failures additionally carry
//! the content recovered from the token, since the signature itself was
//! valid and callers may want to inspect stale payloads.
//!
//! Configuration mistakes are a separate [`ConfigError`], returned from
//! builders; they indicate programmer error, not adversarial input.

use serde_json::Value;
use thiserror::Error;

/// The failure taxonomy for sign/verify/load operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Separator absent, or the recomputed signature did not match.
    BadSignature,
    /// Codec, base64, or decompression failure on an already-verified payload.
    BadPayload,
    /// Header is not an object, claims a different algorithm, or carries a
    /// malformed expiry claim.
    BadHeader,
    /// Timestamp segment missing or undecodable in a timed token.
    BadTimeSignature,
    /// Signature and structure valid, but the token is older than allowed.
    SignatureExpired,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::BadSignature => "bad signature",
            ErrorKind::BadPayload => "bad payload",
            ErrorKind::BadHeader => "bad header",
            ErrorKind::BadTimeSignature => "bad time signature",
            ErrorKind::SignatureExpired => "signature expired",
        };
        f.write_str(name)
    }
}

/// A JSON object, as decoded from a token header.
pub type JsonObject = serde_json::Map<String, Value>;

/// Content recovered from a token whose signature verified but whose
/// time checks failed. Attached to expiry-class [`Error`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum Stale {
    /// Raw signed message, plus its timestamp where one could be decoded.
    Bytes {
        payload: Vec<u8>,
        timestamp: Option<i64>,
    },
    /// Codec-decoded value recovered by a serializer.
    Value {
        value: Value,
        timestamp: Option<i64>,
    },
    /// Decoded header and payload recovered from a headered token.
    Token { header: JsonObject, payload: Value },
}

/// A failed sign/verify/load operation.
///
/// The [`ErrorKind`] is the comparable identity; the message is diagnostic
/// context only. Secrets and derived keys never appear in either.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    stale: Option<Stale>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            stale: None,
        }
    }

    pub(crate) fn bad_signature(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::BadSignature, message)
    }

    pub(crate) fn bad_payload(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::BadPayload, message)
    }

    pub(crate) fn bad_header(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::BadHeader, message)
    }

    pub(crate) fn bad_time_signature(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::BadTimeSignature, message)
    }

    pub(crate) fn signature_expired(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::SignatureExpired, message)
    }

    pub(crate) fn with_stale(mut self, stale: Stale) -> Self {
        self.stale = Some(stale);
        self
    }

    pub(crate) fn map_stale(mut self, f: impl FnOnce(Stale) -> Stale) -> Self {
        self.stale = self.stale.map(f);
        self
    }

    /// The failure kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Diagnostic context for the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Content recovered from a correctly-signed but stale token, if any.
    #[must_use]
    pub fn stale(&self) -> Option<&Stale> {
        self.stale.as_ref()
    }

    /// Consume the error, yielding the recovered content.
    #[must_use]
    pub fn into_stale(self) -> Option<Stale> {
        self.stale
    }
}

/// Invalid configuration, rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("secret must not be empty")]
    EmptySecret,

    #[error("separator must not be empty")]
    EmptySeparator,

    #[error(
        "separator byte {0:?} may appear in a base64 signature; \
         alphanumeric characters and `-_=` cannot be used"
    )]
    ReservedSeparator(char),

    #[error("unknown signing algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("expiry duration must be positive, got {0}")]
    InvalidExpiry(i64),
}
