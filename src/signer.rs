//! Message signing: key derivation, token framing, and timestamp variants.
//!
//! A [`Signer`] is a fully-resolved, immutable configuration; every sign or
//! verify call derives the key fresh from `(secret, salt, mode)` and touches
//! no shared state, so one signer can be used from any number of threads.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use zeroize::Zeroizing;

use crate::algorithm::{Algorithm, Digest};
use crate::encoding::{
    b64_decode, b64_encode, bytes_to_int, int_to_bytes, rsplit_once, BASE64_ALPHABET,
};
use crate::error::{ConfigError, Error, Stale};

/// Default token separator.
pub const DEFAULT_SEPARATOR: &[u8] = b".";

/// Default derivation salt for a bare signer.
pub const DEFAULT_SALT: &[u8] = b"signkit.Signer";

/// How the signing key is derived from the secret and salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DerivationMode {
    /// digest(salt || secret)
    Concat,
    /// digest(salt || "signer" || secret)
    #[default]
    DjangoConcat,
    /// HMAC(key = secret, data = salt)
    Hmac,
    /// Derived key = secret. The salt is ignored entirely, so two signers
    /// sharing a secret lose their domain separation under this mode.
    None,
}

/// Current UTC time as epoch seconds.
#[must_use]
pub(crate) fn now_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Partial signer configuration, applied over an existing signer to produce
/// a rotation fallback. Unset fields inherit from the base signer.
#[derive(Clone, Default)]
pub struct SignerOverrides {
    pub secret: Option<Vec<u8>>,
    pub salt: Option<Vec<u8>>,
    pub separator: Option<Vec<u8>>,
    pub derivation: Option<DerivationMode>,
    pub digest: Option<Digest>,
    pub algorithm: Option<Algorithm>,
}

impl SignerOverrides {
    /// An override that only swaps the digest (the common rotation case).
    #[must_use]
    pub fn digest(digest: Digest) -> Self {
        SignerOverrides {
            digest: Some(digest),
            ..SignerOverrides::default()
        }
    }
}

/// Builder for [`Signer`]. Unset fields resolve to documented defaults at
/// `build` time; the built signer is immutable.
pub struct SignerBuilder {
    secret: Vec<u8>,
    salt: Option<Vec<u8>>,
    separator: Option<Vec<u8>>,
    derivation: Option<DerivationMode>,
    digest: Option<Digest>,
    algorithm: Option<Algorithm>,
}

impl SignerBuilder {
    pub fn salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn separator(mut self, separator: impl Into<Vec<u8>>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn derivation(mut self, derivation: DerivationMode) -> Self {
        self.derivation = Some(derivation);
        self
    }

    pub fn digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Resolve defaults and validate the configuration.
    pub fn build(self) -> Result<Signer, ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        let separator = self
            .separator
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_vec());
        if separator.is_empty() {
            return Err(ConfigError::EmptySeparator);
        }
        // A separator drawn from the signature's output alphabet would make
        // the token ambiguous to split back apart.
        if let Some(&byte) = separator.iter().find(|&&b| BASE64_ALPHABET.contains(&b)) {
            return Err(ConfigError::ReservedSeparator(byte as char));
        }
        let digest = self.digest.unwrap_or(Digest::Sha256);
        Ok(Signer {
            secret: Zeroizing::new(self.secret),
            salt: self.salt.unwrap_or_else(|| DEFAULT_SALT.to_vec()),
            separator,
            derivation: self.derivation.unwrap_or_default(),
            digest,
            algorithm: self.algorithm.unwrap_or(Algorithm::Hmac(digest)),
        })
    }
}

/// Signs messages into `payload . b64(signature)` tokens and verifies
/// them back, with optional timestamping.
#[derive(Clone)]
pub struct Signer {
    secret: Zeroizing<Vec<u8>>,
    salt: Vec<u8>,
    separator: Vec<u8>,
    derivation: DerivationMode,
    digest: Digest,
    algorithm: Algorithm,
}

impl Signer {
    /// A signer with all defaults: `.` separator, django-concat derivation,
    /// SHA-256 digest, HMAC signatures.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Signer, ConfigError> {
        Signer::builder(secret).build()
    }

    pub fn builder(secret: impl Into<Vec<u8>>) -> SignerBuilder {
        SignerBuilder {
            secret: secret.into(),
            salt: None,
            separator: None,
            derivation: None,
            digest: None,
            algorithm: None,
        }
    }

    /// Produce a rotation variant of this signer with `overrides` applied.
    ///
    /// Overriding the digest also retunes an HMAC algorithm to that digest,
    /// unless an explicit algorithm override is given.
    pub fn with_overrides(&self, overrides: &SignerOverrides) -> Result<Signer, ConfigError> {
        let algorithm = match (&overrides.algorithm, overrides.digest) {
            (Some(algorithm), _) => Some(algorithm.clone()),
            (None, Some(digest)) if matches!(self.algorithm, Algorithm::Hmac(_)) => {
                Some(Algorithm::Hmac(digest))
            }
            (None, _) => Some(self.algorithm.clone()),
        };
        SignerBuilder {
            secret: overrides
                .secret
                .clone()
                .unwrap_or_else(|| self.secret.to_vec()),
            salt: Some(overrides.salt.clone().unwrap_or_else(|| self.salt.clone())),
            separator: Some(
                overrides
                    .separator
                    .clone()
                    .unwrap_or_else(|| self.separator.clone()),
            ),
            derivation: Some(overrides.derivation.unwrap_or(self.derivation)),
            digest: Some(overrides.digest.unwrap_or(self.digest)),
            algorithm,
        }
        .build()
    }

    /// The configured separator bytes.
    #[must_use]
    pub fn separator(&self) -> &[u8] {
        &self.separator
    }

    /// Derive the signing key. Recomputed per call; never cached.
    #[must_use]
    pub fn derive_key(&self) -> Vec<u8> {
        match self.derivation {
            DerivationMode::Concat => self.digest.chain(&[&self.salt, &self.secret]),
            DerivationMode::DjangoConcat => {
                self.digest.chain(&[&self.salt, b"signer", &self.secret])
            }
            DerivationMode::Hmac => self.digest.mac(&self.secret, &self.salt),
            DerivationMode::None => self.secret.to_vec(),
        }
    }

    /// Base64 signature of `value` alone, without token framing.
    #[must_use]
    pub fn signature(&self, value: &[u8]) -> String {
        b64_encode(&self.algorithm.signature(&self.derive_key(), value))
    }

    /// Sign `value` into `value`, the separator, and the base64 signature.
    #[must_use]
    pub fn sign(&self, value: &[u8]) -> Vec<u8> {
        let mut token = Vec::with_capacity(value.len() + self.separator.len() + 64);
        token.extend_from_slice(value);
        token.extend_from_slice(&self.separator);
        token.extend_from_slice(self.signature(value).as_bytes());
        token
    }

    /// Check a base64 signature against `value`. Key derivation here is
    /// identical to the signing path; that symmetry is what makes
    /// verification correct.
    #[must_use]
    pub fn verify_signature(&self, value: &[u8], sig: &[u8]) -> bool {
        match b64_decode(sig) {
            Ok(raw) => self.algorithm.verify(&self.derive_key(), value, &raw),
            Err(_) => false,
        }
    }

    /// Split a token on the last separator occurrence and verify it,
    /// returning the original message. Payloads may legitimately contain
    /// the separator, hence last occurrence, not first.
    pub fn unsign(&self, token: &[u8]) -> Result<Vec<u8>, Error> {
        let Some((value, sig)) = rsplit_once(token, &self.separator) else {
            return Err(Error::bad_signature(format!(
                "no separator {:?} found in value",
                String::from_utf8_lossy(&self.separator)
            )));
        };
        if self.verify_signature(value, sig) {
            Ok(value.to_vec())
        } else {
            Err(Error::bad_signature("signature does not match"))
        }
    }

    /// Whether `token` carries a valid signature.
    #[must_use]
    pub fn validate(&self, token: &[u8]) -> bool {
        self.unsign(token).is_ok()
    }

    /// Sign `value` with the current time attached:
    /// `value . b64(timestamp) . b64(signature)` (with the configured separator).
    #[must_use]
    pub fn sign_timestamp(&self, value: &[u8]) -> Vec<u8> {
        self.sign_timestamp_at(value, now_timestamp())
    }

    /// Timestamped signing with an explicit clock reading. The signature
    /// covers the timestamp.
    #[must_use]
    pub fn sign_timestamp_at(&self, value: &[u8], now: i64) -> Vec<u8> {
        let timestamp = b64_encode(&int_to_bytes(now));
        let mut message =
            Vec::with_capacity(value.len() + self.separator.len() + timestamp.len());
        message.extend_from_slice(value);
        message.extend_from_slice(&self.separator);
        message.extend_from_slice(timestamp.as_bytes());
        self.sign(&message)
    }

    /// Verify a timestamped token, returning the message and its timestamp.
    ///
    /// With `max_age = Some(n)`, tokens strictly older than `n` seconds fail
    /// with `SignatureExpired`; a token exactly `n` seconds old verifies.
    /// Expiry-class errors carry the recovered message so stale payloads can
    /// still be inspected.
    pub fn unsign_timestamp(
        &self,
        token: &[u8],
        max_age: Option<i64>,
    ) -> Result<(Vec<u8>, i64), Error> {
        self.unsign_timestamp_at(token, max_age, now_timestamp())
    }

    /// Timestamped verification with an explicit clock reading.
    pub fn unsign_timestamp_at(
        &self,
        token: &[u8],
        max_age: Option<i64>,
        now: i64,
    ) -> Result<(Vec<u8>, i64), Error> {
        let result = self.unsign(token)?;
        let Some((value, ts_b64)) = rsplit_once(&result, &self.separator) else {
            return Err(Error::bad_time_signature("timestamp missing").with_stale(Stale::Bytes {
                payload: result,
                timestamp: None,
            }));
        };
        let ts_raw = match b64_decode(ts_b64) {
            Ok(raw) => raw,
            Err(_) => {
                return Err(
                    Error::bad_time_signature("could not base64 decode timestamp").with_stale(
                        Stale::Bytes {
                            payload: value.to_vec(),
                            timestamp: None,
                        },
                    ),
                );
            }
        };
        let Some(timestamp) = bytes_to_int(&ts_raw) else {
            return Err(
                Error::bad_time_signature("malformed timestamp").with_stale(Stale::Bytes {
                    payload: value.to_vec(),
                    timestamp: None,
                }),
            );
        };
        if let Some(max_age) = max_age {
            let age = now - timestamp;
            if age > max_age {
                return Err(Error::signature_expired(format!(
                    "signature age {age}s > {max_age}s"
                ))
                .with_stale(Stale::Bytes {
                    payload: value.to_vec(),
                    timestamp: Some(timestamp),
                }));
            }
        }
        Ok((value.to_vec(), timestamp))
    }

    /// Whether `token` carries a valid signature and is within `max_age`.
    #[must_use]
    pub fn validate_timestamp(&self, token: &[u8], max_age: Option<i64>) -> bool {
        self.unsign_timestamp(token, max_age).is_ok()
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("secret", &"<redacted>")
            .field("salt", &String::from_utf8_lossy(&self.salt))
            .field("separator", &String::from_utf8_lossy(&self.separator))
            .field("derivation", &self.derivation)
            .field("digest", &self.digest)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
