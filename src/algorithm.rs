//! Signature algorithms and digest selection.
//!
//! `Algorithm` is a closed set: no-op, HMAC over a selectable digest, or a
//! caller-supplied scheme. All comparisons of signature bytes run in time
//! independent of the position of the first mismatching byte.

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::{Digest as _, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

/// Digest function used for key derivation and HMAC signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Digest {
    Sha256,
    Sha384,
    Sha512,
}

impl Digest {
    /// Hash the concatenation of `parts`.
    #[must_use]
    pub(crate) fn chain(self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            Digest::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
            Digest::Sha384 => {
                let mut hasher = Sha384::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
            Digest::Sha512 => {
                let mut hasher = Sha512::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
        }
    }

    /// HMAC over `data` with `key`.
    #[must_use]
    pub(crate) fn mac(self, key: &[u8], data: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length, so new_from_slice cannot fail.
        match self {
            Digest::Sha256 => {
                let mut mac =
                    <Hmac<Sha256>>::new_from_slice(key).expect("HMAC accepts any key length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Digest::Sha384 => {
                let mut mac =
                    <Hmac<Sha384>>::new_from_slice(key).expect("HMAC accepts any key length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Digest::Sha512 => {
                let mut mac =
                    <Hmac<Sha512>>::new_from_slice(key).expect("HMAC accepts any key length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }
}

/// Constant-time equality over signature bytes. Differing lengths compare
/// unequal without leaking a position.
#[must_use]
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// A caller-supplied signature scheme.
///
/// `verify` has a constant-time default; override it only for schemes whose
/// verification is not recompute-and-compare.
pub trait SignatureScheme: Send + Sync {
    /// Compute the signature of `value` under `key`.
    fn signature(&self, key: &[u8], value: &[u8]) -> Vec<u8>;

    /// Check `sig` against the recomputed signature.
    fn verify(&self, key: &[u8], value: &[u8], sig: &[u8]) -> bool {
        constant_time_eq(&self.signature(key, value), sig)
    }
}

/// The signature algorithm applied by a [`Signer`](crate::signer::Signer).
#[derive(Clone)]
pub enum Algorithm {
    /// Empty signature. Only for configurations where integrity checking is
    /// intentionally disabled.
    None,
    /// HMAC over the given digest.
    Hmac(Digest),
    /// A caller-supplied scheme.
    Custom(Arc<dyn SignatureScheme>),
}

impl Algorithm {
    /// Compute the raw signature of `value` under `key`.
    #[must_use]
    pub fn signature(&self, key: &[u8], value: &[u8]) -> Vec<u8> {
        match self {
            Algorithm::None => Vec::new(),
            Algorithm::Hmac(digest) => digest.mac(key, value),
            Algorithm::Custom(scheme) => scheme.signature(key, value),
        }
    }

    /// Check `sig` against the signature of `value` under `key`.
    #[must_use]
    pub fn verify(&self, key: &[u8], value: &[u8], sig: &[u8]) -> bool {
        match self {
            Algorithm::None | Algorithm::Hmac(_) => {
                constant_time_eq(&self.signature(key, value), sig)
            }
            Algorithm::Custom(scheme) => scheme.verify(key, value, sig),
        }
    }
}

impl fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::None => f.write_str("None"),
            Algorithm::Hmac(digest) => f.debug_tuple("Hmac").field(digest).finish(),
            Algorithm::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
