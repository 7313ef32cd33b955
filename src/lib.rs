//! Signkit: tamper-evident tokens from a shared secret.
//!
//! Payloads are bound to an HMAC (or caller-supplied) signature computed
//! over a key derived from `(secret, salt, mode)`, framed into compact
//! URL-safe tokens. Supports timestamped tokens with max-age enforcement,
//! verification-time rotation across fallback signer configurations, and a
//! JWS-like headered variant carrying `alg`/`iat`/`exp` claims.
//!
//! Integrity and authenticity only: payloads are encoded and signed, never
//! encrypted.

pub mod algorithm;
pub mod encoding;
pub mod error;
pub mod jws;
pub mod payload;
pub mod serializer;
pub mod signer;
pub mod urlsafe;
