//! Payload serialization over a signer, with verification-time rotation.
//!
//! A [`Serializer`] frames values through a payload codec and signs the
//! result. Verification tries the primary signer first, then an ordered
//! list of fallback signers. New tokens are always produced with the
//! primary configuration; fallbacks only keep tokens signed under retired
//! secrets or algorithms verifiable until they age out.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::algorithm::Digest;
use crate::error::{ConfigError, Error, ErrorKind, Stale};
use crate::payload::{JsonCodec, PayloadCodec};
use crate::signer::{now_timestamp, Signer, SignerOverrides};
use crate::urlsafe;

/// Default derivation salt for serializers.
pub const DEFAULT_SALT: &[u8] = b"signkit";

/// Builder for [`Serializer`].
pub struct SerializerBuilder {
    secret: Vec<u8>,
    salt: Option<Vec<u8>>,
    codec: Option<Arc<dyn PayloadCodec>>,
    signer: SignerOverrides,
    fallbacks: Option<Vec<SignerOverrides>>,
}

impl SerializerBuilder {
    pub fn salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn codec(mut self, codec: impl PayloadCodec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Overrides applied to the primary signer.
    pub fn signer(mut self, overrides: SignerOverrides) -> Self {
        self.signer = overrides;
        self
    }

    /// Fallback signer configurations, tried in order during verification.
    /// Each inherits the primary's configuration except where overridden.
    /// When unset, a single SHA-512 digest fallback is installed so tokens
    /// from the pre-rotation default still verify; pass an empty list to
    /// disable fallbacks entirely.
    pub fn fallbacks(mut self, fallbacks: Vec<SignerOverrides>) -> Self {
        self.fallbacks = Some(fallbacks);
        self
    }

    pub fn build(self) -> Result<Serializer, ConfigError> {
        let mut base = Signer::builder(self.secret);
        base = base.salt(self.salt.unwrap_or_else(|| DEFAULT_SALT.to_vec()));
        let primary = base.build()?.with_overrides(&self.signer)?;
        let fallback_overrides = self
            .fallbacks
            .unwrap_or_else(|| vec![SignerOverrides::digest(Digest::Sha512)]);
        let fallbacks = fallback_overrides
            .iter()
            .map(|overrides| primary.with_overrides(overrides))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Serializer {
            signer: primary,
            fallbacks,
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonCodec)),
        })
    }
}

/// Signs codec-encoded payloads and loads them back, rotating across
/// fallback signers on verification.
#[derive(Clone)]
pub struct Serializer {
    signer: Signer,
    fallbacks: Vec<Signer>,
    codec: Arc<dyn PayloadCodec>,
}

impl Serializer {
    /// A serializer with all defaults: JSON codec, `signkit` salt, SHA-256
    /// HMAC primary signer, SHA-512 digest fallback.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Serializer, ConfigError> {
        Serializer::builder(secret).build()
    }

    pub fn builder(secret: impl Into<Vec<u8>>) -> SerializerBuilder {
        SerializerBuilder {
            secret: secret.into(),
            salt: None,
            codec: None,
            signer: SignerOverrides::default(),
            fallbacks: None,
        }
    }

    /// The primary signer. New tokens are always produced with it.
    #[must_use]
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Primary signer followed by fallbacks, in verification order.
    fn signers(&self) -> impl Iterator<Item = &Signer> {
        std::iter::once(&self.signer).chain(self.fallbacks.iter())
    }

    /// Encode a value through the payload codec.
    pub fn dumps_payload(&self, value: &Value) -> Result<Vec<u8>, Error> {
        self.codec.dump(value)
    }

    /// Decode codec bytes back into a value. Also the way to decode the raw
    /// bytes recovered in a [`Stale::Bytes`].
    pub fn loads_payload(&self, data: &[u8]) -> Result<Value, Error> {
        self.codec.load(data)
    }

    fn encode_payload(&self, value: &Value, url_safe: bool) -> Result<Vec<u8>, Error> {
        let data = self.codec.dump(value)?;
        Ok(if url_safe {
            urlsafe::encode_payload(&data)
        } else {
            data
        })
    }

    fn decode_payload(&self, data: &[u8], url_safe: bool) -> Result<Value, Error> {
        if url_safe {
            self.codec.load(&urlsafe::decode_payload(data)?)
        } else {
            self.codec.load(data)
        }
    }

    /// Serialize and sign `value`.
    pub fn dumps(&self, value: &Value) -> Result<Vec<u8>, Error> {
        Ok(self.signer.sign(&self.encode_payload(value, false)?))
    }

    /// Verify and deserialize a token.
    pub fn loads(&self, token: &[u8]) -> Result<Value, Error> {
        self.loads_inner(token, false)
    }

    fn loads_inner(&self, token: &[u8], url_safe: bool) -> Result<Value, Error> {
        let mut last_err = None;
        for (index, signer) in self.signers().enumerate() {
            match signer.unsign(token) {
                // Only the verifying signer's payload is decoded; a decode
                // failure here is terminal BadPayload, not a rotation cue.
                Ok(payload) => return self.decode_payload(&payload, url_safe),
                Err(err) => {
                    if index > 0 {
                        debug!(fallback = index, "fallback signer did not verify");
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::bad_signature("no signer verified the token")))
    }

    /// Serialize and sign `value` with the current timestamp attached.
    pub fn timed_dumps(&self, value: &Value) -> Result<Vec<u8>, Error> {
        self.timed_dumps_at(value, now_timestamp())
    }

    /// Timestamped serialization with an explicit clock reading.
    pub fn timed_dumps_at(&self, value: &Value, now: i64) -> Result<Vec<u8>, Error> {
        Ok(self
            .signer
            .sign_timestamp_at(&self.encode_payload(value, false)?, now))
    }

    /// Verify and deserialize a timestamped token, enforcing `max_age`.
    pub fn timed_loads(&self, token: &[u8], max_age: Option<i64>) -> Result<Value, Error> {
        self.timed_loads_at(token, max_age, now_timestamp())
    }

    /// Timed verification with an explicit clock reading.
    pub fn timed_loads_at(
        &self,
        token: &[u8],
        max_age: Option<i64>,
        now: i64,
    ) -> Result<Value, Error> {
        self.timed_loads_inner(token, max_age, now, false)
    }

    fn timed_loads_inner(
        &self,
        token: &[u8],
        max_age: Option<i64>,
        now: i64,
        url_safe: bool,
    ) -> Result<Value, Error> {
        let mut last_err = None;
        for (index, signer) in self.signers().enumerate() {
            match signer.unsign_timestamp_at(token, max_age, now) {
                Ok((payload, _)) => return self.decode_payload(&payload, url_safe),
                Err(err) if err.kind() == ErrorKind::BadSignature => {
                    if index > 0 {
                        debug!(fallback = index, "fallback signer did not verify");
                    }
                    last_err = Some(err);
                }
                // BadTimeSignature or SignatureExpired: this signer verified
                // the signature, so rotation stops: the token is simply
                // stale or malformed under the right key.
                Err(err) => return Err(self.decode_stale(err, url_safe)),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::bad_signature("no signer verified the token")))
    }

    /// Upgrade recovered raw bytes in an expiry-class error to a decoded
    /// value, so stale payloads can be inspected without re-decoding.
    fn decode_stale(&self, err: Error, url_safe: bool) -> Error {
        err.map_stale(|stale| match stale {
            Stale::Bytes { payload, timestamp } => match self.decode_payload(&payload, url_safe) {
                Ok(value) => Stale::Value { value, timestamp },
                Err(_) => Stale::Bytes { payload, timestamp },
            },
            other => other,
        })
    }

    /// Like [`dumps`](Serializer::dumps), but the payload passes through the
    /// URL-safe codec (optional compression + base64) for compact tokens.
    pub fn urlsafe_dumps(&self, value: &Value) -> Result<Vec<u8>, Error> {
        Ok(self.signer.sign(&self.encode_payload(value, true)?))
    }

    /// Verify and decode a URL-safe token.
    pub fn urlsafe_loads(&self, token: &[u8]) -> Result<Value, Error> {
        self.loads_inner(token, true)
    }

    /// Timestamped URL-safe serialization.
    pub fn urlsafe_timed_dumps(&self, value: &Value) -> Result<Vec<u8>, Error> {
        self.urlsafe_timed_dumps_at(value, now_timestamp())
    }

    pub fn urlsafe_timed_dumps_at(&self, value: &Value, now: i64) -> Result<Vec<u8>, Error> {
        Ok(self
            .signer
            .sign_timestamp_at(&self.encode_payload(value, true)?, now))
    }

    /// Verify and decode a timestamped URL-safe token.
    pub fn urlsafe_timed_loads(
        &self,
        token: &[u8],
        max_age: Option<i64>,
    ) -> Result<Value, Error> {
        self.urlsafe_timed_loads_at(token, max_age, now_timestamp())
    }

    pub fn urlsafe_timed_loads_at(
        &self,
        token: &[u8],
        max_age: Option<i64>,
        now: i64,
    ) -> Result<Value, Error> {
        self.timed_loads_inner(token, max_age, now, true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const T0: i64 = 1_700_000_000;

    fn serializer() -> Serializer {
        Serializer::new("serializer-secret").unwrap()
    }

    fn sample() -> Value {
        json!({"id": 42, "name": "alice", "tags": ["a", "b"]})
    }

    #[test]
    fn test_dumps_loads_roundtrip() {
        let s = serializer();
        let token = s.dumps(&sample()).unwrap();
        assert_eq!(s.loads(&token).unwrap(), sample());
    }

    #[test]
    fn test_loads_rejects_tampering() {
        let s = serializer();
        let mut token = s.dumps(&sample()).unwrap();
        token[2] ^= 0x01;
        assert_eq!(
            s.loads(&token).unwrap_err().kind(),
            ErrorKind::BadSignature
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = serializer().dumps(&sample()).unwrap();
        let other = Serializer::new("other-secret").unwrap();
        assert_eq!(
            other.loads(&token).unwrap_err().kind(),
            ErrorKind::BadSignature
        );
    }

    #[test]
    fn test_salt_mismatch_rejected() {
        let a = Serializer::builder("serializer-secret")
            .salt("salt-a")
            .build()
            .unwrap();
        let b = Serializer::builder("serializer-secret")
            .salt("salt-b")
            .build()
            .unwrap();
        let token = a.dumps(&sample()).unwrap();
        assert!(b.loads(&token).is_err());
    }

    #[test]
    fn test_default_fallback_accepts_sha512_tokens() {
        // a serializer whose primary digest is SHA-512 stands in for the
        // pre-rotation deployment
        let old = Serializer::builder("serializer-secret")
            .signer(SignerOverrides::digest(Digest::Sha512))
            .build()
            .unwrap();
        let token = old.dumps(&sample()).unwrap();
        // default configuration verifies it through the SHA-512 fallback
        assert_eq!(serializer().loads(&token).unwrap(), sample());
    }

    #[test]
    fn test_rotation_requires_matching_fallback() {
        let old = Serializer::builder("serializer-secret")
            .signer(SignerOverrides::digest(Digest::Sha384))
            .build()
            .unwrap();
        let token = old.dumps(&sample()).unwrap();

        let without = Serializer::builder("serializer-secret")
            .fallbacks(vec![])
            .build()
            .unwrap();
        assert_eq!(
            without.loads(&token).unwrap_err().kind(),
            ErrorKind::BadSignature
        );

        let with = Serializer::builder("serializer-secret")
            .fallbacks(vec![SignerOverrides::digest(Digest::Sha384)])
            .build()
            .unwrap();
        assert_eq!(with.loads(&token).unwrap(), sample());
    }

    #[test]
    fn test_fallback_secret_rotation() {
        let old = Serializer::new("old-secret").unwrap();
        let token = old.dumps(&sample()).unwrap();

        let rotated = Serializer::builder("new-secret")
            .fallbacks(vec![SignerOverrides {
                secret: Some(b"old-secret".to_vec()),
                ..SignerOverrides::default()
            }])
            .build()
            .unwrap();
        assert_eq!(rotated.loads(&token).unwrap(), sample());
        // new tokens are signed with the new secret only
        let fresh = rotated.dumps(&sample()).unwrap();
        assert!(old.loads(&fresh).is_err());
    }

    #[test]
    fn test_verified_but_undecodable_payload_is_bad_payload() {
        let s = serializer();
        // sign bytes that are not valid JSON under the serializer's own
        // effective signer configuration
        let signer = Signer::builder("serializer-secret")
            .salt(DEFAULT_SALT)
            .build()
            .unwrap();
        let token = signer.sign(b"definitely not json");
        assert_eq!(
            s.loads(&token).unwrap_err().kind(),
            ErrorKind::BadPayload
        );
    }

    #[test]
    fn test_timed_roundtrip() {
        let s = serializer();
        let token = s.timed_dumps_at(&sample(), T0).unwrap();
        assert_eq!(
            s.timed_loads_at(&token, Some(10), T0 + 10).unwrap(),
            sample()
        );
    }

    #[test]
    fn test_timed_expiry_boundary() {
        let s = serializer();
        let token = s.timed_dumps_at(&sample(), T0).unwrap();
        assert!(s.timed_loads_at(&token, Some(2), T0 + 2).is_ok());
        let err = s.timed_loads_at(&token, Some(2), T0 + 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureExpired);
    }

    #[test]
    fn test_expired_token_carries_decoded_value() {
        let s = serializer();
        let token = s.timed_dumps_at(&sample(), T0).unwrap();
        let err = s.timed_loads_at(&token, Some(1), T0 + 60).unwrap_err();
        match err.into_stale() {
            Some(Stale::Value { value, timestamp }) => {
                assert_eq!(value, sample());
                assert_eq!(timestamp, Some(T0));
            }
            other => panic!("expected decoded stale value, got {other:?}"),
        }
    }

    #[test]
    fn test_expiry_from_fallback_signer_is_terminal() {
        let old = Serializer::builder("serializer-secret")
            .signer(SignerOverrides::digest(Digest::Sha512))
            .build()
            .unwrap();
        let token = old.timed_dumps_at(&sample(), T0).unwrap();
        // primary (SHA-256) fails with BadSignature, rotation reaches the
        // SHA-512 fallback, which reports expiry. Terminal, not BadSignature
        let err = serializer()
            .timed_loads_at(&token, Some(1), T0 + 60)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureExpired);
    }

    #[test]
    fn test_plain_token_fails_timed_loads() {
        let s = serializer();
        let token = s.dumps(&sample()).unwrap();
        let err = s.timed_loads_at(&token, Some(10), T0).unwrap_err();
        // the primary signer verifies but finds no timestamp; terminal
        assert_eq!(err.kind(), ErrorKind::BadTimeSignature);
    }

    #[test]
    fn test_urlsafe_roundtrip() {
        let s = serializer();
        let token = s.urlsafe_dumps(&sample()).unwrap();
        assert_eq!(s.urlsafe_loads(&token).unwrap(), sample());
    }

    #[test]
    fn test_urlsafe_compressed_roundtrip() {
        let s = serializer();
        let value = json!({"blob": "x".repeat(512)});
        let token = s.urlsafe_dumps(&value).unwrap();
        // repetitive payload compresses, marked with a leading dot
        assert_eq!(token[0], b'.');
        assert_eq!(s.urlsafe_loads(&token).unwrap(), value);
    }

    #[test]
    fn test_urlsafe_timed_roundtrip_and_expiry() {
        let s = serializer();
        let value = json!({"blob": "y".repeat(512)});
        let token = s.urlsafe_timed_dumps_at(&value, T0).unwrap();
        assert_eq!(
            s.urlsafe_timed_loads_at(&token, Some(5), T0 + 5).unwrap(),
            value
        );
        let err = s
            .urlsafe_timed_loads_at(&token, Some(5), T0 + 6)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureExpired);
        match err.into_stale() {
            Some(Stale::Value { value: stale, .. }) => assert_eq!(stale, value),
            other => panic!("expected decoded stale value, got {other:?}"),
        }
    }

    #[test]
    fn test_urlsafe_token_is_urlsafe() {
        let s = serializer();
        let token = s.urlsafe_dumps(&sample()).unwrap();
        assert!(token
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.'));
    }
}
