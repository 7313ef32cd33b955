//! Headered tokens: `b64(header) . b64(payload) . b64(signature)`.
//!
//! The header is a JSON object carrying at least the algorithm name under
//! `alg`; the timed variant adds `iat` and `exp` claims. Verification
//! re-checks the header's claimed algorithm against the configured one, so
//! a token cannot claim `HS256` while being accepted under different key
//! material (algorithm confusion).

use std::sync::Arc;

use serde_json::Value;

use crate::algorithm::{Algorithm, Digest};
use crate::encoding::{b64_decode, b64_encode};
use crate::error::{ConfigError, Error, JsonObject, Stale};
use crate::payload::{JsonCodec, PayloadCodec};
use crate::signer::{now_timestamp, DerivationMode, Signer};

/// Algorithm name used when none is configured.
pub const DEFAULT_ALGORITHM: &str = "HS512";

/// Default lifetime of timed tokens, in seconds.
pub const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Header/payload separator. Headered tokens always use `.` regardless of
/// any signer configuration.
const SEP: u8 = b'.';

/// The closed algorithm-name registry.
fn algorithm_for_name(name: &str) -> Option<Algorithm> {
    match name {
        "HS256" => Some(Algorithm::Hmac(Digest::Sha256)),
        "HS384" => Some(Algorithm::Hmac(Digest::Sha384)),
        "HS512" => Some(Algorithm::Hmac(Digest::Sha512)),
        "none" => Some(Algorithm::None),
        _ => None,
    }
}

/// Builder for [`JwsSerializer`].
pub struct JwsSerializerBuilder {
    secret: Vec<u8>,
    salt: Option<Vec<u8>>,
    algorithm_name: Option<String>,
    codec: Option<Arc<dyn PayloadCodec>>,
    expires_in: Option<i64>,
}

impl JwsSerializerBuilder {
    /// Extra derivation salt. Without one, the secret keys the MAC directly
    /// (derivation mode `None`), matching standard JWS behavior.
    pub fn salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// One of `HS256`, `HS384`, `HS512`, or `none`.
    pub fn algorithm_name(mut self, name: impl Into<String>) -> Self {
        self.algorithm_name = Some(name.into());
        self
    }

    pub fn codec(mut self, codec: impl PayloadCodec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Lifetime applied to timed tokens.
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    pub fn build(self) -> Result<JwsSerializer, ConfigError> {
        let algorithm_name = self
            .algorithm_name
            .unwrap_or_else(|| DEFAULT_ALGORITHM.to_string());
        let algorithm = algorithm_for_name(&algorithm_name)
            .ok_or_else(|| ConfigError::UnknownAlgorithm(algorithm_name.clone()))?;
        let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        if expires_in <= 0 {
            return Err(ConfigError::InvalidExpiry(expires_in));
        }
        let mut signer = Signer::builder(self.secret).algorithm(algorithm);
        signer = match self.salt {
            Some(salt) => signer.salt(salt),
            None => signer.derivation(DerivationMode::None),
        };
        Ok(JwsSerializer {
            signer: signer.build()?,
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonCodec)),
            algorithm_name,
            expires_in,
        })
    }
}

/// Serializes values into headered tokens and verifies them back,
/// including the header's algorithm claim.
#[derive(Clone)]
pub struct JwsSerializer {
    signer: Signer,
    codec: Arc<dyn PayloadCodec>,
    algorithm_name: String,
    expires_in: i64,
}

impl std::fmt::Debug for JwsSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwsSerializer")
            .field("signer", &self.signer)
            .field("algorithm_name", &self.algorithm_name)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

impl JwsSerializer {
    /// A serializer with all defaults: HS512, JSON codec, no salt, one-hour
    /// timed-token lifetime.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<JwsSerializer, ConfigError> {
        JwsSerializer::builder(secret).build()
    }

    pub fn builder(secret: impl Into<Vec<u8>>) -> JwsSerializerBuilder {
        JwsSerializerBuilder {
            secret: secret.into(),
            salt: None,
            algorithm_name: None,
            codec: None,
            expires_in: None,
        }
    }

    /// The configured algorithm name, as recorded in token headers.
    #[must_use]
    pub fn algorithm_name(&self) -> &str {
        &self.algorithm_name
    }

    /// Serialize and sign `value` with a minimal header.
    pub fn dumps(&self, value: &Value) -> Result<Vec<u8>, Error> {
        self.dumps_with_header(value, JsonObject::new())
    }

    /// Serialize and sign `value` with caller-supplied header fields. The
    /// `alg` field is always overwritten with the configured algorithm.
    pub fn dumps_with_header(&self, value: &Value, extra: JsonObject) -> Result<Vec<u8>, Error> {
        let mut header = extra;
        header.insert("alg".to_string(), Value::String(self.algorithm_name.clone()));

        let header_bytes = self.codec.dump(&Value::Object(header))?;
        let payload_bytes = self.codec.dump(value)?;

        let header_b64 = b64_encode(&header_bytes);
        let payload_b64 = b64_encode(&payload_bytes);
        let mut body = Vec::with_capacity(header_b64.len() + 1 + payload_b64.len());
        body.extend_from_slice(header_b64.as_bytes());
        body.push(SEP);
        body.extend_from_slice(payload_b64.as_bytes());
        Ok(self.signer.sign(&body))
    }

    /// Verify a token and decode its header and payload.
    pub fn loads(&self, token: &[u8]) -> Result<(JsonObject, Value), Error> {
        let body = self.signer.unsign(token)?;

        // first dot: the header segment never contains one
        let dot = body
            .iter()
            .position(|&b| b == SEP)
            .ok_or_else(|| Error::bad_payload("no '.' found in token body"))?;
        let (header_b64, payload_b64) = (&body[..dot], &body[dot + 1..]);

        let header_bytes = b64_decode(header_b64)
            .map_err(|_| Error::bad_payload("could not base64 decode the header"))?;
        let payload_bytes = b64_decode(payload_b64)
            .map_err(|_| Error::bad_payload("could not base64 decode the payload"))?;

        let header_value = self
            .codec
            .load(&header_bytes)
            .map_err(|_| Error::bad_payload("could not deserialize header"))?;
        let Value::Object(header) = header_value else {
            return Err(Error::bad_header("header is not a JSON object"));
        };
        let payload = self.codec.load(&payload_bytes)?;

        match header.get("alg").and_then(Value::as_str) {
            Some(alg) if alg == self.algorithm_name => {}
            _ => return Err(Error::bad_header("algorithm mismatch")),
        }
        Ok((header, payload))
    }

    /// Serialize with `iat`/`exp` claims stamped from the current time.
    pub fn timed_dumps(&self, value: &Value) -> Result<Vec<u8>, Error> {
        self.timed_dumps_at(value, now_timestamp())
    }

    /// Timed serialization with an explicit clock reading:
    /// `iat = now`, `exp = now + expires_in`.
    pub fn timed_dumps_at(&self, value: &Value, now: i64) -> Result<Vec<u8>, Error> {
        let mut header = JsonObject::new();
        header.insert("iat".to_string(), Value::from(now));
        header.insert("exp".to_string(), Value::from(now + self.expires_in));
        self.dumps_with_header(value, header)
    }

    /// Verify a timed token, enforcing its `exp` claim.
    pub fn timed_loads(&self, token: &[u8]) -> Result<(JsonObject, Value), Error> {
        self.timed_loads_at(token, now_timestamp())
    }

    /// Timed verification with an explicit clock reading. A token is
    /// rejected once `exp < now`; at `exp == now` it still verifies. The
    /// expiry-class failures carry the decoded header and payload, since
    /// the signature itself was valid.
    pub fn timed_loads_at(&self, token: &[u8], now: i64) -> Result<(JsonObject, Value), Error> {
        let (header, payload) = self.loads(token)?;

        let Some(exp) = header.get("exp").cloned() else {
            return Err(Error::bad_signature("missing expiry date")
                .with_stale(Stale::Token { header, payload }));
        };
        let exp = match exp.as_i64() {
            Some(exp) if exp >= 0 => exp,
            _ => {
                return Err(Error::bad_header("expiry date is not an IntDate")
                    .with_stale(Stale::Token { header, payload }));
            }
        };
        if exp < now {
            return Err(Error::signature_expired(format!(
                "signature expired at {exp}, now is {now}"
            ))
            .with_stale(Stale::Token { header, payload }));
        }
        Ok((header, payload))
    }
}
