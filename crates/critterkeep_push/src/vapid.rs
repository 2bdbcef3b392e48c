//! VAPID (RFC 8292) application server identity.
//!
//! Keys are P-256: the private key is the raw 32-byte scalar and the public key
//! the 65-byte uncompressed point, both base64url without padding, which is
//! the form browsers expect for `applicationServerKey`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use rand_core::OsRng;
use url::Url;

use crate::error::PushError;

/// Lifetime of a signed VAPID token.
pub const VAPID_TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

/// A freshly generated key pair, base64url-encoded.
#[derive(Debug, Clone)]
pub struct VapidKeyPair {
    pub public_key: String,
    pub private_key: String,
}

/// Generates a new P-256 key pair for VAPID.
pub fn generate_keys() -> VapidKeyPair {
    let signing_key = SigningKey::random(&mut OsRng);
    let public_point = signing_key.verifying_key().to_encoded_point(false);

    VapidKeyPair {
        public_key: URL_SAFE_NO_PAD.encode(public_point.as_bytes()),
        private_key: URL_SAFE_NO_PAD.encode(signing_key.to_bytes()),
    }
}

/// Signs the per-origin JWTs sent in the `Authorization: vapid` header.
pub struct VapidSigner {
    signing_key: SigningKey,
    public_key: String,
    subject: String,
}

impl std::fmt::Debug for VapidSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidSigner")
            .field("public_key", &self.public_key)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl VapidSigner {
    /// Builds a signer from configured keys.
    ///
    /// # Errors
    ///
    /// `PushError::ConfigError` if the private key is not a valid P-256 scalar
    /// or the public key does not belong to it.
    pub fn new(public_key: &str, private_key: &str, subject: &str) -> Result<Self, PushError> {
        let key_bytes = decode_base64_flexible(private_key)
            .map_err(|e| PushError::ConfigError(format!("bad VAPID private key: {}", e)))?;
        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| PushError::ConfigError(format!("bad VAPID private key: {}", e)))?;

        let derived = URL_SAFE_NO_PAD.encode(
            signing_key
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes(),
        );
        let configured = decode_base64_flexible(public_key)
            .map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
            .map_err(|e| PushError::ConfigError(format!("bad VAPID public key: {}", e)))?;
        if configured != derived {
            return Err(PushError::ConfigError(
                "VAPID public key does not match the private key".to_string(),
            ));
        }

        Ok(Self {
            signing_key,
            public_key: derived,
            subject: subject.to_string(),
        })
    }

    /// The public key as sent in the `k=` parameter and to browsers.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Signs an ES256 JWT for the push service that owns `endpoint`.
    ///
    /// `aud` is the endpoint origin, `exp` is `now + 12h`.
    pub fn sign(&self, endpoint: &str, now: i64) -> Result<String, PushError> {
        let origin = extract_origin(endpoint)?;

        let header_b64 = URL_SAFE_NO_PAD.encode(br#"{"typ":"JWT","alg":"ES256"}"#);
        let claims = serde_json::json!({
            "aud": origin,
            "exp": now + VAPID_TOKEN_TTL_SECS,
            "sub": &self.subject,
        });
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{}.{}", header_b64, claims_b64);

        let signature: Signature = self
            .signing_key
            .try_sign(signing_input.as_bytes())
            .map_err(|e| PushError::JwtError(e.to_string()))?;

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    /// Value of the `Authorization` header for `endpoint`.
    pub fn authorization(&self, endpoint: &str, now: i64) -> Result<String, PushError> {
        Ok(format!(
            "vapid t={},k={}",
            self.sign(endpoint, now)?,
            self.public_key
        ))
    }
}

/// Scheme, host and non-default port of an endpoint URL.
pub fn extract_origin(endpoint: &str) -> Result<String, PushError> {
    let parsed = Url::parse(endpoint)
        .map_err(|e| PushError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
    if parsed.host_str().is_none() {
        return Err(PushError::InvalidEndpoint(format!(
            "{}: no host",
            endpoint
        )));
    }
    Ok(parsed.origin().ascii_serialization())
}

/// Decodes base64 that may be URL-safe or standard, padded or not.
pub fn decode_base64_flexible(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};
    let input = input.trim();
    URL_SAFE_NO_PAD
        .decode(input)
        .or_else(|_| URL_SAFE.decode(input))
        .or_else(|_| STANDARD.decode(input))
        .or_else(|_| STANDARD_NO_PAD.decode(input))
}
