//! ID-token signing and verification.
//!
//! The signer is constructed from the `private:` JWK of the ID-token set.
//! Signed tokens carry the corresponding `public:` kid in their header so
//! verifiers can resolve the key from the well-known JWKS.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{BigUint, RsaPrivateKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use aegis_model::JsonWebKey;

use crate::claims::IdTokenClaims;

/// Errors raised by token signing and verification.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The JWK is unusable for signing.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// Signing failed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// Verification or decoding failed.
    #[error("token verification failed: {0}")]
    Verification(String),
}

/// RS256 signer bound to a provisioned private JWK.
pub struct IdTokenSigner {
    kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for IdTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenSigner")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

fn biguint_param(key: &JsonWebKey, param: &Option<String>, name: &str) -> Result<BigUint, TokenError> {
    let value = param
        .as_deref()
        .ok_or_else(|| TokenError::InvalidKey(format!("key '{}' misses '{name}'", key.key_id())))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| TokenError::InvalidKey(format!("'{name}' is not base64url: {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

impl IdTokenSigner {
    /// Builds a signer from the private half of an RSA signing pair.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidKey`] if the JWK is not a private RSA
    /// key or its parameters do not form a valid key.
    pub fn from_jwk(key: &JsonWebKey) -> Result<Self, TokenError> {
        if key.kty != "RSA" {
            return Err(TokenError::InvalidKey(format!(
                "expected an RSA key, got '{}'",
                key.kty
            )));
        }

        let n = biguint_param(key, &key.n, "n")?;
        let e = biguint_param(key, &key.e, "e")?;
        let d = biguint_param(key, &key.d, "d")?;
        let p = biguint_param(key, &key.p, "p")?;
        let q = biguint_param(key, &key.q, "q")?;

        let private = RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| TokenError::InvalidKey(format!("invalid RSA components: {e}")))?;

        let der = private
            .to_pkcs1_der()
            .map_err(|e| TokenError::InvalidKey(format!("PKCS#1 encoding failed: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let n_b64 = key.n.as_deref().unwrap_or_default();
        let e_b64 = key.e.as_deref().unwrap_or_default();
        let decoding_key = DecodingKey::from_rsa_components(n_b64, e_b64)
            .map_err(|e| TokenError::InvalidKey(format!("invalid public components: {e}")))?;

        // Tokens advertise the public half so JWKS consumers can verify.
        let kid = match key.key_id().strip_prefix("private:") {
            Some(id) => format!("public:{id}"),
            None => key.key_id().to_string(),
        };

        Ok(Self {
            kid,
            encoding_key,
            decoding_key,
        })
    }

    /// The kid written into token headers.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Signs an ID token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn sign(&self, claims: &IdTokenClaims) -> Result<String, TokenError> {
        self.sign_claims(claims)
    }

    /// Signs an arbitrary claim set (used for JWT-strategy access tokens).
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn sign_claims<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding_key).map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verifies a token signed by this key, enforcing expiry.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Verification`] on signature mismatch, expiry,
    /// or malformed input.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;

        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Verification(e.to_string()))
    }

    /// Decodes an `id_token_hint`.
    ///
    /// The signature must verify under this key, but expiry, audience and
    /// issuer are ignored: hints are routinely expired tokens whose only
    /// job is to name the expected subject.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Verification`] if the hint is malformed or was
    /// not signed by this server.
    pub fn decode_hint(&self, token: &str) -> Result<Map<String, Value>, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<Map<String, Value>>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Verification(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_jwk::generate_key_set;
    use chrono::Utc;

    fn signer() -> IdTokenSigner {
        let set = generate_key_set("RS256", "test").unwrap();
        IdTokenSigner::from_jwk(set.find("private:test").unwrap()).unwrap()
    }

    fn claims(sub: &str, expires_in: i64) -> IdTokenClaims {
        let now = Utc::now().timestamp();
        IdTokenClaims {
            iss: "https://auth.example.org/".to_string(),
            sub: sub.to_string(),
            aud: vec!["client-id".to_string()],
            exp: now + expires_in,
            iat: now,
            auth_time: None,
            nonce: None,
            acr: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn from_jwk_rejects_public_key() {
        let set = generate_key_set("RS256", "test").unwrap();
        let err = IdTokenSigner::from_jwk(set.find("public:test").unwrap()).unwrap_err();
        assert!(matches!(err, TokenError::InvalidKey(_)));
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let signer = signer();
        let token = signer.sign(&claims("user", 3600)).unwrap();

        let decoded: IdTokenClaims = signer.verify(&token).unwrap();
        assert_eq!(decoded.sub, "user");
    }

    #[test]
    fn header_carries_public_kid() {
        let signer = signer();
        assert_eq!(signer.kid(), "public:test");

        let token = signer.sign(&claims("user", 3600)).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("public:test"));
    }

    #[test]
    fn verify_enforces_expiry_but_hint_decoding_does_not() {
        let signer = signer();
        let expired = signer.sign(&claims("foouser", -3600)).unwrap();

        assert!(signer.verify::<IdTokenClaims>(&expired).is_err());

        let hint = signer.decode_hint(&expired).unwrap();
        assert_eq!(hint.get("sub").and_then(Value::as_str), Some("foouser"));
    }

    #[test]
    fn hint_from_foreign_key_is_rejected() {
        let signer = signer();

        let other_set = generate_key_set("RS256", "other").unwrap();
        let other = IdTokenSigner::from_jwk(other_set.find("private:other").unwrap()).unwrap();
        let foreign = other.sign(&claims("foouser", 3600)).unwrap();

        assert!(signer.decode_hint(&foreign).is_err());
    }
}
