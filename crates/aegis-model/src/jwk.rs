//! JSON Web Key types.
//!
//! Follows RFC 7517. A key set maps kids to keys; the ID-token set stores
//! the public and private halves of the signing pair as two entries whose
//! kids carry a `public:` / `private:` prefix.

use serde::{Deserialize, Serialize};

/// A JSON Web Key.
///
/// Parameters for RSA (`n`, `e`, private `d`/`p`/`q`), EC (`crv`, `x`, `y`,
/// private `d`) and symmetric (`k`) keys; unused parameters are omitted from
/// the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type: `RSA`, `EC` or `oct`.
    pub kty: String,

    /// Key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended use, `sig` or `enc`.
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Algorithm the key is intended for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Private exponent, RSA or EC (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// RSA first prime factor (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,

    /// RSA second prime factor (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Symmetric key value (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

impl JsonWebKey {
    /// Returns the key id, or an empty string if unset.
    #[must_use]
    pub fn key_id(&self) -> &str {
        self.kid.as_deref().unwrap_or_default()
    }

    /// Whether the key carries private material.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.d.is_some() || self.k.is_some()
    }
}

/// A named set of JSON Web Keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Keys in the set.
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Finds a key by exact kid.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|k| k.key_id() == kid)
    }

    /// Finds the first key whose kid starts with `prefix`.
    #[must_use]
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|k| k.key_id().starts_with(prefix))
    }

    /// Returns the subset of keys whose kid starts with `public:`.
    ///
    /// This is what the well-known JWKS endpoint exposes.
    #[must_use]
    pub fn public_keys(&self) -> Self {
        Self {
            keys: self
                .keys
                .iter()
                .filter(|k| k.key_id().starts_with("public:"))
                .cloned()
                .collect(),
        }
    }

    /// Whether the set contains no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
