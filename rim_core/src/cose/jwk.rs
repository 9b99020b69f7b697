//! JSON Web Key (RFC 7517) signing keys.
//!
//! Only private keys are useful here, so `d` is required for every supported
//! key type. Public coordinates (`x`, `y`) are not needed and are ignored.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::rngs::OsRng;
use rsa::{BigUint, RsaPrivateKey};
use serde::Deserialize;
use sha2::{Sha256, Sha384, Sha512};
use signature::{RandomizedSigner, SignatureEncoding, Signer};

use super::{Algorithm, Curve, SignError, SigningKey};

#[derive(thiserror::Error, Debug)]
pub enum JwkError {
    #[error("invalid JWK json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JWK set must contain exactly one key, found {0}")]
    KeyCount(usize),
    #[error("JWK is missing parameter {0:?}")]
    MissingParameter(&'static str),
    #[error("JWK parameter {name:?} is not valid base64url: {source}")]
    Base64 {
        name: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("invalid {kty} key material: {reason}")]
    InvalidKey { kty: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    crv: Option<String>,
    alg: Option<String>,
    kid: Option<String>,
    d: Option<String>,
    n: Option<String>,
    e: Option<String>,
    p: Option<String>,
    q: Option<String>,
}

enum KeyMaterial {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(p521::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
    Rsa(Box<RsaPrivateKey>),
    /// EC key on a curve we cannot sign with.
    OtherCurve(String),
    /// Key type we cannot sign with.
    Unsupported,
}

/// A private key read from a JWK or a single-key JWK Set.
pub struct JwkSigningKey {
    kty: String,
    alg: Option<String>,
    kid: Option<String>,
    material: KeyMaterial,
}

impl std::fmt::Debug for JwkSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwkSigningKey")
            .field("kty", &self.kty)
            .field("crv", &self.curve())
            .field("alg", &self.alg)
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl JwkSigningKey {
    /// Parses a JWK, or a JWK Set holding exactly one key.
    pub fn from_slice(json: &[u8]) -> Result<Self, JwkError> {
        let value: serde_json::Value = serde_json::from_slice(json)?;
        let jwk: Jwk = if value.get("keys").is_some() {
            let mut set: JwkSet = serde_json::from_value(value)?;
            if set.keys.len() != 1 {
                return Err(JwkError::KeyCount(set.keys.len()));
            }
            set.keys.remove(0)
        } else {
            serde_json::from_value(value)?
        };
        Self::from_jwk(jwk)
    }

    fn from_jwk(jwk: Jwk) -> Result<Self, JwkError> {
        let invalid = |reason: String| JwkError::InvalidKey {
            kty: jwk.kty.clone(),
            reason,
        };

        let material = match jwk.kty.as_str() {
            "EC" => {
                let crv = jwk.crv.as_deref().ok_or(JwkError::MissingParameter("crv"))?;
                match Curve::from_name(crv) {
                    Curve::P256 => {
                        let d = required(&jwk.d, "d")?;
                        p256::ecdsa::SigningKey::from_slice(&d)
                            .map(KeyMaterial::P256)
                            .map_err(|e| invalid(e.to_string()))?
                    }
                    Curve::P384 => {
                        let d = required(&jwk.d, "d")?;
                        p384::ecdsa::SigningKey::from_slice(&d)
                            .map(KeyMaterial::P384)
                            .map_err(|e| invalid(e.to_string()))?
                    }
                    Curve::P521 => {
                        let d = required(&jwk.d, "d")?;
                        p521::ecdsa::SigningKey::from_slice(&d)
                            .map(KeyMaterial::P521)
                            .map_err(|e| invalid(e.to_string()))?
                    }
                    Curve::Other(name) => KeyMaterial::OtherCurve(name),
                }
            }
            "OKP" => match jwk.crv.as_deref() {
                Some("Ed25519") => {
                    let d = required(&jwk.d, "d")?;
                    let seed: [u8; 32] = d.as_slice().try_into().map_err(|_| {
                        invalid(format!("Ed25519 key must be 32 bytes, got {}", d.len()))
                    })?;
                    KeyMaterial::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed))
                }
                Some(_) => KeyMaterial::Unsupported,
                None => return Err(JwkError::MissingParameter("crv")),
            },
            "RSA" => {
                let n = BigUint::from_bytes_be(&required(&jwk.n, "n")?);
                let e = BigUint::from_bytes_be(&required(&jwk.e, "e")?);
                let d = BigUint::from_bytes_be(&required(&jwk.d, "d")?);
                let primes = match (&jwk.p, &jwk.q) {
                    (Some(_), Some(_)) => vec![
                        BigUint::from_bytes_be(&required(&jwk.p, "p")?),
                        BigUint::from_bytes_be(&required(&jwk.q, "q")?),
                    ],
                    _ => Vec::new(),
                };
                let key = RsaPrivateKey::from_components(n, e, d, primes)
                    .map_err(|e| invalid(e.to_string()))?;
                key.validate().map_err(|e| invalid(e.to_string()))?;
                KeyMaterial::Rsa(Box::new(key))
            }
            _ => KeyMaterial::Unsupported,
        };

        Ok(JwkSigningKey {
            kty: jwk.kty,
            alg: jwk.alg,
            kid: jwk.kid,
            material,
        })
    }

    pub fn key_id(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

fn required(param: &Option<String>, name: &'static str) -> Result<Vec<u8>, JwkError> {
    let encoded = param.as_deref().ok_or(JwkError::MissingParameter(name))?;
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|source| JwkError::Base64 { name, source })
}

impl SigningKey for JwkSigningKey {
    fn key_type(&self) -> &str {
        &self.kty
    }

    fn curve(&self) -> Option<Curve> {
        match &self.material {
            KeyMaterial::P256(_) => Some(Curve::P256),
            KeyMaterial::P384(_) => Some(Curve::P384),
            KeyMaterial::P521(_) => Some(Curve::P521),
            KeyMaterial::OtherCurve(name) => Some(Curve::Other(name.clone())),
            _ => None,
        }
    }

    fn is_edwards25519(&self) -> bool {
        matches!(self.material, KeyMaterial::Ed25519(_))
    }

    fn is_rsa(&self) -> bool {
        matches!(self.material, KeyMaterial::Rsa(_))
    }

    fn algorithm_hint(&self) -> Option<&str> {
        self.alg.as_deref()
    }

    fn sign(&self, algorithm: Algorithm, message: &[u8]) -> Result<Vec<u8>, SignError> {
        let failed = |reason: String| SignError::SigningFailed { algorithm, reason };

        match (&self.material, algorithm) {
            (KeyMaterial::P256(key), Algorithm::ES256) => {
                let sig: p256::ecdsa::Signature =
                    key.try_sign(message).map_err(|e| failed(e.to_string()))?;
                Ok(sig.to_bytes().to_vec())
            }
            (KeyMaterial::P384(key), Algorithm::ES384) => {
                let sig: p384::ecdsa::Signature =
                    key.try_sign(message).map_err(|e| failed(e.to_string()))?;
                Ok(sig.to_bytes().to_vec())
            }
            (KeyMaterial::P521(key), Algorithm::ES512) => {
                let sig: p521::ecdsa::Signature =
                    key.try_sign(message).map_err(|e| failed(e.to_string()))?;
                Ok(sig.to_bytes().to_vec())
            }
            (KeyMaterial::Ed25519(key), Algorithm::EdDSA) => {
                let sig: ed25519_dalek::Signature =
                    key.try_sign(message).map_err(|e| failed(e.to_string()))?;
                Ok(sig.to_bytes().to_vec())
            }
            (KeyMaterial::Rsa(key), Algorithm::PS256) => {
                let signer = rsa::pss::BlindedSigningKey::<Sha256>::new(key.as_ref().clone());
                let sig = signer
                    .try_sign_with_rng(&mut OsRng, message)
                    .map_err(|e| failed(e.to_string()))?;
                Ok(sig.to_vec())
            }
            (KeyMaterial::Rsa(key), Algorithm::PS384) => {
                let signer = rsa::pss::BlindedSigningKey::<Sha384>::new(key.as_ref().clone());
                let sig = signer
                    .try_sign_with_rng(&mut OsRng, message)
                    .map_err(|e| failed(e.to_string()))?;
                Ok(sig.to_vec())
            }
            (KeyMaterial::Rsa(key), Algorithm::PS512) => {
                let signer = rsa::pss::BlindedSigningKey::<Sha512>::new(key.as_ref().clone());
                let sig = signer
                    .try_sign_with_rng(&mut OsRng, message)
                    .map_err(|e| failed(e.to_string()))?;
                Ok(sig.to_vec())
            }
            _ => Err(failed(format!(
                "{} key cannot produce {algorithm} signatures",
                self.kty
            ))),
        }
    }
}
