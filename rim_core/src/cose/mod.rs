//! COSE_Sign1 signing (RFC 9052 §4.2).
//!
//! [`sign`] wraps an encoded payload in a single-signer envelope:
//!
//! ```text
//! 18([
//!     << {1: alg, 3: content_type, ?8: meta} >>,   ; protected
//!     {},                                          ; unprotected
//!     payload,
//!     signature,
//! ])
//! ```
//!
//! The algorithm is never configured directly; it is inferred from the
//! signing key by [`infer_signing_algorithm`].

use tracing::{debug, info};

pub mod algorithm;
pub mod jwk;
pub mod sign1;

pub use algorithm::{Algorithm, Curve, infer_signing_algorithm};
pub use jwk::{JwkError, JwkSigningKey};
pub use sign1::{EnvelopeError, SignedEnvelope, sig_structure};

#[derive(thiserror::Error, Debug)]
pub enum SignError {
    #[error("no signing key provided")]
    MissingSigner,
    #[error("unsupported elliptic curve {0}")]
    UnsupportedCurve(Curve),
    #[error("unsupported RSA signing algorithm {}", .0.as_deref().unwrap_or("(none)"))]
    UnsupportedRsaAlgorithm(Option<String>),
    #[error("unsupported key type {0:?}")]
    UnsupportedKeyType(String),
    #[error("{algorithm} signing failed: {reason}")]
    SigningFailed {
        algorithm: Algorithm,
        reason: String,
    },
    #[error("failed to serialize signed envelope: {0}")]
    SigningSerializationFailed(String),
}

/// A private key that can produce COSE signatures.
///
/// The descriptive methods are what [`infer_signing_algorithm`] looks at;
/// at most one of `curve`, `is_edwards25519` and `is_rsa` should report a
/// match.
pub trait SigningKey {
    /// Key type as named by the key source, e.g. JWK `kty`.
    fn key_type(&self) -> &str;

    /// Curve of an EC key, `None` for any other key.
    fn curve(&self) -> Option<Curve> {
        None
    }

    fn is_edwards25519(&self) -> bool {
        false
    }

    fn is_rsa(&self) -> bool {
        false
    }

    /// Algorithm advertised alongside the key, e.g. JWK `alg`.
    fn algorithm_hint(&self) -> Option<&str> {
        None
    }

    /// Signs `message` with `algorithm`, returning the raw COSE signature.
    fn sign(&self, algorithm: Algorithm, message: &[u8]) -> Result<Vec<u8>, SignError>;
}

/// Signs `payload` and returns the serialized COSE_Sign1 envelope.
///
/// `meta` goes into protected header 8 and is left out entirely when `None`.
pub fn sign<K: SigningKey + ?Sized>(
    payload: &[u8],
    meta: Option<&[u8]>,
    content_type: &str,
    key: Option<&K>,
) -> Result<Vec<u8>, SignError> {
    let key = key.ok_or(SignError::MissingSigner)?;
    let (algorithm, key) = infer_signing_algorithm(key)?;

    let serialization = |err: minicbor::encode::Error<core::convert::Infallible>| {
        SignError::SigningSerializationFailed(err.to_string())
    };

    let protected =
        sign1::encode_protected_header(algorithm, content_type, meta).map_err(serialization)?;
    let to_be_signed = sig_structure(&protected, payload).map_err(serialization)?;
    let signature = key.sign(algorithm, &to_be_signed)?;
    debug!(len = signature.len(), "produced signature");

    let envelope =
        sign1::encode_envelope(&protected, payload, &signature).map_err(serialization)?;
    info!(
        %algorithm,
        content_type,
        meta = meta.is_some(),
        len = envelope.len(),
        "signed payload"
    );
    Ok(envelope)
}
