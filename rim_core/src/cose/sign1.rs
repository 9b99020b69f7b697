//! COSE_Sign1 framing.

use core::convert::Infallible;

use minicbor::Encoder;
use minicbor::data::Tag;
use minicbor::encode;

use super::Algorithm;
use crate::cbor::{self, Value};

pub const COSE_SIGN1_TAG: u64 = 18;
pub const SIG_STRUCTURE_CONTEXT_SIGNATURE1: &str = "Signature1";

/// Protected header labels (RFC 9052 §3.1).
pub const HEADER_ALG: i64 = 1;
pub const HEADER_CONTENT_TYPE: i64 = 3;
/// Carries the encoded meta document.
pub const HEADER_META: i64 = 8;

#[derive(thiserror::Error, Debug)]
pub enum EnvelopeError {
    #[error("invalid cbor: {0}")]
    Cbor(#[from] minicbor::decode::Error),
    #[error("not a COSE_Sign1 envelope (expected tag 18)")]
    MissingTag,
    #[error("malformed COSE_Sign1 envelope: {0}")]
    Malformed(&'static str),
}

/// Encodes the protected header map `{1: alg, 3: content_type, ?8: meta}`.
pub fn encode_protected_header(
    algorithm: Algorithm,
    content_type: &str,
    meta: Option<&[u8]>,
) -> Result<Vec<u8>, encode::Error<Infallible>> {
    let mut e = Encoder::new(Vec::new());
    e.map(if meta.is_some() { 3 } else { 2 })?;
    e.i64(HEADER_ALG)?.i64(algorithm.id())?;
    e.i64(HEADER_CONTENT_TYPE)?.str(content_type)?;
    if let Some(meta) = meta {
        e.i64(HEADER_META)?.bytes(meta)?;
    }
    Ok(e.into_writer())
}

/// Builds `Sig_structure = ["Signature1", protected, h'', payload]`, the
/// bytes that are actually signed.
pub fn sig_structure(protected: &[u8], payload: &[u8]) -> Result<Vec<u8>, encode::Error<Infallible>> {
    let mut e = Encoder::new(Vec::with_capacity(32 + protected.len() + payload.len()));
    e.array(4)?;
    e.str(SIG_STRUCTURE_CONTEXT_SIGNATURE1)?;
    e.bytes(protected)?;
    e.bytes(&[])?; // external_aad
    e.bytes(payload)?;
    Ok(e.into_writer())
}

pub fn encode_envelope(
    protected: &[u8],
    payload: &[u8],
    signature: &[u8],
) -> Result<Vec<u8>, encode::Error<Infallible>> {
    let mut e = Encoder::new(Vec::new());
    e.tag(Tag::new(COSE_SIGN1_TAG))?;
    e.array(4)?;
    e.bytes(protected)?;
    e.map(0)?;
    e.bytes(payload)?;
    e.bytes(signature)?;
    Ok(e.into_writer())
}

/// A decoded COSE_Sign1 envelope. Decoding checks structure only; the
/// signature is not verified.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedEnvelope {
    /// Protected header exactly as serialized.
    pub protected: Vec<u8>,
    pub algorithm_id: Option<i64>,
    pub content_type: Option<String>,
    pub meta: Option<Vec<u8>>,
    pub unprotected: Vec<(Value, Value)>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedEnvelope {
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let Value::Tag(COSE_SIGN1_TAG, body) = cbor::from_slice(bytes)? else {
            return Err(EnvelopeError::MissingTag);
        };
        let Value::Sequence(items) = *body else {
            return Err(EnvelopeError::Malformed("body is not an array"));
        };
        let [protected, unprotected, payload, signature]: [Value; 4] = items
            .try_into()
            .map_err(|_| EnvelopeError::Malformed("body is not a 4-element array"))?;

        let Value::Bytes(protected) = protected else {
            return Err(EnvelopeError::Malformed("protected header is not a byte string"));
        };
        let Value::Mapping(unprotected) = unprotected else {
            return Err(EnvelopeError::Malformed("unprotected header is not a map"));
        };
        let Value::Bytes(payload) = payload else {
            return Err(EnvelopeError::Malformed("payload is not a byte string"));
        };
        let Value::Bytes(signature) = signature else {
            return Err(EnvelopeError::Malformed("signature is not a byte string"));
        };

        let headers = if protected.is_empty() {
            Vec::new()
        } else {
            match cbor::from_slice(&protected)? {
                Value::Mapping(entries) => entries,
                _ => return Err(EnvelopeError::Malformed("protected header is not a map")),
            }
        };
        let header = |label: i64| {
            headers
                .iter()
                .find(|(k, _)| *k == Value::from(label))
                .map(|(_, v)| v)
        };

        let algorithm_id = match header(HEADER_ALG) {
            None => None,
            Some(Value::Integer(id)) => Some(
                i64::try_from(*id).map_err(|_| EnvelopeError::Malformed("alg out of range"))?,
            ),
            Some(_) => return Err(EnvelopeError::Malformed("alg is not an integer")),
        };
        let content_type = match header(HEADER_CONTENT_TYPE) {
            None => None,
            Some(Value::Text(ct)) => Some(ct.clone()),
            Some(_) => return Err(EnvelopeError::Malformed("content type is not text")),
        };
        let meta = match header(HEADER_META) {
            None => None,
            Some(Value::Bytes(meta)) => Some(meta.to_vec()),
            Some(_) => return Err(EnvelopeError::Malformed("meta is not a byte string")),
        };

        Ok(SignedEnvelope {
            protected: protected.to_vec(),
            algorithm_id,
            content_type,
            meta,
            unprotected,
            payload: payload.to_vec(),
            signature: signature.to_vec(),
        })
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm_id.and_then(Algorithm::from_id)
    }

    /// The Sig_structure the signature was computed over.
    pub fn to_be_signed(&self) -> Result<Vec<u8>, encode::Error<Infallible>> {
        sig_structure(&self.protected, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_header_without_meta() {
        let protected =
            encode_protected_header(Algorithm::ES256, "application/rim+cbor", None).unwrap();
        let value = cbor::from_slice(&protected).unwrap();
        assert_eq!(
            value,
            Value::Mapping(vec![
                (Value::from(1i64), Value::from(-7i64)),
                (Value::from(3i64), Value::from("application/rim+cbor")),
            ])
        );
    }

    #[test]
    fn test_protected_header_with_meta() {
        let protected = encode_protected_header(Algorithm::PS384, "a/b", Some(&[0xa0][..])).unwrap();
        assert_eq!(
            protected,
            [0xa3, 0x01, 0x38, 0x25, 0x03, 0x63, b'a', b'/', b'b', 0x08, 0x41, 0xa0]
        );
    }

    #[test]
    fn test_sig_structure() {
        let tbs = sig_structure(&[0xa0], &[0x01]).unwrap();
        let mut expected = vec![0x84, 0x6a];
        expected.extend_from_slice(b"Signature1");
        expected.extend_from_slice(&[0x41, 0xa0, 0x40, 0x41, 0x01]);
        assert_eq!(tbs, expected);
    }

    #[test]
    fn test_envelope_decode() {
        let protected = encode_protected_header(Algorithm::EdDSA, "x", Some(&b"meta"[..])).unwrap();
        let bytes = encode_envelope(&protected, b"payload", b"sig").unwrap();
        let envelope = SignedEnvelope::from_cbor(&bytes).unwrap();
        assert_eq!(envelope.protected, protected);
        assert_eq!(envelope.algorithm(), Some(Algorithm::EdDSA));
        assert_eq!(envelope.content_type.as_deref(), Some("x"));
        assert_eq!(envelope.meta.as_deref(), Some(&b"meta"[..]));
        assert!(envelope.unprotected.is_empty());
        assert_eq!(envelope.payload, b"payload");
        assert_eq!(envelope.signature, b"sig");
        assert_eq!(
            envelope.to_be_signed().unwrap(),
            sig_structure(&protected, b"payload").unwrap()
        );
    }

    #[test]
    fn test_envelope_decode_rejects_untagged() {
        let protected = encode_protected_header(Algorithm::EdDSA, "x", None).unwrap();
        let bytes = encode_envelope(&protected, b"p", b"s").unwrap();
        let err = SignedEnvelope::from_cbor(&bytes[1..]).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingTag));
    }

    #[test]
    fn test_envelope_decode_rejects_short_array() {
        // 18([h'', {}, h''])
        let err = SignedEnvelope::from_cbor(&[0xd2, 0x83, 0x40, 0xa0, 0x40]).unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed(_)));
    }
}
