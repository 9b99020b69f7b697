//! Core RIM manifest encoding.
//!
//! Turns a YAML description of a reference integrity manifest into canonical
//! CBOR and optionally signs it as a COSE_Sign1 envelope.
//!
//! ## Transcoding
//!
//! - YAML reader (`yaml::from_slice`) producing the generic tree
//!   (`cbor::Value`), with `!!binary` and `!!timestamp` support
//! - Marker resolution and encoding (`transcode::transcode`,
//!   `transcode::yaml_to_cbor`): `{tag, value}` mappings become CBOR tags and
//!   `{encodedCBOR}` mappings become embedded CBOR byte strings
//! - Encoding options (`config::EncodeOptions`): map order and date/time
//!   representation; output never uses indefinite lengths
//!
//! ## Signing
//!
//! - Algorithm inference from the key (`cose::infer_signing_algorithm`)
//! - Envelope construction (`cose::sign`) and structural decoding
//!   (`cose::SignedEnvelope`)
//! - JWK private keys (`cose::JwkSigningKey`)
//!
//! ```
//! use rim_core::{EncodeOptions, yaml_to_cbor};
//!
//! let yaml = b"0: foo\n1: {tag: 6, value: bar}\n";
//! let cbor = yaml_to_cbor(yaml, &EncodeOptions::canonical()).unwrap();
//! assert_eq!(cbor, [0xa2, 0x00, 0x63, b'f', b'o', b'o', 0x01, 0xc6, 0x63, b'b', b'a', b'r']);
//! ```

pub mod cbor;
pub mod config;
pub mod cose;
pub mod transcode;
pub mod yaml;

pub use cbor::Value;
pub use config::{EncodeOptions, MapOrder, RimConfig, SigningConfig, TimeFormat, TimeTag};
pub use cose::{
    Algorithm, Curve, JwkSigningKey, SignError, SignedEnvelope, SigningKey,
    infer_signing_algorithm, sign,
};
pub use transcode::{TranscodeError, transcode, yaml_to_cbor};
pub use yaml::YamlError;
