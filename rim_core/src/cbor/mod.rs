//! Generic value tree and its canonical CBOR encoding.
//!
//! [`Value`] is the in-memory form produced by the YAML reader and consumed
//! by the encoder. Encoding always uses definite lengths; map order and
//! date/time representation follow the [`EncodeOptions`] passed in.

use core::convert::Infallible;

use minicbor::encode::{Encode, Encoder};

use crate::config::EncodeOptions;

pub mod value;

pub use value::Value;

/// Encodes `value` with the given options.
pub fn to_vec(
    value: &Value,
    options: &EncodeOptions,
) -> Result<Vec<u8>, minicbor::encode::Error<Infallible>> {
    let mut ctx = *options;
    let mut e = Encoder::new(Vec::new());
    value.encode(&mut e, &mut ctx)?;
    Ok(e.into_writer())
}

/// Decodes a single CBOR data item, rejecting trailing bytes.
pub fn from_slice(bytes: &[u8]) -> Result<Value, minicbor::decode::Error> {
    let mut d = minicbor::Decoder::new(bytes);
    let value: Value = d.decode()?;
    if d.position() != bytes.len() {
        return Err(minicbor::decode::Error::message("trailing bytes after data item").at(d.position()));
    }
    Ok(value)
}
