//! YAML tree to canonical CBOR.
//!
//! Two mapping shapes are treated specially when walking the tree:
//!
//! - `{tag: <uint>, value: <any>}` becomes CBOR tag `<uint>` wrapping the
//!   resolved `<any>`.
//! - `{encodedCBOR: <any>}` becomes a byte string holding the CBOR encoding
//!   of `<any>`. Tag markers inside `<any>` are resolved first; the bytes are
//!   not looked at again.
//!
//! Detection is shape-exact: a mapping with any extra key, a missing key or a
//! `tag` that is not a non-negative integer is an ordinary mapping.

use tracing::debug;

use crate::cbor::{self, Value};
use crate::config::EncodeOptions;
use crate::yaml::{self, YamlError};

pub const TAG_MARKER_TAG: &str = "tag";
pub const TAG_MARKER_VALUE: &str = "value";
pub const RAW_CBOR_MARKER: &str = "encodedCBOR";

#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    #[error("failed to parse yaml: {0}")]
    Parse(#[from] YamlError),
    #[error("failed to encode {value} as cbor: {reason}")]
    EncodingFailed { value: String, reason: String },
    #[error("document root must be a mapping, found {0}")]
    RootNotMapping(&'static str),
}

/// Parses `input` as YAML and transcodes the document. The document root
/// must be a mapping.
pub fn yaml_to_cbor(input: &[u8], options: &EncodeOptions) -> Result<Vec<u8>, TranscodeError> {
    let tree = yaml::from_slice(input)?;
    if tree.as_mapping().is_none() {
        return Err(TranscodeError::RootNotMapping(tree.kind()));
    }
    transcode(tree, options)
}

/// Resolves markers in `tree` and encodes the result.
pub fn transcode(tree: Value, options: &EncodeOptions) -> Result<Vec<u8>, TranscodeError> {
    let resolved = resolve(tree, options)?;
    let out = encode(&resolved, options)?;
    debug!(len = out.len(), "encoded document");
    Ok(out)
}

/// Replaces every tag marker with a [`Value::Tag`] and every raw-CBOR marker
/// with a [`Value::Bytes`] holding its encoded content.
pub fn resolve(tree: Value, options: &EncodeOptions) -> Result<Value, TranscodeError> {
    resolve_node(tree, options, true)
}

/// Inside a raw-CBOR block `raw_markers` is false, so nested
/// `encodedCBOR` shapes are kept as literal mappings.
fn resolve_node(
    value: Value,
    options: &EncodeOptions,
    raw_markers: bool,
) -> Result<Value, TranscodeError> {
    match value {
        Value::Mapping(entries) => {
            if let Some((tag, index)) = tag_marker(&entries) {
                let content = take_entry(entries, index);
                debug!(tag, "resolving tag marker");
                let content = resolve_node(content, options, raw_markers)?;
                return Ok(Value::Tag(tag, Box::new(content)));
            }
            if raw_markers && is_raw_marker(&entries) {
                let content = take_entry(entries, 0);
                let content = resolve_node(content, options, false)?;
                let bytes = encode(&content, options)?;
                debug!(len = bytes.len(), "embedding raw cbor");
                return Ok(Value::from(bytes));
            }
            let entries = entries
                .into_iter()
                .map(|(k, v)| {
                    Ok((
                        resolve_node(k, options, raw_markers)?,
                        resolve_node(v, options, raw_markers)?,
                    ))
                })
                .collect::<Result<Vec<_>, TranscodeError>>()?;
            Ok(Value::Mapping(entries))
        }
        Value::Sequence(items) => {
            let items = items
                .into_iter()
                .map(|item| resolve_node(item, options, raw_markers))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Sequence(items))
        }
        Value::Tag(tag, content) => Ok(Value::Tag(
            tag,
            Box::new(resolve_node(*content, options, raw_markers)?),
        )),
        scalar => Ok(scalar),
    }
}

/// Returns the tag number and the index of the `value` entry if `entries`
/// has exactly the keys `tag` and `value`.
fn tag_marker(entries: &[(Value, Value)]) -> Option<(u64, usize)> {
    if entries.len() != 2 {
        return None;
    }
    let mut tag = None;
    let mut content = None;
    for (i, (k, v)) in entries.iter().enumerate() {
        match k.as_text() {
            Some(TAG_MARKER_TAG) => tag = v.as_u64(),
            Some(TAG_MARKER_VALUE) => content = Some(i),
            _ => return None,
        }
    }
    Some((tag?, content?))
}

fn is_raw_marker(entries: &[(Value, Value)]) -> bool {
    matches!(entries, [(k, _)] if k.as_text() == Some(RAW_CBOR_MARKER))
}

fn take_entry(mut entries: Vec<(Value, Value)>, index: usize) -> Value {
    entries.swap_remove(index).1
}

fn encode(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>, TranscodeError> {
    cbor::to_vec(value, options).map_err(|err| TranscodeError::EncodingFailed {
        value: value.to_string(),
        reason: err.to_string(),
    })
}
