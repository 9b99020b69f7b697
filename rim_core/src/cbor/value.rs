use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use core::fmt;
use minicbor::data::{Int, Tag, Type};
use minicbor::decode::{Decode, Error};
use minicbor::encode::{self, Encode, Encoder, Write};

use crate::config::{EncodeOptions, MapOrder, TimeFormat, TimeTag};

/// Maximum size for bytes/string values to prevent memory exhaustion from
/// untrusted CBOR input.
const MAX_BYTES_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum nesting of arrays, maps and tags accepted by the decoder.
const MAX_NESTING_DEPTH: usize = 512;

/// Standard date/time string (RFC 8949 §3.4.1).
pub const TAG_DATE_TIME_STRING: u64 = 0;

/// Epoch-based date/time (RFC 8949 §3.4.2).
pub const TAG_EPOCH_DATE_TIME: u64 = 1;

/// Generic value tree shared by the YAML reader, the transcoder and the
/// CBOR encoder.
///
/// Mapping keys may be any variant and mapping entries keep the order in
/// which they were read; [`MapOrder`] decides the order they are written in.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Any CBOR integer, i.e. in the range `-2^64 ..= 2^64 - 1`.
    Integer(Int),
    Float(f64),
    Text(String),
    Bytes(Bytes),
    Sequence(Vec<Value>),
    Mapping(Vec<(Value, Value)>),
    /// A tag number applied to its content.
    Tag(u64, Box<Value>),
    /// A date/time, written according to [`TimeFormat`] and [`TimeTag`].
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn empty_mapping() -> Self {
        Value::Mapping(Vec::new())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as a `u64` if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_ref()),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Mapping(entries) => Some(entries.as_slice()),
            _ => None,
        }
    }

    /// Looks up the first entry whose key is the given text string.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Tag(..) => "tag",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Integer(Int::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(Int::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(b))
    }
}

/// Diagnostic notation (RFC 8949 §8).
///
/// - Integers, booleans and `null` are displayed as in Rust; floats use
///   Rust's shortest round-trip form.
/// - Text strings are displayed in double quotes.
/// - Byte strings are hex-encoded inside `h'...'`.
/// - Sequences are `[a, b]`, mappings are `{k: v, ...}`.
/// - Tags are `n(content)`; timestamps are shown as tag 0 with RFC 3339 text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => {
                f.write_str("h'")?;
                for x in b {
                    write!(f, "{:02x}", x)?;
                }
                f.write_str("'")
            }
            Value::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Mapping(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Tag(n, content) => write!(f, "{}({})", n, content),
            Value::Timestamp(dt) => write!(
                f,
                "{}(\"{}\")",
                TAG_DATE_TIME_STRING,
                dt.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        }
    }
}

impl<'b, C> Decode<'b, C> for Value {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, Error> {
        decode_value(d, 0)
    }
}

fn decode_value(d: &mut minicbor::Decoder<'_>, depth: usize) -> Result<Value, Error> {
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::message("nesting depth exceeds limit").at(d.position()));
    }
    match d.datatype()? {
        Type::Null => {
            d.null()?;
            Ok(Value::Null)
        }
        Type::Bool => d.bool().map(Value::Bool),
        Type::U8
        | Type::U16
        | Type::U32
        | Type::U64
        | Type::I8
        | Type::I16
        | Type::I32
        | Type::I64
        | Type::Int => d.int().map(Value::Integer),
        Type::F16 => d.f16().map(|n| Value::Float(f64::from(n))),
        Type::F32 => d.f32().map(|n| Value::Float(f64::from(n))),
        Type::F64 => d.f64().map(Value::Float),
        Type::Bytes => {
            let p = d.position();
            let val = d.bytes()?;
            if val.len() > MAX_BYTES_STRING_LEN {
                return Err(Error::message("bytes value exceeds size limit").at(p));
            }
            Ok(Value::Bytes(Bytes::copy_from_slice(val)))
        }
        Type::String => {
            let p = d.position();
            let val = d.str()?;
            if val.len() > MAX_BYTES_STRING_LEN {
                return Err(Error::message("string value exceeds size limit").at(p));
            }
            Ok(Value::Text(val.into()))
        }
        Type::Array => {
            let p = d.position();
            let Some(n) = d.array()? else {
                return Err(Error::type_mismatch(Type::Array)
                    .at(p)
                    .with_message("missing array length"));
            };
            let mut items = Vec::with_capacity(n.min(1024) as usize);
            for _ in 0..n {
                items.push(decode_value(d, depth + 1)?);
            }
            Ok(Value::Sequence(items))
        }
        Type::Map => {
            let p = d.position();
            let Some(n) = d.map()? else {
                return Err(Error::type_mismatch(Type::Map)
                    .at(p)
                    .with_message("missing map length"));
            };
            let mut entries = Vec::with_capacity(n.min(1024) as usize);
            for _ in 0..n {
                let k = decode_value(d, depth + 1)?;
                let v = decode_value(d, depth + 1)?;
                entries.push((k, v));
            }
            Ok(Value::Mapping(entries))
        }
        Type::Tag => {
            let tag = d.tag()?;
            let content = decode_value(d, depth + 1)?;
            Ok(Value::Tag(u64::from(tag), Box::new(content)))
        }
        t @ (Type::BytesIndef | Type::StringIndef | Type::ArrayIndef | Type::MapIndef) => {
            Err(Error::type_mismatch(t)
                .at(d.position())
                .with_message("indefinite-length item"))
        }
        t => Err(Error::type_mismatch(t)
            .at(d.position())
            .with_message("unsupported cbor type")),
    }
}

impl Encode<EncodeOptions> for Value {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        opts: &mut EncodeOptions,
    ) -> Result<(), encode::Error<W::Error>> {
        match self {
            Value::Null => {
                e.null()?;
            }
            Value::Bool(val) => {
                e.bool(*val)?;
            }
            Value::Integer(val) => {
                e.int(*val)?;
            }
            Value::Float(val) => {
                e.f64(*val)?;
            }
            Value::Text(val) => {
                e.str(val.as_str())?;
            }
            Value::Bytes(val) => {
                e.bytes(val.as_ref())?;
            }
            Value::Sequence(items) => {
                e.array(items.len() as u64)?;
                for item in items {
                    item.encode(e, opts)?;
                }
            }
            Value::Mapping(entries) => encode_mapping(entries, e, opts)?,
            Value::Tag(n, content) => {
                e.tag(Tag::new(*n))?;
                content.encode(e, opts)?;
            }
            Value::Timestamp(dt) => encode_timestamp(dt, e, opts)?,
        }
        Ok(())
    }
}

fn encode_mapping<W: Write>(
    entries: &[(Value, Value)],
    e: &mut Encoder<W>,
    opts: &mut EncodeOptions,
) -> Result<(), encode::Error<W::Error>> {
    e.map(entries.len() as u64)?;

    if opts.map_order == MapOrder::Preserve {
        for (k, v) in entries {
            k.encode(e, opts)?;
            v.encode(e, opts)?;
        }
        return Ok(());
    }

    // Sorting happens on the encoded form of each key.
    let mut keyed = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let key = super::to_vec(k, opts).map_err(encode::Error::message)?;
        keyed.push((key, v));
    }
    match opts.map_order {
        MapOrder::LengthFirst => {
            keyed.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)))
        }
        _ => keyed.sort_by(|a, b| a.0.cmp(&b.0)),
    }

    for (key, v) in keyed {
        e.writer_mut().write_all(&key).map_err(encode::Error::write)?;
        v.encode(e, opts)?;
    }
    Ok(())
}

fn encode_timestamp<W: Write>(
    dt: &DateTime<Utc>,
    e: &mut Encoder<W>,
    opts: &mut EncodeOptions,
) -> Result<(), encode::Error<W::Error>> {
    let tagged = opts.time_tag == TimeTag::Required;
    match opts.time_format {
        TimeFormat::Unix => {
            if tagged {
                e.tag(Tag::new(TAG_EPOCH_DATE_TIME))?;
            }
            e.i64(dt.timestamp())?;
        }
        TimeFormat::Rfc3339 => {
            if tagged {
                e.tag(Tag::new(TAG_DATE_TIME_STRING))?;
            }
            e.str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn encode(value: &Value, options: EncodeOptions) -> Vec<u8> {
        crate::cbor::to_vec(value, &options).unwrap()
    }

    #[test]
    fn test_scalars() {
        let opts = EncodeOptions::canonical();
        assert_eq!(encode(&Value::Null, opts), [0xf6]);
        assert_eq!(encode(&Value::Bool(true), opts), [0xf5]);
        assert_eq!(encode(&Value::from(42u64), opts), [0x18, 0x2a]);
        assert_eq!(encode(&Value::from(-1i64), opts), [0x20]);
        assert_eq!(
            encode(&Value::Float(1.5), opts),
            [0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(encode(&Value::from("a"), opts), [0x61, b'a']);
        assert_eq!(encode(&Value::from(vec![1u8, 2]), opts), [0x42, 1, 2]);
    }

    #[test]
    fn test_definite_lengths_only() {
        let value = Value::Sequence(vec![Value::empty_mapping(), Value::Sequence(vec![])]);
        assert_eq!(encode(&value, EncodeOptions::canonical()), [0x82, 0xa0, 0x80]);
    }

    #[test]
    fn test_map_order() {
        let value = Value::Mapping(vec![
            (Value::from("bb"), Value::Null),
            (Value::from(10u64), Value::Null),
            (Value::from("a"), Value::Null),
            (Value::from(1u64), Value::Null),
        ]);

        let preserved = encode(&value, EncodeOptions::canonical());
        assert_eq!(
            preserved,
            [0xa4, 0x62, b'b', b'b', 0xf6, 0x0a, 0xf6, 0x61, b'a', 0xf6, 0x01, 0xf6]
        );

        let lexical = encode(
            &value,
            EncodeOptions::canonical().with_map_order(MapOrder::BytewiseLexical),
        );
        assert_eq!(
            lexical,
            [0xa4, 0x01, 0xf6, 0x0a, 0xf6, 0x61, b'a', 0xf6, 0x62, b'b', b'b', 0xf6]
        );

        let length_first = encode(
            &value,
            EncodeOptions::canonical().with_map_order(MapOrder::LengthFirst),
        );
        assert_eq!(length_first, lexical);
    }

    #[test]
    fn test_length_first_differs_from_lexical() {
        // 24 encodes as 0x18 0x18 and sorts before -1 (0x20) bytewise, but
        // after it when shorter keys come first.
        let value = Value::Mapping(vec![
            (Value::from(-1i64), Value::Null),
            (Value::from(24u64), Value::Null),
        ]);
        let lexical = encode(
            &value,
            EncodeOptions::canonical().with_map_order(MapOrder::BytewiseLexical),
        );
        let length_first = encode(
            &value,
            EncodeOptions::canonical().with_map_order(MapOrder::LengthFirst),
        );
        assert_eq!(lexical, [0xa2, 0x18, 0x18, 0xf6, 0x20, 0xf6]);
        assert_eq!(length_first, [0xa2, 0x20, 0xf6, 0x18, 0x18, 0xf6]);
    }

    #[test]
    fn test_timestamp_encodings() {
        let dt = Utc.with_ymd_and_hms(2001, 12, 14, 21, 59, 43).unwrap();
        let value = Value::Timestamp(dt);

        let unix = encode(&value, EncodeOptions::canonical());
        assert_eq!(unix, [0xc1, 0x1a, 0x3c, 0x1a, 0x76, 0x4f]);

        let untagged = encode(&value, EncodeOptions::canonical().with_time_tag(TimeTag::None));
        assert_eq!(untagged, [0x1a, 0x3c, 0x1a, 0x76, 0x4f]);

        let text = encode(
            &value,
            EncodeOptions::canonical().with_time_format(TimeFormat::Rfc3339),
        );
        assert_eq!(text[0], 0xc0);
        let decoded = crate::cbor::from_slice(&text).unwrap();
        assert_eq!(
            decoded,
            Value::Tag(0, Box::new(Value::from("2001-12-14T21:59:43Z")))
        );
    }

    #[test]
    fn test_decode_tree() {
        // {0: "foo", "k": [true, null, h'01'], 1: 6("bar")}
        let bytes = hex::decode("a30063666f6f616b83f5f6410101c663626172").unwrap();
        let value = crate::cbor::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            Value::Mapping(vec![
                (Value::from(0u64), Value::from("foo")),
                (
                    Value::from("k"),
                    Value::Sequence(vec![
                        Value::Bool(true),
                        Value::Null,
                        Value::from(vec![1u8])
                    ])
                ),
                (
                    Value::from(1u64),
                    Value::Tag(6, Box::new(Value::from("bar")))
                ),
            ])
        );
    }

    #[test]
    fn test_decode_rejects_indefinite() {
        assert!(crate::cbor::from_slice(&[0x9f, 0x01, 0xff]).is_err());
        assert!(crate::cbor::from_slice(&[0xbf, 0xff]).is_err());
    }

    #[test]
    fn test_decode_large_integers() {
        let max = crate::cbor::from_slice(&[0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff])
            .unwrap();
        assert_eq!(max.as_u64(), Some(u64::MAX));
        let min = crate::cbor::from_slice(&[0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff])
            .unwrap();
        assert_eq!(min.as_u64(), None);
        assert_eq!(
            encode(&min, EncodeOptions::canonical()),
            [0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn test_display() {
        let value = Value::Mapping(vec![
            (Value::from(0u64), Value::from("foo")),
            (
                Value::from("b"),
                Value::Sequence(vec![Value::from(vec![0xde, 0xad]), Value::Float(1.5)]),
            ),
            (Value::from(2u64), Value::Tag(6, Box::new(Value::Null))),
        ]);
        assert_eq!(
            value.to_string(),
            r#"{0: "foo", "b": [h'dead', 1.5], 2: 6(null)}"#
        );
    }

    #[test]
    fn test_get() {
        let value = Value::Mapping(vec![
            (Value::from(0u64), Value::from("zero")),
            (Value::from("0"), Value::from("text zero")),
        ]);
        assert_eq!(value.get("0"), Some(&Value::from("text zero")));
        assert_eq!(value.get("1"), None);
        assert_eq!(Value::Null.get("0"), None);
    }
}
