//! YAML document reader.
//!
//! Builds a [`Value`] tree from the event stream of `yaml-rust2`. Working on
//! events (instead of a loaded document) keeps explicit scalar tags visible,
//! which is needed for `!!binary` and `!!timestamp`.
//!
//! Scalar resolution:
//!
//! | Input | Value |
//! |---|---|
//! | quoted scalar, `!!str` | `Text` |
//! | `~`, `null`, empty, `!!null` | `Null` |
//! | `true` / `false` (any case form) | `Bool` |
//! | decimal, `0x`, `0o`, `0b`, leading-zero octal integer (`_` ignored) | `Integer` |
//! | float, `.inf`, `.nan` | `Float` |
//! | `!!binary` | `Bytes` (base64, whitespace ignored) |
//! | `!!timestamp` | `Timestamp` |
//!
//! Other tags are ignored. Only the first document of a stream is read; an
//! empty or null document reads as an empty mapping. A key repeated within
//! one mapping is an error.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use yaml_rust2::Yaml;
use yaml_rust2::parser::{Event, EventReceiver, Parser};
use yaml_rust2::scanner::{ScanError, TScalarStyle};

use crate::cbor::Value;

const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

#[derive(thiserror::Error, Debug)]
pub enum YamlError {
    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("yaml syntax error: {0}")]
    Syntax(#[from] ScanError),
    #[error("invalid !!binary scalar: {0}")]
    InvalidBinary(#[from] base64::DecodeError),
    #[error("invalid !!timestamp scalar {0:?}")]
    InvalidTimestamp(String),
    #[error("invalid !!{tag} scalar {value:?}")]
    InvalidScalar { tag: String, value: String },
    #[error("alias refers to unknown anchor {0}")]
    UnknownAnchor(usize),
    #[error("mapping key {0} already defined")]
    DuplicateKey(String),
}

/// Reads the first YAML document in `input`.
pub fn from_slice(input: &[u8]) -> Result<Value, YamlError> {
    from_str(std::str::from_utf8(input)?)
}

pub fn from_str(input: &str) -> Result<Value, YamlError> {
    let mut builder = TreeBuilder::default();
    let mut parser = Parser::new_from_str(input);
    parser.load(&mut builder, false)?;

    if let Some(err) = builder.error {
        return Err(err);
    }
    match builder.root {
        None | Some(Value::Null) => Ok(Value::empty_mapping()),
        Some(root) => Ok(root),
    }
}

enum Frame {
    Sequence {
        anchor: usize,
        items: Vec<Value>,
    },
    Mapping {
        anchor: usize,
        entries: Vec<(Value, Value)>,
        pending_key: Option<Value>,
    },
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    anchors: HashMap<usize, Value>,
    root: Option<Value>,
    error: Option<YamlError>,
}

impl TreeBuilder {
    fn push(&mut self, value: Value, anchor: usize) -> Result<(), YamlError> {
        if anchor > 0 {
            self.anchors.insert(anchor, value.clone());
        }
        match self.stack.last_mut() {
            None => {
                if self.root.is_none() {
                    self.root = Some(value);
                }
            }
            Some(Frame::Sequence { items, .. }) => items.push(value),
            Some(Frame::Mapping {
                entries,
                pending_key,
                ..
            }) => match pending_key.take() {
                None => {
                    if entries.iter().any(|(k, _)| *k == value) {
                        return Err(YamlError::DuplicateKey(value.to_string()));
                    }
                    *pending_key = Some(value);
                }
                Some(key) => entries.push((key, value)),
            },
        }
        Ok(())
    }

    fn handle(&mut self, ev: Event) -> Result<(), YamlError> {
        match ev {
            Event::Scalar(text, style, anchor, tag) => {
                let tag = tag.as_ref().and_then(|t| core_tag(&t.handle, &t.suffix));
                let value = resolve_scalar(text, style, tag)?;
                self.push(value, anchor)?;
            }
            Event::Alias(id) => {
                let value = self
                    .anchors
                    .get(&id)
                    .cloned()
                    .ok_or(YamlError::UnknownAnchor(id))?;
                self.push(value, 0)?;
            }
            Event::SequenceStart(anchor, _) => self.stack.push(Frame::Sequence {
                anchor,
                items: Vec::new(),
            }),
            Event::MappingStart(anchor, _) => self.stack.push(Frame::Mapping {
                anchor,
                entries: Vec::new(),
                pending_key: None,
            }),
            Event::SequenceEnd | Event::MappingEnd => {
                if let Some(frame) = self.stack.pop() {
                    let (value, anchor) = match frame {
                        Frame::Sequence { anchor, items } => (Value::Sequence(items), anchor),
                        Frame::Mapping {
                            anchor, entries, ..
                        } => (Value::Mapping(entries), anchor),
                    };
                    self.push(value, anchor)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl EventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.handle(ev) {
            self.error = Some(err);
        }
    }
}

/// Returns the suffix of a tag from the YAML core schema (`!!name`).
fn core_tag<'a>(handle: &str, suffix: &'a str) -> Option<&'a str> {
    if handle == "!!" || handle == CORE_TAG_PREFIX {
        return Some(suffix);
    }
    if handle.is_empty() || handle == "!" {
        return suffix.strip_prefix(CORE_TAG_PREFIX);
    }
    None
}

fn resolve_scalar(
    text: String,
    style: TScalarStyle,
    tag: Option<&str>,
) -> Result<Value, YamlError> {
    let invalid = |tag: &str, text: &str| YamlError::InvalidScalar {
        tag: tag.to_owned(),
        value: text.to_owned(),
    };

    match tag {
        Some("str") => Ok(Value::Text(text)),
        Some("binary") => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            Ok(Value::from(STANDARD.decode(compact)?))
        }
        Some("timestamp") => parse_timestamp(&text)
            .map(Value::Timestamp)
            .ok_or(YamlError::InvalidTimestamp(text)),
        Some(t @ "int") => match resolve_plain(&text) {
            v @ Value::Integer(_) => Ok(v),
            _ => Err(invalid(t, &text)),
        },
        Some(t @ "float") => match resolve_plain(&text) {
            v @ Value::Float(_) => Ok(v),
            Value::Integer(i) => Ok(Value::Float(i128::from(i) as f64)),
            _ => Err(invalid(t, &text)),
        },
        Some(t @ "bool") => match resolve_plain(&text) {
            v @ Value::Bool(_) => Ok(v),
            _ => Err(invalid(t, &text)),
        },
        Some(t @ "null") => match resolve_plain(&text) {
            Value::Null => Ok(Value::Null),
            _ => Err(invalid(t, &text)),
        },
        _ if style != TScalarStyle::Plain => Ok(Value::Text(text)),
        _ => Ok(resolve_plain(&text)),
    }
}

/// Resolves an untagged plain scalar.
fn resolve_plain(text: &str) -> Value {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Value::Null,
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        _ => {}
    }

    if let Some(int) = parse_int(text) {
        return int;
    }
    match Yaml::from_str(text) {
        Yaml::Integer(i) => Value::from(i),
        real @ Yaml::Real(_) => match real.as_f64() {
            Some(f) => Value::Float(f),
            None => Value::Text(text.to_owned()),
        },
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Null => Value::Null,
        _ => Value::Text(text.to_owned()),
    }
}

/// Parses an integer in decimal, `0x`, `0o`, `0b` or leading-zero octal
/// notation. Underscores are dropped first. Values up to `u64::MAX` and down
/// to `i64::MIN` are integers; anything else is left to the float rules.
fn parse_int(text: &str) -> Option<Value> {
    let plain = text.replace('_', "");
    let (negative, unsigned) = match plain.as_bytes().first()? {
        b'-' => (true, &plain[1..]),
        b'+' => (false, &plain[1..]),
        _ => (false, plain.as_str()),
    };
    let (radix, digits) = if let Some(d) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, d)
    } else if let Some(d) = unsigned
        .strip_prefix("0o")
        .or_else(|| unsigned.strip_prefix("0O"))
    {
        (8, d)
    } else if let Some(d) = unsigned
        .strip_prefix("0b")
        .or_else(|| unsigned.strip_prefix("0B"))
    {
        (2, d)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if !negative {
        return Some(Value::from(magnitude));
    }
    let n = i64::try_from(-i128::from(magnitude)).ok()?;
    Some(Value::from(n))
}

/// Parses the YAML timestamp forms: a bare date (midnight UTC), or a date
/// and time with `T`, `t` or space as separator and an optional offset
/// (UTC when absent).
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f %:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f %#z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let naive = text.trim_end_matches(['Z', 'z']);
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dt%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }
    None
}
