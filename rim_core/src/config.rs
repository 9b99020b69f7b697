//! Encoding and signing configuration.
//!
//! The configuration is built once at startup (from defaults, an optional
//! TOML file and command line overrides) and then only read. Every encoder
//! entry point takes an [`EncodeOptions`] by reference, so the top-level
//! document and every embedded `encodedCBOR` payload are written with the
//! same settings.
//!
//! Indefinite-length items are never emitted, so there is no knob for them.
//!
//! ```toml
//! [encoding]
//! map_order = "preserve"      # or "length_first", "bytewise_lexical"
//! time_format = "unix"        # or "rfc3339"
//! time_tag = "required"       # or "none"
//!
//! [signing]
//! content_type = "application/rim+cbor"
//! ```

use serde::{Deserialize, Serialize};

/// Content type placed in the COSE protected header when none is configured.
pub const DEFAULT_CONTENT_TYPE: &str = "application/rim+cbor";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("signing.content_type must not be empty")]
    EmptyContentType,
}

/// Order in which map entries are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapOrder {
    /// Entries are written in document order.
    #[default]
    Preserve,
    /// RFC 7049 canonical order: shorter encoded keys first, ties bytewise.
    LengthFirst,
    /// RFC 8949 core deterministic order: bytewise lexical on encoded keys.
    BytewiseLexical,
}

/// Representation of date/time values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    /// Integer seconds since the Unix epoch (tag 1).
    #[default]
    Unix,
    /// RFC 3339 text with second precision (tag 0).
    Rfc3339,
}

/// Whether date/time values carry their CBOR tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeTag {
    #[default]
    Required,
    None,
}

/// Options applied to every CBOR encoding performed by the transcoder.
///
/// The default value is the canonical configuration: definite lengths,
/// document map order, tagged Unix timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeOptions {
    pub map_order: MapOrder,
    pub time_format: TimeFormat,
    pub time_tag: TimeTag,
}

impl EncodeOptions {
    pub fn canonical() -> Self {
        Self::default()
    }

    pub fn with_map_order(mut self, map_order: MapOrder) -> Self {
        self.map_order = map_order;
        self
    }

    pub fn with_time_format(mut self, time_format: TimeFormat) -> Self {
        self.time_format = time_format;
        self
    }

    pub fn with_time_tag(mut self, time_tag: TimeTag) -> Self {
        self.time_tag = time_tag;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SigningConfig {
    /// Value of the COSE content type header (label 3).
    pub content_type: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
        }
    }
}

/// Top-level configuration file layout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RimConfig {
    pub encoding: EncodeOptions,
    pub signing: SigningConfig,
}

impl RimConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing.content_type.is_empty() {
            return Err(ConfigError::EmptyContentType);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_canonical() {
        let config = RimConfig::from_toml_str("").unwrap();
        assert_eq!(config.encoding, EncodeOptions::canonical());
        assert_eq!(config.signing.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_parse_all_fields() {
        let config = RimConfig::from_toml_str(
            r#"
[encoding]
map_order = "bytewise_lexical"
time_format = "rfc3339"
time_tag = "none"

[signing]
content_type = "application/corim-unsigned+cbor"
"#,
        )
        .unwrap();
        assert_eq!(config.encoding.map_order, MapOrder::BytewiseLexical);
        assert_eq!(config.encoding.time_format, TimeFormat::Rfc3339);
        assert_eq!(config.encoding.time_tag, TimeTag::None);
        assert_eq!(
            config.signing.content_type,
            "application/corim-unsigned+cbor"
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = RimConfig::from_toml_str("[encoding]\nindef_length = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_empty_content_type_rejected() {
        let err = RimConfig::from_toml_str("[signing]\ncontent_type = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyContentType));
    }
}
