//! Attribute value transcoding contract
//!
//! Protocol layers hand attribute values to the wire as strings and read
//! them back through a [`ValueMapper`]. The protocol codecs themselves live
//! outside this workspace; mappers only define the value-level contract.

use crate::error::{require_id, ComponentError, Result};
use crate::lifecycle::Lifecycle;
use crate::traits::Component;
use crate::types::{AttributeValue, EmptyKind};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Encode/decode attribute values to and from their wire string form
pub trait ValueMapper: Component {
    /// Encode a value. `Ok(None)` means this mapper does not handle the value type.
    fn encode(&self, value: &AttributeValue) -> Result<Option<String>>;

    /// Decode a single wire value. `Ok(None)` means the input was skipped.
    fn decode(&self, text: &str) -> Result<Option<AttributeValue>>;

    /// Decode a batch of wire values, dropping skipped inputs
    fn decode_values(&self, texts: &[&str]) -> Result<Vec<AttributeValue>> {
        let mut values = Vec::with_capacity(texts.len());
        for text in texts {
            if let Some(value) = self.decode(text)? {
                values.push(value);
            }
        }
        Ok(values)
    }
}

macro_rules! mapper_component {
    ($ty:ty) => {
        impl Component for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn initialize(&self) -> Result<()> {
                self.lifecycle.initialize(&self.id, || self.check_config())
            }

            fn validate(&self) -> Result<()> {
                self.lifecycle.validate(&self.id, || Ok(()))
            }

            fn destroy(&self) {
                self.lifecycle.destroy(&self.id, || {})
            }

            fn is_initialized(&self) -> bool {
                self.lifecycle.is_initialized()
            }

            fn is_destroyed(&self) -> bool {
                self.lifecycle.is_destroyed()
            }
        }
    };
}

/// Plain string values
#[derive(Debug)]
pub struct StringValueMapper {
    id: String,
    lifecycle: Lifecycle,
}

impl StringValueMapper {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: require_id(id, "value mapper")?,
            lifecycle: Lifecycle::new(),
        })
    }

    fn check_config(&self) -> Result<()> {
        Ok(())
    }
}

mapper_component!(StringValueMapper);

impl ValueMapper for StringValueMapper {
    fn encode(&self, value: &AttributeValue) -> Result<Option<String>> {
        self.lifecycle.ensure_operational(&self.id)?;
        Ok(match value {
            AttributeValue::String(s) => Some(s.clone()),
            _ => None,
        })
    }

    fn decode(&self, text: &str) -> Result<Option<AttributeValue>> {
        self.lifecycle.ensure_operational(&self.id)?;
        if text.is_empty() {
            return Ok(Some(AttributeValue::Empty(EmptyKind::ZeroLengthValue)));
        }
        Ok(Some(AttributeValue::string(text)))
    }
}

/// Scoped values carried as `value<delimiter>scope`
#[derive(Debug)]
pub struct ScopedStringValueMapper {
    id: String,
    lifecycle: Lifecycle,
    delimiter: String,
}

impl ScopedStringValueMapper {
    /// Default delimiter between value and scope
    pub const DEFAULT_DELIMITER: &'static str = "@";

    pub fn new(id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: require_id(id, "value mapper")?,
            lifecycle: Lifecycle::new(),
            delimiter: Self::DEFAULT_DELIMITER.to_string(),
        })
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn set_delimiter(&mut self, delimiter: impl Into<String>) -> Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.delimiter = delimiter.into();
        Ok(())
    }

    fn check_config(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(ComponentError::initialization(format!(
                "Value mapper '{}': scope delimiter cannot be empty",
                self.id
            )));
        }
        Ok(())
    }
}

mapper_component!(ScopedStringValueMapper);

impl ValueMapper for ScopedStringValueMapper {
    fn encode(&self, value: &AttributeValue) -> Result<Option<String>> {
        self.lifecycle.ensure_operational(&self.id)?;
        Ok(match value {
            AttributeValue::Scoped { value, scope } => {
                Some(format!("{}{}{}", value, self.delimiter, scope))
            }
            _ => None,
        })
    }

    fn decode(&self, text: &str) -> Result<Option<AttributeValue>> {
        self.lifecycle.ensure_operational(&self.id)?;
        match text.split_once(self.delimiter.as_str()) {
            Some((value, scope)) => Ok(Some(AttributeValue::scoped(value, scope))),
            None => {
                debug!(
                    "Value mapper '{}': value '{}' has no scope delimiter, skipping",
                    self.id, text
                );
                Ok(None)
            }
        }
    }
}

/// Byte values carried as base64 text
#[derive(Debug)]
pub struct ByteValueMapper {
    id: String,
    lifecycle: Lifecycle,
}

impl ByteValueMapper {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: require_id(id, "value mapper")?,
            lifecycle: Lifecycle::new(),
        })
    }

    fn check_config(&self) -> Result<()> {
        Ok(())
    }
}

mapper_component!(ByteValueMapper);

impl ValueMapper for ByteValueMapper {
    fn encode(&self, value: &AttributeValue) -> Result<Option<String>> {
        self.lifecycle.ensure_operational(&self.id)?;
        Ok(match value {
            AttributeValue::Bytes(bytes) => Some(STANDARD.encode(bytes)),
            _ => None,
        })
    }

    fn decode(&self, text: &str) -> Result<Option<AttributeValue>> {
        self.lifecycle.ensure_operational(&self.id)?;
        match STANDARD.decode(text) {
            Ok(bytes) if bytes.is_empty() => {
                Ok(Some(AttributeValue::Empty(EmptyKind::ZeroLengthValue)))
            }
            Ok(bytes) => Ok(Some(AttributeValue::Bytes(bytes))),
            Err(e) => {
                debug!("Value mapper '{}': invalid base64 value: {}", self.id, e);
                Ok(None)
            }
        }
    }
}
