//! Request-scoped filtering state
//!
//! An [`AttributeFilterContext`] carries the prefiltered attributes handed
//! over from resolution, the request parameters matchers may inspect, and
//! the filtered output.

use idp_core::IdPAttribute;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An attribute the requester declares it wants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    /// Whether the requester marks the attribute as required
    #[serde(default)]
    pub is_required: bool,

    /// Acceptable values; empty means any value
    #[serde(default)]
    pub values: Vec<String>,
}

/// A scope the requester is authorized for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataScope {
    pub value: String,

    /// Whether `value` is a regular expression
    #[serde(default)]
    pub regexp: bool,
}

/// What the requester's metadata says about attributes and scopes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterMetadata {
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, RequestedAttribute>,

    #[serde(default)]
    pub scopes: Vec<MetadataScope>,
}

/// Locates the metadata of the requester of a filter run
pub trait RequesterMetadataLookup: Send + Sync {
    fn lookup(&self, requester_id: &str) -> Option<Arc<RequesterMetadata>>;
}

/// Metadata lookup over a fixed table, keyed by requester id
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataLookup {
    entries: BTreeMap<String, Arc<RequesterMetadata>>,
}

impl StaticMetadataLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, requester_id: impl Into<String>, metadata: RequesterMetadata) -> Self {
        self.entries.insert(requester_id.into(), Arc::new(metadata));
        self
    }
}

impl RequesterMetadataLookup for StaticMetadataLookup {
    fn lookup(&self, requester_id: &str) -> Option<Arc<RequesterMetadata>> {
        self.entries.get(requester_id).cloned()
    }
}

/// Per-request filtering state
#[derive(Default)]
pub struct AttributeFilterContext {
    principal: Option<String>,
    attribute_recipient_id: Option<String>,
    attribute_issuer_id: Option<String>,
    principal_authentication_method: Option<String>,
    metadata_lookup: Option<Arc<dyn RequesterMetadataLookup>>,

    prefiltered_attributes: BTreeMap<String, IdPAttribute>,
    filtered_attributes: BTreeMap<String, IdPAttribute>,
}

impl AttributeFilterContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context over the given prefiltered attributes
    pub fn with_prefiltered<I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = IdPAttribute>,
    {
        let mut context = Self::new();
        context.set_prefiltered_attributes(attributes);
        context
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn set_principal(&mut self, principal: impl Into<String>) {
        self.principal = non_blank(principal.into());
    }

    /// Entity the attributes are released to
    pub fn attribute_recipient_id(&self) -> Option<&str> {
        self.attribute_recipient_id.as_deref()
    }

    pub fn set_attribute_recipient_id(&mut self, recipient: impl Into<String>) {
        self.attribute_recipient_id = non_blank(recipient.into());
    }

    /// Entity issuing the attributes
    pub fn attribute_issuer_id(&self) -> Option<&str> {
        self.attribute_issuer_id.as_deref()
    }

    pub fn set_attribute_issuer_id(&mut self, issuer: impl Into<String>) {
        self.attribute_issuer_id = non_blank(issuer.into());
    }

    pub fn principal_authentication_method(&self) -> Option<&str> {
        self.principal_authentication_method.as_deref()
    }

    pub fn set_principal_authentication_method(&mut self, method: impl Into<String>) {
        self.principal_authentication_method = non_blank(method.into());
    }

    pub fn set_metadata_lookup(&mut self, lookup: Arc<dyn RequesterMetadataLookup>) {
        self.metadata_lookup = Some(lookup);
    }

    /// Metadata of the recipient, when both a recipient and a lookup are set
    pub fn requester_metadata(&self) -> Option<Arc<RequesterMetadata>> {
        let recipient = self.attribute_recipient_id.as_deref()?;
        self.metadata_lookup.as_ref()?.lookup(recipient)
    }

    pub fn prefiltered_attributes(&self) -> &BTreeMap<String, IdPAttribute> {
        &self.prefiltered_attributes
    }

    /// Replace the input attributes; attributes with a blank id are dropped
    pub fn set_prefiltered_attributes<I>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = IdPAttribute>,
    {
        self.prefiltered_attributes = keyed(attributes);
    }

    pub fn filtered_attributes(&self) -> &BTreeMap<String, IdPAttribute> {
        &self.filtered_attributes
    }

    pub fn set_filtered_attributes<I>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = IdPAttribute>,
    {
        self.filtered_attributes = keyed(attributes);
    }

    /// Take the filtered output out of the context
    pub fn take_filtered_attributes(&mut self) -> BTreeMap<String, IdPAttribute> {
        std::mem::take(&mut self.filtered_attributes)
    }
}

impl fmt::Debug for AttributeFilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeFilterContext")
            .field("principal", &self.principal)
            .field("attribute_recipient_id", &self.attribute_recipient_id)
            .field("attribute_issuer_id", &self.attribute_issuer_id)
            .field("prefiltered_attributes", &self.prefiltered_attributes.keys().collect::<Vec<_>>())
            .field("filtered_attributes", &self.filtered_attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn keyed<I>(attributes: I) -> BTreeMap<String, IdPAttribute>
where
    I: IntoIterator<Item = IdPAttribute>,
{
    attributes
        .into_iter()
        .filter(|attribute| !attribute.id().is_empty())
        .map(|attribute| (attribute.id().to_string(), attribute))
        .collect()
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
