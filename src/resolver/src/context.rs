//! Request-scoped resolution state
//!
//! An [`AttributeResolutionContext`] is created per request. It carries the
//! request parameters, the memoized result of every plugin resolved so far
//! and, once resolution completes, the final attribute set.

use crate::connector::DataConnector;
use crate::definition::AttributeDefinition;
use crate::error::{ResolutionError, Result};
use idp_core::IdPAttribute;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Attributes produced by a data connector, keyed by attribute id
pub type ConnectorOutput = BTreeMap<String, IdPAttribute>;

/// Memoized result of an attribute definition
#[derive(Debug, Clone)]
pub struct ResolvedAttributeDefinition {
    definition: Arc<AttributeDefinition>,
    attribute: Option<IdPAttribute>,
}

impl ResolvedAttributeDefinition {
    pub fn new(definition: Arc<AttributeDefinition>, attribute: Option<IdPAttribute>) -> Self {
        Self { definition, attribute }
    }

    pub fn id(&self) -> &str {
        self.definition.id()
    }

    pub fn definition(&self) -> &AttributeDefinition {
        &self.definition
    }

    pub fn resolved_attribute(&self) -> Option<&IdPAttribute> {
        self.attribute.as_ref()
    }

    /// Returns the recorded result without invoking the definition again
    pub fn resolve(&self, _context: &AttributeResolutionContext) -> Option<IdPAttribute> {
        self.attribute.clone()
    }
}

/// Memoized result of a data connector
#[derive(Debug, Clone)]
pub struct ResolvedDataConnector {
    connector: Arc<DataConnector>,
    attributes: Option<ConnectorOutput>,
}

impl ResolvedDataConnector {
    pub fn new(connector: Arc<DataConnector>, attributes: Option<ConnectorOutput>) -> Self {
        Self { connector, attributes }
    }

    pub fn id(&self) -> &str {
        self.connector.id()
    }

    pub fn connector(&self) -> &DataConnector {
        &self.connector
    }

    pub fn resolved_attributes(&self) -> Option<&ConnectorOutput> {
        self.attributes.as_ref()
    }

    /// Returns the recorded result without invoking the connector again
    pub fn resolve(&self, _context: &AttributeResolutionContext) -> Option<ConnectorOutput> {
        self.attributes.clone()
    }
}

/// Per-request resolution state
#[derive(Debug, Default)]
pub struct AttributeResolutionContext {
    principal: Option<String>,
    attribute_issuer_id: Option<String>,
    attribute_recipient_id: Option<String>,
    principal_authentication_method: Option<String>,
    requested_attribute_names: BTreeSet<String>,

    resolved_attribute_definitions: BTreeMap<String, ResolvedAttributeDefinition>,
    resolved_data_connectors: BTreeMap<String, ResolvedDataConnector>,
    in_progress: BTreeSet<String>,

    resolved_attributes: BTreeMap<String, IdPAttribute>,
}

impl AttributeResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for `principal`
    pub fn for_principal(principal: impl Into<String>) -> Self {
        let mut context = Self::new();
        context.set_principal(principal);
        context
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn set_principal(&mut self, principal: impl Into<String>) {
        self.principal = non_blank(principal.into());
    }

    /// Entity issuing the attributes (this IdP)
    pub fn attribute_issuer_id(&self) -> Option<&str> {
        self.attribute_issuer_id.as_deref()
    }

    pub fn set_attribute_issuer_id(&mut self, issuer: impl Into<String>) {
        self.attribute_issuer_id = non_blank(issuer.into());
    }

    /// Entity the attributes are released to
    pub fn attribute_recipient_id(&self) -> Option<&str> {
        self.attribute_recipient_id.as_deref()
    }

    pub fn set_attribute_recipient_id(&mut self, recipient: impl Into<String>) {
        self.attribute_recipient_id = non_blank(recipient.into());
    }

    pub fn principal_authentication_method(&self) -> Option<&str> {
        self.principal_authentication_method.as_deref()
    }

    pub fn set_principal_authentication_method(&mut self, method: impl Into<String>) {
        self.principal_authentication_method = non_blank(method.into());
    }

    /// Requested attribute ids. Empty means "everything the resolver knows".
    pub fn requested_attribute_names(&self) -> &BTreeSet<String> {
        &self.requested_attribute_names
    }

    /// Replace the requested ids; blank entries are dropped
    pub fn set_requested_attribute_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_attribute_names = names
            .into_iter()
            .filter_map(|name| non_blank(name.into()))
            .collect();
    }

    /// Record the result of an attribute definition.
    ///
    /// A context holds at most one record per id: a second record, even for a
    /// different definition instance with the same id, is rejected.
    pub fn record_attribute_definition_resolution(
        &mut self,
        definition: Arc<AttributeDefinition>,
        attribute: Option<IdPAttribute>,
    ) -> Result<()> {
        let id = definition.id().to_string();
        if self.resolved_attribute_definitions.contains_key(&id) {
            return Err(ResolutionError::AlreadyResolved { plugin_id: id });
        }
        self.resolved_attribute_definitions
            .insert(id, ResolvedAttributeDefinition::new(definition, attribute));
        Ok(())
    }

    /// Record the result of a data connector. Same insert-once rule as for
    /// attribute definitions.
    pub fn record_data_connector_resolution(
        &mut self,
        connector: Arc<DataConnector>,
        attributes: Option<ConnectorOutput>,
    ) -> Result<()> {
        let id = connector.id().to_string();
        if self.resolved_data_connectors.contains_key(&id) {
            return Err(ResolutionError::AlreadyResolved { plugin_id: id });
        }
        self.resolved_data_connectors
            .insert(id, ResolvedDataConnector::new(connector, attributes));
        Ok(())
    }

    pub fn resolved_attribute_definition(&self, id: &str) -> Option<&ResolvedAttributeDefinition> {
        self.resolved_attribute_definitions.get(id)
    }

    pub fn resolved_data_connector(&self, id: &str) -> Option<&ResolvedDataConnector> {
        self.resolved_data_connectors.get(id)
    }

    pub fn resolved_attribute_definitions(&self) -> &BTreeMap<String, ResolvedAttributeDefinition> {
        &self.resolved_attribute_definitions
    }

    pub fn resolved_data_connectors(&self) -> &BTreeMap<String, ResolvedDataConnector> {
        &self.resolved_data_connectors
    }

    /// Mark a plugin as being resolved; false if it already is
    pub(crate) fn begin_resolution(&mut self, id: &str) -> bool {
        self.in_progress.insert(id.to_string())
    }

    pub(crate) fn end_resolution(&mut self, id: &str) {
        self.in_progress.remove(id);
    }

    /// Final resolved attributes, keyed by id
    pub fn resolved_attributes(&self) -> &BTreeMap<String, IdPAttribute> {
        &self.resolved_attributes
    }

    /// Replace the final attribute set; attributes with a blank id are dropped
    pub fn set_resolved_attributes<I>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = IdPAttribute>,
    {
        self.resolved_attributes = attributes
            .into_iter()
            .filter(|attribute| !attribute.id().is_empty())
            .map(|attribute| (attribute.id().to_string(), attribute))
            .collect();
    }

    /// Take the final attribute set out of the context
    pub fn take_resolved_attributes(&mut self) -> BTreeMap<String, IdPAttribute> {
        std::mem::take(&mut self.resolved_attributes)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::StaticDataConnector;
    use crate::definition::StaticAttributeDefinition;
    use idp_core::{AttributeValue, Component};

    fn static_definition(id: &str, value: &str) -> Arc<AttributeDefinition> {
        let definition = AttributeDefinition::new(
            id,
            StaticAttributeDefinition::new([AttributeValue::string(value)]),
        )
        .unwrap();
        definition.initialize().unwrap();
        Arc::new(definition)
    }

    fn static_connector(id: &str) -> Arc<DataConnector> {
        let connector = DataConnector::new(
            id,
            StaticDataConnector::new([IdPAttribute::new("a").with_values(["1"])]),
        )
        .unwrap();
        connector.initialize().unwrap();
        Arc::new(connector)
    }

    #[test]
    fn test_requested_names_drop_blanks() {
        let mut context = AttributeResolutionContext::new();
        context.set_requested_attribute_names(["uid", "", "  ", "mail", "uid"]);
        let names: Vec<_> = context.requested_attribute_names().iter().cloned().collect();
        assert_eq!(names, vec!["mail".to_string(), "uid".to_string()]);
    }

    #[test]
    fn test_definition_recorded_once() {
        let mut context = AttributeResolutionContext::new();
        let first = static_definition("affiliation", "member");
        let second = static_definition("affiliation", "staff");

        context
            .record_attribute_definition_resolution(first.clone(), None)
            .unwrap();
        let again = context.record_attribute_definition_resolution(first, None);
        assert!(matches!(again, Err(ResolutionError::AlreadyResolved { .. })));

        let other_instance = context.record_attribute_definition_resolution(second, None);
        assert!(matches!(other_instance, Err(ResolutionError::AlreadyResolved { .. })));
    }

    #[test]
    fn test_connector_recorded_once() {
        let mut context = AttributeResolutionContext::new();
        context
            .record_data_connector_resolution(static_connector("static"), None)
            .unwrap();
        let again = context.record_data_connector_resolution(static_connector("static"), None);
        assert!(matches!(again, Err(ResolutionError::AlreadyResolved { .. })));
    }

    #[test]
    fn test_record_returns_cached_value() {
        let mut context = AttributeResolutionContext::new();
        let definition = static_definition("affiliation", "member");
        let attribute = IdPAttribute::new("affiliation").with_values(["member"]);

        context
            .record_attribute_definition_resolution(definition, Some(attribute.clone()))
            .unwrap();

        let record = context.resolved_attribute_definition("affiliation").unwrap();
        assert_eq!(record.resolve(&context).unwrap().values(), attribute.values());
        assert_eq!(record.resolve(&context).unwrap().values(), attribute.values());
        assert!(context.resolved_attribute_definition("other").is_none());
    }

    #[test]
    fn test_resolved_attributes_drop_blank_ids() {
        let mut context = AttributeResolutionContext::new();
        context.set_resolved_attributes([
            IdPAttribute::new("uid").with_values(["jdoe"]),
            IdPAttribute::new("  "),
        ]);
        assert_eq!(context.resolved_attributes().len(), 1);
        assert!(context.resolved_attributes().contains_key("uid"));
    }

    #[test]
    fn test_in_progress_guard() {
        let mut context = AttributeResolutionContext::new();
        assert!(context.begin_resolution("a"));
        assert!(!context.begin_resolution("a"));
        context.end_resolution("a");
        assert!(context.begin_resolution("a"));
    }
}
