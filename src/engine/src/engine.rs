//! Resolve-then-filter pipeline

use crate::config::{EngineConfig, PluginRegistry};
use crate::error::Result;
use idp_attribute_filter::{AttributeFilter, AttributeFilterContext, RequesterMetadataLookup};
use idp_attribute_resolver::{AttributeResolutionContext, AttributeResolver};
use idp_core::{Component, IdPAttribute};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Parameters of one attribute request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeRequest {
    pub principal: String,

    /// Relying party the attributes are released to
    #[serde(default)]
    pub requester: Option<String>,

    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub authentication_method: Option<String>,

    /// Attribute ids to resolve; empty resolves everything
    #[serde(default)]
    pub requested_attributes: Vec<String>,
}

impl AttributeRequest {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            ..Default::default()
        }
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_authentication_method(mut self, method: impl Into<String>) -> Self {
        self.authentication_method = Some(method.into());
        self
    }

    pub fn with_requested_attributes<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_attributes = ids.into_iter().map(Into::into).collect();
        self
    }

    fn resolution_context(&self) -> AttributeResolutionContext {
        let mut context = AttributeResolutionContext::for_principal(self.principal.clone());
        if let Some(requester) = &self.requester {
            context.set_attribute_recipient_id(requester.clone());
        }
        if let Some(issuer) = &self.issuer {
            context.set_attribute_issuer_id(issuer.clone());
        }
        if let Some(method) = &self.authentication_method {
            context.set_principal_authentication_method(method.clone());
        }
        context.set_requested_attribute_names(self.requested_attributes.iter().cloned());
        context
    }

    fn filter_context(&self, resolved: BTreeMap<String, IdPAttribute>) -> AttributeFilterContext {
        let mut context = AttributeFilterContext::with_prefiltered(resolved.into_values());
        context.set_principal(self.principal.clone());
        if let Some(requester) = &self.requester {
            context.set_attribute_recipient_id(requester.clone());
        }
        if let Some(issuer) = &self.issuer {
            context.set_attribute_issuer_id(issuer.clone());
        }
        if let Some(method) = &self.authentication_method {
            context.set_principal_authentication_method(method.clone());
        }
        context
    }
}

/// Attribute resolver and filter run back to back for each request
///
/// The engine is shared across requests; each [`process`](Self::process)
/// call works on its own resolution and filter contexts.
pub struct AttributeEngine {
    resolver: AttributeResolver,
    filter: AttributeFilter,
    metadata_lookup: Option<Arc<dyn RequesterMetadataLookup>>,
}

impl AttributeEngine {
    pub fn new(resolver: AttributeResolver, filter: AttributeFilter) -> Self {
        Self {
            resolver,
            filter,
            metadata_lookup: None,
        }
    }

    /// Requester metadata consulted by metadata-aware matchers
    pub fn with_metadata_lookup(mut self, lookup: Arc<dyn RequesterMetadataLookup>) -> Self {
        self.metadata_lookup = Some(lookup);
        self
    }

    /// Build an uninitialized engine from a configuration document
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::from_config_with(config, &PluginRegistry::default())
    }

    /// Build an uninitialized engine whose templated and scripted plugins
    /// are looked up in `registry`
    pub fn from_config_with(config: &EngineConfig, registry: &PluginRegistry) -> Result<Self> {
        let mut engine = Self::new(config.resolver.build_with(registry)?, config.filter.build()?);
        if let Some(lookup) = config.metadata_lookup() {
            engine.metadata_lookup = Some(Arc::new(lookup));
        }
        Ok(engine)
    }

    pub fn resolver(&self) -> &AttributeResolver {
        &self.resolver
    }

    pub fn filter(&self) -> &AttributeFilter {
        &self.filter
    }

    /// Initialize the resolver, then the filter
    pub fn initialize(&self) -> Result<()> {
        self.resolver.initialize()?;
        self.filter.initialize()?;
        info!(
            "Attribute engine ready: resolver '{}' ({} definitions, {} connectors), filter '{}' ({} policies)",
            self.resolver.id(),
            self.resolver.attribute_definitions().len(),
            self.resolver.data_connectors().len(),
            self.filter.id(),
            self.filter.filter_policies().len()
        );
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.resolver.validate()?;
        self.filter.validate()?;
        Ok(())
    }

    pub fn destroy(&self) {
        self.filter.destroy();
        self.resolver.destroy();
    }

    /// Resolve and filter the attributes of one request, returning the
    /// released attributes keyed by id
    pub fn process(&self, request: &AttributeRequest) -> Result<BTreeMap<String, IdPAttribute>> {
        let mut resolution = request.resolution_context();
        self.resolver.resolve(&mut resolution)?;
        let resolved = resolution.take_resolved_attributes();
        let resolved_count = resolved.len();

        let mut filtering = request.filter_context(resolved);
        if let Some(lookup) = &self.metadata_lookup {
            filtering.set_metadata_lookup(Arc::clone(lookup));
        }
        self.filter.filter_attributes(&mut filtering)?;
        let released = filtering.take_filtered_attributes();

        debug!(
            "Principal '{}' for '{}': {} attributes resolved, {} released",
            request.principal,
            request.requester.as_deref().unwrap_or("-"),
            resolved_count,
            released.len()
        );
        Ok(released)
    }
}

impl fmt::Debug for AttributeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeEngine")
            .field("resolver", &self.resolver.id())
            .field("filter", &self.filter.id())
            .field("metadata_lookup", &self.metadata_lookup.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use idp_core::ComponentError;

    fn engine(json: &str) -> AttributeEngine {
        let engine = AttributeEngine::from_config(&EngineConfig::from_json(json).unwrap()).unwrap();
        engine.initialize().unwrap();
        engine
    }

    const CONFIG: &str = r#"{
        "resolver": {
            "id": "resolver",
            "data_connectors": [
                { "id": "directory", "type": "static",
                  "attributes": [ { "id": "uid", "values": ["jdoe"] },
                                  { "id": "mail", "values": ["jdoe@example.org"] } ] }
            ],
            "attribute_definitions": [
                { "id": "uid", "type": "simple", "dependencies": [ { "plugin": "directory", "attribute": "uid" } ] },
                { "id": "mail", "type": "simple", "dependencies": [ { "plugin": "directory", "attribute": "mail" } ] }
            ]
        },
        "filter": {
            "id": "filter",
            "policies": [
                { "id": "releaseUid",
                  "requirement": { "type": "requester", "value": "https://sp.example.org" },
                  "rules": [ { "attribute": "uid", "permit": { "type": "matches_all" } } ] }
            ]
        }
    }"#;

    #[test]
    fn test_process_resolves_then_filters() {
        let engine = engine(CONFIG);

        let released = engine
            .process(&AttributeRequest::new("jdoe").with_requester("https://sp.example.org"))
            .unwrap();
        assert_eq!(released.keys().collect::<Vec<_>>(), vec!["uid"]);

        let released = engine
            .process(&AttributeRequest::new("jdoe").with_requester("https://other.example.org"))
            .unwrap();
        assert!(released.is_empty());
    }

    #[test]
    fn test_process_before_initialize() {
        let engine = AttributeEngine::from_config(&EngineConfig::from_json(CONFIG).unwrap()).unwrap();
        let result = engine.process(&AttributeRequest::new("jdoe"));
        assert!(matches!(
            result,
            Err(EngineError::Resolution(_)) | Err(EngineError::Component(ComponentError::Uninitialized(_)))
        ));
    }

    #[test]
    fn test_destroy() {
        let engine = engine(CONFIG);
        engine.validate().unwrap();
        engine.destroy();
        assert!(engine.resolver().is_destroyed());
        assert!(engine.filter().is_destroyed());
        assert!(engine.process(&AttributeRequest::new("jdoe")).is_err());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: AttributeRequest = serde_json::from_str(r#"{ "principal": "jdoe" }"#).unwrap();
        assert_eq!(request.principal, "jdoe");
        assert!(request.requester.is_none());
        assert!(request.requested_attributes.is_empty());
    }
}
