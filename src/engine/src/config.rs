//! Declarative engine configuration
//!
//! An [`EngineConfig`] is a JSON document describing the resolver plugins,
//! the filter policies and optional requester metadata. Plugins, definitions
//! and matchers are internally tagged by `"type"`.
//!
//! Query executors and scripts are code, not data: a `templated` connector
//! names its executor and `scripted` plugins name their script, each looked
//! up in the [`PluginRegistry`] passed to [`ResolverConfig::build_with`].
//! Building without a registry rejects those plugins.
//!
//! # Example
//!
//! ```json
//! {
//!   "resolver": {
//!     "id": "resolver",
//!     "data_connectors": [
//!       { "id": "directory", "type": "static",
//!         "attributes": [ { "id": "uid", "values": ["jdoe"] } ] }
//!     ],
//!     "attribute_definitions": [
//!       { "id": "eppn", "type": "scoped", "scope": "example.org",
//!         "dependencies": [ { "plugin": "directory", "attribute": "uid" } ] }
//!     ]
//!   },
//!   "filter": {
//!     "id": "filter",
//!     "policies": [
//!       { "id": "releaseToSp",
//!         "requirement": { "type": "requester", "value": "https://sp.example.org" },
//!         "rules": [ { "attribute": "eppn", "permit": { "type": "matches_all" } } ] }
//!     ]
//!   }
//! }
//! ```

use crate::error::{EngineError, Result};
use idp_attribute_filter::matcher::{
    matcher_fails, matches_all, matches_none, AndMatcher, AttributeInMetadataMatcher, NotMatcher, OrMatcher,
    ScopeMatchesMetadataMatcher,
};
use idp_attribute_filter::{
    AttributeFilter, AttributeFilterPolicy, AttributeRule, Matcher, PredicateMatcher, RequesterMetadata,
    StaticMetadataLookup,
};
use idp_attribute_resolver::connector::ConnectorScript;
use idp_attribute_resolver::definition::DefinitionScript;
use idp_attribute_resolver::{
    activation_condition, AttributeDefinition, AttributeResolver, CacheConfig, DataConnector,
    DefaultMappingStrategy, MappedAttributeDefinition, PrescopedAttributeDefinition,
    PrincipalNameAttributeDefinition, QueryExecutor, RegexSplitAttributeDefinition, ResolverPluginDependency,
    ScopedAttributeDefinition, ScriptedAttributeDefinition, ScriptedDataConnector, SearchDataConnector,
    SimpleAttributeDefinition, SourceValue, StaticAttributeDefinition, StaticDataConnector,
    TemplatedQueryBuilder, ValueMap,
};
use idp_core::{AttributeValue, IdPAttribute};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_delimiter() -> String {
    "@".to_string()
}

fn default_cache_capacity() -> usize {
    CacheConfig::default().capacity
}

fn default_cache_ttl_secs() -> u64 {
    CacheConfig::default().ttl.as_secs()
}

/// Named query executors and scripts referenced from configuration
#[derive(Clone, Default)]
pub struct PluginRegistry {
    query_executors: BTreeMap<String, Arc<dyn QueryExecutor>>,
    connector_scripts: BTreeMap<String, ConnectorScript>,
    definition_scripts: BTreeMap<String, DefinitionScript>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_executor(mut self, name: impl Into<String>, executor: Arc<dyn QueryExecutor>) -> Self {
        self.query_executors.insert(name.into(), executor);
        self
    }

    pub fn with_connector_script(mut self, name: impl Into<String>, script: ConnectorScript) -> Self {
        self.connector_scripts.insert(name.into(), script);
        self
    }

    pub fn with_definition_script(mut self, name: impl Into<String>, script: DefinitionScript) -> Self {
        self.definition_scripts.insert(name.into(), script);
        self
    }

    fn query_executor(&self, name: &str) -> Result<Arc<dyn QueryExecutor>> {
        self.query_executors
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::config(format!("no query executor registered as '{}'", name)))
    }

    fn connector_script(&self, name: &str) -> Result<ConnectorScript> {
        self.connector_scripts
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::config(format!("no connector script registered as '{}'", name)))
    }

    fn definition_script(&self, name: &str) -> Result<DefinitionScript> {
        self.definition_scripts
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::config(format!("no definition script registered as '{}'", name)))
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("query_executors", &self.query_executors.keys().collect::<Vec<_>>())
            .field("connector_scripts", &self.connector_scripts.keys().collect::<Vec<_>>())
            .field("definition_scripts", &self.definition_scripts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Root configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub resolver: ResolverConfig,
    pub filter: FilterConfig,

    /// Requester metadata keyed by requester id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, RequesterMetadata>,
}

impl EngineConfig {
    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Metadata lookup over the configured requester metadata, if any
    pub fn metadata_lookup(&self) -> Option<StaticMetadataLookup> {
        if self.metadata.is_empty() {
            return None;
        }
        let lookup = self
            .metadata
            .iter()
            .fold(StaticMetadataLookup::new(), |lookup, (requester, metadata)| {
                lookup.with_entry(requester.clone(), metadata.clone())
            });
        Some(lookup)
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub id: String,

    #[serde(default)]
    pub data_connectors: Vec<ConnectorConfig>,

    #[serde(default)]
    pub attribute_definitions: Vec<DefinitionConfig>,
}

impl ResolverConfig {
    /// Build an uninitialized resolver with no registered plugins
    pub fn build(&self) -> Result<AttributeResolver> {
        self.build_with(&PluginRegistry::default())
    }

    /// Build an uninitialized resolver, resolving executor and script names
    /// against `registry`
    pub fn build_with(&self, registry: &PluginRegistry) -> Result<AttributeResolver> {
        let connectors = self
            .data_connectors
            .iter()
            .map(|connector| connector.build_with(registry))
            .collect::<Result<Vec<_>>>()?;
        let definitions = self
            .attribute_definitions
            .iter()
            .map(|definition| definition.build_with(registry))
            .collect::<Result<Vec<_>>>()?;

        let mut resolver = AttributeResolver::new(self.id.clone())?;
        resolver.set_data_connectors(connectors)?;
        resolver.set_attribute_definitions(definitions)?;
        Ok(resolver)
    }
}

/// Dependency on a plugin, or on one attribute of a data connector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyConfig {
    Attribute { plugin: String, attribute: String },
    Plugin(String),
    PluginOnly { plugin: String },
}

impl DependencyConfig {
    fn build(&self) -> Result<ResolverPluginDependency> {
        let dependency = match self {
            DependencyConfig::Attribute { plugin, attribute } => {
                ResolverPluginDependency::with_attribute(plugin.clone(), attribute.clone())?
            }
            DependencyConfig::Plugin(plugin) | DependencyConfig::PluginOnly { plugin } => {
                ResolverPluginDependency::new(plugin.clone())?
            }
        };
        Ok(dependency)
    }
}

/// A configured value: plain text or `{ "value", "scope" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueConfig {
    Scoped { value: String, scope: String },
    Text(String),
}

impl From<&ValueConfig> for AttributeValue {
    fn from(value: &ValueConfig) -> Self {
        match value {
            ValueConfig::Scoped { value, scope } => AttributeValue::scoped(value.clone(), scope.clone()),
            ValueConfig::Text(text) => AttributeValue::string(text.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub id: String,
    #[serde(default)]
    pub values: Vec<ValueConfig>,
}

impl AttributeConfig {
    fn to_attribute(&self) -> IdPAttribute {
        IdPAttribute::new(self.id.clone()).with_values(self.values.iter().map(AttributeValue::from))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub id: String,

    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,

    #[serde(default = "default_true")]
    pub propagate_errors: bool,

    /// Restrict the connector to these requesters; empty means always active
    #[serde(default)]
    pub active_for_requesters: Vec<String>,

    #[serde(default)]
    pub failover: Option<String>,

    /// Attributes released directly into the resolved set
    #[serde(default)]
    pub export: Vec<String>,

    #[serde(flatten)]
    pub kind: ConnectorKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorKind {
    Static {
        attributes: Vec<AttributeConfig>,
    },

    /// Query rendered from a `${...}` template and run by a registered executor
    Templated {
        template: String,
        executor: String,
        #[serde(default = "default_true")]
        escape_values: bool,
        /// Source column or attribute name to published attribute id
        #[serde(default)]
        renames: BTreeMap<String, String>,
        #[serde(default)]
        multiple_results_is_error: bool,
        #[serde(default)]
        no_result_is_error: bool,
        #[serde(default)]
        cache: Option<ResultsCacheConfig>,
    },

    Scripted {
        script: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsCacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl From<&ResultsCacheConfig> for CacheConfig {
    fn from(config: &ResultsCacheConfig) -> Self {
        CacheConfig {
            capacity: config.capacity,
            ttl: Duration::from_secs(config.ttl_secs),
        }
    }
}

/// Plugin settings shared by connectors and definitions
macro_rules! configure_plugin {
    ($plugin:expr, $config:expr) => {{
        let dependencies = $config
            .dependencies
            .iter()
            .map(DependencyConfig::build)
            .collect::<Result<Vec<_>>>()?;
        $plugin.set_dependencies(dependencies)?;
        $plugin.set_propagate_resolution_exceptions($config.propagate_errors)?;
        if !$config.active_for_requesters.is_empty() {
            let requesters: BTreeSet<String> = $config.active_for_requesters.iter().cloned().collect();
            $plugin.set_activation_condition(activation_condition(move |context| {
                context
                    .attribute_recipient_id()
                    .map(|requester| requesters.contains(requester))
                    .unwrap_or(false)
            }))?;
        }
    }};
}

impl ConnectorConfig {
    pub fn build(&self) -> Result<DataConnector> {
        self.build_with(&PluginRegistry::default())
    }

    pub fn build_with(&self, registry: &PluginRegistry) -> Result<DataConnector> {
        let id = self.id.clone();
        let mut connector = match &self.kind {
            ConnectorKind::Static { attributes } => DataConnector::new(
                id,
                StaticDataConnector::new(attributes.iter().map(AttributeConfig::to_attribute)),
            )?,
            ConnectorKind::Templated {
                template,
                executor,
                escape_values,
                renames,
                multiple_results_is_error,
                no_result_is_error,
                cache,
            } => {
                let builder = TemplatedQueryBuilder::new(template.clone(), registry.query_executor(executor)?)?
                    .with_escaping(*escape_values);
                let mapping = renames
                    .iter()
                    .fold(DefaultMappingStrategy::new(), |mapping, (from, to)| {
                        mapping.with_rename(from.clone(), to.clone())
                    })
                    .with_multiple_results_is_error(*multiple_results_is_error);
                let mut search =
                    SearchDataConnector::new(builder, mapping).with_no_result_is_error(*no_result_is_error);
                if let Some(cache) = cache {
                    search = search.with_results_cache(CacheConfig::from(cache));
                }
                DataConnector::new(id, search)?
            }
            ConnectorKind::Scripted { script } => {
                DataConnector::new(id, ScriptedDataConnector::new(registry.connector_script(script)?))?
            }
        };
        configure_plugin!(connector, self);
        if let Some(failover) = &self.failover {
            connector.set_failover_data_connector_id(failover.clone())?;
        }
        connector.set_export_attributes(self.export.iter().cloned())?;
        Ok(connector)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceValueConfig {
    pub pattern: String,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub partial_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueMapConfig {
    pub return_value: String,
    pub source_values: Vec<SourceValueConfig>,
}

impl ValueMapConfig {
    fn build(&self) -> Result<ValueMap> {
        let sources = self
            .source_values
            .iter()
            .map(|s| SourceValue::new(&s.pattern, s.ignore_case, s.partial_match))
            .collect::<idp_core::Result<Vec<_>>>()?;
        Ok(ValueMap::new(self.return_value.clone(), sources))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionConfig {
    pub id: String,

    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,

    #[serde(default = "default_true")]
    pub propagate_errors: bool,

    #[serde(default)]
    pub active_for_requesters: Vec<String>,

    /// Resolve for other plugins but never release
    #[serde(default)]
    pub dependency_only: bool,

    #[serde(default)]
    pub display_names: BTreeMap<String, String>,

    #[serde(default)]
    pub display_descriptions: BTreeMap<String, String>,

    #[serde(flatten)]
    pub kind: DefinitionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DefinitionKind {
    Simple,
    Scoped {
        scope: String,
    },
    Prescoped {
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
    Mapped {
        value_maps: Vec<ValueMapConfig>,
        #[serde(default)]
        default_value: Option<String>,
        #[serde(default)]
        pass_through: bool,
    },
    Static {
        values: Vec<ValueConfig>,
    },
    PrincipalName,
    RegexSplit {
        regex: String,
        #[serde(default)]
        ignore_case: bool,
    },
    Scripted {
        script: String,
    },
}

impl DefinitionConfig {
    pub fn build(&self) -> Result<AttributeDefinition> {
        self.build_with(&PluginRegistry::default())
    }

    pub fn build_with(&self, registry: &PluginRegistry) -> Result<AttributeDefinition> {
        let id = self.id.clone();
        let mut definition = match &self.kind {
            DefinitionKind::Simple => AttributeDefinition::new(id, SimpleAttributeDefinition::new())?,
            DefinitionKind::Scoped { scope } => {
                AttributeDefinition::new(id, ScopedAttributeDefinition::new(scope.clone()))?
            }
            DefinitionKind::Prescoped { delimiter } => {
                AttributeDefinition::new(id, PrescopedAttributeDefinition::new(delimiter.clone()))?
            }
            DefinitionKind::Mapped {
                value_maps,
                default_value,
                pass_through,
            } => {
                let maps = value_maps.iter().map(ValueMapConfig::build).collect::<Result<Vec<_>>>()?;
                let mut mapped = MappedAttributeDefinition::new(maps).with_pass_through(*pass_through);
                if let Some(default_value) = default_value {
                    mapped = mapped.with_default_value(default_value.clone());
                }
                AttributeDefinition::new(id, mapped)?
            }
            DefinitionKind::Static { values } => AttributeDefinition::new(
                id,
                StaticAttributeDefinition::new(values.iter().map(AttributeValue::from)),
            )?,
            DefinitionKind::PrincipalName => AttributeDefinition::new(id, PrincipalNameAttributeDefinition::new())?,
            DefinitionKind::RegexSplit { regex, ignore_case } => {
                AttributeDefinition::new(id, RegexSplitAttributeDefinition::new(regex, *ignore_case)?)?
            }
            DefinitionKind::Scripted { script } => {
                AttributeDefinition::new(id, ScriptedAttributeDefinition::new(registry.definition_script(script)?))?
            }
        };

        configure_plugin!(definition, self);
        definition.set_dependency_only(self.dependency_only)?;
        for (lang, name) in &self.display_names {
            definition.set_display_name(lang.clone(), name.clone())?;
        }
        for (lang, text) in &self.display_descriptions {
            definition.set_display_description(lang.clone(), text.clone())?;
        }
        Ok(definition)
    }
}

// ============================================================================
// FILTER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub id: String,

    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

impl FilterConfig {
    /// Build an uninitialized filter
    pub fn build(&self) -> Result<AttributeFilter> {
        let policies = self.policies.iter().map(PolicyConfig::build).collect::<Result<Vec<_>>>()?;
        Ok(AttributeFilter::with_policies(self.id.clone(), policies)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub id: String,
    pub requirement: MatcherConfig,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl PolicyConfig {
    pub fn build(&self) -> Result<AttributeFilterPolicy> {
        let requirement = self.requirement.build(&format!("{}/requirement", self.id))?;
        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| rule.build(&self.id, index))
            .collect::<Result<Vec<_>>>()?;
        Ok(AttributeFilterPolicy::with_rules(self.id.clone(), requirement, rules)?)
    }
}

/// Attribute rule: exactly one of `permit` or `deny`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub id: Option<String>,

    pub attribute: String,

    #[serde(default)]
    pub permit: Option<MatcherConfig>,

    #[serde(default)]
    pub deny: Option<MatcherConfig>,
}

impl RuleConfig {
    fn build(&self, policy_id: &str, index: usize) -> Result<AttributeRule> {
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| format!("{}/{}/{}", policy_id, self.attribute, index));
        let rule = match (&self.permit, &self.deny) {
            (Some(matcher), None) => {
                AttributeRule::permit(id.clone(), self.attribute.clone(), matcher.build(&format!("{}/permit", id))?)?
            }
            (None, Some(matcher)) => {
                AttributeRule::deny(id.clone(), self.attribute.clone(), matcher.build(&format!("{}/deny", id))?)?
            }
            _ => {
                return Err(EngineError::config(format!(
                    "attribute rule '{}' must have exactly one of 'permit' or 'deny'",
                    id
                )))
            }
        };
        Ok(rule)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Generated from the enclosing rule or policy when absent
    #[serde(default)]
    pub id: Option<String>,

    #[serde(flatten)]
    pub kind: MatcherKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherKind {
    MatchesAll,
    MatchesNone,
    MatcherFails,
    Value {
        value: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
        #[serde(default)]
        attribute: Option<String>,
    },
    ValueRegex {
        regex: String,
        #[serde(default)]
        attribute: Option<String>,
    },
    Scope {
        value: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
        #[serde(default)]
        attribute: Option<String>,
    },
    ScopeRegex {
        regex: String,
        #[serde(default)]
        attribute: Option<String>,
    },
    Requester {
        value: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
    RequesterRegex {
        regex: String,
    },
    Issuer {
        value: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
    Principal {
        value: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
    PrincipalRegex {
        regex: String,
    },
    AuthenticationMethod {
        value: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
    InMetadata {
        #[serde(default)]
        match_if_metadata_silent: bool,
        #[serde(default = "default_true")]
        only_if_required: bool,
    },
    ScopeInMetadata,
    And {
        matchers: Vec<MatcherConfig>,
    },
    Or {
        matchers: Vec<MatcherConfig>,
    },
    Not {
        matcher: Box<MatcherConfig>,
    },
}

fn targeted(mut matcher: PredicateMatcher, attribute: &Option<String>) -> Result<Arc<dyn Matcher>> {
    if let Some(attribute) = attribute {
        matcher.set_attribute_id(attribute.clone())?;
    }
    Ok(Arc::new(matcher))
}

impl MatcherConfig {
    /// Build an uninitialized matcher, named `fallback_id` unless the
    /// document names it
    pub fn build(&self, fallback_id: &str) -> Result<Arc<dyn Matcher>> {
        let id = self.id.clone().unwrap_or_else(|| fallback_id.to_string());

        let matcher: Arc<dyn Matcher> = match &self.kind {
            MatcherKind::MatchesAll => matches_all(),
            MatcherKind::MatchesNone => matches_none(),
            MatcherKind::MatcherFails => matcher_fails(),
            MatcherKind::Value {
                value,
                case_sensitive,
                attribute,
            } => targeted(
                PredicateMatcher::attribute_value_string(id, value.clone(), *case_sensitive)?,
                attribute,
            )?,
            MatcherKind::ValueRegex { regex, attribute } => {
                targeted(PredicateMatcher::attribute_value_regex(id, regex)?, attribute)?
            }
            MatcherKind::Scope {
                value,
                case_sensitive,
                attribute,
            } => targeted(
                PredicateMatcher::attribute_scope_string(id, value.clone(), *case_sensitive)?,
                attribute,
            )?,
            MatcherKind::ScopeRegex { regex, attribute } => {
                targeted(PredicateMatcher::attribute_scope_regex(id, regex)?, attribute)?
            }
            MatcherKind::Requester { value, case_sensitive } => {
                Arc::new(PredicateMatcher::requester_string(id, value.clone(), *case_sensitive)?)
            }
            MatcherKind::RequesterRegex { regex } => Arc::new(PredicateMatcher::requester_regex(id, regex)?),
            MatcherKind::Issuer { value, case_sensitive } => {
                Arc::new(PredicateMatcher::issuer_string(id, value.clone(), *case_sensitive)?)
            }
            MatcherKind::Principal { value, case_sensitive } => {
                Arc::new(PredicateMatcher::principal_name_string(id, value.clone(), *case_sensitive)?)
            }
            MatcherKind::PrincipalRegex { regex } => Arc::new(PredicateMatcher::principal_name_regex(id, regex)?),
            MatcherKind::AuthenticationMethod { value, case_sensitive } => Arc::new(
                PredicateMatcher::authentication_method_string(id, value.clone(), *case_sensitive)?,
            ),
            MatcherKind::InMetadata {
                match_if_metadata_silent,
                only_if_required,
            } => {
                let mut matcher = AttributeInMetadataMatcher::new(id)?;
                matcher.set_match_if_metadata_silent(*match_if_metadata_silent)?;
                matcher.set_only_if_required(*only_if_required)?;
                Arc::new(matcher)
            }
            MatcherKind::ScopeInMetadata => Arc::new(ScopeMatchesMetadataMatcher::new(id)?),
            MatcherKind::And { matchers } => Arc::new(AndMatcher::new(id.clone(), build_children(&id, matchers)?)?),
            MatcherKind::Or { matchers } => Arc::new(OrMatcher::new(id.clone(), build_children(&id, matchers)?)?),
            MatcherKind::Not { matcher } => {
                let child = matcher.build(&format!("{}/0", id))?;
                Arc::new(NotMatcher::new(id, child)?)
            }
        };
        Ok(matcher)
    }
}

fn build_children(parent_id: &str, children: &[MatcherConfig]) -> Result<Vec<Arc<dyn Matcher>>> {
    children
        .iter()
        .enumerate()
        .map(|(index, child)| child.build(&format!("{}/{}", parent_id, index)))
        .collect()
}
