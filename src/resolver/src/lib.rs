//! # IdP Attribute Resolver
//!
//! Resolves the attributes of a principal through a graph of resolver
//! plugins:
//!
//! - **Data connectors** fetch attributes from external sources
//! - **Attribute definitions** derive a single attribute from the values of
//!   their dependencies
//!
//! The [`AttributeResolver`] validates the plugin graph once at
//! initialization and then resolves requests concurrently, each against its
//! own [`AttributeResolutionContext`].
//!
//! # Example
//!
//! ```
//! use idp_attribute_resolver::{
//!     AttributeDefinition, AttributeResolutionContext, AttributeResolver, DataConnector,
//!     ResolverPluginDependency, ScopedAttributeDefinition, StaticDataConnector,
//! };
//! use idp_core::{Component, IdPAttribute};
//!
//! let connector = DataConnector::new(
//!     "static",
//!     StaticDataConnector::new([IdPAttribute::new("affiliation").with_values(["member"])]),
//! )
//! .unwrap();
//!
//! let mut scoped = AttributeDefinition::new("scopedAffiliation", ScopedAttributeDefinition::new("example.org")).unwrap();
//! scoped
//!     .set_dependencies([ResolverPluginDependency::with_attribute("static", "affiliation").unwrap()])
//!     .unwrap();
//!
//! let mut resolver = AttributeResolver::new("resolver").unwrap();
//! resolver.set_data_connectors([connector]).unwrap();
//! resolver.set_attribute_definitions([scoped]).unwrap();
//! resolver.initialize().unwrap();
//!
//! let mut context = AttributeResolutionContext::for_principal("jdoe");
//! resolver.resolve(&mut context).unwrap();
//!
//! let attribute = &context.resolved_attributes()["scopedAffiliation"];
//! assert_eq!(attribute.values()[0].to_string(), "member@example.org");
//! ```

pub mod connector;
pub mod context;
pub mod definition;
pub mod dependency;
pub mod error;
pub mod graph;
pub mod plugin;
pub mod resolver;

pub use connector::{
    CacheConfig, CacheStats, ConnectorStrategy, DataConnector, DefaultMappingStrategy, ExecutableSearch,
    ExecutableSearchBuilder, MappingStrategy, QueryExecutor, ResultsCache, ScriptedDataConnector,
    SearchDataConnector, SearchResult, SearchRow, StaticDataConnector, TemplatedQueryBuilder,
};
pub use context::{
    AttributeResolutionContext, ConnectorOutput, ResolvedAttributeDefinition, ResolvedDataConnector,
};
pub use definition::{
    AttributeDefinition, DefinitionStrategy, MappedAttributeDefinition, PrescopedAttributeDefinition,
    PrincipalNameAttributeDefinition, RegexSplitAttributeDefinition, ScopedAttributeDefinition,
    ScriptedAttributeDefinition, SimpleAttributeDefinition, SourceValue, StaticAttributeDefinition, ValueMap,
};
pub use dependency::{DependencyValues, ResolverPluginDependency};
pub use error::{BoxError, ResolutionError, Result};
pub use plugin::{activation_condition, always_active, ActivationCondition};
pub use resolver::AttributeResolver;
