//! Data connectors
//!
//! A [`DataConnector`] fetches zero or more attributes for a principal from
//! an external source. The source-specific part is a [`ConnectorStrategy`]:
//!
//! - [`StaticDataConnector`]: fixed attributes
//! - [`SearchDataConnector`]: build/execute/map search with an optional
//!   cross-request results cache
//! - [`ScriptedDataConnector`]: injected function

pub mod scripted;
pub mod search;
pub mod static_connector;
pub mod template;

pub use scripted::{ConnectorScript, ScriptedDataConnector};
pub use search::{
    CacheConfig, CacheStats, DefaultMappingStrategy, ExecutableSearch, ExecutableSearchBuilder,
    MappingStrategy, ResultsCache, SearchDataConnector, SearchResult, SearchRow,
};
pub use static_connector::StaticDataConnector;
pub use template::{QueryExecutor, TemplatedQueryBuilder};

use crate::context::{AttributeResolutionContext, ConnectorOutput};
use crate::dependency::{DependencyValues, ResolverPluginDependency};
use crate::error::Result;
use crate::plugin::{resolver_plugin, PluginCore};
use idp_core::require_id;
use std::collections::BTreeSet;
use std::fmt;
use tracing::trace;

/// Source-specific behaviour of a data connector
pub trait ConnectorStrategy: Send + Sync {
    /// Check configuration when the owning connector initializes
    fn check_config(&self, _id: &str, _dependencies: &BTreeSet<ResolverPluginDependency>) -> idp_core::Result<()> {
        Ok(())
    }

    /// Health check
    fn validate(&self, _id: &str) -> idp_core::Result<()> {
        Ok(())
    }

    /// Fetch attributes. `Ok(None)` means nothing was found.
    fn fetch(
        &self,
        id: &str,
        context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> Result<Option<ConnectorOutput>>;

    /// Release resources held by the strategy
    fn teardown(&self) {}
}

/// Resolver plugin producing a map of attributes
pub struct DataConnector {
    core: PluginCore,
    strategy: Box<dyn ConnectorStrategy>,
    failover_data_connector_id: Option<String>,
    export_attributes: BTreeSet<String>,
}

impl DataConnector {
    pub fn new<S>(id: impl Into<String>, strategy: S) -> idp_core::Result<Self>
    where
        S: ConnectorStrategy + 'static,
    {
        Ok(Self {
            core: PluginCore::new(id, "Data connector")?,
            strategy: Box::new(strategy),
            failover_data_connector_id: None,
            export_attributes: BTreeSet::new(),
        })
    }

    /// Connector consulted when this one fails
    pub fn set_failover_data_connector_id(&mut self, id: impl Into<String>) -> idp_core::Result<()> {
        self.core.lifecycle().ensure_modifiable(self.core.id())?;
        self.failover_data_connector_id = Some(require_id(id, "Failover data connector")?);
        Ok(())
    }

    pub fn failover_data_connector_id(&self) -> Option<&str> {
        self.failover_data_connector_id.as_deref()
    }

    /// Attributes released directly into the final attribute set
    pub fn set_export_attributes<I, S>(&mut self, attribute_ids: I) -> idp_core::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.core.lifecycle().ensure_modifiable(self.core.id())?;
        self.export_attributes = attribute_ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| !id.trim().is_empty())
            .collect();
        Ok(())
    }

    pub fn export_attributes(&self) -> &BTreeSet<String> {
        &self.export_attributes
    }

    /// Resolve against a context whose dependencies are already recorded,
    /// applying the propagation policy to failures.
    pub fn resolve(&self, context: &AttributeResolutionContext) -> Result<Option<ConnectorOutput>> {
        self.core.resolve_with(context, || self.fetch(context))
    }

    /// Like [`resolve`](Self::resolve) but hands failures back unhandled so
    /// the caller can try the failover connector first.
    pub(crate) fn attempt(&self, context: &AttributeResolutionContext) -> Result<Option<ConnectorOutput>> {
        if !self.core.begin(context)? {
            return Ok(None);
        }
        self.fetch(context)
    }

    /// Apply the propagation policy to a failure returned by `attempt`
    pub(crate) fn recover(&self, error: crate::error::ResolutionError) -> Result<Option<ConnectorOutput>> {
        self.core.recover(error)
    }

    pub(crate) fn log_prefix(&self) -> String {
        self.core.log_prefix()
    }

    fn fetch(&self, context: &AttributeResolutionContext) -> Result<Option<ConnectorOutput>> {
        let dependencies = DependencyValues::collect(context, &self.core.dependencies());
        let output = self.strategy.fetch(self.id(), context, &dependencies)?;
        if let Some(attributes) = &output {
            trace!("{} produced {} attribute(s)", self.core.log_prefix(), attributes.len());
        }
        Ok(output)
    }

    fn do_initialize(&self) -> idp_core::Result<()> {
        self.strategy.check_config(self.id(), &self.core.dependencies())
    }

    fn do_validate(&self) -> idp_core::Result<()> {
        self.strategy.validate(self.id())
    }

    fn do_destroy(&self) {
        self.strategy.teardown();
    }
}

resolver_plugin!(DataConnector);

impl fmt::Debug for DataConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataConnector")
            .field("core", &self.core)
            .field("failover_data_connector_id", &self.failover_data_connector_id)
            .field("export_attributes", &self.export_attributes)
            .finish()
    }
}
