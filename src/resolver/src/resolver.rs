//! Attribute resolver
//!
//! Orchestrates a resolution request: selects the attribute definitions to
//! run, resolves each one depth-first after its dependencies, memoizes every
//! plugin result in the request context, and assembles the final attribute
//! set.
//!
//! The plugin graph is validated once, at initialization. Per request, the
//! insert-once records and an in-progress guard on the context stop any
//! plugin from running twice.

use crate::connector::DataConnector;
use crate::context::{AttributeResolutionContext, ConnectorOutput};
use crate::definition::AttributeDefinition;
use crate::dependency::ResolverPluginDependency;
use crate::error::{ResolutionError, Result};
use crate::graph::DependencyGraphBuilder;
use idp_core::{require_id, Component, ComponentError, IdPAttribute, Lifecycle};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Validated plugin index, built at initialization
#[derive(Debug, Default)]
struct ResolutionPlan {
    definitions: BTreeMap<String, Arc<AttributeDefinition>>,
    connectors: BTreeMap<String, Arc<DataConnector>>,
    evaluation_order: Vec<String>,
}

/// Resolves attributes for a request against a shared plugin graph
///
/// The resolver and its plugins are immutable once initialized and can be
/// shared across threads; all per-request state lives in the
/// [`AttributeResolutionContext`].
#[derive(Debug)]
pub struct AttributeResolver {
    id: String,
    lifecycle: Lifecycle,
    attribute_definitions: Vec<Arc<AttributeDefinition>>,
    data_connectors: Vec<Arc<DataConnector>>,
    plan: RwLock<Arc<ResolutionPlan>>,
}

impl AttributeResolver {
    pub fn new(id: impl Into<String>) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, "Attribute resolver")?,
            lifecycle: Lifecycle::new(),
            attribute_definitions: Vec::new(),
            data_connectors: Vec::new(),
            plan: RwLock::new(Arc::new(ResolutionPlan::default())),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_attribute_definitions<I>(&mut self, definitions: I) -> idp_core::Result<()>
    where
        I: IntoIterator<Item = AttributeDefinition>,
    {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.attribute_definitions = definitions.into_iter().map(Arc::new).collect();
        Ok(())
    }

    pub fn set_data_connectors<I>(&mut self, connectors: I) -> idp_core::Result<()>
    where
        I: IntoIterator<Item = DataConnector>,
    {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.data_connectors = connectors.into_iter().map(Arc::new).collect();
        Ok(())
    }

    pub fn attribute_definitions(&self) -> &[Arc<AttributeDefinition>] {
        &self.attribute_definitions
    }

    pub fn data_connectors(&self) -> &[Arc<DataConnector>] {
        &self.data_connectors
    }

    /// Plugin ids in evaluation order (empty before initialization)
    pub fn evaluation_order(&self) -> Vec<String> {
        self.plan.read().evaluation_order.clone()
    }

    /// Resolve the attributes requested by `context` and store the final
    /// attribute set on it.
    ///
    /// # Errors
    ///
    /// Lifecycle errors, double resolution, and failures of plugins whose
    /// propagation flag is set.
    pub fn resolve(&self, context: &mut AttributeResolutionContext) -> Result<()> {
        self.lifecycle.ensure_operational(&self.id)?;
        let plan = self.plan.read().clone();

        let requested = context.requested_attribute_names().clone();
        for name in &requested {
            if !plan.definitions.contains_key(name) && !self.is_exported(&plan, name) {
                debug!("Attribute resolver '{}': no plugin produces requested attribute '{}'", self.id, name);
            }
        }

        for plugin_id in &plan.evaluation_order {
            if let Some(definition) = plan.definitions.get(plugin_id) {
                if requested.is_empty() || requested.contains(plugin_id) {
                    self.resolve_definition(&plan, definition.id(), context)?;
                }
            } else if let Some(connector) = plan.connectors.get(plugin_id) {
                let exported = connector.export_attributes();
                if !exported.is_empty()
                    && (requested.is_empty() || exported.iter().any(|id| requested.contains(id)))
                {
                    self.resolve_connector(&plan, connector.id(), context)?;
                }
            }
        }

        let resolved = self.finalize(context);
        debug!(
            "Attribute resolver '{}': resolved {} attribute(s) for principal {:?}",
            self.id,
            resolved.len(),
            context.principal()
        );
        context.set_resolved_attributes(resolved);
        Ok(())
    }

    fn is_exported(&self, plan: &ResolutionPlan, attribute_id: &str) -> bool {
        plan.connectors
            .values()
            .any(|connector| connector.export_attributes().contains(attribute_id))
    }

    fn resolve_dependencies(
        &self,
        plan: &ResolutionPlan,
        dependencies: &BTreeSet<ResolverPluginDependency>,
        context: &mut AttributeResolutionContext,
    ) -> Result<()> {
        for dependency in dependencies {
            let plugin_id = dependency.plugin_id();
            if plan.definitions.contains_key(plugin_id) {
                self.resolve_definition(plan, plugin_id, context)?;
            } else if plan.connectors.contains_key(plugin_id) {
                self.resolve_connector(plan, plugin_id, context)?;
            } else {
                return Err(ResolutionError::UnknownPlugin(plugin_id.to_string()));
            }
        }
        Ok(())
    }

    fn resolve_definition(
        &self,
        plan: &ResolutionPlan,
        definition_id: &str,
        context: &mut AttributeResolutionContext,
    ) -> Result<()> {
        if context.resolved_attribute_definition(definition_id).is_some() {
            return Ok(());
        }
        let definition = plan
            .definitions
            .get(definition_id)
            .ok_or_else(|| ResolutionError::UnknownPlugin(definition_id.to_string()))?;

        if !context.begin_resolution(definition_id) {
            return Err(ResolutionError::CircularDependency(format!(
                "attribute definition '{}' depends on itself",
                definition_id
            )));
        }
        let result = match self.resolve_dependencies(plan, &definition.dependencies(), context) {
            Ok(()) => definition.resolve(context),
            Err(e) => Err(e),
        };
        context.end_resolution(definition_id);

        context.record_attribute_definition_resolution(Arc::clone(definition), result?)
    }

    fn resolve_connector(
        &self,
        plan: &ResolutionPlan,
        connector_id: &str,
        context: &mut AttributeResolutionContext,
    ) -> Result<()> {
        if context.resolved_data_connector(connector_id).is_some() {
            return Ok(());
        }
        let connector = plan
            .connectors
            .get(connector_id)
            .ok_or_else(|| ResolutionError::UnknownPlugin(connector_id.to_string()))?;

        if !context.begin_resolution(connector_id) {
            return Err(ResolutionError::CircularDependency(format!(
                "data connector '{}' depends on itself",
                connector_id
            )));
        }
        let result = self.fetch_with_failover(plan, connector, context);
        context.end_resolution(connector_id);

        context.record_data_connector_resolution(Arc::clone(connector), result?)
    }

    fn fetch_with_failover(
        &self,
        plan: &ResolutionPlan,
        connector: &DataConnector,
        context: &mut AttributeResolutionContext,
    ) -> Result<Option<ConnectorOutput>> {
        self.resolve_dependencies(plan, &connector.dependencies(), context)?;

        let error = match connector.attempt(context) {
            Ok(output) => return Ok(output),
            Err(e) => e,
        };

        match connector.failover_data_connector_id() {
            Some(failover_id) if !error.is_hard_failure() => {
                warn!(
                    "{} failed, using failover connector '{}': {}",
                    connector.log_prefix(),
                    failover_id,
                    error
                );
                self.resolve_connector(plan, failover_id, context)?;
                Ok(context
                    .resolved_data_connector(failover_id)
                    .and_then(|record| record.resolved_attributes().cloned()))
            }
            _ => connector.recover(error),
        }
    }

    /// Exported connector attributes first, then definitions, which win on
    /// id collisions. Dependency-only definitions and empty attributes are
    /// left out.
    fn finalize(&self, context: &AttributeResolutionContext) -> Vec<IdPAttribute> {
        let mut resolved: BTreeMap<String, IdPAttribute> = BTreeMap::new();

        for record in context.resolved_data_connectors().values() {
            let Some(attributes) = record.resolved_attributes() else {
                continue;
            };
            for attribute_id in record.connector().export_attributes() {
                if let Some(attribute) = attributes.get(attribute_id) {
                    resolved.insert(attribute_id.clone(), attribute.clone());
                }
            }
        }

        for record in context.resolved_attribute_definitions().values() {
            if record.definition().is_dependency_only() {
                continue;
            }
            if let Some(attribute) = record.resolved_attribute() {
                resolved.insert(attribute.id().to_string(), attribute.clone());
            }
        }

        resolved
            .into_values()
            .filter(|attribute| !attribute.is_empty())
            .collect()
    }

    fn build_plan(&self) -> idp_core::Result<ResolutionPlan> {
        let mut builder = DependencyGraphBuilder::new();
        let mut plan = ResolutionPlan::default();

        for connector in &self.data_connectors {
            let mut edges: Vec<String> = connector
                .dependencies()
                .iter()
                .map(|dependency| dependency.plugin_id().to_string())
                .collect();
            if let Some(failover_id) = connector.failover_data_connector_id() {
                edges.push(failover_id.to_string());
            }
            builder
                .add_plugin(connector.id(), edges)
                .map_err(|e| self.graph_error(e))?;
            plan.connectors.insert(connector.id().to_string(), Arc::clone(connector));
        }

        for definition in &self.attribute_definitions {
            let edges = definition
                .dependencies()
                .into_iter()
                .map(|dependency| dependency.plugin_id().to_string());
            builder
                .add_plugin(definition.id(), edges)
                .map_err(|e| self.graph_error(e))?;
            plan.definitions.insert(definition.id().to_string(), Arc::clone(definition));
        }

        for (connector_id, connector) in &plan.connectors {
            if let Some(failover_id) = connector.failover_data_connector_id() {
                if !plan.connectors.contains_key(failover_id) {
                    return Err(ComponentError::initialization(format!(
                        "Attribute resolver '{}': failover '{}' of data connector '{}' is not a data connector",
                        self.id, failover_id, connector_id
                    )));
                }
            }
        }

        let graph = builder.build().map_err(|e| self.graph_error(e))?;
        plan.evaluation_order = graph.resolve_order().map_err(|e| self.graph_error(e))?;
        Ok(plan)
    }

    fn graph_error(&self, error: crate::graph::GraphError) -> ComponentError {
        ComponentError::initialization(format!("Attribute resolver '{}': {}", self.id, error))
    }

    fn plugins(&self) -> impl Iterator<Item = &dyn Component> {
        self.data_connectors
            .iter()
            .map(|c| c.as_ref() as &dyn Component)
            .chain(self.attribute_definitions.iter().map(|d| d.as_ref() as &dyn Component))
    }
}

impl Component for AttributeResolver {
    fn id(&self) -> &str {
        &self.id
    }

    fn initialize(&self) -> idp_core::Result<()> {
        self.lifecycle.initialize(&self.id, || {
            let plan = self.build_plan()?;
            for plugin in self.plugins() {
                plugin.initialize()?;
            }
            info!(
                "Attribute resolver '{}': initialized with {} data connector(s) and {} attribute definition(s)",
                self.id,
                plan.connectors.len(),
                plan.definitions.len()
            );
            *self.plan.write() = Arc::new(plan);
            Ok(())
        })
    }

    fn validate(&self) -> idp_core::Result<()> {
        self.lifecycle.validate(&self.id, || {
            for plugin in self.plugins() {
                plugin.validate()?;
            }
            Ok(())
        })
    }

    fn destroy(&self) {
        self.lifecycle.destroy(&self.id, || {
            for plugin in self.plugins() {
                plugin.destroy();
            }
        })
    }

    fn is_initialized(&self) -> bool {
        self.lifecycle.is_initialized()
    }

    fn is_destroyed(&self) -> bool {
        self.lifecycle.is_destroyed()
    }
}
