//! Attribute definitions
//!
//! An [`AttributeDefinition`] produces exactly one attribute, named after
//! the definition, by applying a [`DefinitionStrategy`] to the values of its
//! dependencies.

pub mod mapped;
pub mod scripted;
pub mod transform;

pub use mapped::{MappedAttributeDefinition, SourceValue, ValueMap};
pub use scripted::{DefinitionScript, ScriptedAttributeDefinition};
pub use transform::{
    PrescopedAttributeDefinition, PrincipalNameAttributeDefinition, RegexSplitAttributeDefinition,
    ScopedAttributeDefinition, SimpleAttributeDefinition, StaticAttributeDefinition,
};

use crate::context::AttributeResolutionContext;
use crate::dependency::{DependencyValues, ResolverPluginDependency};
use crate::error::{ResolutionError, Result};
use crate::plugin::{resolver_plugin, PluginCore};
use idp_core::{AttributeValue, ComponentError, IdPAttribute};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::trace;

/// Value-producing behaviour of an attribute definition
pub trait DefinitionStrategy: Send + Sync {
    /// Check configuration when the owning definition initializes
    fn check_config(&self, _id: &str, _dependencies: &BTreeSet<ResolverPluginDependency>) -> idp_core::Result<()> {
        Ok(())
    }

    /// Health check
    fn validate(&self, _id: &str) -> idp_core::Result<()> {
        Ok(())
    }

    /// Compute the attribute values. `Ok(None)` means no attribute.
    fn produce(
        &self,
        id: &str,
        context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> Result<Option<Vec<AttributeValue>>>;
}

/// Fail initialization when a transform has nothing to transform
pub(crate) fn require_dependencies(
    id: &str,
    dependencies: &BTreeSet<ResolverPluginDependency>,
) -> idp_core::Result<()> {
    if dependencies.is_empty() {
        return Err(ComponentError::initialization(format!(
            "Attribute definition '{}': no dependencies were configured",
            id
        )));
    }
    Ok(())
}

/// String form of a dependency value. Empty markers are skipped, other
/// non-string values are an error.
pub(crate) fn string_input<'a>(id: &str, value: &'a AttributeValue) -> Result<Option<&'a str>> {
    if value.is_empty_marker() {
        return Ok(None);
    }
    value.string_value().map(Some).ok_or_else(|| {
        ResolutionError::plugin_failure(id, format!("input value '{}' is not a string", value))
    })
}

/// Resolver plugin producing a single attribute
pub struct AttributeDefinition {
    core: PluginCore,
    strategy: Box<dyn DefinitionStrategy>,
    dependency_only: bool,
    display_names: BTreeMap<String, String>,
    display_descriptions: BTreeMap<String, String>,
}

impl AttributeDefinition {
    pub fn new<S>(id: impl Into<String>, strategy: S) -> idp_core::Result<Self>
    where
        S: DefinitionStrategy + 'static,
    {
        Ok(Self {
            core: PluginCore::new(id, "Attribute definition")?,
            strategy: Box::new(strategy),
            dependency_only: false,
            display_names: BTreeMap::new(),
            display_descriptions: BTreeMap::new(),
        })
    }

    /// Resolve for other plugins only; never released in the final set
    pub fn set_dependency_only(&mut self, dependency_only: bool) -> idp_core::Result<()> {
        self.core.lifecycle().ensure_modifiable(self.core.id())?;
        self.dependency_only = dependency_only;
        Ok(())
    }

    pub fn is_dependency_only(&self) -> bool {
        self.dependency_only
    }

    pub fn set_display_name(&mut self, lang: impl Into<String>, name: impl Into<String>) -> idp_core::Result<()> {
        self.core.lifecycle().ensure_modifiable(self.core.id())?;
        self.display_names.insert(lang.into(), name.into());
        Ok(())
    }

    pub fn set_display_description(
        &mut self,
        lang: impl Into<String>,
        description: impl Into<String>,
    ) -> idp_core::Result<()> {
        self.core.lifecycle().ensure_modifiable(self.core.id())?;
        self.display_descriptions.insert(lang.into(), description.into());
        Ok(())
    }

    /// Resolve against a context whose dependencies are already recorded.
    ///
    /// Returns `Ok(None)` when the definition is inactive, produced nothing,
    /// or failed with propagation disabled.
    pub fn resolve(&self, context: &AttributeResolutionContext) -> Result<Option<IdPAttribute>> {
        self.core.resolve_with(context, || {
            let dependencies = DependencyValues::collect(context, &self.core.dependencies());
            let Some(values) = self.strategy.produce(self.id(), context, &dependencies)? else {
                return Ok(None);
            };

            let mut attribute = IdPAttribute::new(self.id()).with_values(values);
            for (lang, name) in &self.display_names {
                attribute.set_display_name(lang.clone(), name.clone());
            }
            for (lang, description) in &self.display_descriptions {
                attribute.set_display_description(lang.clone(), description.clone());
            }

            trace!(
                "{} produced {} value(s)",
                self.core.log_prefix(),
                attribute.values().len()
            );
            Ok(Some(attribute))
        })
    }

    fn do_initialize(&self) -> idp_core::Result<()> {
        self.strategy.check_config(self.id(), &self.core.dependencies())
    }

    fn do_validate(&self) -> idp_core::Result<()> {
        self.strategy.validate(self.id())
    }

    fn do_destroy(&self) {}
}

resolver_plugin!(AttributeDefinition);

impl fmt::Debug for AttributeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDefinition")
            .field("core", &self.core)
            .field("dependency_only", &self.dependency_only)
            .finish()
    }
}
