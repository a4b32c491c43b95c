//! Dependency descriptors and the values they select

use crate::context::AttributeResolutionContext;
use idp_core::{require_id, AttributeValue, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Reference from one resolver plugin to another plugin's output.
///
/// For an attribute definition the reference selects the definition's own
/// attribute. For a data connector it selects every produced attribute, or
/// only `attribute_id` when set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolverPluginDependency {
    plugin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attribute_id: Option<String>,
}

impl ResolverPluginDependency {
    /// Depend on everything `plugin_id` produces
    pub fn new(plugin_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            plugin_id: require_id(plugin_id, "Dependency plugin")?,
            attribute_id: None,
        })
    }

    /// Depend on a single attribute produced by a data connector
    pub fn with_attribute(plugin_id: impl Into<String>, attribute_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            plugin_id: require_id(plugin_id, "Dependency plugin")?,
            attribute_id: Some(require_id(attribute_id, "Dependency attribute")?),
        })
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn attribute_id(&self) -> Option<&str> {
        self.attribute_id.as_deref()
    }
}

/// Values gathered from resolved dependencies, keyed by source attribute id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyValues {
    values: BTreeMap<String, Vec<AttributeValue>>,
}

impl DependencyValues {
    /// Collect the values selected by `dependencies` from the records
    /// already present in `context`. Unresolved or empty dependencies
    /// contribute nothing.
    pub fn collect<'a, I>(context: &AttributeResolutionContext, dependencies: I) -> Self
    where
        I: IntoIterator<Item = &'a ResolverPluginDependency>,
    {
        let mut collected = DependencyValues::default();

        for dependency in dependencies {
            let plugin_id = dependency.plugin_id();

            if let Some(record) = context.resolved_attribute_definition(plugin_id) {
                if let Some(attribute) = record.resolved_attribute() {
                    collected.extend(attribute.id(), attribute.values().iter().cloned());
                }
                continue;
            }

            if let Some(record) = context.resolved_data_connector(plugin_id) {
                let Some(attributes) = record.resolved_attributes() else {
                    continue;
                };
                match dependency.attribute_id() {
                    Some(attribute_id) => {
                        if let Some(attribute) = attributes.get(attribute_id) {
                            collected.extend(attribute_id, attribute.values().iter().cloned());
                        }
                    }
                    None => {
                        for (attribute_id, attribute) in attributes {
                            collected.extend(attribute_id, attribute.values().iter().cloned());
                        }
                    }
                }
            }
        }

        collected
    }

    /// Add values under a source attribute id, skipping duplicates
    pub fn extend<I>(&mut self, attribute_id: &str, values: I)
    where
        I: IntoIterator<Item = AttributeValue>,
    {
        let entry = self.values.entry(attribute_id.to_string()).or_default();
        for value in values {
            if !entry.contains(&value) {
                entry.push(value);
            }
        }
    }

    /// Values for one source attribute
    pub fn get(&self, attribute_id: &str) -> &[AttributeValue] {
        self.values.get(attribute_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Source attribute ids
    pub fn attribute_ids(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// All values across every source attribute, without duplicates
    pub fn merged(&self) -> Vec<AttributeValue> {
        let mut seen = BTreeSet::new();
        self.values
            .values()
            .flatten()
            .filter(|value| seen.insert((*value).clone()))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(Vec::is_empty)
    }
}
