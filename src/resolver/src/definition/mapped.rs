//! Value mapping definition
//!
//! Each input value is compared with the source patterns of every
//! [`ValueMap`]; each match contributes the map's return value. Return
//! values may reference capture groups (`$1`, `${name}`).

use super::{require_dependencies, string_input, DefinitionStrategy};
use crate::context::AttributeResolutionContext;
use crate::dependency::{DependencyValues, ResolverPluginDependency};
use crate::error::Result;
use idp_core::{AttributeValue, ComponentError};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use tracing::debug;

/// Source pattern of a value map
#[derive(Debug, Clone)]
pub struct SourceValue {
    regex: Regex,
    partial_match: bool,
}

impl SourceValue {
    /// `pattern` is a regular expression. Without `partial_match` it must
    /// match the whole input value.
    pub fn new(pattern: &str, ignore_case: bool, partial_match: bool) -> idp_core::Result<Self> {
        let source = if partial_match {
            pattern.to_string()
        } else {
            format!("^(?:{})$", pattern)
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| ComponentError::constraint(format!("invalid source value '{}': {}", pattern, e)))?;
        Ok(Self { regex, partial_match })
    }

    pub fn is_partial_match(&self) -> bool {
        self.partial_match
    }

    /// The return value with `$n` / `${name}` filled from the first match
    fn apply(&self, input: &str, return_value: &str) -> Option<String> {
        let captures = self.regex.captures(input)?;
        let mut output = String::new();
        captures.expand(return_value, &mut output);
        Some(output)
    }
}

/// One return value and the source patterns that produce it
#[derive(Debug, Clone)]
pub struct ValueMap {
    return_value: String,
    source_values: Vec<SourceValue>,
}

impl ValueMap {
    pub fn new<I>(return_value: impl Into<String>, source_values: I) -> Self
    where
        I: IntoIterator<Item = SourceValue>,
    {
        Self {
            return_value: return_value.into(),
            source_values: source_values.into_iter().collect(),
        }
    }

    pub fn return_value(&self) -> &str {
        &self.return_value
    }

    /// Values produced for `input`, one per matching source value
    pub fn apply(&self, input: &str) -> BTreeSet<String> {
        self.source_values
            .iter()
            .filter_map(|source| source.apply(input, &self.return_value))
            .collect()
    }
}

/// Maps dependency values through a table of value maps
#[derive(Debug, Clone, Default)]
pub struct MappedAttributeDefinition {
    value_maps: Vec<ValueMap>,
    default_value: Option<String>,
    pass_through: bool,
}

impl MappedAttributeDefinition {
    pub fn new<I>(value_maps: I) -> Self
    where
        I: IntoIterator<Item = ValueMap>,
    {
        Self {
            value_maps: value_maps.into_iter().collect(),
            default_value: None,
            pass_through: false,
        }
    }

    /// Value used for inputs no map matches
    pub fn with_default_value(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into()).filter(|v| !v.is_empty());
        self
    }

    /// Release unmatched inputs unchanged
    pub fn with_pass_through(mut self, pass_through: bool) -> Self {
        self.pass_through = pass_through;
        self
    }
}

impl DefinitionStrategy for MappedAttributeDefinition {
    fn check_config(&self, id: &str, dependencies: &BTreeSet<ResolverPluginDependency>) -> idp_core::Result<()> {
        if self.default_value.is_some() && self.pass_through {
            return Err(ComponentError::initialization(format!(
                "Attribute definition '{}': default value and pass through are mutually exclusive",
                id
            )));
        }
        require_dependencies(id, dependencies)
    }

    fn produce(
        &self,
        id: &str,
        _context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> Result<Option<Vec<AttributeValue>>> {
        let mut values = Vec::new();

        for value in dependencies.merged() {
            let Some(text) = string_input(id, &value)? else {
                continue;
            };

            let mapped: BTreeSet<String> =
                self.value_maps.iter().flat_map(|map| map.apply(text)).collect();

            if !mapped.is_empty() {
                values.extend(mapped.into_iter().map(AttributeValue::String));
            } else if self.pass_through {
                values.push(AttributeValue::string(text));
            } else if let Some(default_value) = &self.default_value {
                values.push(AttributeValue::string(default_value.clone()));
            } else {
                debug!("Attribute definition '{}': no mapping for value '{}'", id, text);
            }
        }

        Ok(Some(values))
    }
}
