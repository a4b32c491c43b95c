//! Value transforms over dependency values

use super::{require_dependencies, string_input, DefinitionStrategy};
use crate::context::AttributeResolutionContext;
use crate::dependency::{DependencyValues, ResolverPluginDependency};
use crate::error::{ResolutionError, Result};
use idp_core::{AttributeValue, ComponentError};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use tracing::debug;

/// Releases the merged dependency values unchanged
#[derive(Debug, Default)]
pub struct SimpleAttributeDefinition;

impl SimpleAttributeDefinition {
    pub fn new() -> Self {
        Self
    }
}

impl DefinitionStrategy for SimpleAttributeDefinition {
    fn check_config(&self, id: &str, dependencies: &BTreeSet<ResolverPluginDependency>) -> idp_core::Result<()> {
        require_dependencies(id, dependencies)
    }

    fn produce(
        &self,
        _id: &str,
        _context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> Result<Option<Vec<AttributeValue>>> {
        Ok(Some(dependencies.merged()))
    }
}

/// Attaches a fixed scope to every string value
#[derive(Debug)]
pub struct ScopedAttributeDefinition {
    scope: String,
}

impl ScopedAttributeDefinition {
    pub fn new(scope: impl Into<String>) -> Self {
        Self { scope: scope.into() }
    }
}

impl DefinitionStrategy for ScopedAttributeDefinition {
    fn check_config(&self, id: &str, dependencies: &BTreeSet<ResolverPluginDependency>) -> idp_core::Result<()> {
        if self.scope.trim().is_empty() {
            return Err(ComponentError::initialization(format!(
                "Attribute definition '{}': no scope was configured",
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
            if let Some(text) = string_input(id, &value)? {
                values.push(AttributeValue::scoped(text, self.scope.clone()));
            }
        }
        Ok(Some(values))
    }
}

/// Splits values that already carry their scope, e.g. `jdoe@example.org`
#[derive(Debug)]
pub struct PrescopedAttributeDefinition {
    delimiter: String,
}

impl PrescopedAttributeDefinition {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }
}

impl Default for PrescopedAttributeDefinition {
    fn default() -> Self {
        Self::new("@")
    }
}

impl DefinitionStrategy for PrescopedAttributeDefinition {
    fn check_config(&self, id: &str, dependencies: &BTreeSet<ResolverPluginDependency>) -> idp_core::Result<()> {
        if self.delimiter.is_empty() {
            return Err(ComponentError::initialization(format!(
                "Attribute definition '{}': scope delimiter cannot be empty",
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
            let (local, scope) = text.split_once(self.delimiter.as_str()).ok_or_else(|| {
                ResolutionError::plugin_failure(
                    id,
                    format!("input value '{}' does not contain delimiter '{}'", text, self.delimiter),
                )
            })?;
            values.push(AttributeValue::scoped(local, scope));
        }
        Ok(Some(values))
    }
}

/// Fixed values, independent of the request
#[derive(Debug)]
pub struct StaticAttributeDefinition {
    values: Vec<AttributeValue>,
}

impl StaticAttributeDefinition {
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator<Item = AttributeValue>,
    {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl DefinitionStrategy for StaticAttributeDefinition {
    fn check_config(&self, id: &str, _dependencies: &BTreeSet<ResolverPluginDependency>) -> idp_core::Result<()> {
        if self.values.is_empty() {
            return Err(ComponentError::initialization(format!(
                "Attribute definition '{}': no static values were configured",
                id
            )));
        }
        Ok(())
    }

    fn produce(
        &self,
        _id: &str,
        _context: &AttributeResolutionContext,
        _dependencies: &DependencyValues,
    ) -> Result<Option<Vec<AttributeValue>>> {
        Ok(Some(self.values.clone()))
    }
}

/// The principal name of the request
#[derive(Debug, Default)]
pub struct PrincipalNameAttributeDefinition;

impl PrincipalNameAttributeDefinition {
    pub fn new() -> Self {
        Self
    }
}

impl DefinitionStrategy for PrincipalNameAttributeDefinition {
    fn produce(
        &self,
        id: &str,
        context: &AttributeResolutionContext,
        _dependencies: &DependencyValues,
    ) -> Result<Option<Vec<AttributeValue>>> {
        let principal = context
            .principal()
            .ok_or_else(|| ResolutionError::plugin_failure(id, "no principal name available"))?;
        Ok(Some(vec![AttributeValue::string(principal)]))
    }
}

/// First capture group of a regular expression applied to each value.
/// Values that do not match are dropped.
#[derive(Debug)]
pub struct RegexSplitAttributeDefinition {
    regex: Regex,
}

impl RegexSplitAttributeDefinition {
    pub fn new(pattern: &str, ignore_case: bool) -> idp_core::Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| ComponentError::constraint(format!("invalid regular expression: {}", e)))?;
        Ok(Self { regex })
    }
}

impl DefinitionStrategy for RegexSplitAttributeDefinition {
    fn check_config(&self, id: &str, dependencies: &BTreeSet<ResolverPluginDependency>) -> idp_core::Result<()> {
        if self.regex.captures_len() < 2 {
            return Err(ComponentError::initialization(format!(
                "Attribute definition '{}': regular expression has no capture group",
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
            match self.regex.captures(text).and_then(|caps| caps.get(1)) {
                Some(group) => values.push(AttributeValue::string(group.as_str())),
                None => debug!(
                    "Attribute definition '{}': value '{}' does not match regex '{}'",
                    id,
                    text,
                    self.regex.as_str()
                ),
            }
        }
        Ok(Some(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idp_core::EmptyKind;

    fn inputs(values: &[&str]) -> DependencyValues {
        let mut deps = DependencyValues::default();
        deps.extend("source", values.iter().map(|v| AttributeValue::string(*v)));
        deps
    }

    fn one_dependency() -> BTreeSet<ResolverPluginDependency> {
        [ResolverPluginDependency::new("source").unwrap()].into_iter().collect()
    }

    #[test]
    fn test_simple_passes_values_through() {
        let strategy = SimpleAttributeDefinition::new();
        let ctx = AttributeResolutionContext::new();
        let values = strategy.produce("simple", &ctx, &inputs(&["a", "b"])).unwrap().unwrap();
        assert_eq!(values, vec![AttributeValue::string("a"), AttributeValue::string("b")]);

        assert!(strategy.check_config("simple", &BTreeSet::new()).is_err());
        assert!(strategy.check_config("simple", &one_dependency()).is_ok());
    }

    #[test]
    fn test_scoped() {
        let strategy = ScopedAttributeDefinition::new("example.org");
        let ctx = AttributeResolutionContext::new();
        let mut deps = inputs(&["jdoe"]);
        deps.extend("source", [AttributeValue::Empty(EmptyKind::NullValue)]);

        let values = strategy.produce("eppn", &ctx, &deps).unwrap().unwrap();
        assert_eq!(values, vec![AttributeValue::scoped("jdoe", "example.org")]);

        let mut bytes = DependencyValues::default();
        bytes.extend("source", [AttributeValue::bytes(vec![1])]);
        assert!(strategy.produce("eppn", &ctx, &bytes).is_err());

        assert!(ScopedAttributeDefinition::new(" ")
            .check_config("eppn", &one_dependency())
            .is_err());
    }

    #[test]
    fn test_prescoped() {
        let strategy = PrescopedAttributeDefinition::default();
        let ctx = AttributeResolutionContext::new();

        let values = strategy
            .produce("eppn", &ctx, &inputs(&["jdoe@example.org"]))
            .unwrap()
            .unwrap();
        assert_eq!(values, vec![AttributeValue::scoped("jdoe", "example.org")]);

        let missing = strategy.produce("eppn", &ctx, &inputs(&["jdoe"]));
        assert!(matches!(missing, Err(ResolutionError::PluginFailure { .. })));
    }

    #[test]
    fn test_static_requires_values() {
        let empty = StaticAttributeDefinition::new(Vec::new());
        assert!(matches!(
            empty.check_config("static", &BTreeSet::new()),
            Err(ComponentError::Initialization(_))
        ));

        let strategy = StaticAttributeDefinition::new([AttributeValue::string("member")]);
        assert!(strategy.check_config("static", &BTreeSet::new()).is_ok());
        let ctx = AttributeResolutionContext::new();
        let values = strategy
            .produce("static", &ctx, &DependencyValues::default())
            .unwrap()
            .unwrap();
        assert_eq!(values, vec![AttributeValue::string("member")]);
    }

    #[test]
    fn test_principal_name() {
        let strategy = PrincipalNameAttributeDefinition::new();
        let deps = DependencyValues::default();

        let ctx = AttributeResolutionContext::for_principal("jdoe");
        let values = strategy.produce("principal", &ctx, &deps).unwrap().unwrap();
        assert_eq!(values, vec![AttributeValue::string("jdoe")]);

        let anonymous = AttributeResolutionContext::new();
        assert!(strategy.produce("principal", &anonymous, &deps).is_err());
    }

    #[test]
    fn test_regex_split() {
        let strategy = RegexSplitAttributeDefinition::new("^(.+)@example\\.org$", true).unwrap();
        let ctx = AttributeResolutionContext::new();
        let values = strategy
            .produce("uid", &ctx, &inputs(&["jdoe@EXAMPLE.org", "other@elsewhere.net"]))
            .unwrap()
            .unwrap();
        assert_eq!(values, vec![AttributeValue::string("jdoe")]);

        let no_group = RegexSplitAttributeDefinition::new("^.+$", false).unwrap();
        assert!(no_group.check_config("uid", &one_dependency()).is_err());
        assert!(RegexSplitAttributeDefinition::new("(", false).is_err());
    }
}
