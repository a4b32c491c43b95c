//! User-supplied value function

use super::DefinitionStrategy;
use crate::context::AttributeResolutionContext;
use crate::dependency::DependencyValues;
use crate::error::{BoxError, ResolutionError, Result};
use idp_core::AttributeValue;
use std::fmt;
use std::sync::Arc;

/// Function computing the values of a scripted definition
pub type DefinitionScript = Arc<
    dyn Fn(&AttributeResolutionContext, &DependencyValues) -> std::result::Result<Vec<AttributeValue>, BoxError>
        + Send
        + Sync,
>;

/// Definition whose values come from an injected function
#[derive(Clone)]
pub struct ScriptedAttributeDefinition {
    script: DefinitionScript,
}

impl ScriptedAttributeDefinition {
    pub fn new(script: DefinitionScript) -> Self {
        Self { script }
    }

    pub fn from_fn<F>(script: F) -> Self
    where
        F: Fn(&AttributeResolutionContext, &DependencyValues) -> std::result::Result<Vec<AttributeValue>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(Arc::new(script))
    }
}

impl fmt::Debug for ScriptedAttributeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScriptedAttributeDefinition")
    }
}

impl DefinitionStrategy for ScriptedAttributeDefinition {
    fn produce(
        &self,
        id: &str,
        context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> Result<Option<Vec<AttributeValue>>> {
        (self.script)(context, dependencies)
            .map(Some)
            .map_err(|e| ResolutionError::plugin_failure(id, format!("script failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_sees_dependencies() {
        let strategy = ScriptedAttributeDefinition::from_fn(|ctx, deps| {
            let principal = ctx.principal().unwrap_or("anonymous");
            Ok(deps
                .merged()
                .iter()
                .map(|v| AttributeValue::string(format!("{}:{}", principal, v)))
                .collect())
        });

        let mut deps = DependencyValues::default();
        deps.extend("affiliation", [AttributeValue::string("staff")]);
        let ctx = AttributeResolutionContext::for_principal("jdoe");

        let values = strategy.produce("scripted", &ctx, &deps).unwrap().unwrap();
        assert_eq!(values, vec![AttributeValue::string("jdoe:staff")]);
    }

    #[test]
    fn test_script_failure() {
        let strategy = ScriptedAttributeDefinition::from_fn(|_, _| Err("boom".into()));
        let ctx = AttributeResolutionContext::new();
        let result = strategy.produce("scripted", &ctx, &DependencyValues::default());
        assert!(matches!(result, Err(ResolutionError::PluginFailure { .. })));
    }
}
