//! User-supplied connector function

use super::ConnectorStrategy;
use crate::context::{AttributeResolutionContext, ConnectorOutput};
use crate::dependency::DependencyValues;
use crate::error::{BoxError, ResolutionError, Result};
use idp_core::IdPAttribute;
use std::fmt;
use std::sync::Arc;

/// Function computing the attributes of a scripted connector
pub type ConnectorScript = Arc<
    dyn Fn(&AttributeResolutionContext, &DependencyValues) -> std::result::Result<Vec<IdPAttribute>, BoxError>
        + Send
        + Sync,
>;

/// Connector whose attributes come from an injected function
#[derive(Clone)]
pub struct ScriptedDataConnector {
    script: ConnectorScript,
}

impl ScriptedDataConnector {
    pub fn new(script: ConnectorScript) -> Self {
        Self { script }
    }

    pub fn from_fn<F>(script: F) -> Self
    where
        F: Fn(&AttributeResolutionContext, &DependencyValues) -> std::result::Result<Vec<IdPAttribute>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(Arc::new(script))
    }
}

impl fmt::Debug for ScriptedDataConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScriptedDataConnector")
    }
}

impl ConnectorStrategy for ScriptedDataConnector {
    fn fetch(
        &self,
        id: &str,
        context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> Result<Option<ConnectorOutput>> {
        let attributes = (self.script)(context, dependencies)
            .map_err(|e| ResolutionError::plugin_failure(id, format!("script failed: {}", e)))?;
        Ok(Some(
            attributes
                .into_iter()
                .filter(|attribute| !attribute.id().is_empty())
                .map(|attribute| (attribute.id().to_string(), attribute))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_output_keyed_by_id() {
        let strategy = ScriptedDataConnector::from_fn(|ctx, _| {
            let principal = ctx.principal().ok_or("no principal")?;
            Ok(vec![
                IdPAttribute::new("uid").with_values([principal]),
                IdPAttribute::new(""),
            ])
        });

        let ctx = AttributeResolutionContext::for_principal("jdoe");
        let output = strategy
            .fetch("scripted", &ctx, &DependencyValues::default())
            .unwrap()
            .unwrap();
        assert_eq!(output.len(), 1);
        assert!(output.contains_key("uid"));

        let failed = strategy.fetch("scripted", &AttributeResolutionContext::new(), &DependencyValues::default());
        assert!(matches!(failed, Err(ResolutionError::PluginFailure { .. })));
    }
}
