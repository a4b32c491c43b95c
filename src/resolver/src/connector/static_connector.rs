//! Connector returning a fixed set of attributes

use super::ConnectorStrategy;
use crate::context::{AttributeResolutionContext, ConnectorOutput};
use crate::dependency::{DependencyValues, ResolverPluginDependency};
use crate::error::Result;
use idp_core::{ComponentError, IdPAttribute};
use std::collections::BTreeSet;

/// Fixed attributes, identical for every request
#[derive(Debug, Clone)]
pub struct StaticDataConnector {
    attributes: ConnectorOutput,
}

impl StaticDataConnector {
    pub fn new<I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = IdPAttribute>,
    {
        Self {
            attributes: attributes
                .into_iter()
                .map(|attribute| (attribute.id().to_string(), attribute))
                .collect(),
        }
    }
}

impl ConnectorStrategy for StaticDataConnector {
    fn check_config(&self, id: &str, _dependencies: &BTreeSet<ResolverPluginDependency>) -> idp_core::Result<()> {
        if self.attributes.is_empty() {
            return Err(ComponentError::initialization(format!(
                "Data connector '{}': no static values were configured",
                id
            )));
        }
        Ok(())
    }

    fn fetch(
        &self,
        _id: &str,
        _context: &AttributeResolutionContext,
        _dependencies: &DependencyValues,
    ) -> Result<Option<ConnectorOutput>> {
        Ok(Some(self.attributes.clone()))
    }
}
