//! Query templates for search connectors
//!
//! A template is plain query text with placeholders:
//!
//! - `${principal}`, `${requester}`, `${issuer}`: request parameters
//! - `${attr}`: every value of dependency attribute `attr`, comma separated
//! - `${attr[n]}`: the n-th value of dependency attribute `attr`
//!
//! Substituted values are escaped for SQL string literals (`'` → `''`)
//! unless escaping is turned off.

use super::search::{ExecutableSearch, ExecutableSearchBuilder, SearchResult};
use crate::context::AttributeResolutionContext;
use crate::dependency::DependencyValues;
use crate::error::BoxError;
use idp_core::ComponentError;
use regex::{Captures, Regex};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Runs a rendered query against the external source
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, query: &str) -> std::result::Result<SearchResult, BoxError>;
}

/// Builds searches by rendering a query template
pub struct TemplatedQueryBuilder {
    template: String,
    placeholder: Regex,
    escape_values: bool,
    executor: Arc<dyn QueryExecutor>,
}

impl TemplatedQueryBuilder {
    pub fn new(template: impl Into<String>, executor: Arc<dyn QueryExecutor>) -> idp_core::Result<Self> {
        let template = template.into();
        if template.trim().is_empty() {
            return Err(ComponentError::constraint("query template cannot be empty"));
        }
        let placeholder = Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_.:-]*)\s*(?:\[\s*(\d+)\s*\])?\s*\}")
            .map_err(|e| ComponentError::initialization(e.to_string()))?;
        Ok(Self {
            template,
            placeholder,
            escape_values: true,
            executor,
        })
    }

    /// Turn SQL quote escaping on or off
    pub fn with_escaping(mut self, escape_values: bool) -> Self {
        self.escape_values = escape_values;
        self
    }

    /// Render the template for a request
    pub fn render(
        &self,
        context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> std::result::Result<String, BoxError> {
        let mut missing_principal = false;

        let rendered = self.placeholder.replace_all(&self.template, |caps: &Captures<'_>| {
            let name = &caps[1];
            let index = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());

            match (name, index) {
                ("principal", None) => match context.principal() {
                    Some(principal) => self.escape(principal),
                    None => {
                        missing_principal = true;
                        String::new()
                    }
                },
                ("requester", None) => self.escape(context.attribute_recipient_id().unwrap_or_default()),
                ("issuer", None) => self.escape(context.attribute_issuer_id().unwrap_or_default()),
                (attribute, Some(i)) => match dependencies.get(attribute).get(i) {
                    Some(value) => self.escape(&value.to_string()),
                    None => {
                        debug!("Query template: no value {} for '{}'", i, attribute);
                        String::new()
                    }
                },
                (attribute, None) => dependencies
                    .get(attribute)
                    .iter()
                    .map(|value| self.escape(&value.to_string()))
                    .collect::<Vec<_>>()
                    .join(","),
            }
        });

        if missing_principal {
            return Err("query template references the principal but none is available".into());
        }

        trace!("Query template rendered: {}", rendered);
        Ok(rendered.into_owned())
    }

    fn escape(&self, value: &str) -> String {
        if self.escape_values {
            value.replace('\'', "''")
        } else {
            value.to_string()
        }
    }
}

impl fmt::Debug for TemplatedQueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplatedQueryBuilder")
            .field("template", &self.template)
            .field("escape_values", &self.escape_values)
            .finish()
    }
}

impl ExecutableSearchBuilder for TemplatedQueryBuilder {
    fn build(
        &self,
        context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> std::result::Result<Box<dyn ExecutableSearch>, BoxError> {
        Ok(Box::new(TemplatedQuery {
            query: self.render(context, dependencies)?,
            executor: Arc::clone(&self.executor),
        }))
    }
}

/// A rendered query; the query text doubles as its result cache key
struct TemplatedQuery {
    query: String,
    executor: Arc<dyn QueryExecutor>,
}

impl ExecutableSearch for TemplatedQuery {
    fn result_cache_key(&self) -> String {
        self.query.clone()
    }

    fn execute(&self) -> std::result::Result<SearchResult, BoxError> {
        self.executor.execute(&self.query)
    }
}
