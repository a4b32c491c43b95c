//! Attribute rules: a permit or deny matcher bound to one attribute

use crate::context::AttributeFilterContext;
use crate::error::Result;
use crate::matcher::{MatchedValues, Matcher};
use idp_core::{require_id, Component, ComponentError, IdPAttribute, Lifecycle};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Permit or deny rule for the values of one attribute
pub struct AttributeRule {
    id: String,
    lifecycle: Lifecycle,
    attribute_id: Option<String>,
    matcher: Option<Arc<dyn Matcher>>,
    is_deny_rule: bool,
}

impl AttributeRule {
    pub fn new(id: impl Into<String>) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, "Attribute rule")?,
            lifecycle: Lifecycle::new(),
            attribute_id: None,
            matcher: None,
            is_deny_rule: false,
        })
    }

    /// Permit rule for `attribute_id`
    pub fn permit(id: impl Into<String>, attribute_id: impl Into<String>, matcher: Arc<dyn Matcher>) -> idp_core::Result<Self> {
        let mut rule = Self::new(id)?;
        rule.set_attribute_id(attribute_id)?;
        rule.set_matcher(matcher)?;
        Ok(rule)
    }

    /// Deny rule for `attribute_id`
    pub fn deny(id: impl Into<String>, attribute_id: impl Into<String>, matcher: Arc<dyn Matcher>) -> idp_core::Result<Self> {
        let mut rule = Self::permit(id, attribute_id, matcher)?;
        rule.set_deny_rule(true)?;
        Ok(rule)
    }

    pub fn set_attribute_id(&mut self, attribute_id: impl Into<String>) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.attribute_id = Some(require_id(attribute_id, "Attribute rule target")?);
        Ok(())
    }

    pub fn set_matcher(&mut self, matcher: Arc<dyn Matcher>) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.matcher = Some(matcher);
        Ok(())
    }

    pub fn set_deny_rule(&mut self, is_deny_rule: bool) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.is_deny_rule = is_deny_rule;
        Ok(())
    }

    /// Target attribute id (set once initialized)
    pub fn attribute_id(&self) -> Option<&str> {
        self.attribute_id.as_deref()
    }

    pub fn matcher(&self) -> Option<&Arc<dyn Matcher>> {
        self.matcher.as_ref()
    }

    pub fn is_deny_rule(&self) -> bool {
        self.is_deny_rule
    }

    /// Values this rule permits or denies.
    ///
    /// A failing matcher permits nothing; for a deny rule it denies every
    /// value of the attribute.
    pub fn select(&self, attribute: &IdPAttribute, context: &AttributeFilterContext) -> Result<MatchedValues> {
        self.lifecycle.ensure_operational(&self.id)?;
        let matcher = self.configured_matcher()?;

        match matcher.matching_values(attribute, context)? {
            Some(values) => Ok(values),
            None if self.is_deny_rule => {
                warn!(
                    "Attribute rule '{}': matcher '{}' failed, denying all values of '{}'",
                    self.id,
                    matcher.id(),
                    attribute.id()
                );
                Ok(attribute.value_set())
            }
            None => {
                warn!(
                    "Attribute rule '{}': matcher '{}' failed, permitting no values of '{}'",
                    self.id,
                    matcher.id(),
                    attribute.id()
                );
                Ok(MatchedValues::new())
            }
        }
    }

    fn configured_matcher(&self) -> idp_core::Result<&Arc<dyn Matcher>> {
        self.matcher
            .as_ref()
            .ok_or_else(|| ComponentError::initialization(format!("Attribute rule '{}': no matcher was configured", self.id)))
    }
}

impl Component for AttributeRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn initialize(&self) -> idp_core::Result<()> {
        self.lifecycle.initialize(&self.id, || {
            if self.attribute_id.is_none() {
                return Err(ComponentError::initialization(format!(
                    "Attribute rule '{}': no attribute id was configured",
                    self.id
                )));
            }
            self.configured_matcher()?.initialize()
        })
    }

    fn validate(&self) -> idp_core::Result<()> {
        self.lifecycle.validate(&self.id, || self.configured_matcher()?.validate())
    }

    fn destroy(&self) {
        self.lifecycle.destroy(&self.id, || {
            if let Some(matcher) = &self.matcher {
                matcher.destroy();
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

impl fmt::Debug for AttributeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRule")
            .field("id", &self.id)
            .field("attribute_id", &self.attribute_id)
            .field("matcher", &self.matcher.as_ref().map(|m| m.id().to_string()))
            .field("is_deny_rule", &self.is_deny_rule)
            .finish()
    }
}
