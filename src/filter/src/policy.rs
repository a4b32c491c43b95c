//! Filter policies: a requirement rule gating an ordered list of attribute
//! rules

use crate::context::AttributeFilterContext;
use crate::error::Result;
use crate::matcher::{MatchedValues, Matcher, Tristate};
use crate::rule::AttributeRule;
use idp_core::{require_id, Component, ComponentError, IdPAttribute, Lifecycle};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Values permitted and denied so far in a filter run, per attribute id
#[derive(Debug, Default)]
pub(crate) struct ValueDecisions {
    permitted: BTreeMap<String, MatchedValues>,
    denied: BTreeMap<String, MatchedValues>,
}

impl ValueDecisions {
    fn record(&mut self, attribute_id: &str, values: MatchedValues, deny: bool) {
        let target = if deny { &mut self.denied } else { &mut self.permitted };
        target.entry(attribute_id.to_string()).or_default().extend(values);
    }

    /// Attribute restricted to its permitted, never denied values, in the
    /// original order. `None` if nothing is left.
    pub(crate) fn release(&self, attribute: &IdPAttribute) -> Option<IdPAttribute> {
        let permitted = self.permitted.get(attribute.id())?;
        let denied = self.denied.get(attribute.id());
        let released = attribute.retain_values(|value| {
            permitted.contains(value) && !denied.map(|d| d.contains(value)).unwrap_or(false)
        });
        if released.is_empty() {
            None
        } else {
            Some(released)
        }
    }
}

/// Ordered attribute rules applied when the requirement rule holds
pub struct AttributeFilterPolicy {
    id: String,
    lifecycle: Lifecycle,
    requirement_rule: Option<Arc<dyn Matcher>>,
    attribute_rules: Vec<AttributeRule>,
}

impl AttributeFilterPolicy {
    pub fn new(id: impl Into<String>) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, "Attribute filter policy")?,
            lifecycle: Lifecycle::new(),
            requirement_rule: None,
            attribute_rules: Vec::new(),
        })
    }

    /// Policy gated by `requirement_rule`
    pub fn with_rules<I>(
        id: impl Into<String>,
        requirement_rule: Arc<dyn Matcher>,
        attribute_rules: I,
    ) -> idp_core::Result<Self>
    where
        I: IntoIterator<Item = AttributeRule>,
    {
        let mut policy = Self::new(id)?;
        policy.set_policy_requirement_rule(requirement_rule)?;
        policy.set_attribute_rules(attribute_rules)?;
        Ok(policy)
    }

    pub fn set_policy_requirement_rule(&mut self, rule: Arc<dyn Matcher>) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.requirement_rule = Some(rule);
        Ok(())
    }

    pub fn set_attribute_rules<I>(&mut self, rules: I) -> idp_core::Result<()>
    where
        I: IntoIterator<Item = AttributeRule>,
    {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.attribute_rules = rules.into_iter().collect();
        Ok(())
    }

    pub fn policy_requirement_rule(&self) -> Option<&Arc<dyn Matcher>> {
        self.requirement_rule.as_ref()
    }

    pub fn attribute_rules(&self) -> &[AttributeRule] {
        &self.attribute_rules
    }

    /// Whether the requirement rule holds. A failed evaluation does not.
    pub fn is_applicable(&self, context: &AttributeFilterContext) -> Result<bool> {
        self.lifecycle.ensure_operational(&self.id)?;

        match self.configured_requirement()?.matches(context)? {
            Tristate::True => Ok(true),
            Tristate::False => Ok(false),
            Tristate::Fail => {
                warn!(
                    "Attribute filter policy '{}': requirement rule failed, policy not applied",
                    self.id
                );
                Ok(false)
            }
        }
    }

    /// Run the attribute rules against the prefiltered attributes. Rules
    /// for attributes not present are skipped.
    pub(crate) fn apply(&self, context: &AttributeFilterContext, decisions: &mut ValueDecisions) -> Result<()> {
        for rule in &self.attribute_rules {
            let Some(attribute_id) = rule.attribute_id() else {
                continue;
            };
            let Some(attribute) = context.prefiltered_attributes().get(attribute_id) else {
                debug!(
                    "Attribute filter policy '{}': rule '{}' targets absent attribute '{}'",
                    self.id,
                    rule.id(),
                    attribute_id
                );
                continue;
            };
            let selected = rule.select(attribute, context)?;
            debug!(
                "Attribute filter policy '{}': {} rule '{}' selected {} of {} value(s) of '{}'",
                self.id,
                if rule.is_deny_rule() { "deny" } else { "permit" },
                rule.id(),
                selected.len(),
                attribute.values().len(),
                attribute_id
            );
            decisions.record(attribute_id, selected, rule.is_deny_rule());
        }
        Ok(())
    }

    fn configured_requirement(&self) -> idp_core::Result<&Arc<dyn Matcher>> {
        self.requirement_rule.as_ref().ok_or_else(|| {
            ComponentError::initialization(format!(
                "Attribute filter policy '{}': no policy requirement rule was configured",
                self.id
            ))
        })
    }
}

impl Component for AttributeFilterPolicy {
    fn id(&self) -> &str {
        &self.id
    }

    fn initialize(&self) -> idp_core::Result<()> {
        self.lifecycle.initialize(&self.id, || {
            self.configured_requirement()?.initialize()?;
            for rule in &self.attribute_rules {
                rule.initialize()?;
            }
            Ok(())
        })
    }

    fn validate(&self) -> idp_core::Result<()> {
        self.lifecycle.validate(&self.id, || {
            self.configured_requirement()?.validate()?;
            for rule in &self.attribute_rules {
                rule.validate()?;
            }
            Ok(())
        })
    }

    fn destroy(&self) {
        self.lifecycle.destroy(&self.id, || {
            if let Some(requirement) = &self.requirement_rule {
                requirement.destroy();
            }
            for rule in &self.attribute_rules {
                rule.destroy();
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

impl fmt::Debug for AttributeFilterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeFilterPolicy")
            .field("id", &self.id)
            .field("requirement_rule", &self.requirement_rule.as_ref().map(|r| r.id().to_string()))
            .field("attribute_rules", &self.attribute_rules)
            .finish()
    }
}
