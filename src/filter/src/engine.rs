//! Attribute filtering engine
//!
//! Evaluates filter policies in declaration order against an
//! [`AttributeFilterContext`]:
//!
//! 1. Skip policies whose requirement rule does not hold
//! 2. Collect the values each permit rule selects and each deny rule selects
//! 3. Release every prefiltered value that was permitted and never denied
//!
//! Denials are sticky for the whole run: a value denied by any applicable
//! rule is withheld no matter which rules or policies permit it. Attributes
//! no permit rule touches are withheld (default deny), and attributes left
//! without values are omitted.

use crate::context::AttributeFilterContext;
use crate::error::Result;
use crate::policy::{AttributeFilterPolicy, ValueDecisions};
use idp_core::{require_id, Component, ComponentError, Lifecycle};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Filters resolved attributes before release to a requester
#[derive(Debug)]
pub struct AttributeFilter {
    id: String,
    lifecycle: Lifecycle,
    policies: Vec<AttributeFilterPolicy>,
}

impl AttributeFilter {
    pub fn new(id: impl Into<String>) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, "Attribute filter")?,
            lifecycle: Lifecycle::new(),
            policies: Vec::new(),
        })
    }

    /// Filter over `policies`, evaluated in order
    pub fn with_policies<I>(id: impl Into<String>, policies: I) -> idp_core::Result<Self>
    where
        I: IntoIterator<Item = AttributeFilterPolicy>,
    {
        let mut filter = Self::new(id)?;
        filter.set_filter_policies(policies)?;
        Ok(filter)
    }

    pub fn set_filter_policies<I>(&mut self, policies: I) -> idp_core::Result<()>
    where
        I: IntoIterator<Item = AttributeFilterPolicy>,
    {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.policies = policies.into_iter().collect();
        Ok(())
    }

    pub fn filter_policies(&self) -> &[AttributeFilterPolicy] {
        &self.policies
    }

    /// Filter the prefiltered attributes of `context` into its filtered
    /// attributes.
    ///
    /// # Errors
    ///
    /// Lifecycle errors of the filter or any of its components. Matcher
    /// evaluation failures are handled per rule and never abort the run.
    pub fn filter_attributes(&self, context: &mut AttributeFilterContext) -> Result<()> {
        self.lifecycle.ensure_operational(&self.id)?;

        let mut decisions = ValueDecisions::default();
        let mut applied = 0usize;
        for policy in &self.policies {
            if !policy.is_applicable(context)? {
                debug!("Attribute filter '{}': policy '{}' not applicable", self.id, policy.id());
                continue;
            }
            applied += 1;
            policy.apply(context, &mut decisions)?;
        }

        let filtered: Vec<_> = context
            .prefiltered_attributes()
            .values()
            .filter_map(|attribute| decisions.release(attribute))
            .collect();

        debug!(
            "Attribute filter '{}': applied {} of {} policies, released {} of {} attribute(s)",
            self.id,
            applied,
            self.policies.len(),
            filtered.len(),
            context.prefiltered_attributes().len()
        );
        context.set_filtered_attributes(filtered);
        Ok(())
    }
}

impl Component for AttributeFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn initialize(&self) -> idp_core::Result<()> {
        self.lifecycle.initialize(&self.id, || {
            let mut seen = BTreeSet::new();
            for policy in &self.policies {
                if !seen.insert(policy.id()) {
                    return Err(ComponentError::initialization(format!(
                        "Attribute filter '{}': duplicate policy id '{}'",
                        self.id,
                        policy.id()
                    )));
                }
                policy.initialize()?;
            }
            info!(
                "Attribute filter '{}': initialized with {} policies",
                self.id,
                self.policies.len()
            );
            Ok(())
        })
    }

    fn validate(&self) -> idp_core::Result<()> {
        self.lifecycle.validate(&self.id, || {
            for policy in &self.policies {
                policy.validate()?;
            }
            Ok(())
        })
    }

    fn destroy(&self) {
        self.lifecycle.destroy(&self.id, || {
            for policy in &self.policies {
                policy.destroy();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use crate::matcher::{matches_all, Matcher, PredicateMatcher};
    use crate::rule::AttributeRule;
    use idp_core::{AttributeValue, IdPAttribute};
    use std::sync::Arc;

    fn value(expected: &str) -> Arc<dyn Matcher> {
        Arc::new(PredicateMatcher::attribute_value_string(format!("is-{}", expected), expected, true).unwrap())
    }

    fn context() -> AttributeFilterContext {
        AttributeFilterContext::with_prefiltered([
            IdPAttribute::new("affiliation").with_values(["one", "two"]),
            IdPAttribute::new("uid").with_values(["jdoe"]),
        ])
    }

    fn run(policies: Vec<AttributeFilterPolicy>) -> AttributeFilterContext {
        let filter = AttributeFilter::with_policies("filter", policies).unwrap();
        filter.initialize().unwrap();
        let mut ctx = context();
        filter.filter_attributes(&mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_deny_before_permit_in_same_policy() {
        let policy = AttributeFilterPolicy::with_rules(
            "policy",
            matches_all(),
            [
                AttributeRule::deny("denyOne", "affiliation", value("one")).unwrap(),
                AttributeRule::permit("permitAll", "affiliation", matches_all()).unwrap(),
            ],
        )
        .unwrap();

        let ctx = run(vec![policy]);
        assert_eq!(
            ctx.filtered_attributes()["affiliation"].values(),
            &[AttributeValue::string("two")]
        );
    }

    #[test]
    fn test_later_policy_deny_removes_earlier_permit() {
        let permit = AttributeFilterPolicy::with_rules(
            "permit",
            matches_all(),
            [AttributeRule::permit("permitAll", "affiliation", matches_all()).unwrap()],
        )
        .unwrap();
        let deny = AttributeFilterPolicy::with_rules(
            "deny",
            matches_all(),
            [AttributeRule::deny("denyTwo", "affiliation", value("two")).unwrap()],
        )
        .unwrap();

        let ctx = run(vec![permit, deny]);
        assert_eq!(
            ctx.filtered_attributes()["affiliation"].values(),
            &[AttributeValue::string("one")]
        );
    }

    #[test]
    fn test_default_deny_and_empty_omission() {
        let policy = AttributeFilterPolicy::with_rules(
            "policy",
            matches_all(),
            [
                AttributeRule::permit("permitOne", "affiliation", value("one")).unwrap(),
                AttributeRule::deny("denyOne", "affiliation", value("one")).unwrap(),
            ],
        )
        .unwrap();

        let ctx = run(vec![policy]);
        assert!(ctx.filtered_attributes().is_empty());
    }

    #[test]
    fn test_inapplicable_policy_is_skipped() {
        let gate: Arc<dyn Matcher> =
            Arc::new(PredicateMatcher::requester_string("gate", "https://sp.example.org", true).unwrap());
        let policy = AttributeFilterPolicy::with_rules(
            "policy",
            gate,
            [AttributeRule::permit("permitUid", "uid", matches_all()).unwrap()],
        )
        .unwrap();
        let filter = AttributeFilter::with_policies("filter", [policy]).unwrap();
        filter.initialize().unwrap();

        let mut ctx = context();
        filter.filter_attributes(&mut ctx).unwrap();
        assert!(ctx.filtered_attributes().is_empty());

        let mut ctx = context();
        ctx.set_attribute_recipient_id("https://sp.example.org");
        filter.filter_attributes(&mut ctx).unwrap();
        assert_eq!(ctx.filtered_attributes().len(), 1);
        assert!(ctx.filtered_attributes().contains_key("uid"));
    }

    #[test]
    fn test_duplicate_policy_ids_rejected() {
        let a = AttributeFilterPolicy::with_rules("same", matches_all(), Vec::new()).unwrap();
        let b = AttributeFilterPolicy::with_rules("same", matches_all(), Vec::new()).unwrap();
        let filter = AttributeFilter::with_policies("filter", [a, b]).unwrap();
        assert!(matches!(filter.initialize(), Err(ComponentError::Initialization(_))));
    }

    #[test]
    fn test_lifecycle() {
        let policy = AttributeFilterPolicy::with_rules("policy", matches_all(), Vec::new()).unwrap();
        let mut filter = AttributeFilter::with_policies("filter", [policy]).unwrap();
        let mut ctx = context();

        assert!(matches!(
            filter.filter_attributes(&mut ctx),
            Err(FilterError::Component(ComponentError::Uninitialized(_)))
        ));
        assert!(matches!(filter.validate(), Err(ComponentError::Uninitialized(_))));

        filter.initialize().unwrap();
        filter.validate().unwrap();
        assert!(filter.filter_policies()[0].is_initialized());
        assert!(matches!(
            filter.set_filter_policies(Vec::new()),
            Err(ComponentError::Unmodifiable(_))
        ));

        filter.destroy();
        assert!(filter.filter_policies()[0].is_destroyed());
        assert!(matches!(filter.initialize(), Err(ComponentError::Destroyed(_))));
    }
}
