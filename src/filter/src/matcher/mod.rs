//! Matchers and policy requirement rules
//!
//! One [`Matcher`] trait serves both roles of the filtering engine:
//!
//! - as the value selector of an attribute rule, through
//!   [`Matcher::matching_values`]
//! - as the gate of a filter policy, through [`Matcher::matches`]
//!
//! Runtime failures are not errors: `matching_values` returns `None` and
//! `matches` returns [`Tristate::Fail`]. `Err` is reserved for lifecycle
//! misuse.

pub mod comparison;
pub mod constants;
pub mod logic;
pub mod metadata;
pub mod scripted;

pub use comparison::{Comparison, RegexComparison, StringComparison};
pub use constants::{matcher_fails, matches_all, matches_none, MatcherFails, MatchesAll, MatchesNone};
pub use logic::{AndMatcher, NotMatcher, OrMatcher};
pub use metadata::{AttributeInMetadataMatcher, ScopeMatchesMetadataMatcher};
pub use scripted::{ScriptedMatcher, ScriptedPolicy, ScriptedValues};

use crate::context::AttributeFilterContext;
use crate::error::Result;
use idp_core::types::logic::at_least_one_value_matches;
use idp_core::{require_id, AttributeValue, Component, ComponentError, IdPAttribute, Lifecycle};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Values selected by a matcher
pub type MatchedValues = BTreeSet<AttributeValue>;

/// Outcome of a whole-context evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tristate {
    True,
    False,
    /// The matcher could not be evaluated
    Fail,
}

impl Tristate {
    pub fn is_true(self) -> bool {
        self == Tristate::True
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

/// Value selector and whole-context predicate
pub trait Matcher: Component {
    /// Values of `attribute` accepted by this matcher, or `None` when the
    /// matcher failed to evaluate.
    fn matching_values(
        &self,
        attribute: &IdPAttribute,
        context: &AttributeFilterContext,
    ) -> Result<Option<MatchedValues>>;

    /// Whole-context evaluation. By default true iff some value of some
    /// prefiltered attribute is selected.
    fn matches(&self, context: &AttributeFilterContext) -> Result<Tristate> {
        any_value_selected(self, context)
    }
}

/// True if `matcher` selects a value of some prefiltered attribute; fails if
/// it failed on any attribute and selected nothing.
pub fn any_value_selected<M>(matcher: &M, context: &AttributeFilterContext) -> Result<Tristate>
where
    M: Matcher + ?Sized,
{
    let mut failed = false;
    for attribute in context.prefiltered_attributes().values() {
        match matcher.matching_values(attribute, context)? {
            Some(values) if !values.is_empty() => return Ok(Tristate::True),
            Some(_) => {}
            None => failed = true,
        }
    }
    Ok(if failed { Tristate::Fail } else { Tristate::False })
}

/// Per-value predicate
pub type ValuePredicate = Arc<dyn Fn(&AttributeValue) -> bool + Send + Sync>;

/// Whole-context predicate
pub type ContextPredicate = Arc<dyn Fn(&AttributeFilterContext) -> bool + Send + Sync>;

/// Wrap a closure as a value predicate
pub fn value_predicate<F>(predicate: F) -> ValuePredicate
where
    F: Fn(&AttributeValue) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}

/// Wrap a closure as a context predicate
pub fn context_predicate<F>(predicate: F) -> ContextPredicate
where
    F: Fn(&AttributeFilterContext) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}

/// Lifecycle boilerplate for matchers with `id` and `lifecycle` fields.
/// The type provides `check_config`, `check_health` and `teardown`.
macro_rules! filter_component {
    ($ty:ty) => {
        impl idp_core::Component for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn initialize(&self) -> idp_core::Result<()> {
                self.lifecycle.initialize(&self.id, || self.check_config())
            }

            fn validate(&self) -> idp_core::Result<()> {
                self.lifecycle.validate(&self.id, || self.check_health())
            }

            fn destroy(&self) {
                self.lifecycle.destroy(&self.id, || self.teardown())
            }

            fn is_initialized(&self) -> bool {
                self.lifecycle.is_initialized()
            }

            fn is_destroyed(&self) -> bool {
                self.lifecycle.is_destroyed()
            }
        }
    };
}

pub(crate) use filter_component;

/// Matcher built from exactly one predicate.
///
/// With a value predicate it selects the values that satisfy it and
/// `matches` holds when any prefiltered value does. With a context
/// predicate it selects all values or none, depending on the predicate.
///
/// When a target attribute id is set, the value predicate is applied to
/// that attribute instead: if any of its values matches, every value of the
/// filtered attribute is selected.
pub struct PredicateMatcher {
    id: String,
    lifecycle: Lifecycle,
    value_predicate: Option<ValuePredicate>,
    context_predicate: Option<ContextPredicate>,
    attribute_id: Option<String>,
}

impl PredicateMatcher {
    pub fn new(id: impl Into<String>) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, "Matcher")?,
            lifecycle: Lifecycle::new(),
            value_predicate: None,
            context_predicate: None,
            attribute_id: None,
        })
    }

    pub fn set_value_predicate(&mut self, predicate: ValuePredicate) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.value_predicate = Some(predicate);
        Ok(())
    }

    pub fn set_context_predicate(&mut self, predicate: ContextPredicate) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.context_predicate = Some(predicate);
        Ok(())
    }

    /// Evaluate the value predicate against another attribute
    pub fn set_attribute_id(&mut self, attribute_id: impl Into<String>) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.attribute_id = Some(require_id(attribute_id, "Matcher target attribute")?);
        Ok(())
    }

    pub fn attribute_id(&self) -> Option<&str> {
        self.attribute_id.as_deref()
    }

    fn target_matches(&self, predicate: &ValuePredicate, context: &AttributeFilterContext, target_id: &str) -> bool {
        context
            .prefiltered_attributes()
            .get(target_id)
            .map(|target| at_least_one_value_matches(target, |v| predicate(v)))
            .unwrap_or(false)
    }

    fn check_config(&self) -> idp_core::Result<()> {
        match (&self.value_predicate, &self.context_predicate) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(ComponentError::initialization(format!(
                "Matcher '{}': a value predicate and a context predicate cannot both be set",
                self.id
            ))),
            (None, None) => Err(ComponentError::initialization(format!(
                "Matcher '{}': no predicate was configured",
                self.id
            ))),
        }
    }

    fn check_health(&self) -> idp_core::Result<()> {
        Ok(())
    }

    fn teardown(&self) {}
}

filter_component!(PredicateMatcher);

impl Matcher for PredicateMatcher {
    fn matching_values(
        &self,
        attribute: &IdPAttribute,
        context: &AttributeFilterContext,
    ) -> Result<Option<MatchedValues>> {
        self.lifecycle.ensure_operational(&self.id)?;

        if let Some(predicate) = &self.value_predicate {
            let selected = match &self.attribute_id {
                Some(target_id) if self.target_matches(predicate, context, target_id) => attribute.value_set(),
                Some(_) => MatchedValues::new(),
                None => attribute.values().iter().filter(|v| predicate(*v)).cloned().collect(),
            };
            return Ok(Some(selected));
        }

        if let Some(predicate) = &self.context_predicate {
            let selected = if predicate(context) {
                attribute.value_set()
            } else {
                MatchedValues::new()
            };
            return Ok(Some(selected));
        }

        Ok(None)
    }

    fn matches(&self, context: &AttributeFilterContext) -> Result<Tristate> {
        self.lifecycle.ensure_operational(&self.id)?;

        if let Some(predicate) = &self.context_predicate {
            return Ok(predicate(context).into());
        }

        if let Some(predicate) = &self.value_predicate {
            let hit = match &self.attribute_id {
                Some(target_id) => self.target_matches(predicate, context, target_id),
                None => context
                    .prefiltered_attributes()
                    .values()
                    .any(|attribute| at_least_one_value_matches(attribute, |v| predicate(v))),
            };
            return Ok(hit.into());
        }

        Ok(Tristate::Fail)
    }
}

impl fmt::Debug for PredicateMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateMatcher")
            .field("id", &self.id)
            .field("value_predicate", &self.value_predicate.is_some())
            .field("context_predicate", &self.context_predicate.is_some())
            .field("attribute_id", &self.attribute_id)
            .finish()
    }
}
