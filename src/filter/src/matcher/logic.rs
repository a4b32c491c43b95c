//! Boolean composition of matchers
//!
//! | Matcher | `matching_values`            | `matches`                      |
//! |---------|------------------------------|--------------------------------|
//! | And     | intersection of children     | all true, short-circuits       |
//! | Or      | union of children            | any true, short-circuits       |
//! | Not     | complement of the child      | negation of the child          |
//!
//! And/Or treat a failing child as selecting nothing (or as false). Not
//! propagates the failure of its child. A composite without children
//! selects nothing.

use super::{filter_component, MatchedValues, Matcher, Tristate};
use crate::context::AttributeFilterContext;
use crate::error::Result;
use idp_core::{require_id, Component, IdPAttribute, Lifecycle};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Shared state of And/Or
struct Composite {
    children: Vec<Arc<dyn Matcher>>,
}

impl Composite {
    fn initialize(&self) -> idp_core::Result<()> {
        for child in &self.children {
            child.initialize()?;
        }
        Ok(())
    }

    fn validate(&self) -> idp_core::Result<()> {
        for child in &self.children {
            child.validate()?;
        }
        Ok(())
    }

    fn destroy(&self) {
        for child in &self.children {
            child.destroy();
        }
    }

    /// Child selections, a failure counting as the empty set
    fn selections(
        &self,
        owner: &str,
        attribute: &IdPAttribute,
        context: &AttributeFilterContext,
    ) -> Result<Vec<MatchedValues>> {
        let mut selections = Vec::with_capacity(self.children.len());
        for child in &self.children {
            match child.matching_values(attribute, context)? {
                Some(values) => selections.push(values),
                None => {
                    debug!(
                        "Matcher '{}': child '{}' failed on attribute '{}', treating as no match",
                        owner,
                        child.id(),
                        attribute.id()
                    );
                    selections.push(MatchedValues::new());
                }
            }
        }
        Ok(selections)
    }
}

macro_rules! composite_matcher {
    ($ty:ident, $doc:literal) => {
        #[doc = $doc]
        pub struct $ty {
            id: String,
            lifecycle: Lifecycle,
            composite: Composite,
        }

        impl $ty {
            pub fn new<I>(id: impl Into<String>, children: I) -> idp_core::Result<Self>
            where
                I: IntoIterator<Item = Arc<dyn Matcher>>,
            {
                Ok(Self {
                    id: require_id(id, "Matcher")?,
                    lifecycle: Lifecycle::new(),
                    composite: Composite {
                        children: children.into_iter().collect(),
                    },
                })
            }

            /// Child matchers, in evaluation order
            pub fn composed_matchers(&self) -> &[Arc<dyn Matcher>] {
                &self.composite.children
            }

            fn check_config(&self) -> idp_core::Result<()> {
                self.composite.initialize()
            }

            fn check_health(&self) -> idp_core::Result<()> {
                self.composite.validate()
            }

            fn teardown(&self) {
                self.composite.destroy()
            }
        }

        filter_component!($ty);

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let children: Vec<&str> = self.composite.children.iter().map(|c| c.id()).collect();
                f.debug_struct(stringify!($ty))
                    .field("id", &self.id)
                    .field("children", &children)
                    .finish()
            }
        }
    };
}

composite_matcher!(AndMatcher, "Selects the values every child selects");
composite_matcher!(OrMatcher, "Selects the values any child selects");

impl Matcher for AndMatcher {
    fn matching_values(
        &self,
        attribute: &IdPAttribute,
        context: &AttributeFilterContext,
    ) -> Result<Option<MatchedValues>> {
        self.lifecycle.ensure_operational(&self.id)?;

        let mut selections = self.composite.selections(&self.id, attribute, context)?.into_iter();
        let Some(mut selected) = selections.next() else {
            return Ok(Some(MatchedValues::new()));
        };
        for other in selections {
            selected.retain(|value| other.contains(value));
        }
        Ok(Some(selected))
    }

    fn matches(&self, context: &AttributeFilterContext) -> Result<Tristate> {
        self.lifecycle.ensure_operational(&self.id)?;

        if self.composite.children.is_empty() {
            return Ok(Tristate::False);
        }
        for child in &self.composite.children {
            if !child.matches(context)?.is_true() {
                return Ok(Tristate::False);
            }
        }
        Ok(Tristate::True)
    }
}

impl Matcher for OrMatcher {
    fn matching_values(
        &self,
        attribute: &IdPAttribute,
        context: &AttributeFilterContext,
    ) -> Result<Option<MatchedValues>> {
        self.lifecycle.ensure_operational(&self.id)?;

        let selected = self
            .composite
            .selections(&self.id, attribute, context)?
            .into_iter()
            .flatten()
            .collect();
        Ok(Some(selected))
    }

    fn matches(&self, context: &AttributeFilterContext) -> Result<Tristate> {
        self.lifecycle.ensure_operational(&self.id)?;

        for child in &self.composite.children {
            if child.matches(context)?.is_true() {
                return Ok(Tristate::True);
            }
        }
        Ok(Tristate::False)
    }
}

/// Selects the values its child rejects
pub struct NotMatcher {
    id: String,
    lifecycle: Lifecycle,
    child: Arc<dyn Matcher>,
}

impl NotMatcher {
    pub fn new(id: impl Into<String>, child: Arc<dyn Matcher>) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, "Matcher")?,
            lifecycle: Lifecycle::new(),
            child,
        })
    }

    pub fn negated_matcher(&self) -> &Arc<dyn Matcher> {
        &self.child
    }

    fn check_config(&self) -> idp_core::Result<()> {
        self.child.initialize()
    }

    fn check_health(&self) -> idp_core::Result<()> {
        self.child.validate()
    }

    fn teardown(&self) {
        self.child.destroy();
    }
}

filter_component!(NotMatcher);

impl Matcher for NotMatcher {
    fn matching_values(
        &self,
        attribute: &IdPAttribute,
        context: &AttributeFilterContext,
    ) -> Result<Option<MatchedValues>> {
        self.lifecycle.ensure_operational(&self.id)?;

        let Some(rejected) = self.child.matching_values(attribute, context)? else {
            return Ok(None);
        };
        Ok(Some(
            attribute
                .values()
                .iter()
                .filter(|value| !rejected.contains(*value))
                .cloned()
                .collect(),
        ))
    }

    fn matches(&self, context: &AttributeFilterContext) -> Result<Tristate> {
        self.lifecycle.ensure_operational(&self.id)?;

        Ok(match self.child.matches(context)? {
            Tristate::True => Tristate::False,
            Tristate::False => Tristate::True,
            Tristate::Fail => Tristate::Fail,
        })
    }
}

impl fmt::Debug for NotMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotMatcher")
            .field("id", &self.id)
            .field("child", &self.child.id())
            .finish()
    }
}
