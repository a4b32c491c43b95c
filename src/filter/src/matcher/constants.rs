//! Stateless matchers with fixed outcomes

use super::{MatchedValues, Matcher, Tristate};
use crate::context::AttributeFilterContext;
use crate::error::Result;
use idp_core::{Component, IdPAttribute};
use std::sync::Arc;

macro_rules! constant_matcher {
    ($ty:ident, $id:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $ty;

        impl Component for $ty {
            fn id(&self) -> &str {
                $id
            }

            fn initialize(&self) -> idp_core::Result<()> {
                Ok(())
            }

            fn validate(&self) -> idp_core::Result<()> {
                Ok(())
            }

            fn destroy(&self) {}

            fn is_initialized(&self) -> bool {
                true
            }

            fn is_destroyed(&self) -> bool {
                false
            }
        }
    };
}

constant_matcher!(MatchesAll, "MATCHES_ALL", "Selects every value; always true");
constant_matcher!(MatchesNone, "MATCHES_NONE", "Selects nothing; always false");
constant_matcher!(MatcherFails, "MATCHER_FAILS", "Always fails to evaluate");

impl Matcher for MatchesAll {
    fn matching_values(&self, attribute: &IdPAttribute, _context: &AttributeFilterContext) -> Result<Option<MatchedValues>> {
        Ok(Some(attribute.value_set()))
    }

    fn matches(&self, _context: &AttributeFilterContext) -> Result<Tristate> {
        Ok(Tristate::True)
    }
}

impl Matcher for MatchesNone {
    fn matching_values(&self, _attribute: &IdPAttribute, _context: &AttributeFilterContext) -> Result<Option<MatchedValues>> {
        Ok(Some(MatchedValues::new()))
    }

    fn matches(&self, _context: &AttributeFilterContext) -> Result<Tristate> {
        Ok(Tristate::False)
    }
}

impl Matcher for MatcherFails {
    fn matching_values(&self, _attribute: &IdPAttribute, _context: &AttributeFilterContext) -> Result<Option<MatchedValues>> {
        Ok(None)
    }

    fn matches(&self, _context: &AttributeFilterContext) -> Result<Tristate> {
        Ok(Tristate::Fail)
    }
}

pub fn matches_all() -> Arc<dyn Matcher> {
    Arc::new(MatchesAll)
}

pub fn matches_none() -> Arc<dyn Matcher> {
    Arc::new(MatchesNone)
}

pub fn matcher_fails() -> Arc<dyn Matcher> {
    Arc::new(MatcherFails)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        let ctx = AttributeFilterContext::new();
        let attribute = IdPAttribute::new("a").with_values(["one", "two"]);

        assert_eq!(matches_all().matching_values(&attribute, &ctx).unwrap().unwrap().len(), 2);
        assert!(matches_none().matching_values(&attribute, &ctx).unwrap().unwrap().is_empty());
        assert!(matcher_fails().matching_values(&attribute, &ctx).unwrap().is_none());

        assert_eq!(matches_all().matches(&ctx).unwrap(), Tristate::True);
        assert_eq!(matches_none().matches(&ctx).unwrap(), Tristate::False);
        assert_eq!(matcher_fails().matches(&ctx).unwrap(), Tristate::Fail);
        assert_eq!(matches_all().id(), "MATCHES_ALL");
    }
}
