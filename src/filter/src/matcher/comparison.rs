//! String and regex leaf matchers
//!
//! Value-style matchers test attribute values (or their scopes); policy-style
//! matchers test a request parameter such as the requester or the principal
//! name. All are [`PredicateMatcher`]s.

use super::{context_predicate, value_predicate, PredicateMatcher};
use crate::context::AttributeFilterContext;
use idp_core::types::logic::string_value_matches;
use idp_core::{AttributeValue, ComponentError};
use regex::{Regex, RegexBuilder};

/// Test applied to a candidate string
pub trait Comparison: Send + Sync + 'static {
    fn test(&self, candidate: &str) -> bool;
}

/// Literal comparison, optionally ignoring case
#[derive(Debug, Clone)]
pub struct StringComparison {
    expected: String,
    case_sensitive: bool,
}

impl StringComparison {
    pub fn new(expected: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            expected: expected.into(),
            case_sensitive,
        }
    }
}

impl Comparison for StringComparison {
    fn test(&self, candidate: &str) -> bool {
        if self.case_sensitive {
            candidate == self.expected
        } else {
            candidate.to_lowercase() == self.expected.to_lowercase()
        }
    }
}

/// Regular expression that must match the whole candidate
#[derive(Debug, Clone)]
pub struct RegexComparison {
    regex: Regex,
}

impl RegexComparison {
    pub fn new(pattern: &str) -> idp_core::Result<Self> {
        let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .build()
            .map_err(|e| ComponentError::constraint(format!("invalid regular expression '{}': {}", pattern, e)))?;
        Ok(Self { regex })
    }
}

impl Comparison for RegexComparison {
    fn test(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

impl PredicateMatcher {
    /// Selects string values equal to `expected`
    pub fn attribute_value_string(
        id: impl Into<String>,
        expected: impl Into<String>,
        case_sensitive: bool,
    ) -> idp_core::Result<Self> {
        Self::on_value(id, StringComparison::new(expected, case_sensitive))
    }

    /// Selects string values matching `pattern`
    pub fn attribute_value_regex(id: impl Into<String>, pattern: &str) -> idp_core::Result<Self> {
        Self::on_value(id, RegexComparison::new(pattern)?)
    }

    /// Selects scoped values whose scope equals `scope`
    pub fn attribute_scope_string(
        id: impl Into<String>,
        scope: impl Into<String>,
        case_sensitive: bool,
    ) -> idp_core::Result<Self> {
        Self::on_scope(id, StringComparison::new(scope, case_sensitive))
    }

    /// Selects scoped values whose scope matches `pattern`
    pub fn attribute_scope_regex(id: impl Into<String>, pattern: &str) -> idp_core::Result<Self> {
        Self::on_scope(id, RegexComparison::new(pattern)?)
    }

    pub fn requester_string(
        id: impl Into<String>,
        requester: impl Into<String>,
        case_sensitive: bool,
    ) -> idp_core::Result<Self> {
        Self::on_context(
            id,
            StringComparison::new(requester, case_sensitive),
            AttributeFilterContext::attribute_recipient_id,
        )
    }

    pub fn requester_regex(id: impl Into<String>, pattern: &str) -> idp_core::Result<Self> {
        Self::on_context(id, RegexComparison::new(pattern)?, AttributeFilterContext::attribute_recipient_id)
    }

    pub fn issuer_string(id: impl Into<String>, issuer: impl Into<String>, case_sensitive: bool) -> idp_core::Result<Self> {
        Self::on_context(
            id,
            StringComparison::new(issuer, case_sensitive),
            AttributeFilterContext::attribute_issuer_id,
        )
    }

    pub fn principal_name_string(
        id: impl Into<String>,
        principal: impl Into<String>,
        case_sensitive: bool,
    ) -> idp_core::Result<Self> {
        Self::on_context(
            id,
            StringComparison::new(principal, case_sensitive),
            AttributeFilterContext::principal,
        )
    }

    pub fn principal_name_regex(id: impl Into<String>, pattern: &str) -> idp_core::Result<Self> {
        Self::on_context(id, RegexComparison::new(pattern)?, AttributeFilterContext::principal)
    }

    pub fn authentication_method_string(
        id: impl Into<String>,
        method: impl Into<String>,
        case_sensitive: bool,
    ) -> idp_core::Result<Self> {
        Self::on_context(
            id,
            StringComparison::new(method, case_sensitive),
            AttributeFilterContext::principal_authentication_method,
        )
    }

    fn on_value<C: Comparison>(id: impl Into<String>, comparison: C) -> idp_core::Result<Self> {
        let mut matcher = Self::new(id)?;
        matcher.set_value_predicate(value_predicate(string_value_matches(move |s| comparison.test(s))))?;
        Ok(matcher)
    }

    fn on_scope<C: Comparison>(id: impl Into<String>, comparison: C) -> idp_core::Result<Self> {
        let mut matcher = Self::new(id)?;
        matcher.set_value_predicate(value_predicate(move |value: &AttributeValue| {
            value.scope().map(|scope| comparison.test(scope)).unwrap_or(false)
        }))?;
        Ok(matcher)
    }

    fn on_context<C, F>(id: impl Into<String>, comparison: C, select: F) -> idp_core::Result<Self>
    where
        C: Comparison,
        F: Fn(&AttributeFilterContext) -> Option<&str> + Send + Sync + 'static,
    {
        let mut matcher = Self::new(id)?;
        matcher.set_context_predicate(context_predicate(move |context| {
            select(context).map(|candidate| comparison.test(candidate)).unwrap_or(false)
        }))?;
        Ok(matcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchedValues, Matcher, Tristate};
    use idp_core::{Component, IdPAttribute};

    fn context() -> AttributeFilterContext {
        let mut context = AttributeFilterContext::with_prefiltered([
            IdPAttribute::new("affiliation").with_values(["member", "Staff"]),
            IdPAttribute::new("eppn").with_values([
                AttributeValue::scoped("jdoe", "example.org"),
                AttributeValue::scoped("jdoe", "partner.net"),
            ]),
        ]);
        context.set_principal("jdoe");
        context.set_attribute_recipient_id("https://sp.example.org/shibboleth");
        context.set_attribute_issuer_id("https://idp.example.org/idp");
        context.set_principal_authentication_method("urn:oasis:names:tc:SAML:2.0:ac:classes:Password");
        context
    }

    fn select(matcher: PredicateMatcher, attribute_id: &str) -> MatchedValues {
        matcher.initialize().unwrap();
        let ctx = context();
        matcher
            .matching_values(&ctx.prefiltered_attributes()[attribute_id], &ctx)
            .unwrap()
            .unwrap()
    }

    fn gate(matcher: PredicateMatcher) -> Tristate {
        matcher.initialize().unwrap();
        matcher.matches(&context()).unwrap()
    }

    #[test]
    fn test_value_string_case_handling() {
        let sensitive = PredicateMatcher::attribute_value_string("m", "staff", true).unwrap();
        assert!(select(sensitive, "affiliation").is_empty());

        let insensitive = PredicateMatcher::attribute_value_string("m", "staff", false).unwrap();
        assert_eq!(
            select(insensitive, "affiliation"),
            MatchedValues::from([AttributeValue::string("Staff")])
        );
    }

    #[test]
    fn test_value_regex_is_anchored() {
        let partial = PredicateMatcher::attribute_value_regex("m", "mem").unwrap();
        assert!(select(partial, "affiliation").is_empty());

        let full = PredicateMatcher::attribute_value_regex("m", "mem.*").unwrap();
        assert_eq!(select(full, "affiliation").len(), 1);

        assert!(matches!(
            PredicateMatcher::attribute_value_regex("m", "("),
            Err(ComponentError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_scope_matchers() {
        let string = PredicateMatcher::attribute_scope_string("m", "example.org", true).unwrap();
        assert_eq!(
            select(string, "eppn"),
            MatchedValues::from([AttributeValue::scoped("jdoe", "example.org")])
        );

        let regex = PredicateMatcher::attribute_scope_regex("m", r".*\.(org|net)").unwrap();
        assert_eq!(select(regex, "eppn").len(), 2);

        // unscoped values never match
        let any = PredicateMatcher::attribute_scope_regex("m", ".*").unwrap();
        assert!(select(any, "affiliation").is_empty());
    }

    #[test]
    fn test_value_string_compares_local_part_of_scoped_values() {
        let matcher = PredicateMatcher::attribute_value_string("m", "jdoe", true).unwrap();
        assert_eq!(select(matcher, "eppn").len(), 2);
    }

    #[test]
    fn test_policy_style_matchers() {
        assert_eq!(
            gate(PredicateMatcher::requester_string("r", "https://sp.example.org/shibboleth", true).unwrap()),
            Tristate::True
        );
        assert_eq!(
            gate(PredicateMatcher::requester_string("r", "HTTPS://SP.EXAMPLE.ORG/SHIBBOLETH", true).unwrap()),
            Tristate::False
        );
        assert_eq!(
            gate(PredicateMatcher::requester_regex("r", r"https://sp\.example\.org/.*").unwrap()),
            Tristate::True
        );
        assert_eq!(
            gate(PredicateMatcher::issuer_string("i", "https://idp.example.org/idp", true).unwrap()),
            Tristate::True
        );
        assert_eq!(
            gate(PredicateMatcher::principal_name_string("p", "JDOE", false).unwrap()),
            Tristate::True
        );
        assert_eq!(
            gate(PredicateMatcher::principal_name_regex("p", "j.*").unwrap()),
            Tristate::True
        );
        assert_eq!(
            gate(PredicateMatcher::authentication_method_string("a", "urn:example:mfa", true).unwrap()),
            Tristate::False
        );
    }

    #[test]
    fn test_policy_style_selects_all_values() {
        let matcher = PredicateMatcher::requester_string("r", "https://sp.example.org/shibboleth", true).unwrap();
        assert_eq!(select(matcher, "affiliation").len(), 2);
    }

    #[test]
    fn test_missing_request_parameter_never_matches() {
        let matcher = PredicateMatcher::principal_name_regex("p", ".*").unwrap();
        matcher.initialize().unwrap();
        let empty = AttributeFilterContext::new();
        assert_eq!(matcher.matches(&empty).unwrap(), Tristate::False);
    }
}
