//! Filter engine scenarios and algebraic properties

use idp_attribute_filter::matcher::{
    matcher_fails, matches_all, matches_none, value_predicate, AndMatcher, NotMatcher, OrMatcher,
};
use idp_attribute_filter::{
    AttributeFilter, AttributeFilterContext, AttributeFilterPolicy, AttributeRule, FilterError, MatchedValues,
    Matcher, PredicateMatcher,
};
use idp_core::{AttributeValue, Component, ComponentError, IdPAttribute};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn string_matcher(id: &str, expected: &str) -> Arc<dyn Matcher> {
    Arc::new(PredicateMatcher::attribute_value_string(id, expected, true).unwrap())
}

/// Selects string values contained in `accepted`
fn one_of(id: &str, accepted: BTreeSet<String>) -> Arc<dyn Matcher> {
    let mut matcher = PredicateMatcher::new(id).unwrap();
    matcher
        .set_value_predicate(value_predicate(move |v| {
            v.string_value().map(|s| accepted.contains(s)).unwrap_or(false)
        }))
        .unwrap();
    Arc::new(matcher)
}

fn strings(values: &[&str]) -> MatchedValues {
    values.iter().map(|s| AttributeValue::string(*s)).collect()
}

fn filter(policies: Vec<AttributeFilterPolicy>, attributes: Vec<IdPAttribute>) -> AttributeFilterContext {
    let filter = AttributeFilter::with_policies("filter", policies).unwrap();
    filter.initialize().unwrap();
    let mut context = AttributeFilterContext::with_prefiltered(attributes);
    filter.filter_attributes(&mut context).unwrap();
    context
}

fn released(context: &AttributeFilterContext, id: &str) -> Vec<String> {
    context
        .filtered_attributes()
        .get(id)
        .map(|a| a.values().iter().map(ToString::to_string).collect())
        .unwrap_or_default()
}

// ============================================================================
// MATCHER COMPOSITION
// ============================================================================

#[test]
fn test_composition_over_three_values() {
    let attribute = IdPAttribute::new("numbers").with_values(["one", "two", "three"]);
    let context = AttributeFilterContext::with_prefiltered([attribute.clone()]);

    let and = AndMatcher::new("and", [string_matcher("m1", "one"), string_matcher("m2", "two")]).unwrap();
    let or = OrMatcher::new("or", [string_matcher("m1", "one"), string_matcher("m2", "two")]).unwrap();
    let not = NotMatcher::new("not", string_matcher("m1", "one")).unwrap();

    and.initialize().unwrap();
    or.initialize().unwrap();
    not.initialize().unwrap();

    assert_eq!(and.matching_values(&attribute, &context).unwrap(), Some(strings(&[])));
    assert_eq!(or.matching_values(&attribute, &context).unwrap(), Some(strings(&["one", "two"])));
    assert_eq!(not.matching_values(&attribute, &context).unwrap(), Some(strings(&["two", "three"])));
}

#[test]
fn test_nested_composition_as_policy_gate() {
    // (requester is sp1 OR requester is sp2) AND NOT principal is "guest"
    let requester = OrMatcher::new(
        "requester",
        [
            Arc::new(PredicateMatcher::requester_string("sp1", "https://sp1.example.org", true).unwrap())
                as Arc<dyn Matcher>,
            Arc::new(PredicateMatcher::requester_string("sp2", "https://sp2.example.org", true).unwrap()),
        ],
    )
    .unwrap();
    let not_guest = NotMatcher::new(
        "notGuest",
        Arc::new(PredicateMatcher::principal_name_string("guest", "guest", true).unwrap()),
    )
    .unwrap();
    let gate: Arc<dyn Matcher> = Arc::new(
        AndMatcher::new("gate", [Arc::new(requester) as Arc<dyn Matcher>, Arc::new(not_guest)]).unwrap(),
    );

    let policy = AttributeFilterPolicy::with_rules(
        "policy",
        gate,
        [AttributeRule::permit("releaseMail", "mail", matches_all()).unwrap()],
    )
    .unwrap();
    let filter = AttributeFilter::with_policies("filter", [policy]).unwrap();
    filter.initialize().unwrap();

    let run = |requester: &str, principal: &str| {
        let mut context =
            AttributeFilterContext::with_prefiltered([IdPAttribute::new("mail").with_values(["jdoe@example.org"])]);
        context.set_attribute_recipient_id(requester);
        context.set_principal(principal);
        filter.filter_attributes(&mut context).unwrap();
        context.filtered_attributes().contains_key("mail")
    };

    assert!(run("https://sp1.example.org", "jdoe"));
    assert!(run("https://sp2.example.org", "jdoe"));
    assert!(!run("https://sp3.example.org", "jdoe"));
    assert!(!run("https://sp1.example.org", "guest"));
}

// ============================================================================
// POLICY EVALUATION
// ============================================================================

#[test]
fn test_deny_overrides_permit_in_rule_order() {
    let policy = AttributeFilterPolicy::with_rules(
        "policy",
        matches_all(),
        [
            AttributeRule::deny("denyOne", "numbers", string_matcher("one", "one")).unwrap(),
            AttributeRule::permit("permitAll", "numbers", matches_all()).unwrap(),
        ],
    )
    .unwrap();

    let context = filter(vec![policy], vec![IdPAttribute::new("numbers").with_values(["one", "two"])]);
    assert_eq!(released(&context, "numbers"), vec!["two"]);
}

#[test]
fn test_default_deny() {
    let policy = AttributeFilterPolicy::with_rules(
        "policy",
        matches_all(),
        [AttributeRule::permit("permitUid", "uid", matches_all()).unwrap()],
    )
    .unwrap();

    let context = filter(
        vec![policy],
        vec![
            IdPAttribute::new("uid").with_values(["jdoe"]),
            IdPAttribute::new("mail").with_values(["jdoe@example.org"]),
        ],
    );
    assert_eq!(released(&context, "uid"), vec!["jdoe"]);
    assert!(!context.filtered_attributes().contains_key("mail"));
}

#[test]
fn test_permits_accumulate_across_policies() {
    let first = AttributeFilterPolicy::with_rules(
        "first",
        matches_all(),
        [AttributeRule::permit("permitOne", "numbers", string_matcher("one", "one")).unwrap()],
    )
    .unwrap();
    let second = AttributeFilterPolicy::with_rules(
        "second",
        matches_all(),
        [AttributeRule::permit("permitThree", "numbers", string_matcher("three", "three")).unwrap()],
    )
    .unwrap();
    let skipped = AttributeFilterPolicy::with_rules(
        "skipped",
        matches_none(),
        [AttributeRule::permit("permitAll", "numbers", matches_all()).unwrap()],
    )
    .unwrap();

    let context = filter(
        vec![first, second, skipped],
        vec![IdPAttribute::new("numbers").with_values(["one", "two", "three"])],
    );
    assert_eq!(released(&context, "numbers"), vec!["one", "three"]);
}

#[test]
fn test_failing_matchers_in_rules_and_gates() {
    let failing_gate = AttributeFilterPolicy::with_rules(
        "failingGate",
        matcher_fails(),
        [AttributeRule::permit("permitAll", "numbers", matches_all()).unwrap()],
    )
    .unwrap();
    let context = filter(vec![failing_gate], vec![IdPAttribute::new("numbers").with_values(["one"])]);
    assert!(context.filtered_attributes().is_empty());

    let failing_deny = AttributeFilterPolicy::with_rules(
        "failingDeny",
        matches_all(),
        [
            AttributeRule::permit("permitAll", "numbers", matches_all()).unwrap(),
            AttributeRule::deny("denyBroken", "numbers", matcher_fails()).unwrap(),
            AttributeRule::permit("permitUid", "uid", matches_all()).unwrap(),
        ],
    )
    .unwrap();
    let context = filter(
        vec![failing_deny],
        vec![
            IdPAttribute::new("numbers").with_values(["one"]),
            IdPAttribute::new("uid").with_values(["jdoe"]),
        ],
    );
    assert!(!context.filtered_attributes().contains_key("numbers"));
    assert_eq!(released(&context, "uid"), vec!["jdoe"]);
}

#[test]
fn test_filtering_preserves_value_order() {
    let policy = AttributeFilterPolicy::with_rules(
        "policy",
        matches_all(),
        [AttributeRule::permit(
            "permitSome",
            "letters",
            one_of("some", ["d", "b", "a"].iter().map(|s| s.to_string()).collect()),
        )
        .unwrap()],
    )
    .unwrap();

    let context = filter(vec![policy], vec![IdPAttribute::new("letters").with_values(["d", "c", "b", "a"])]);
    assert_eq!(released(&context, "letters"), vec!["d", "b", "a"]);
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_lifecycle_guard_matrix() {
    let attribute = IdPAttribute::new("a").with_values(["x"]);
    let context = AttributeFilterContext::with_prefiltered([attribute.clone()]);

    let uninitialized: Vec<Arc<dyn Matcher>> = vec![
        Arc::new(PredicateMatcher::attribute_value_string("s", "x", true).unwrap()),
        Arc::new(AndMatcher::new("and", [matches_all()]).unwrap()),
        Arc::new(OrMatcher::new("or", [matches_all()]).unwrap()),
        Arc::new(NotMatcher::new("not", matches_none()).unwrap()),
    ];

    for matcher in &uninitialized {
        assert!(matches!(
            matcher.matching_values(&attribute, &context),
            Err(FilterError::Component(ComponentError::Uninitialized(_)))
        ));
        assert!(matches!(
            matcher.matches(&context),
            Err(FilterError::Component(ComponentError::Uninitialized(_)))
        ));

        matcher.initialize().unwrap();
        matcher.destroy();
        assert!(matches!(matcher.initialize(), Err(ComponentError::Destroyed(_))));
        assert!(matches!(
            matcher.matches(&context),
            Err(FilterError::Component(ComponentError::Destroyed(_)))
        ));
    }

    let mut policy = AttributeFilterPolicy::with_rules("policy", matches_all(), Vec::new()).unwrap();
    policy.initialize().unwrap();
    assert!(matches!(
        policy.set_policy_requirement_rule(matches_none()),
        Err(ComponentError::Unmodifiable(_))
    ));
    assert!(matches!(
        policy.set_attribute_rules(Vec::new()),
        Err(ComponentError::Unmodifiable(_))
    ));
    policy.destroy();
    assert!(matches!(policy.initialize(), Err(ComponentError::Destroyed(_))));
}

#[test]
fn test_validation_failure_does_not_uninitialize() {
    let filter = AttributeFilter::with_policies(
        "filter",
        [AttributeFilterPolicy::with_rules("policy", matches_all(), Vec::new()).unwrap()],
    )
    .unwrap();
    filter.initialize().unwrap();

    filter.filter_policies()[0].destroy();
    assert!(filter.validate().is_err());
    assert!(filter.is_initialized());
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test]
async fn test_shared_filter_across_requests() {
    let gate: Arc<dyn Matcher> =
        Arc::new(PredicateMatcher::requester_regex("gate", r"https://sp[0-9]\.example\.org").unwrap());
    let policy = AttributeFilterPolicy::with_rules(
        "policy",
        gate,
        [AttributeRule::permit("permitMail", "mail", matches_all()).unwrap()],
    )
    .unwrap();
    let filter = Arc::new(AttributeFilter::with_policies("filter", [policy]).unwrap());
    filter.initialize().unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..16 {
        let filter = Arc::clone(&filter);
        tasks.spawn_blocking(move || {
            let mut context =
                AttributeFilterContext::with_prefiltered([IdPAttribute::new("mail").with_values(["jdoe@example.org"])]);
            let requester = if i % 2 == 0 {
                format!("https://sp{}.example.org", i % 10)
            } else {
                "https://other.example.org".to_string()
            };
            context.set_attribute_recipient_id(requester);
            filter.filter_attributes(&mut context).unwrap();
            (i, context.filtered_attributes().contains_key("mail"))
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (i, released) = joined.unwrap();
        assert_eq!(released, i % 2 == 0);
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn value_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-f]", 0..6)
}

proptest! {
    #[test]
    fn prop_filtered_is_subset_of_prefiltered(
        values in prop::collection::vec("[a-f]", 1..8),
        permitted in value_set(),
        denied in value_set(),
    ) {
        let policy = AttributeFilterPolicy::with_rules(
            "policy",
            matches_all(),
            [
                AttributeRule::permit("permit", "letters", one_of("p", permitted.clone())).unwrap(),
                AttributeRule::deny("deny", "letters", one_of("d", denied.clone())).unwrap(),
            ],
        )
        .unwrap();

        let attribute = IdPAttribute::new("letters").with_values(values.clone());
        let context = filter(vec![policy], vec![attribute.clone()]);

        let original: Vec<String> = attribute.values().iter().map(ToString::to_string).collect();
        let out = released(&context, "letters");

        // subsequence of the prefiltered values
        let mut remaining = original.iter();
        for value in &out {
            prop_assert!(remaining.any(|v| v == value));
        }
        for value in &out {
            prop_assert!(permitted.contains(value));
            prop_assert!(!denied.contains(value));
        }
        let expected: Vec<String> = original
            .iter()
            .filter(|v| permitted.contains(*v) && !denied.contains(*v))
            .cloned()
            .collect();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn prop_deny_wins_regardless_of_policy_order(
        values in prop::collection::vec("[a-f]", 1..8),
        denied in value_set(),
        deny_first in any::<bool>(),
    ) {
        let permit = AttributeFilterPolicy::with_rules(
            "permit",
            matches_all(),
            [AttributeRule::permit("permitAll", "letters", matches_all()).unwrap()],
        )
        .unwrap();
        let deny = AttributeFilterPolicy::with_rules(
            "deny",
            matches_all(),
            [AttributeRule::deny("denySome", "letters", one_of("d", denied.clone())).unwrap()],
        )
        .unwrap();
        let policies = if deny_first { vec![deny, permit] } else { vec![permit, deny] };

        let context = filter(policies, vec![IdPAttribute::new("letters").with_values(values)]);
        for value in released(&context, "letters") {
            prop_assert!(!denied.contains(&value));
        }
        if let Some(attribute) = context.filtered_attributes().get("letters") {
            prop_assert!(!attribute.is_empty());
        }
    }

    #[test]
    fn prop_and_is_subset_of_or(
        values in prop::collection::vec("[a-f]", 0..8),
        left in value_set(),
        right in value_set(),
    ) {
        let attribute = IdPAttribute::new("letters").with_values(values);
        let context = AttributeFilterContext::with_prefiltered([attribute.clone()]);

        let and = AndMatcher::new("and", [one_of("l", left.clone()), one_of("r", right.clone())]).unwrap();
        let or = OrMatcher::new("or", [one_of("l", left), one_of("r", right)]).unwrap();
        and.initialize().unwrap();
        or.initialize().unwrap();

        let and_values = and.matching_values(&attribute, &context).unwrap().unwrap();
        let or_values = or.matching_values(&attribute, &context).unwrap().unwrap();
        prop_assert!(and_values.is_subset(&or_values));
        prop_assert!(or_values.is_subset(&attribute.value_set()));
    }
}
