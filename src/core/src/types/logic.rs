//! Predicate helpers over attribute values

use super::attribute::IdPAttribute;
use super::value::AttributeValue;

/// True if at least one value satisfies `predicate`
pub fn at_least_one_value_matches<P>(attribute: &IdPAttribute, predicate: P) -> bool
where
    P: Fn(&AttributeValue) -> bool,
{
    attribute.values().iter().any(predicate)
}

/// True if every value satisfies `predicate` (vacuously true for no values)
pub fn all_values_match<P>(attribute: &IdPAttribute, predicate: P) -> bool
where
    P: Fn(&AttributeValue) -> bool,
{
    attribute.values().iter().all(predicate)
}

/// Lift a string predicate to a value predicate. Values without a string
/// form never match.
pub fn string_value_matches<P>(predicate: P) -> impl Fn(&AttributeValue) -> bool
where
    P: Fn(&str) -> bool,
{
    move |value| value.string_value().map(&predicate).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_logic() {
        let one = IdPAttribute::new("oneVal").with_values(["one"]);
        let two = IdPAttribute::new("twoVals").with_values(["one", "two"]);
        let three = IdPAttribute::new("threeVals").with_values(["one", "two", "three"]);

        let match_two = string_value_matches(|s| s == "two");
        assert!(!at_least_one_value_matches(&one, &match_two));
        assert!(at_least_one_value_matches(&two, &match_two));
        assert!(at_least_one_value_matches(&three, &match_two));

        let match_both = string_value_matches(|s| s == "one" || s == "two");
        assert!(all_values_match(&one, &match_both));
        assert!(all_values_match(&two, &match_both));
        assert!(!all_values_match(&three, &match_both));
    }

    #[test]
    fn test_non_string_values_never_match() {
        let attr = IdPAttribute::new("photo").with_values([AttributeValue::bytes(vec![0x01])]);
        assert!(!at_least_one_value_matches(&attr, string_value_matches(|_| true)));
    }
}
