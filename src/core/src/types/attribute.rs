//! Identity attribute

use super::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

/// An identity attribute: an id plus zero or more values.
///
/// Equality, ordering and hashing use the id only. Two attributes with the
/// same id but different values are "the same attribute" for resolution
/// bookkeeping; compare [`values()`](Self::values) explicitly when the
/// content matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdPAttribute {
    id: String,

    #[serde(default)]
    values: Vec<AttributeValue>,

    /// Localized display names (language tag → name)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    display_names: BTreeMap<String, String>,

    /// Localized descriptions (language tag → text)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    display_descriptions: BTreeMap<String, String>,
}

impl IdPAttribute {
    /// Create an attribute with no values
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            values: Vec::new(),
            display_names: BTreeMap::new(),
            display_descriptions: BTreeMap::new(),
        }
    }

    /// Builder-style variant of [`set_values`](Self::set_values)
    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        self.set_values(values);
        self
    }

    /// Attribute id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Values in insertion order, without duplicates
    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// Values as an ordered set
    pub fn value_set(&self) -> BTreeSet<AttributeValue> {
        self.values.iter().cloned().collect()
    }

    /// Replace all values. Duplicates are dropped, first occurrence wins.
    pub fn set_values<I, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        self.values.clear();
        for value in values {
            self.add_value(value);
        }
    }

    /// Append a value; returns false if it was already present
    pub fn add_value(&mut self, value: impl Into<AttributeValue>) -> bool {
        let value = value.into();
        if self.values.contains(&value) {
            return false;
        }
        self.values.push(value);
        true
    }

    /// Whether the attribute has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Localized display names
    pub fn display_names(&self) -> &BTreeMap<String, String> {
        &self.display_names
    }

    /// Set the display name for a language
    pub fn set_display_name(&mut self, lang: impl Into<String>, name: impl Into<String>) {
        self.display_names.insert(lang.into(), name.into());
    }

    /// Localized descriptions
    pub fn display_descriptions(&self) -> &BTreeMap<String, String> {
        &self.display_descriptions
    }

    /// Set the description for a language
    pub fn set_display_description(&mut self, lang: impl Into<String>, text: impl Into<String>) {
        self.display_descriptions.insert(lang.into(), text.into());
    }

    /// Copy of this attribute keeping only the values accepted by `keep`,
    /// in their original order
    pub fn retain_values<F>(&self, mut keep: F) -> IdPAttribute
    where
        F: FnMut(&AttributeValue) -> bool,
    {
        let mut copy = IdPAttribute {
            id: self.id.clone(),
            values: Vec::with_capacity(self.values.len()),
            display_names: self.display_names.clone(),
            display_descriptions: self.display_descriptions.clone(),
        };
        copy.values.extend(self.values.iter().filter(|v| keep(v)).cloned());
        copy
    }
}

impl PartialEq for IdPAttribute {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IdPAttribute {}

impl Hash for IdPAttribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for IdPAttribute {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IdPAttribute {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_by_id() {
        let a = IdPAttribute::new("mail").with_values(["a@example.org"]);
        let b = IdPAttribute::new("mail").with_values(["b@example.org"]);
        assert_eq!(a, b);

        let set: HashSet<IdPAttribute> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_values_are_deduplicated_in_order() {
        let mut attr = IdPAttribute::new("affiliation");
        attr.set_values(["member", "staff", "member"]);
        assert_eq!(
            attr.values(),
            &[AttributeValue::string("member"), AttributeValue::string("staff")]
        );
        assert!(!attr.add_value("staff"));
        assert!(attr.add_value("student"));
        assert_eq!(attr.values().len(), 3);
    }

    #[test]
    fn test_id_is_trimmed() {
        assert_eq!(IdPAttribute::new("  uid ").id(), "uid");
    }

    #[test]
    fn test_retain_values_keeps_order_and_metadata() {
        let mut attr = IdPAttribute::new("eppn").with_values(["one", "two", "three"]);
        attr.set_display_name("en", "Principal name");

        let kept = attr.retain_values(|v| v.string_value() != Some("two"));
        assert_eq!(
            kept.values(),
            &[AttributeValue::string("one"), AttributeValue::string("three")]
        );
        assert_eq!(kept.display_names().get("en").map(String::as_str), Some("Principal name"));
    }
}
