//! Matchers consulting the requester's metadata

use super::{filter_component, MatchedValues, Matcher};
use crate::context::{AttributeFilterContext, MetadataScope};
use crate::error::Result;
use dashmap::DashMap;
use idp_core::{require_id, AttributeValue, IdPAttribute, Lifecycle};
use regex::Regex;
use tracing::{debug, warn};

/// Selects the values of attributes the requester asks for in its metadata
///
/// - no metadata, or metadata listing no attributes: every value when
///   `match_if_metadata_silent`, otherwise none
/// - attribute not listed: none
/// - attribute listed as optional while `only_if_required`: none
/// - attribute listed with values: the values that appear in the list
/// - attribute listed without values: every value
#[derive(Debug)]
pub struct AttributeInMetadataMatcher {
    id: String,
    lifecycle: Lifecycle,
    match_if_metadata_silent: bool,
    only_if_required: bool,
}

impl AttributeInMetadataMatcher {
    pub fn new(id: impl Into<String>) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, "Matcher")?,
            lifecycle: Lifecycle::new(),
            match_if_metadata_silent: false,
            only_if_required: true,
        })
    }

    pub fn set_match_if_metadata_silent(&mut self, match_if_silent: bool) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.match_if_metadata_silent = match_if_silent;
        Ok(())
    }

    pub fn set_only_if_required(&mut self, only_if_required: bool) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.only_if_required = only_if_required;
        Ok(())
    }

    fn silent(&self, attribute: &IdPAttribute) -> MatchedValues {
        if self.match_if_metadata_silent {
            attribute.value_set()
        } else {
            MatchedValues::new()
        }
    }

    fn check_config(&self) -> idp_core::Result<()> {
        Ok(())
    }

    fn check_health(&self) -> idp_core::Result<()> {
        Ok(())
    }

    fn teardown(&self) {}
}

filter_component!(AttributeInMetadataMatcher);

impl Matcher for AttributeInMetadataMatcher {
    fn matching_values(
        &self,
        attribute: &IdPAttribute,
        context: &AttributeFilterContext,
    ) -> Result<Option<MatchedValues>> {
        self.lifecycle.ensure_operational(&self.id)?;

        let Some(metadata) = context.requester_metadata() else {
            debug!("Matcher '{}': no requester metadata available", self.id);
            return Ok(Some(self.silent(attribute)));
        };
        if metadata.requested_attributes.is_empty() {
            debug!("Matcher '{}': requester metadata lists no attributes", self.id);
            return Ok(Some(self.silent(attribute)));
        }

        let Some(requested) = metadata.requested_attributes.get(attribute.id()) else {
            debug!("Matcher '{}': attribute '{}' not requested", self.id, attribute.id());
            return Ok(Some(MatchedValues::new()));
        };
        if self.only_if_required && !requested.is_required {
            debug!(
                "Matcher '{}': attribute '{}' requested but not required",
                self.id,
                attribute.id()
            );
            return Ok(Some(MatchedValues::new()));
        }
        if requested.values.is_empty() {
            return Ok(Some(attribute.value_set()));
        }

        Ok(Some(
            attribute
                .values()
                .iter()
                .filter(|value| {
                    value
                        .string_value()
                        .map(|text| requested.values.iter().any(|wanted| wanted == text))
                        .unwrap_or(false)
                })
                .cloned()
                .collect(),
        ))
    }
}

/// Selects scoped values whose scope the requester's metadata authorizes
///
/// Regular expression scopes are compiled once per pattern text and kept
/// for the lifetime of the matcher; invalid ones are remembered as such.
#[derive(Debug)]
pub struct ScopeMatchesMetadataMatcher {
    id: String,
    lifecycle: Lifecycle,
    patterns: DashMap<String, Option<Regex>>,
}

impl ScopeMatchesMetadataMatcher {
    pub fn new(id: impl Into<String>) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, "Matcher")?,
            lifecycle: Lifecycle::new(),
            patterns: DashMap::new(),
        })
    }

    fn scope_allowed(&self, scope: &str, allowed: &[MetadataScope]) -> bool {
        allowed.iter().any(|entry| {
            if !entry.regexp {
                return entry.value == scope;
            }
            self.pattern(&entry.value)
                .map(|regex| regex.is_match(scope))
                .unwrap_or(false)
        })
    }

    fn pattern(&self, source: &str) -> Option<Regex> {
        if let Some(cached) = self.patterns.get(source) {
            return cached.value().clone();
        }
        let compiled = match Regex::new(&format!("^(?:{})$", source)) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!("Matcher '{}': ignoring invalid metadata scope '{}': {}", self.id, source, e);
                None
            }
        };
        self.patterns
            .entry(source.to_string())
            .or_insert(compiled)
            .value()
            .clone()
    }

    fn check_config(&self) -> idp_core::Result<()> {
        Ok(())
    }

    fn check_health(&self) -> idp_core::Result<()> {
        Ok(())
    }

    fn teardown(&self) {
        self.patterns.clear();
    }
}

filter_component!(ScopeMatchesMetadataMatcher);

impl Matcher for ScopeMatchesMetadataMatcher {
    fn matching_values(
        &self,
        attribute: &IdPAttribute,
        context: &AttributeFilterContext,
    ) -> Result<Option<MatchedValues>> {
        self.lifecycle.ensure_operational(&self.id)?;

        let Some(metadata) = context.requester_metadata() else {
            debug!("Matcher '{}': no requester metadata available", self.id);
            return Ok(Some(MatchedValues::new()));
        };

        Ok(Some(
            attribute
                .values()
                .iter()
                .filter(|value| match value {
                    AttributeValue::Scoped { scope, .. } => self.scope_allowed(scope, &metadata.scopes),
                    _ => false,
                })
                .cloned()
                .collect(),
        ))
    }
}
