//! Matchers backed by injected functions

use super::{any_value_selected, filter_component, MatchedValues, Matcher, Tristate};
use crate::context::AttributeFilterContext;
use crate::error::{BoxError, FilterError, Result};
use idp_core::{require_id, ComponentError, IdPAttribute, Lifecycle};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Function selecting values of an attribute
pub type ScriptedValues = Arc<
    dyn Fn(&IdPAttribute, &AttributeFilterContext) -> std::result::Result<MatchedValues, BoxError> + Send + Sync,
>;

/// Function evaluating the whole context
pub type ScriptedPolicy =
    Arc<dyn Fn(&AttributeFilterContext) -> std::result::Result<bool, BoxError> + Send + Sync>;

/// Matcher running a user-supplied function.
///
/// Exactly one of a value script or a policy script must be set. A script
/// error is logged and reported as a failed evaluation. Values returned by a
/// value script that are not values of the attribute are ignored.
pub struct ScriptedMatcher {
    id: String,
    lifecycle: Lifecycle,
    values_script: Option<ScriptedValues>,
    policy_script: Option<ScriptedPolicy>,
}

impl ScriptedMatcher {
    pub fn new(id: impl Into<String>) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, "Matcher")?,
            lifecycle: Lifecycle::new(),
            values_script: None,
            policy_script: None,
        })
    }

    /// Matcher selecting values with `script`
    pub fn values<F>(id: impl Into<String>, script: F) -> idp_core::Result<Self>
    where
        F: Fn(&IdPAttribute, &AttributeFilterContext) -> std::result::Result<MatchedValues, BoxError>
            + Send
            + Sync
            + 'static,
    {
        let mut matcher = Self::new(id)?;
        matcher.set_values_script(Arc::new(script))?;
        Ok(matcher)
    }

    /// Matcher evaluating the context with `script`
    pub fn policy<F>(id: impl Into<String>, script: F) -> idp_core::Result<Self>
    where
        F: Fn(&AttributeFilterContext) -> std::result::Result<bool, BoxError> + Send + Sync + 'static,
    {
        let mut matcher = Self::new(id)?;
        matcher.set_policy_script(Arc::new(script))?;
        Ok(matcher)
    }

    pub fn set_values_script(&mut self, script: ScriptedValues) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.values_script = Some(script);
        Ok(())
    }

    pub fn set_policy_script(&mut self, script: ScriptedPolicy) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.policy_script = Some(script);
        Ok(())
    }

    fn report(&self, error: BoxError) {
        warn!("{}", FilterError::evaluation(&self.id, format!("script failed: {}", error)));
    }

    fn check_config(&self) -> idp_core::Result<()> {
        match (&self.values_script, &self.policy_script) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(ComponentError::initialization(format!(
                "Matcher '{}': exactly one of a value script or a policy script must be set",
                self.id
            ))),
        }
    }

    fn check_health(&self) -> idp_core::Result<()> {
        Ok(())
    }

    fn teardown(&self) {}
}

filter_component!(ScriptedMatcher);

impl Matcher for ScriptedMatcher {
    fn matching_values(
        &self,
        attribute: &IdPAttribute,
        context: &AttributeFilterContext,
    ) -> Result<Option<MatchedValues>> {
        self.lifecycle.ensure_operational(&self.id)?;

        if let Some(script) = &self.policy_script {
            return Ok(match script(context) {
                Ok(true) => Some(attribute.value_set()),
                Ok(false) => Some(MatchedValues::new()),
                Err(e) => {
                    self.report(e);
                    None
                }
            });
        }

        let Some(script) = &self.values_script else {
            return Ok(None);
        };
        match script(attribute, context) {
            Ok(selected) => {
                let owned = attribute.value_set();
                Ok(Some(selected.into_iter().filter(|value| owned.contains(value)).collect()))
            }
            Err(e) => {
                self.report(e);
                Ok(None)
            }
        }
    }

    fn matches(&self, context: &AttributeFilterContext) -> Result<Tristate> {
        self.lifecycle.ensure_operational(&self.id)?;

        let Some(script) = &self.policy_script else {
            return any_value_selected(self, context);
        };

        Ok(match script(context) {
            Ok(result) => result.into(),
            Err(e) => {
                self.report(e);
                Tristate::Fail
            }
        })
    }
}

impl fmt::Debug for ScriptedMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedMatcher")
            .field("id", &self.id)
            .field("values_script", &self.values_script.is_some())
            .field("policy_script", &self.policy_script.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idp_core::{AttributeValue, Component};

    fn context() -> AttributeFilterContext {
        let mut context = AttributeFilterContext::with_prefiltered([
            IdPAttribute::new("affiliation").with_values(["member", "staff"]),
        ]);
        context.set_principal("jdoe");
        context
    }

    #[test]
    fn test_values_script() {
        let ctx = context();
        let matcher = ScriptedMatcher::values("script", |attribute: &IdPAttribute, _ctx: &AttributeFilterContext| {
            let mut selected: MatchedValues = attribute
                .values()
                .iter()
                .filter(|v| v.string_value() == Some("staff"))
                .cloned()
                .collect();
            selected.insert(AttributeValue::string("injected"));
            Ok(selected)
        })
        .unwrap();
        matcher.initialize().unwrap();

        let selected = matcher
            .matching_values(&ctx.prefiltered_attributes()["affiliation"], &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(selected, MatchedValues::from([AttributeValue::string("staff")]));
        assert_eq!(matcher.matches(&ctx).unwrap(), Tristate::True);
    }

    #[test]
    fn test_policy_script() {
        let ctx = context();
        let matcher =
            ScriptedMatcher::policy("script", |ctx: &AttributeFilterContext| Ok(ctx.principal() == Some("jdoe")))
                .unwrap();
        matcher.initialize().unwrap();

        assert_eq!(matcher.matches(&ctx).unwrap(), Tristate::True);
        assert_eq!(
            matcher
                .matching_values(&ctx.prefiltered_attributes()["affiliation"], &ctx)
                .unwrap()
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_script_errors_are_failures() {
        let ctx = context();
        let attribute = &ctx.prefiltered_attributes()["affiliation"];

        let values = ScriptedMatcher::values("broken", |_a: &IdPAttribute, _c: &AttributeFilterContext| {
            Err(BoxError::from("boom"))
        })
        .unwrap();
        values.initialize().unwrap();
        assert!(values.matching_values(attribute, &ctx).unwrap().is_none());
        assert_eq!(values.matches(&ctx).unwrap(), Tristate::Fail);

        let policy = ScriptedMatcher::policy("broken", |_c: &AttributeFilterContext| Err(BoxError::from("boom"))).unwrap();
        policy.initialize().unwrap();
        assert!(policy.matching_values(attribute, &ctx).unwrap().is_none());
        assert_eq!(policy.matches(&ctx).unwrap(), Tristate::Fail);
    }

    #[test]
    fn test_exactly_one_script_required() {
        let neither = ScriptedMatcher::new("neither").unwrap();
        assert!(matches!(neither.initialize(), Err(ComponentError::Initialization(_))));
    }
}
