//! Shared resolver plugin state
//!
//! Attribute definitions and data connectors embed a [`PluginCore`] holding
//! their id, lifecycle, activation condition, dependencies and failure
//! policy. Behaviour differences live in injected strategies.

use crate::context::AttributeResolutionContext;
use crate::dependency::ResolverPluginDependency;
use crate::error::{ResolutionError, Result};
use idp_core::{require_id, Lifecycle};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Predicate deciding whether a plugin runs for a given request
pub type ActivationCondition = Arc<dyn Fn(&AttributeResolutionContext) -> bool + Send + Sync>;

/// Activation condition that is always satisfied
pub fn always_active() -> ActivationCondition {
    Arc::new(|_| true)
}

/// Wrap a closure as an activation condition
pub fn activation_condition<F>(condition: F) -> ActivationCondition
where
    F: Fn(&AttributeResolutionContext) -> bool + Send + Sync + 'static,
{
    Arc::new(condition)
}

fn never_active() -> ActivationCondition {
    Arc::new(|_| false)
}

/// Common state of every resolver plugin
pub struct PluginCore {
    id: String,
    kind: &'static str,
    lifecycle: Lifecycle,
    activation_condition: RwLock<ActivationCondition>,
    dependencies: RwLock<BTreeSet<ResolverPluginDependency>>,
    propagate_resolution_exceptions: bool,
}

impl PluginCore {
    pub(crate) fn new(id: impl Into<String>, kind: &'static str) -> idp_core::Result<Self> {
        Ok(Self {
            id: require_id(id, kind)?,
            kind,
            lifecycle: Lifecycle::new(),
            activation_condition: RwLock::new(always_active()),
            dependencies: RwLock::new(BTreeSet::new()),
            propagate_resolution_exceptions: true,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Prefix used by all log lines of this plugin
    pub fn log_prefix(&self) -> String {
        format!("{} '{}':", self.kind, self.id)
    }

    pub fn set_activation_condition(&mut self, condition: ActivationCondition) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        *self.activation_condition.get_mut() = condition;
        Ok(())
    }

    pub fn set_dependencies<I>(&mut self, dependencies: I) -> idp_core::Result<()>
    where
        I: IntoIterator<Item = ResolverPluginDependency>,
    {
        self.lifecycle.ensure_modifiable(&self.id)?;
        *self.dependencies.get_mut() = dependencies.into_iter().collect();
        Ok(())
    }

    pub fn set_propagate_resolution_exceptions(&mut self, propagate: bool) -> idp_core::Result<()> {
        self.lifecycle.ensure_modifiable(&self.id)?;
        self.propagate_resolution_exceptions = propagate;
        Ok(())
    }

    /// Dependencies, ordered and de-duplicated
    pub fn dependencies(&self) -> BTreeSet<ResolverPluginDependency> {
        self.dependencies.read().clone()
    }

    pub fn propagate_resolution_exceptions(&self) -> bool {
        self.propagate_resolution_exceptions
    }

    /// Evaluate the activation condition against a request
    pub fn is_active(&self, context: &AttributeResolutionContext) -> bool {
        let condition = self.activation_condition.read().clone();
        condition(context)
    }

    /// Lifecycle and activation gate run before any resolution logic.
    /// Returns false when the plugin is inactive for this request.
    pub(crate) fn begin(&self, context: &AttributeResolutionContext) -> Result<bool> {
        self.lifecycle.ensure_operational(&self.id)?;
        if !self.is_active(context) {
            debug!("{} activation condition not met, nothing produced", self.log_prefix());
            return Ok(false);
        }
        Ok(true)
    }

    /// Apply the failure policy: rethrow, or log and produce nothing
    pub(crate) fn recover<T>(&self, error: ResolutionError) -> Result<Option<T>> {
        if error.is_hard_failure() || self.propagate_resolution_exceptions {
            return Err(error);
        }
        debug!(
            "{} resolution failed, continuing without a result: {}",
            self.log_prefix(),
            error
        );
        Ok(None)
    }

    /// Full resolution protocol around `produce`
    pub(crate) fn resolve_with<T, F>(&self, context: &AttributeResolutionContext, produce: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Result<Option<T>>,
    {
        if !self.begin(context)? {
            return Ok(None);
        }
        match produce() {
            Ok(result) => Ok(result),
            Err(e) => self.recover(e),
        }
    }

    /// Deactivate the plugin, drop its dependencies and run `teardown`
    pub(crate) fn destroy<F: FnOnce()>(&self, teardown: F) {
        self.lifecycle.destroy(&self.id, || {
            *self.activation_condition.write() = never_active();
            self.dependencies.write().clear();
            teardown();
        });
    }
}

impl fmt::Debug for PluginCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCore")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("dependencies", &*self.dependencies.read())
            .field("propagate_resolution_exceptions", &self.propagate_resolution_exceptions)
            .finish()
    }
}

/// Shared accessors, lifecycle and identity for types embedding a `PluginCore`
/// in a field named `core`. The type provides `do_initialize`, `do_validate`
/// and `do_destroy`.
macro_rules! resolver_plugin {
    ($ty:ty) => {
        impl $ty {
            pub fn id(&self) -> &str {
                self.core.id()
            }

            pub fn set_activation_condition(
                &mut self,
                condition: $crate::plugin::ActivationCondition,
            ) -> idp_core::Result<()> {
                self.core.set_activation_condition(condition)
            }

            pub fn set_dependencies<I>(&mut self, dependencies: I) -> idp_core::Result<()>
            where
                I: IntoIterator<Item = $crate::dependency::ResolverPluginDependency>,
            {
                self.core.set_dependencies(dependencies)
            }

            pub fn set_propagate_resolution_exceptions(&mut self, propagate: bool) -> idp_core::Result<()> {
                self.core.set_propagate_resolution_exceptions(propagate)
            }

            pub fn dependencies(
                &self,
            ) -> std::collections::BTreeSet<$crate::dependency::ResolverPluginDependency> {
                self.core.dependencies()
            }

            pub fn propagate_resolution_exceptions(&self) -> bool {
                self.core.propagate_resolution_exceptions()
            }

            pub fn is_active(&self, context: &$crate::context::AttributeResolutionContext) -> bool {
                self.core.is_active(context)
            }
        }

        impl idp_core::Component for $ty {
            fn id(&self) -> &str {
                self.core.id()
            }

            fn initialize(&self) -> idp_core::Result<()> {
                self.core
                    .lifecycle()
                    .initialize(self.core.id(), || self.do_initialize())
            }

            fn validate(&self) -> idp_core::Result<()> {
                self.core
                    .lifecycle()
                    .validate(self.core.id(), || self.do_validate())
            }

            fn destroy(&self) {
                self.core.destroy(|| self.do_destroy())
            }

            fn is_initialized(&self) -> bool {
                self.core.lifecycle().is_initialized()
            }

            fn is_destroyed(&self) -> bool {
                self.core.lifecycle().is_destroyed()
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.core.id() == other.core.id()
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.core.id().hash(state);
            }
        }
    };
}

pub(crate) use resolver_plugin;
