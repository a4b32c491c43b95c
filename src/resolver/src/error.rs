//! Error types for attribute resolution

use idp_core::ComponentError;
use thiserror::Error;

/// Attribute resolution errors
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Lifecycle or configuration error of a component
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// A plugin failed to produce its value
    #[error("Resolver plugin '{plugin_id}' failed: {message}")]
    PluginFailure { plugin_id: String, message: String },

    /// A second resolution record was offered for a plugin id
    #[error("Resolver plugin '{plugin_id}' has already been resolved in this context")]
    AlreadyResolved { plugin_id: String },

    /// A plugin was re-entered while it was still resolving
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// A dependency names a plugin the resolver does not know
    #[error("Unknown resolver plugin: {0}")]
    UnknownPlugin(String),

    /// A search returned nothing and the connector treats that as an error
    #[error("Resolver plugin '{plugin_id}' produced no result")]
    NoResult { plugin_id: String },

    /// A search against an external source failed
    #[error("Search for resolver plugin '{plugin_id}' failed: {message}")]
    Search { plugin_id: String, message: String },
}

impl ResolutionError {
    /// Create a plugin failure
    pub fn plugin_failure<S: Into<String>, M: Into<String>>(plugin_id: S, message: M) -> Self {
        ResolutionError::PluginFailure {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }

    /// Create a search failure
    pub fn search<S: Into<String>, M: Into<String>>(plugin_id: S, message: M) -> Self {
        ResolutionError::Search {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }

    /// Errors that are never swallowed, whatever the plugin's propagation
    /// setting: lifecycle misuse, double resolution and cycles.
    pub fn is_hard_failure(&self) -> bool {
        match self {
            ResolutionError::Component(e) => e.is_lifecycle_violation(),
            ResolutionError::AlreadyResolved { .. }
            | ResolutionError::CircularDependency(_)
            | ResolutionError::UnknownPlugin(_) => true,
            _ => false,
        }
    }
}

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, ResolutionError>;

/// Error returned by injected collaborators (searches, scripts)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResolutionError::plugin_failure("mail", "no source value");
        assert_eq!(err.to_string(), "Resolver plugin 'mail' failed: no source value");

        let err = ResolutionError::AlreadyResolved { plugin_id: "ldap".into() };
        assert_eq!(
            err.to_string(),
            "Resolver plugin 'ldap' has already been resolved in this context"
        );
    }

    #[test]
    fn test_hard_failures() {
        assert!(ResolutionError::from(ComponentError::Uninitialized("x".into())).is_hard_failure());
        assert!(ResolutionError::AlreadyResolved { plugin_id: "x".into() }.is_hard_failure());
        assert!(ResolutionError::CircularDependency("a -> a".into()).is_hard_failure());
        assert!(!ResolutionError::plugin_failure("x", "boom").is_hard_failure());
        assert!(!ResolutionError::search("x", "timeout").is_hard_failure());
        assert!(!ResolutionError::NoResult { plugin_id: "x".into() }.is_hard_failure());
    }
}
