//! Component lifecycle error taxonomy
//!
//! Every pluggable component (resolver plugins, matchers, rules, policies,
//! value mappers) reports lifecycle misuse through [`ComponentError`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComponentError>;

/// Lifecycle and configuration errors shared by all components
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComponentError {
    /// Missing or invalid configuration detected by `initialize()`
    #[error("Component initialization failed: {0}")]
    Initialization(String),

    /// Operation attempted before `initialize()`
    #[error("Component '{0}' has not been initialized")]
    Uninitialized(String),

    /// Operation attempted after `destroy()`
    #[error("Component '{0}' has been destroyed")]
    Destroyed(String),

    /// Configuration mutator called after `initialize()`
    #[error("Component '{0}' is initialized and can no longer be modified")]
    Unmodifiable(String),

    /// Periodic health check failed
    #[error("Component validation failed: {0}")]
    Validation(String),

    /// Invalid argument (blank identifier, missing collaborator)
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl ComponentError {
    /// Create an initialization error
    pub fn initialization<S: Into<String>>(msg: S) -> Self {
        ComponentError::Initialization(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        ComponentError::Validation(msg.into())
    }

    /// Create a constraint violation error
    pub fn constraint<S: Into<String>>(msg: S) -> Self {
        ComponentError::ConstraintViolation(msg.into())
    }

    /// Whether this error reports misuse of the component lifecycle
    /// (as opposed to bad configuration or a failed health check)
    pub fn is_lifecycle_violation(&self) -> bool {
        matches!(
            self,
            ComponentError::Uninitialized(_)
                | ComponentError::Destroyed(_)
                | ComponentError::Unmodifiable(_)
        )
    }
}

/// Trim an identifier and reject it when blank
pub fn require_id(id: impl Into<String>, what: &str) -> Result<String> {
    let id = id.into();
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ComponentError::constraint(format!("{} identifier cannot be blank", what)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ComponentError::Uninitialized("static".to_string());
        assert_eq!(err.to_string(), "Component 'static' has not been initialized");

        let err = ComponentError::initialization("no values");
        assert_eq!(err.to_string(), "Component initialization failed: no values");
    }

    #[test]
    fn test_lifecycle_violation_classification() {
        assert!(ComponentError::Destroyed("x".into()).is_lifecycle_violation());
        assert!(ComponentError::Unmodifiable("x".into()).is_lifecycle_violation());
        assert!(!ComponentError::validation("x").is_lifecycle_violation());
        assert!(!ComponentError::initialization("x").is_lifecycle_violation());
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id("  engine ", "Filter").unwrap(), "engine");
        assert!(matches!(require_id("", "Filter"), Err(ComponentError::ConstraintViolation(_))));
        assert!(matches!(require_id("   ", "Filter"), Err(ComponentError::ConstraintViolation(_))));
    }
}
