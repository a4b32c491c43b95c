//! Error types for the attribute engine

use idp_attribute_filter::FilterError;
use idp_attribute_resolver::ResolutionError;
use idp_core::ComponentError;
use thiserror::Error;

/// Attribute engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration document is well formed but inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration document could not be parsed
    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Attribute resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Attribute filtering failed
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Component lifecycle or configuration error
    #[error(transparent)]
    Component(#[from] ComponentError),
}

impl EngineError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        EngineError::Config(msg.into())
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            EngineError::config("rule 'r' has no matcher").to_string(),
            "Invalid configuration: rule 'r' has no matcher"
        );

        let err: EngineError = ComponentError::Uninitialized("resolver".to_string()).into();
        assert_eq!(err.to_string(), "Component 'resolver' has not been initialized");

        let err: EngineError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, EngineError::Parse(_)));
    }
}
