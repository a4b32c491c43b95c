//! Error types for attribute filtering

use idp_core::ComponentError;
use thiserror::Error;

/// Attribute filtering errors
#[derive(Debug, Error)]
pub enum FilterError {
    /// Lifecycle or configuration error of a component
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// A matcher or rule could not be evaluated
    #[error("Evaluation of '{component_id}' failed: {message}")]
    Evaluation { component_id: String, message: String },
}

impl FilterError {
    /// Create an evaluation error
    pub fn evaluation<S: Into<String>, M: Into<String>>(component_id: S, message: M) -> Self {
        FilterError::Evaluation {
            component_id: component_id.into(),
            message: message.into(),
        }
    }
}

/// Result type for filtering operations
pub type Result<T> = std::result::Result<T, FilterError>;

/// Error returned by injected scripts
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
