//! # IdP Core
//!
//! Shared building blocks for the attribute resolution and filtering crates:
//! the component lifecycle, its error taxonomy, the attribute model and the
//! value transcoding contract.

pub mod error;
pub mod lifecycle;
pub mod mapper;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{require_id, ComponentError, Result};
pub use lifecycle::Lifecycle;
pub use mapper::{ByteValueMapper, ScopedStringValueMapper, StringValueMapper, ValueMapper};
pub use traits::Component;
pub use types::{AttributeValue, EmptyKind, IdPAttribute};
