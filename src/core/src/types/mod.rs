//! Attribute model

pub mod attribute;
pub mod logic;
pub mod value;

pub use attribute::IdPAttribute;
pub use value::{AttributeValue, EmptyKind};
