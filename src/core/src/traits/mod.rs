//! Shared traits

pub mod component;

pub use component::Component;
