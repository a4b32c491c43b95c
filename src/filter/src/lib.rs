//! # IdP Attribute Filter
//!
//! Decides which resolved attribute values may be released to a requester.
//!
//! An [`AttributeFilter`] holds ordered [`AttributeFilterPolicy`]s. Each
//! policy is gated by a requirement rule and carries permit and deny
//! [`AttributeRule`]s whose [`Matcher`]s select attribute values.
//!
//! # Example
//!
//! ```
//! use idp_attribute_filter::matcher::{matches_all, PredicateMatcher};
//! use idp_attribute_filter::{AttributeFilter, AttributeFilterContext, AttributeFilterPolicy, AttributeRule};
//! use idp_core::{Component, IdPAttribute};
//! use std::sync::Arc;
//!
//! let requester = Arc::new(PredicateMatcher::requester_string("sp", "https://sp.example.org", true).unwrap());
//! let policy = AttributeFilterPolicy::with_rules(
//!     "releaseToSp",
//!     requester,
//!     [AttributeRule::permit("releaseMail", "mail", matches_all()).unwrap()],
//! )
//! .unwrap();
//!
//! let filter = AttributeFilter::with_policies("filter", [policy]).unwrap();
//! filter.initialize().unwrap();
//!
//! let mut context = AttributeFilterContext::with_prefiltered([
//!     IdPAttribute::new("mail").with_values(["jdoe@example.org"]),
//!     IdPAttribute::new("uid").with_values(["jdoe"]),
//! ]);
//! context.set_attribute_recipient_id("https://sp.example.org");
//! filter.filter_attributes(&mut context).unwrap();
//!
//! assert!(context.filtered_attributes().contains_key("mail"));
//! assert!(!context.filtered_attributes().contains_key("uid"));
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod policy;
pub mod rule;

pub use context::{
    AttributeFilterContext, MetadataScope, RequestedAttribute, RequesterMetadata, RequesterMetadataLookup,
    StaticMetadataLookup,
};
pub use engine::AttributeFilter;
pub use error::{BoxError, FilterError, Result};
pub use matcher::{MatchedValues, Matcher, PredicateMatcher, Tristate};
pub use policy::AttributeFilterPolicy;
pub use rule::AttributeRule;
