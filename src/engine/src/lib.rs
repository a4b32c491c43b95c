//! # IdP Attribute Engine
//!
//! Wires an attribute resolver and an attribute filter into a single
//! per-request pipeline, built from a declarative JSON configuration.
//!
//! # Example
//!
//! ```
//! use idp_attribute_engine::{AttributeEngine, AttributeRequest, EngineConfig};
//!
//! let config = EngineConfig::from_json(r#"{
//!     "resolver": {
//!         "id": "resolver",
//!         "attribute_definitions": [
//!             { "id": "affiliation", "type": "static", "values": ["member"] }
//!         ]
//!     },
//!     "filter": {
//!         "id": "filter",
//!         "policies": [
//!             { "id": "everyone",
//!               "requirement": { "type": "matches_all" },
//!               "rules": [ { "attribute": "affiliation", "permit": { "type": "matches_all" } } ] }
//!         ]
//!     }
//! }"#).unwrap();
//!
//! let engine = AttributeEngine::from_config(&config).unwrap();
//! engine.initialize().unwrap();
//!
//! let released = engine.process(&AttributeRequest::new("jdoe")).unwrap();
//! assert_eq!(released["affiliation"].values()[0].to_string(), "member");
//! ```

pub mod config;
pub mod engine;
pub mod error;

pub use config::{
    ConnectorConfig, DefinitionConfig, EngineConfig, FilterConfig, MatcherConfig, PluginRegistry, PolicyConfig,
    ResolverConfig, RuleConfig,
};
pub use engine::{AttributeEngine, AttributeRequest};
pub use error::{EngineError, Result};

/// Version of the attribute engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
