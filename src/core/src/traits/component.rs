//! Component contract shared by every pluggable part of the engine

use crate::error::Result;

/// Identified component with an explicit lifecycle.
///
/// Lifecycle transitions take `&self` so that shared (`Arc`) components can be
/// initialized and destroyed by the composites that own them.
pub trait Component: Send + Sync {
    /// Unique, non-blank identifier
    fn id(&self) -> &str;

    /// Check configuration and move to the initialized state. Idempotent.
    fn initialize(&self) -> Result<()>;

    /// Periodic health check, only legal while initialized
    fn validate(&self) -> Result<()>;

    /// Release resources; further operations fail with `Destroyed`
    fn destroy(&self);

    /// Whether `initialize()` has completed
    fn is_initialized(&self) -> bool;

    /// Whether `destroy()` has been called
    fn is_destroyed(&self) -> bool;
}
