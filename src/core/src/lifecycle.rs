//! Component lifecycle state machine
//!
//! `New → Initialized → (validated)* → Destroyed`
//!
//! Configuration is only legal while `New`; operations are only legal while
//! `Initialized`; nothing but `destroy()` is legal once `Destroyed`.
//! Transitions are guarded by a coarse mutex so that concurrent
//! `initialize()`/`destroy()` calls are idempotent.

use crate::error::{ComponentError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
struct Flags {
    initialized: bool,
    destroyed: bool,
}

/// Lifecycle state holder embedded in every component
#[derive(Debug, Default)]
pub struct Lifecycle {
    flags: Mutex<Flags>,
    validations: AtomicUsize,
}

impl Lifecycle {
    /// Create a lifecycle in the `New` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `initialize()` has completed. Stays true after destruction.
    pub fn is_initialized(&self) -> bool {
        self.flags.lock().initialized
    }

    /// Whether `destroy()` has been called
    pub fn is_destroyed(&self) -> bool {
        self.flags.lock().destroyed
    }

    /// Number of successful validations
    pub fn validation_count(&self) -> usize {
        self.validations.load(Ordering::Relaxed)
    }

    /// Run `init` once and mark the component initialized.
    ///
    /// Idempotent once initialized; fails with `Destroyed` after destruction.
    /// If `init` fails the component stays uninitialized and may be retried.
    pub fn initialize<F>(&self, id: &str, init: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut flags = self.flags.lock();
        if flags.destroyed {
            return Err(ComponentError::Destroyed(id.to_string()));
        }
        if flags.initialized {
            return Ok(());
        }
        init()?;
        flags.initialized = true;
        debug!("Component '{}' initialized", id);
        Ok(())
    }

    /// Fail unless the component is initialized and not destroyed
    pub fn ensure_operational(&self, id: &str) -> Result<()> {
        let flags = *self.flags.lock();
        if flags.destroyed {
            return Err(ComponentError::Destroyed(id.to_string()));
        }
        if !flags.initialized {
            return Err(ComponentError::Uninitialized(id.to_string()));
        }
        Ok(())
    }

    /// Fail unless the component is still being configured
    pub fn ensure_modifiable(&self, id: &str) -> Result<()> {
        let flags = *self.flags.lock();
        if flags.destroyed {
            return Err(ComponentError::Destroyed(id.to_string()));
        }
        if flags.initialized {
            return Err(ComponentError::Unmodifiable(id.to_string()));
        }
        Ok(())
    }

    /// Run a health check. Lifecycle violations are reported as such,
    /// check failures as `Validation`.
    pub fn validate<F>(&self, id: &str, check: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.ensure_operational(id)?;
        check().map_err(|e| match e {
            ComponentError::Validation(_) => e,
            other if other.is_lifecycle_violation() => other,
            other => ComponentError::validation(format!("'{}': {}", id, other)),
        })?;
        self.validations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Mark the component destroyed and run `teardown` once
    pub fn destroy<F>(&self, id: &str, teardown: F)
    where
        F: FnOnce(),
    {
        {
            let mut flags = self.flags.lock();
            if flags.destroyed {
                return;
            }
            flags.destroyed = true;
        }
        teardown();
        debug!("Component '{}' destroyed", id);
    }
}
