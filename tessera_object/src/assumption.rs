//! One-way validity flags for speculative optimization.
//!
//! An assumption starts out valid and can be invalidated exactly once;
//! it never becomes valid again. Inline caches and compiled code capture
//! an `Arc<Assumption>` and poll it (or register on it) instead of
//! re-checking the guarded condition on every use.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A monotonic valid-until-invalidated flag.
///
/// Reads are a single `Acquire` load; invalidation is a `Release` store,
/// so everything written before `invalidate()` is visible to any thread
/// that observes the flag as invalid.
#[derive(Debug)]
pub struct Assumption {
    name: &'static str,
    valid: AtomicBool,
}

impl Assumption {
    /// Creates a fresh, valid assumption.
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            valid: AtomicBool::new(true),
        })
    }

    /// Diagnostic label, e.g. `"valid shape"`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the assumption still holds.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Permanently invalidates the assumption. Idempotent.
    #[inline]
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

// ============================================================================
// Tests
// ============================================================================
