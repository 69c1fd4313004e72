//! Global string interning.
//!
//! Property keys are interned exactly once; afterwards every comparison and
//! hash is a pointer operation. The canonical data pointer of an interned
//! string is what gets packed into the NaN-box payload, and
//! [`interned_by_ptr`] recovers the string from that payload.
//!
//! The interner never evicts, so canonical pointers stay valid for the
//! lifetime of the process.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

// ============================================================================
// InternedString
// ============================================================================

/// A handle to a canonical, process-wide unique string.
///
/// Equality and hashing use the canonical pointer, so two handles compare
/// equal iff their contents are equal. Clones are reference-count bumps.
#[derive(Clone)]
pub struct InternedString(Arc<str>);

impl InternedString {
    /// The string contents.
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The canonical data pointer identifying this string.
    #[inline(always)]
    pub fn as_raw(&self) -> *const u8 {
        self.0.as_ptr()
    }
}

impl PartialEq for InternedString {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for InternedString {}

impl std::hash::Hash for InternedString {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self.as_raw() as usize).hash(state);
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for InternedString {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// ============================================================================
// Interner
// ============================================================================

#[derive(Default)]
struct InternerInner {
    /// Canonical instances, looked up by content.
    strings: FxHashSet<Arc<str>>,
    /// Canonical data pointer back to the instance, for NaN-box decoding.
    by_ptr: FxHashMap<usize, Arc<str>>,
}

struct Interner {
    inner: RwLock<InternerInner>,
}

fn global() -> &'static Interner {
    static INTERNER: OnceLock<Interner> = OnceLock::new();
    INTERNER.get_or_init(|| Interner {
        inner: RwLock::new(InternerInner::default()),
    })
}

/// Interns `s`, returning the canonical handle for its contents.
pub fn intern(s: &str) -> InternedString {
    let interner = global();
    {
        let inner = interner.inner.read();
        if let Some(existing) = inner.strings.get(s) {
            return InternedString(Arc::clone(existing));
        }
    }
    let mut inner = interner.inner.write();
    // Double-check: another thread may have interned between the locks
    if let Some(existing) = inner.strings.get(s) {
        return InternedString(Arc::clone(existing));
    }
    let canonical: Arc<str> = Arc::from(s);
    inner.strings.insert(Arc::clone(&canonical));
    inner
        .by_ptr
        .insert(canonical.as_ptr() as usize, Arc::clone(&canonical));
    InternedString(canonical)
}

/// Recovers an interned string from its canonical data pointer.
///
/// Returns `None` for pointers that never came out of [`intern`].
pub fn interned_by_ptr(ptr: *const u8) -> Option<InternedString> {
    let inner = global().inner.read();
    inner
        .by_ptr
        .get(&(ptr as usize))
        .map(|canonical| InternedString(Arc::clone(canonical)))
}

// ============================================================================
// Tests
// ============================================================================
