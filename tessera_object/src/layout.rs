//! Layout configuration and shape families.
//!
//! A [`Layout`] owns one shape family: a root shape, the inline-storage
//! configuration every shape in the family inherits, the mutex that
//! serializes transition construction, and the family's counters. Shapes
//! derived from the same root share all of these; unrelated layouts share
//! nothing.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::shape::{Shape, ShapeFlags};

/// Default number of unboxed primitive slots allocated inline.
pub const DEFAULT_PRIMITIVE_INLINE_SLOTS: u32 = 3;

/// Default number of boxed object slots allocated inline.
pub const DEFAULT_OBJECT_INLINE_SLOTS: u32 = 4;

/// Opaque embedder context shared by every shape in a family.
pub type SharedData = Arc<dyn Any + Send + Sync>;

// ============================================================================
// Identifiers
// ============================================================================

/// Embedder-assigned dynamic type tag carried by shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectTypeId(pub u32);

impl ObjectTypeId {
    pub const DEFAULT: Self = Self(0);

    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Process-unique identifier of a shape family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct LayoutId(pub u32);

impl LayoutId {
    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

static NEXT_LAYOUT_ID: AtomicU32 = AtomicU32::new(0);

fn allocate_layout_id() -> LayoutId {
    LayoutId(NEXT_LAYOUT_ID.fetch_add(1, Ordering::Relaxed))
}

// ============================================================================
// Statistics
// ============================================================================

/// Monotonic family counters, updated with relaxed atomics.
#[derive(Debug, Default)]
pub(crate) struct LayoutStats {
    shapes_created: AtomicU64,
    transition_hits: AtomicU64,
    transition_misses: AtomicU64,
    retype_transitions: AtomicU64,
    property_removals: AtomicU64,
    merges: AtomicU64,
    invalidations: AtomicU64,
}

impl LayoutStats {
    #[inline]
    pub(crate) fn record_shape_created(&self) {
        self.shapes_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_transition_hit(&self) {
        self.transition_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_transition_miss(&self) {
        self.transition_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_retype(&self) {
        self.retype_transitions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_removal(&self) {
        self.property_removals.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_merge(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LayoutStatsSnapshot {
        LayoutStatsSnapshot {
            shapes_created: self.shapes_created.load(Ordering::Relaxed),
            transition_hits: self.transition_hits.load(Ordering::Relaxed),
            transition_misses: self.transition_misses.load(Ordering::Relaxed),
            retype_transitions: self.retype_transitions.load(Ordering::Relaxed),
            property_removals: self.property_removals.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a family's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutStatsSnapshot {
    pub shapes_created: u64,
    pub transition_hits: u64,
    pub transition_misses: u64,
    pub retype_transitions: u64,
    pub property_removals: u64,
    pub merges: u64,
    pub invalidations: u64,
}

// ============================================================================
// LayoutInner
// ============================================================================

/// Family state shared by every shape derived from one root.
#[derive(Debug)]
pub(crate) struct LayoutInner {
    id: LayoutId,
    primitive_inline_slots: u32,
    object_inline_slots: u32,
    /// Serializes transition construction within the family.
    mutex: Mutex<()>,
    stats: LayoutStats,
}

impl LayoutInner {
    fn new(primitive_inline_slots: u32, object_inline_slots: u32) -> Arc<Self> {
        Arc::new(Self {
            id: allocate_layout_id(),
            primitive_inline_slots,
            object_inline_slots,
            mutex: Mutex::new(()),
            stats: LayoutStats::default(),
        })
    }

    /// Fresh family with the same storage configuration but its own id,
    /// mutex and counters.
    pub(crate) fn fresh_family(&self) -> Arc<Self> {
        Self::new(self.primitive_inline_slots, self.object_inline_slots)
    }

    #[inline]
    pub(crate) fn id(&self) -> LayoutId {
        self.id
    }

    #[inline]
    pub(crate) fn primitive_inline_slots(&self) -> u32 {
        self.primitive_inline_slots
    }

    #[inline]
    pub(crate) fn object_inline_slots(&self) -> u32 {
        self.object_inline_slots
    }

    #[inline]
    pub(crate) fn mutex(&self) -> &Mutex<()> {
        &self.mutex
    }

    #[inline]
    pub(crate) fn stats(&self) -> &LayoutStats {
        &self.stats
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Handle to a shape family and its root shape.
#[derive(Clone)]
pub struct Layout {
    inner: Arc<LayoutInner>,
    root: Arc<Shape>,
}

impl Layout {
    /// Family with default inline storage and a fresh empty root.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> LayoutBuilder {
        LayoutBuilder::new()
    }

    /// The family's empty root shape.
    #[inline]
    pub fn root(&self) -> &Arc<Shape> {
        &self.root
    }

    #[inline]
    pub fn id(&self) -> LayoutId {
        self.inner.id()
    }

    #[inline]
    pub fn primitive_inline_slots(&self) -> u32 {
        self.inner.primitive_inline_slots()
    }

    #[inline]
    pub fn object_inline_slots(&self) -> u32 {
        self.inner.object_inline_slots()
    }

    /// Snapshot of the family counters.
    pub fn stats(&self) -> LayoutStatsSnapshot {
        self.inner.stats().snapshot()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layout")
            .field("id", &self.inner.id())
            .field("primitive_inline_slots", &self.inner.primitive_inline_slots())
            .field("object_inline_slots", &self.inner.object_inline_slots())
            .finish_non_exhaustive()
    }
}

/// Configures and builds a [`Layout`].
pub struct LayoutBuilder {
    primitive_inline_slots: u32,
    object_inline_slots: u32,
    object_type: ObjectTypeId,
    shared_data: Option<SharedData>,
}

impl LayoutBuilder {
    fn new() -> Self {
        Self {
            primitive_inline_slots: DEFAULT_PRIMITIVE_INLINE_SLOTS,
            object_inline_slots: DEFAULT_OBJECT_INLINE_SLOTS,
            object_type: ObjectTypeId::DEFAULT,
            shared_data: None,
        }
    }

    /// Number of unboxed primitive slots stored inline per object.
    pub fn primitive_inline_slots(mut self, n: u32) -> Self {
        self.primitive_inline_slots = n;
        self
    }

    /// Number of boxed object slots stored inline per object.
    pub fn object_inline_slots(mut self, n: u32) -> Self {
        self.object_inline_slots = n;
        self
    }

    /// Dynamic type tag of the root shape.
    pub fn object_type(mut self, object_type: ObjectTypeId) -> Self {
        self.object_type = object_type;
        self
    }

    /// Embedder context attached to the root shape.
    pub fn shared_data(mut self, shared_data: SharedData) -> Self {
        self.shared_data = Some(shared_data);
        self
    }

    pub fn build(self) -> Layout {
        let inner = LayoutInner::new(self.primitive_inline_slots, self.object_inline_slots);
        let shared_data = self
            .shared_data
            .unwrap_or_else(|| Arc::new(()) as SharedData);
        let root = Shape::new_root(
            Arc::clone(&inner),
            self.object_type,
            shared_data,
            ShapeFlags::empty(),
        );
        Layout { inner, root }
    }
}

// ============================================================================
// Tests
// ============================================================================
