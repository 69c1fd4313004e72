//! Shape graph for object layouts (hidden classes).
//!
//! A shape is an immutable description of one object layout: the ordered
//! property list, each property's storage location, the dynamic type tag
//! and the reservation frontier. Objects point at their shape; every
//! layout "mutation" derives a child shape and leaves the original
//! untouched, so two objects built by the same property-definition
//! sequence end up pointing at the same shape instance.
//!
//! # Architecture
//!
//! ```text
//!   Layout (family config, mutex, stats)
//!      │
//!      ▼
//!   root shape ──add "x"──▶ shape{x} ──add "y"──▶ shape{x, y}
//!      │                      │   ▲
//!      │                      │   └── cached: the same add from the
//!      └──add "y"──▶ shape{y} │       same base returns the same Arc
//!                             ▼
//!                        shape{x'} (retype: "x" moved to a boxed slot)
//! ```
//!
//! Each shape memoizes its outgoing transitions. Lookups are lock-free
//! reads; constructing a missing edge takes the family mutex, re-checks,
//! builds exactly one child and publishes it. Everything else on a shape
//! is plain immutable data and can be read from any thread.
//!
//! # Performance
//!
//! - transition hits: one hash lookup under an uncontended read lock
//! - identity checks (`check`, inline-cache guards) are pointer compares
//! - property lookup scans the ordered list; shapes stay small in practice
//! - `valid`/`leaf` assumptions are single atomic loads

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tessera_core::{InternedString, Value, ValueKind};

use crate::allocator::{LocationAllocator, SlotFrontier};
use crate::assumption::Assumption;
use crate::error::ShapeError;
use crate::layout::{LayoutId, LayoutInner, ObjectTypeId, SharedData};
use crate::location::{Location, LocationModifiers, PrimitiveKind};
use crate::object::{DynamicObject, ObjectFactory};
use crate::property::{Property, PropertyFlags};
use crate::transition::Transition;

// ============================================================================
// Shape Identity
// ============================================================================

/// Process-unique numeric shape identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ShapeId(pub u32);

impl ShapeId {
    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

static NEXT_SHAPE_ID: AtomicU32 = AtomicU32::new(0);

fn allocate_shape_id() -> ShapeId {
    ShapeId(NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed))
}

bitflags! {
    /// Structural shape attributes inherited by derived shapes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct ShapeFlags: u8 {
        /// Objects of this shape may be reached by multiple threads;
        /// derived shapes never re-layout existing slots.
        const SHARED = 0b0000_0001;
        /// The primitive extension array is reserved; the allocator may
        /// spill unboxed slots into it.
        const PRIMITIVE_EXTENSION = 0b0000_0010;
    }
}

// ============================================================================
// Shape
// ============================================================================

/// An immutable object layout. See the module docs for the big picture.
pub struct Shape {
    id: ShapeId,
    layout: Arc<LayoutInner>,
    parent: Option<Arc<Shape>>,
    /// Ordered property list; keys are unique.
    properties: Box<[Property]>,
    object_type: ObjectTypeId,
    shared_data: SharedData,
    flags: ShapeFlags,
    frontier: SlotFrontier,
    /// Invalidated when the shape is superseded (e.g. by a merge).
    valid: Arc<Assumption>,
    /// Invalidated when the first transition leaves this shape.
    leaf: Arc<Assumption>,
    /// Memoized outgoing edges.
    transitions: RwLock<FxHashMap<Transition, Arc<Shape>>>,
}

impl Shape {
    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    pub(crate) fn new_root(
        layout: Arc<LayoutInner>,
        object_type: ObjectTypeId,
        shared_data: SharedData,
        flags: ShapeFlags,
    ) -> Arc<Shape> {
        layout.stats().record_shape_created();
        Arc::new(Shape {
            id: allocate_shape_id(),
            layout,
            parent: None,
            properties: Box::from([]),
            object_type,
            shared_data,
            flags,
            frontier: SlotFrontier::default(),
            valid: Assumption::new("valid shape"),
            leaf: Assumption::new("leaf shape"),
            transitions: RwLock::new(FxHashMap::default()),
        })
    }

    fn new_child(
        parent: &Arc<Shape>,
        properties: Box<[Property]>,
        frontier: SlotFrontier,
        flags: ShapeFlags,
        object_type: ObjectTypeId,
    ) -> Arc<Shape> {
        parent.layout.stats().record_shape_created();
        Arc::new(Shape {
            id: allocate_shape_id(),
            layout: Arc::clone(&parent.layout),
            parent: Some(Arc::clone(parent)),
            properties,
            object_type,
            shared_data: Arc::clone(&parent.shared_data),
            flags,
            frontier,
            valid: Assumption::new("valid shape"),
            leaf: Assumption::new("leaf shape"),
            transitions: RwLock::new(FxHashMap::default()),
        })
    }

    // ------------------------------------------------------------------------
    // Transition engine
    // ------------------------------------------------------------------------

    fn lookup_transition(&self, descriptor: &Transition) -> Option<Arc<Shape>> {
        self.transitions.read().get(descriptor).cloned()
    }

    /// Returns the memoized child for `descriptor`, building it under the
    /// family mutex on first request. Racing threads converge on the one
    /// instance the winner published.
    fn cached_transition(
        self: &Arc<Self>,
        descriptor: Transition,
        build: impl FnOnce() -> Arc<Shape>,
    ) -> Arc<Shape> {
        if let Some(existing) = self.lookup_transition(&descriptor) {
            self.layout.stats().record_transition_hit();
            return existing;
        }
        let _guard = self.layout.mutex().lock();
        // Double-check: a racing thread may have built the edge already
        if let Some(existing) = self.lookup_transition(&descriptor) {
            self.layout.stats().record_transition_hit();
            return existing;
        }
        self.layout.stats().record_transition_miss();
        let child = build();
        self.leaf.invalidate();
        self.transitions
            .write()
            .insert(descriptor, Arc::clone(&child));
        child
    }

    // ------------------------------------------------------------------------
    // Property Lookup
    // ------------------------------------------------------------------------

    /// Looks up a property by key, hidden properties included.
    pub fn get_property(&self, key: &InternedString) -> Option<&Property> {
        self.properties.iter().find(|p| p.key() == key)
    }

    pub fn has_property(&self, key: &InternedString) -> bool {
        self.get_property(key).is_some()
    }

    /// Number of properties, hidden ones included.
    #[inline]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// The most recently added property, if any.
    pub fn last_property(&self) -> Option<&Property> {
        self.properties.last()
    }

    // ------------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------------

    /// Non-hidden properties in insertion order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> + '_ {
        self.properties.iter().filter(|p| !p.is_hidden())
    }

    /// Non-hidden keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &InternedString> + '_ {
        self.properties().map(Property::key)
    }

    /// Non-hidden properties in insertion order, as an owned list.
    pub fn property_list(&self) -> Vec<Property> {
        self.properties().cloned().collect()
    }

    /// All properties (hidden included) accepted by `filter`, in
    /// insertion order.
    pub fn property_list_filtered(&self, filter: impl Fn(&Property) -> bool) -> Vec<Property> {
        self.properties.iter().filter(|p| filter(p)).cloned().collect()
    }

    /// All properties, hidden included, in ascending or descending
    /// insertion order.
    pub fn property_list_internal(&self, ascending: bool) -> Vec<Property> {
        if ascending {
            self.properties.to_vec()
        } else {
            self.properties.iter().rev().cloned().collect()
        }
    }

    /// Non-hidden keys in insertion order, as an owned list.
    pub fn key_list(&self) -> Vec<InternedString> {
        self.keys().cloned().collect()
    }

    /// All keys (hidden included) whose property is accepted by `filter`.
    pub fn key_list_filtered(&self, filter: impl Fn(&Property) -> bool) -> Vec<InternedString> {
        self.properties
            .iter()
            .filter(|p| filter(p))
            .map(|p| p.key().clone())
            .collect()
    }

    // ------------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------------

    #[inline(always)]
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// The shape this one was derived from; `None` for roots.
    #[inline]
    pub fn parent(&self) -> Option<&Arc<Shape>> {
        self.parent.as_ref()
    }

    #[inline]
    pub fn object_type(&self) -> ObjectTypeId {
        self.object_type
    }

    /// Embedder context shared by the whole family (until replaced by
    /// [`Shape::create_separate_shape`]).
    #[inline]
    pub fn shared_data(&self) -> &SharedData {
        &self.shared_data
    }

    #[inline]
    pub fn layout_id(&self) -> LayoutId {
        self.layout.id()
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.flags.contains(ShapeFlags::SHARED)
    }

    #[inline]
    pub fn has_primitive_extension(&self) -> bool {
        self.flags.contains(ShapeFlags::PRIMITIVE_EXTENSION)
    }

    /// Whether this shape has been superseded. Stale shapes remain fully
    /// functional; holders are expected to re-derive at their next check.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.is_valid()
    }

    /// Assumption mirroring [`Shape::is_valid`], for speculative callers.
    #[inline]
    pub fn valid_assumption(&self) -> &Arc<Assumption> {
        &self.valid
    }

    /// Whether no transition has ever left this shape.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.leaf.is_valid()
    }

    /// Assumption mirroring [`Shape::is_leaf`], for speculative callers.
    #[inline]
    pub fn leaf_assumption(&self) -> &Arc<Assumption> {
        &self.leaf
    }

    /// Whether an object currently has this exact shape.
    #[inline]
    pub fn check(&self, object: &DynamicObject) -> bool {
        std::ptr::eq(Arc::as_ptr(object.shape()), self)
    }

    /// Walks parent links up to the family root.
    pub fn root(self: &Arc<Self>) -> Arc<Shape> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.parent.clone() {
            current = parent;
        }
        current
    }

    /// Whether both shapes descend from the same root.
    #[inline]
    pub fn is_related(&self, other: &Shape) -> bool {
        Arc::ptr_eq(&self.layout, &other.layout)
    }

    /// Whether a memoized property transition for `key` exists.
    pub fn has_transition_with_key(&self, key: &InternedString) -> bool {
        self.transitions
            .read()
            .keys()
            .any(|t| t.property_key() == Some(key))
    }

    /// Number of memoized outgoing edges.
    pub fn transition_count(&self) -> usize {
        self.transitions.read().len()
    }

    /// The mutex serializing transition construction for this family.
    /// Embedders synchronize storage writes to shared-shape objects on it.
    pub fn mutex(&self) -> &Mutex<()> {
        self.layout.mutex()
    }

    /// Fresh allocator primed with this shape's reserved slots.
    pub fn allocator(&self) -> LocationAllocator {
        LocationAllocator::new(
            self.layout.primitive_inline_slots(),
            self.layout.object_inline_slots(),
            self.has_primitive_extension(),
            self.frontier,
        )
    }

    pub(crate) fn layout(&self) -> &LayoutInner {
        &self.layout
    }

    pub(crate) fn frontier(&self) -> SlotFrontier {
        self.frontier
    }

    // ------------------------------------------------------------------------
    // Property Transitions
    // ------------------------------------------------------------------------

    /// Derives a shape with `property` appended at the given location.
    ///
    /// The location should come from this shape's [`Shape::allocator`];
    /// the shape reserves it but does not validate overlap with slots the
    /// caller allocated elsewhere.
    pub fn add_property(self: &Arc<Self>, property: Property) -> Result<Arc<Shape>, ShapeError> {
        if self.has_property(property.key()) {
            return Err(ShapeError::DuplicateProperty {
                key: property.key().clone(),
            });
        }
        Ok(self.add_property_unchecked(property))
    }

    fn add_property_unchecked(self: &Arc<Self>, property: Property) -> Arc<Shape> {
        let descriptor = Transition::AddProperty {
            key: property.key().clone(),
            location: property.location().clone(),
            flags: property.flags(),
        };
        self.cached_transition(descriptor, || {
            let mut frontier = self.frontier;
            frontier.reserve(property.location());
            let mut properties = self.properties.to_vec();
            properties.push(property);
            Shape::new_child(
                self,
                properties.into_boxed_slice(),
                frontier,
                self.flags,
                self.object_type,
            )
        })
    }

    /// Like [`Shape::add_property`], but relocates the property to the
    /// next location this shape's allocator would assign. Used to copy
    /// properties across shapes whose slot layouts differ.
    pub fn append(self: &Arc<Self>, property: &Property) -> Result<Arc<Shape>, ShapeError> {
        if self.has_property(property.key()) {
            return Err(ShapeError::DuplicateProperty {
                key: property.key().clone(),
            });
        }
        let mut allocator = self.allocator();
        let location = allocator.move_location(property.location());
        Ok(self.add_property_unchecked(property.with_location(location)))
    }

    /// Derives the shape an object gets after `key = value`.
    ///
    /// - absent key: appends a property at a location suited to `value`
    /// - present and the location admits `value` with equal flags:
    ///   returns `self` unchanged
    /// - present with different flags but an admissible value: replaces
    ///   the property in place, keeping its location
    /// - present and inadmissible (kind conflict, final, non-null):
    ///   replaces the property at a generalized location that admits the
    ///   old storage class and `value`, leaving the old slot unused
    pub fn define_property(
        self: &Arc<Self>,
        key: InternedString,
        value: Value,
        flags: PropertyFlags,
    ) -> Arc<Shape> {
        self.define_property_impl(key, value, flags, |allocator, old| match old {
            None => allocator.location_for_value(value),
            Some(old) => generalized_location(allocator, old, value),
        })
    }

    /// [`Shape::define_property`] with a caller-supplied allocation
    /// policy, consulted for both the fresh-add and the relocation case.
    pub fn define_property_with(
        self: &Arc<Self>,
        key: InternedString,
        value: Value,
        flags: PropertyFlags,
        location_factory: impl FnOnce(&mut LocationAllocator, Value) -> Location,
    ) -> Arc<Shape> {
        self.define_property_impl(key, value, flags, |allocator, _old| {
            location_factory(allocator, value)
        })
    }

    fn define_property_impl(
        self: &Arc<Self>,
        key: InternedString,
        value: Value,
        flags: PropertyFlags,
        make_location: impl FnOnce(&mut LocationAllocator, Option<&Location>) -> Location,
    ) -> Arc<Shape> {
        let existing = self.get_property(&key).cloned();
        match existing {
            None => {
                let mut allocator = self.allocator();
                let location = make_location(&mut allocator, None);
                self.add_property_unchecked(Property::new(key, location, flags))
            }
            Some(current) if current.location().can_set(value) => {
                if current.flags() == flags {
                    Arc::clone(self)
                } else {
                    self.replace_property_unchecked(key, current.location().clone(), flags)
                }
            }
            Some(current) => {
                self.layout.stats().record_retype();
                let mut allocator = self.allocator();
                let location = make_location(&mut allocator, Some(current.location()));
                self.replace_property_unchecked(key, location, flags)
            }
        }
    }

    /// Derives a shape with the property for `property.key()` swapped to
    /// the given location and flags. Relative property order is kept; no
    /// other property moves.
    pub fn replace_property(self: &Arc<Self>, property: Property) -> Result<Arc<Shape>, ShapeError> {
        if !self.has_property(property.key()) {
            return Err(ShapeError::MissingProperty {
                key: property.key().clone(),
            });
        }
        Ok(self.replace_property_unchecked(
            property.key().clone(),
            property.location().clone(),
            property.flags(),
        ))
    }

    fn replace_property_unchecked(
        self: &Arc<Self>,
        key: InternedString,
        location: Location,
        flags: PropertyFlags,
    ) -> Arc<Shape> {
        let descriptor = Transition::ReplaceProperty {
            key: key.clone(),
            location: location.clone(),
            flags,
        };
        self.cached_transition(descriptor, || {
            let mut frontier = self.frontier;
            frontier.reserve(&location);
            let properties: Box<[Property]> = self
                .properties
                .iter()
                .map(|p| {
                    if p.key() == &key {
                        Property::new(key.clone(), location.clone(), flags)
                    } else {
                        p.clone()
                    }
                })
                .collect();
            Shape::new_child(self, properties, frontier, self.flags, self.object_type)
        })
    }

    /// Derives a shape without `key`, or `None` if the key is absent.
    ///
    /// Unshared shapes re-layout the survivors compactly (objects must
    /// migrate their storage). Shared shapes keep every surviving slot
    /// where it is and never shrink the frontier, so concurrent readers
    /// of old locations stay safe; the removed slot simply leaks.
    pub fn remove_property(self: &Arc<Self>, key: &InternedString) -> Option<Arc<Shape>> {
        if !self.has_property(key) {
            return None;
        }
        let descriptor = Transition::RemoveProperty { key: key.clone() };
        Some(self.cached_transition(descriptor, || {
            self.layout.stats().record_removal();
            if self.is_shared() {
                let properties: Box<[Property]> = self
                    .properties
                    .iter()
                    .filter(|p| p.key() != key)
                    .cloned()
                    .collect();
                Shape::new_child(self, properties, self.frontier, self.flags, self.object_type)
            } else {
                let mut allocator = LocationAllocator::new(
                    self.layout.primitive_inline_slots(),
                    self.layout.object_inline_slots(),
                    self.has_primitive_extension(),
                    SlotFrontier::default(),
                );
                let properties: Box<[Property]> = self
                    .properties
                    .iter()
                    .filter(|p| p.key() != key)
                    .map(|p| p.with_location(allocator.move_location(p.location())))
                    .collect();
                Shape::new_child(
                    self,
                    properties,
                    allocator.frontier(),
                    self.flags,
                    self.object_type,
                )
            }
        }))
    }

    // ------------------------------------------------------------------------
    // Layout-Level Transitions
    // ------------------------------------------------------------------------

    /// Derives a shape with a different dynamic type tag.
    pub fn change_object_type(self: &Arc<Self>, object_type: ObjectTypeId) -> Arc<Shape> {
        if self.object_type == object_type {
            return Arc::clone(self);
        }
        self.cached_transition(Transition::ObjectType { object_type }, || {
            Shape::new_child(
                self,
                self.properties.clone(),
                self.frontier,
                self.flags,
                object_type,
            )
        })
    }

    /// Derives a shape whose allocator may spill unboxed primitives into
    /// the extension array instead of boxing them.
    pub fn reserve_primitive_extension(self: &Arc<Self>) -> Arc<Shape> {
        if self.has_primitive_extension() {
            return Arc::clone(self);
        }
        self.cached_transition(Transition::ReservePrimitiveExtension, || {
            Shape::new_child(
                self,
                self.properties.clone(),
                self.frontier,
                self.flags | ShapeFlags::PRIMITIVE_EXTENSION,
                self.object_type,
            )
        })
    }

    /// Derives the shared variant of this shape. Objects adopting it may
    /// be published to other threads; all derived shapes stay shared and
    /// never re-layout existing slots.
    pub fn make_shared(self: &Arc<Self>) -> Arc<Shape> {
        if self.is_shared() {
            return Arc::clone(self);
        }
        self.cached_transition(Transition::Share, || {
            Shape::new_child(
                self,
                self.properties.clone(),
                self.frontier,
                self.flags | ShapeFlags::SHARED,
                self.object_type,
            )
        })
    }

    // ------------------------------------------------------------------------
    // Merging
    // ------------------------------------------------------------------------

    /// Attempts to find or build a shape both inputs' objects can migrate
    /// to. Returns `Ok(None)` when the shapes are related but not
    /// mergeable (different key order, flags, type tags), and
    /// `Err(UnrelatedShapes)` when they do not share a root.
    ///
    /// When one input already generalizes the other it is returned as-is.
    /// Superseded inputs have their valid assumption invalidated, which
    /// is the signal for caches to re-derive. Results are cached per peer
    /// shape; replays return the cached winner without touching validity.
    pub fn try_merge(
        self: &Arc<Self>,
        other: &Arc<Shape>,
    ) -> Result<Option<Arc<Shape>>, ShapeError> {
        if !self.is_related(other) {
            return Err(ShapeError::UnrelatedShapes);
        }
        if Arc::ptr_eq(self, other) {
            return Ok(Some(Arc::clone(self)));
        }
        if self.flags != other.flags
            || self.object_type != other.object_type
            || self.properties.len() != other.properties.len()
        {
            return Ok(None);
        }
        for (a, b) in self.properties.iter().zip(other.properties.iter()) {
            if a.key() != b.key() || a.flags() != b.flags() {
                return Ok(None);
            }
        }

        let descriptor = Transition::Merge { other: other.id };
        if let Some(merged) = self.lookup_transition(&descriptor) {
            self.layout.stats().record_transition_hit();
            return Ok(Some(merged));
        }
        // Superseding a shape must not overlap an in-flight construction
        // anywhere in the family, so the mutex covers every invalidating
        // path, not just the build
        let _guard = self.layout.mutex().lock();
        if let Some(merged) = self.lookup_transition(&descriptor) {
            self.layout.stats().record_transition_hit();
            return Ok(Some(merged));
        }
        self.layout.stats().record_transition_miss();

        if generalizes(&self.properties, &other.properties) {
            other.mark_superseded();
            self.transitions
                .write()
                .insert(descriptor, Arc::clone(self));
            return Ok(Some(Arc::clone(self)));
        }
        if generalizes(&other.properties, &self.properties) {
            self.mark_superseded();
            self.transitions
                .write()
                .insert(descriptor, Arc::clone(other));
            return Ok(Some(Arc::clone(other)));
        }

        let merged = self.build_merged(other);
        self.layout.stats().record_merge();
        self.mark_superseded();
        other.mark_superseded();
        self.leaf.invalidate();
        self.transitions
            .write()
            .insert(descriptor, Arc::clone(&merged));
        Ok(Some(merged))
    }

    /// Drops the valid assumption of a merge-superseded shape. Callers
    /// hold the family mutex; an already-invalid shape records nothing.
    fn mark_superseded(&self) {
        if self.is_valid() {
            self.valid.invalidate();
            self.layout.stats().record_invalidation();
        }
    }

    fn build_merged(self: &Arc<Self>, other: &Arc<Shape>) -> Arc<Shape> {
        // Shared families must not reuse any slot either input ever
        // assigned; unshared merges re-layout compactly
        let start = if self.is_shared() {
            self.frontier.union(other.frontier)
        } else {
            SlotFrontier::default()
        };
        let mut allocator = LocationAllocator::new(
            self.layout.primitive_inline_slots(),
            self.layout.object_inline_slots(),
            self.has_primitive_extension(),
            start,
        );
        let properties: Box<[Property]> = self
            .properties
            .iter()
            .zip(other.properties.iter())
            .map(|(a, b)| {
                let class = merged_class(slot_class(a.location()), slot_class(b.location()));
                let location = match class {
                    SlotClass::Constant(value) => Location::Constant { value },
                    SlotClass::Declared(default) => Location::Declared { default },
                    SlotClass::Primitive(kind) => {
                        allocator.location_for_type(kind.value_kind(), LocationModifiers::empty())
                    }
                    SlotClass::Object { non_null } => {
                        let modifiers = if non_null {
                            LocationModifiers::NON_NULL
                        } else {
                            LocationModifiers::empty()
                        };
                        allocator.location_for_type(ValueKind::Object, modifiers)
                    }
                };
                a.with_location(location)
            })
            .collect();
        Shape::new_child(
            self,
            properties,
            allocator.frontier(),
            self.flags,
            self.object_type,
        )
    }

    // ------------------------------------------------------------------------
    // Family Surgery
    // ------------------------------------------------------------------------

    /// Clones this shape into a brand-new family with its own root,
    /// mutex, counters and `shared_data`. The result is structurally
    /// identical (same properties at the same locations), so existing
    /// storage layouts carry over, but it is unrelated to this shape and
    /// never returns memoized results from the old family.
    pub fn create_separate_shape(self: &Arc<Self>, shared_data: SharedData) -> Arc<Shape> {
        let family = self.layout.fresh_family();
        let root = Shape::new_root(family, self.object_type, shared_data, self.flags);
        if self.properties.is_empty() {
            return root;
        }
        root.leaf.invalidate();
        Shape::new_child(
            &root,
            self.properties.clone(),
            self.frontier,
            self.flags,
            self.object_type,
        )
    }

    // ------------------------------------------------------------------------
    // Instantiation
    // ------------------------------------------------------------------------

    /// Creates an empty object of this shape with presized storage.
    pub fn new_instance(self: &Arc<Self>) -> DynamicObject {
        DynamicObject::new(Arc::clone(self))
    }

    /// Factory that stamps out instances of this shape.
    pub fn create_factory(self: &Arc<Self>) -> ObjectFactory {
        ObjectFactory::new(Arc::clone(self))
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("id", &self.id)
            .field("object_type", &self.object_type)
            .field("flags", &self.flags)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Location Generalization
// ============================================================================

/// Storage class of a location, ignoring slot indices and finality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotClass {
    Constant(Value),
    Declared(Value),
    Primitive(PrimitiveKind),
    Object { non_null: bool },
}

fn slot_class(location: &Location) -> SlotClass {
    match *location {
        Location::Constant { value } => SlotClass::Constant(value),
        Location::Declared { default } => SlotClass::Declared(default),
        Location::PrimitiveSlot { kind, .. } => SlotClass::Primitive(kind),
        Location::ObjectSlot { non_null, .. } => SlotClass::Object { non_null },
    }
}

/// Join of two storage classes: the least class that can store every
/// value either input could.
fn merged_class(a: SlotClass, b: SlotClass) -> SlotClass {
    if a == b {
        return a;
    }
    match (a, b) {
        // Unboxed values are never none, so a boxed join of two
        // primitive classes keeps the non-null guarantee
        (SlotClass::Primitive(_), SlotClass::Primitive(_)) => SlotClass::Object { non_null: true },
        (SlotClass::Primitive(_), SlotClass::Object { non_null })
        | (SlotClass::Object { non_null }, SlotClass::Primitive(_)) => {
            SlotClass::Object { non_null }
        }
        (SlotClass::Object { non_null: na }, SlotClass::Object { non_null: nb }) => {
            SlotClass::Object { non_null: na && nb }
        }
        // Mismatched constant/declared locations lose their storage-free
        // status entirely
        _ => SlotClass::Object { non_null: false },
    }
}

/// Whether every location in `general` can already store everything the
/// corresponding location in `specific` can.
fn generalizes(general: &[Property], specific: &[Property]) -> bool {
    general.iter().zip(specific.iter()).all(|(a, b)| {
        let ca = slot_class(a.location());
        merged_class(ca, slot_class(b.location())) == ca
    })
}

/// Replacement location for a retype: admits the stored value and stays
/// stable under further writes of either the old or the new class.
fn generalized_location(
    allocator: &mut LocationAllocator,
    old: &Location,
    value: Value,
) -> Location {
    match *old {
        // The first real write narrows a declared property to the
        // value's natural class
        Location::Declared { .. } => allocator.location_for_value(value),
        // Same-kind conflict (a final slot): keep the unboxed class
        Location::PrimitiveSlot { kind, .. } if kind.admits(value) => {
            allocator.location_for_type(kind.value_kind(), LocationModifiers::empty())
        }
        // Cross-kind conflicts generalize to a nullable boxed slot
        _ => allocator.location_for_type(ValueKind::Object, LocationModifiers::empty()),
    }
}

// ============================================================================
// Tests
// ============================================================================
