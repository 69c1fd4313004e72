//! Slot allocation policy.
//!
//! The allocator decides which storage class a value gets and hands out
//! slot indices from a monotonically growing frontier. Slots already held
//! by earlier properties are never re-layouted; derived shapes only ever
//! extend the reservation frontier, which is what keeps parent and child
//! shapes storage-compatible.
//!
//! Allocation order within a class:
//!
//! 1. unboxed primitive inline slot (ints, floats, bools)
//! 2. primitive extension slot, if the shape reserved the extension array
//! 3. boxed inline object slot
//! 4. object extension slot
//!
//! Each [`crate::shape::Shape`] hands out allocators primed with its own
//! frontier via `Shape::allocator()`; the allocator is a detached value
//! and mutating it never changes the shape it came from.

use tessera_core::{Value, ValueKind};

use crate::location::{Location, LocationModifiers, PrimitiveKind};

// ============================================================================
// SlotFrontier
// ============================================================================

/// High-water marks for the four storage regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SlotFrontier {
    pub(crate) primitive_inline: u32,
    pub(crate) primitive_ext: u32,
    pub(crate) object_inline: u32,
    pub(crate) object_ext: u32,
}

impl SlotFrontier {
    /// Extends the frontier past `location`'s slot, if it has one.
    pub(crate) fn reserve(&mut self, location: &Location) {
        match *location {
            Location::PrimitiveSlot {
                index,
                extension: false,
                ..
            } => self.primitive_inline = self.primitive_inline.max(index + 1),
            Location::PrimitiveSlot {
                index,
                extension: true,
                ..
            } => self.primitive_ext = self.primitive_ext.max(index + 1),
            Location::ObjectSlot {
                index,
                extension: false,
                ..
            } => self.object_inline = self.object_inline.max(index + 1),
            Location::ObjectSlot {
                index,
                extension: true,
                ..
            } => self.object_ext = self.object_ext.max(index + 1),
            Location::Constant { .. } | Location::Declared { .. } => {}
        }
    }

    /// Component-wise maximum of two frontiers.
    pub(crate) fn union(self, other: SlotFrontier) -> SlotFrontier {
        SlotFrontier {
            primitive_inline: self.primitive_inline.max(other.primitive_inline),
            primitive_ext: self.primitive_ext.max(other.primitive_ext),
            object_inline: self.object_inline.max(other.object_inline),
            object_ext: self.object_ext.max(other.object_ext),
        }
    }
}

// ============================================================================
// LocationAllocator
// ============================================================================

/// Hands out locations for new properties.
///
/// Cloning an allocator snapshots its frontier; the clone allocates
/// independently from that point on.
#[derive(Debug, Clone)]
pub struct LocationAllocator {
    primitive_inline_cap: u32,
    object_inline_cap: u32,
    use_primitive_ext: bool,
    frontier: SlotFrontier,
}

impl LocationAllocator {
    pub(crate) fn new(
        primitive_inline_cap: u32,
        object_inline_cap: u32,
        use_primitive_ext: bool,
        frontier: SlotFrontier,
    ) -> Self {
        Self {
            primitive_inline_cap,
            object_inline_cap,
            use_primitive_ext,
            frontier,
        }
    }

    pub(crate) fn frontier(&self) -> SlotFrontier {
        self.frontier
    }

    // ------------------------------------------------------------------------
    // Public allocation requests
    // ------------------------------------------------------------------------

    /// Location suited to `value`, with the default policy: mutable, and
    /// non-null when the value itself is not `none`.
    pub fn location_for_value(&mut self, value: Value) -> Location {
        self.location_for_value_with(value, LocationModifiers::NON_NULL)
    }

    /// Location suited to `value` under explicit modifiers. A `NON_NULL`
    /// request is ignored when the value is `none`.
    pub fn location_for_value_with(
        &mut self,
        value: Value,
        modifiers: LocationModifiers,
    ) -> Location {
        let is_final = modifiers.contains(LocationModifiers::FINAL);
        let non_null = modifiers.contains(LocationModifiers::NON_NULL) && !value.is_none();
        match value.kind() {
            ValueKind::Int => self.primitive_or_boxed(PrimitiveKind::Int, is_final, non_null),
            ValueKind::Float => self.primitive_or_boxed(PrimitiveKind::Float, is_final, non_null),
            ValueKind::Bool => self.primitive_or_boxed(PrimitiveKind::Bool, is_final, non_null),
            ValueKind::None | ValueKind::Str | ValueKind::Object => {
                self.alloc_object(is_final, non_null)
            }
        }
    }

    /// Location suited to a value kind rather than a concrete value.
    pub fn location_for_type(&mut self, kind: ValueKind, modifiers: LocationModifiers) -> Location {
        let is_final = modifiers.contains(LocationModifiers::FINAL);
        let non_null = modifiers.contains(LocationModifiers::NON_NULL);
        match kind {
            ValueKind::Int => self.primitive_or_boxed(PrimitiveKind::Int, is_final, non_null),
            ValueKind::Float => self.primitive_or_boxed(PrimitiveKind::Float, is_final, non_null),
            ValueKind::Bool => self.primitive_or_boxed(PrimitiveKind::Bool, is_final, non_null),
            ValueKind::None => self.alloc_object(is_final, false),
            ValueKind::Str | ValueKind::Object => self.alloc_object(is_final, non_null),
        }
    }

    /// Storage-free location that always reads as `value`.
    pub fn constant_location(&self, value: Value) -> Location {
        Location::Constant { value }
    }

    /// Storage-free declared location reading as `default` until the
    /// first real write retypes it.
    pub fn declared_location(&self, default: Value) -> Location {
        Location::Declared { default }
    }

    /// Marks `location`'s slot as taken so it will not be handed out to
    /// subsequently allocated locations.
    pub fn reserve(&mut self, location: &Location) {
        self.frontier.reserve(location);
    }

    /// Allocates a fresh location with the same storage class, finality
    /// and null policy as `location`.
    pub fn move_location(&mut self, location: &Location) -> Location {
        match *location {
            Location::PrimitiveSlot { kind, is_final, .. } => {
                // Primitive values are never none, so the boxed fallback
                // keeps the non-null guarantee
                self.primitive_or_boxed(kind, is_final, true)
            }
            Location::ObjectSlot {
                is_final, non_null, ..
            } => self.alloc_object(is_final, non_null),
            Location::Constant { value } => Location::Constant { value },
            Location::Declared { default } => Location::Declared { default },
        }
    }

    // ------------------------------------------------------------------------
    // Region allocation
    // ------------------------------------------------------------------------

    fn primitive_or_boxed(
        &mut self,
        kind: PrimitiveKind,
        is_final: bool,
        non_null: bool,
    ) -> Location {
        match self.alloc_primitive(kind, is_final) {
            Some(location) => location,
            None => self.alloc_object(is_final, non_null),
        }
    }

    fn alloc_primitive(&mut self, kind: PrimitiveKind, is_final: bool) -> Option<Location> {
        if self.frontier.primitive_inline < self.primitive_inline_cap {
            let index = self.frontier.primitive_inline;
            self.frontier.primitive_inline += 1;
            Some(Location::PrimitiveSlot {
                index,
                extension: false,
                kind,
                is_final,
            })
        } else if self.use_primitive_ext {
            let index = self.frontier.primitive_ext;
            self.frontier.primitive_ext += 1;
            Some(Location::PrimitiveSlot {
                index,
                extension: true,
                kind,
                is_final,
            })
        } else {
            None
        }
    }

    fn alloc_object(&mut self, is_final: bool, non_null: bool) -> Location {
        if self.frontier.object_inline < self.object_inline_cap {
            let index = self.frontier.object_inline;
            self.frontier.object_inline += 1;
            Location::ObjectSlot {
                index,
                extension: false,
                is_final,
                non_null,
            }
        } else {
            let index = self.frontier.object_ext;
            self.frontier.object_ext += 1;
            Location::ObjectSlot {
                index,
                extension: true,
                is_final,
                non_null,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
