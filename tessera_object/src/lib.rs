//! Shape-based object model for the Tessera runtime.
//!
//! This crate provides:
//! - Immutable shapes describing property-to-storage mappings
//! - Memoized shape transitions (add, replace, remove, retype)
//! - Typed storage locations (primitive, boxed, constant, declared)
//! - Slot allocation with inline and extension storage regions
//! - Dynamic objects backed by flat slot arrays
//! - Shape validity and leaf assumptions for speculative callers
//! - Structural shape merging with location generalization

#![deny(unsafe_op_in_unsafe_fn)]

pub mod allocator;
pub mod assumption;
pub mod error;
pub mod layout;
pub mod location;
pub mod object;
pub mod property;
pub mod shape;

pub(crate) mod transition;

// Re-export commonly used items
pub use allocator::LocationAllocator;
pub use assumption::Assumption;
pub use error::{LocationError, ShapeError};
pub use layout::{
    DEFAULT_OBJECT_INLINE_SLOTS, DEFAULT_PRIMITIVE_INLINE_SLOTS, Layout, LayoutBuilder, LayoutId,
    LayoutStatsSnapshot, ObjectTypeId, SharedData,
};
pub use location::{Location, LocationModifiers, PrimitiveKind};
pub use object::{DynamicObject, ObjectFactory};
pub use property::{Property, PropertyFlags};
pub use shape::{Shape, ShapeId};
