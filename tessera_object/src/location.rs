//! Property storage locations.
//!
//! A location says where a property's value lives relative to an object,
//! or that no storage is needed at all:
//!
//! - `PrimitiveSlot`: an unboxed 64-bit cell in the primitive array,
//!   tagged with the primitive kind it stores
//! - `ObjectSlot`: a boxed [`Value`] cell in the object array
//! - `Constant`: the value is baked into the shape; reads return it and
//!   objects carry nothing
//! - `Declared`: a default value baked into the shape; the first real
//!   write retypes the property to a storage location
//!
//! Slot locations address either the fixed inline area or the spillover
//! extension array (`extension: true`). Locations are immutable and carry
//! their finality and null-admission policy with them, so they can be
//! compared for transition identity.

use bitflags::bitflags;
use tessera_core::{Value, ValueKind};

use crate::error::LocationError;
use crate::object::DynamicObject;

// ============================================================================
// Primitive storage kinds
// ============================================================================

/// Storage class of an unboxed primitive slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Int,
    Float,
    Bool,
}

impl PrimitiveKind {
    /// Whether `value` can be stored unboxed in a slot of this kind.
    #[inline]
    pub fn admits(self, value: Value) -> bool {
        match self {
            PrimitiveKind::Int => value.is_int(),
            PrimitiveKind::Float => value.is_float(),
            PrimitiveKind::Bool => value.is_bool(),
        }
    }

    /// The value kind stored by this primitive class.
    #[inline]
    pub fn value_kind(self) -> ValueKind {
        match self {
            PrimitiveKind::Int => ValueKind::Int,
            PrimitiveKind::Float => ValueKind::Float,
            PrimitiveKind::Bool => ValueKind::Bool,
        }
    }

    /// Unboxes `value` into the raw slot representation.
    #[inline]
    fn encode(self, value: Value) -> Option<u64> {
        match self {
            PrimitiveKind::Int => value.as_int().map(|n| n as u64),
            PrimitiveKind::Float => value.as_float().map(f64::to_bits),
            PrimitiveKind::Bool => value.as_bool().map(u64::from),
        }
    }

    /// Reboxes a raw slot word.
    #[inline]
    fn decode(self, raw: u64) -> Value {
        match self {
            PrimitiveKind::Int => {
                Value::int(raw as i64).expect("primitive slot holds an out-of-range integer")
            }
            PrimitiveKind::Float => Value::float(f64::from_bits(raw)),
            PrimitiveKind::Bool => Value::bool(raw != 0),
        }
    }
}

bitflags! {
    /// Modifiers accepted by the allocator's location requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LocationModifiers: u8 {
        /// The location is write-once: it accepts its value when the
        /// object transitions to the shape and rejects later stores.
        const FINAL = 0b0000_0001;
        /// The location never stores `none`.
        const NON_NULL = 0b0000_0010;
    }
}

impl Default for LocationModifiers {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Location
// ============================================================================

/// Where a property's value lives, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// Unboxed 64-bit cell in the primitive array.
    PrimitiveSlot {
        index: u32,
        extension: bool,
        kind: PrimitiveKind,
        is_final: bool,
    },
    /// Boxed cell in the object array.
    ObjectSlot {
        index: u32,
        extension: bool,
        is_final: bool,
        non_null: bool,
    },
    /// Value stored in the shape itself; objects carry nothing.
    Constant { value: Value },
    /// Declared-only property with a shape-level default; the first
    /// write retypes it to real storage.
    Declared { default: Value },
}

impl Location {
    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(self, Location::Constant { .. })
    }

    #[inline]
    pub fn is_declared(&self) -> bool {
        matches!(self, Location::Declared { .. })
    }

    /// Whether this location occupies storage in objects.
    #[inline]
    pub fn has_slot(&self) -> bool {
        matches!(self, Location::PrimitiveSlot { .. } | Location::ObjectSlot { .. })
    }

    #[inline]
    pub fn is_final(&self) -> bool {
        match *self {
            Location::PrimitiveSlot { is_final, .. } | Location::ObjectSlot { is_final, .. } => {
                is_final
            }
            // Shape-bound locations never change after the transition
            Location::Constant { .. } | Location::Declared { .. } => true,
        }
    }

    /// Whether `value` belongs to this location's storage class, ignoring
    /// finality. A final slot *fits* a value it would refuse to *set*.
    pub fn fits(&self, value: Value) -> bool {
        match *self {
            Location::PrimitiveSlot { kind, .. } => kind.admits(value),
            Location::ObjectSlot { non_null, .. } => !(non_null && value.is_none()),
            Location::Constant { value: bound } => value == bound,
            Location::Declared { default } => value == default,
        }
    }

    /// Whether a post-transition in-place store of `value` would succeed.
    pub fn can_set(&self, value: Value) -> bool {
        match *self {
            Location::PrimitiveSlot { kind, is_final, .. } => !is_final && kind.admits(value),
            Location::ObjectSlot {
                is_final, non_null, ..
            } => !is_final && !(non_null && value.is_none()),
            Location::Constant { value: bound } => value == bound,
            Location::Declared { default } => value == default,
        }
    }

    /// Reads the value through this location.
    ///
    /// # Panics
    ///
    /// Panics if the object's storage does not cover this location's slot;
    /// objects must be instantiated or migrated through their shape.
    pub fn get(&self, object: &DynamicObject) -> Value {
        match *self {
            Location::PrimitiveSlot {
                index,
                extension,
                kind,
                ..
            } => kind.decode(object.primitive_raw(index, extension)),
            Location::ObjectSlot {
                index, extension, ..
            } => object.object_slot(index, extension),
            Location::Constant { value } => value,
            Location::Declared { default } => default,
        }
    }

    /// Stores `value` through this location, enforcing finality.
    ///
    /// # Panics
    ///
    /// Panics if the object's storage does not cover this location's slot.
    pub fn set(&self, object: &mut DynamicObject, value: Value) -> Result<(), LocationError> {
        self.write(object, value, false)
    }

    /// Stores `value` as part of a shape transition or migration, where
    /// final locations receive their one allowed write.
    pub(crate) fn set_initializing(
        &self,
        object: &mut DynamicObject,
        value: Value,
    ) -> Result<(), LocationError> {
        self.write(object, value, true)
    }

    fn write(
        &self,
        object: &mut DynamicObject,
        value: Value,
        initializing: bool,
    ) -> Result<(), LocationError> {
        match *self {
            Location::PrimitiveSlot {
                index,
                extension,
                kind,
                is_final,
            } => {
                let raw = kind.encode(value).ok_or(LocationError::TypeMismatch)?;
                if is_final && !initializing {
                    return Err(LocationError::FinalReassignment);
                }
                object.set_primitive_raw(index, extension, raw);
                Ok(())
            }
            Location::ObjectSlot {
                index,
                extension,
                is_final,
                non_null,
            } => {
                if non_null && value.is_none() {
                    return Err(LocationError::NonNullViolation);
                }
                if is_final && !initializing {
                    return Err(LocationError::FinalReassignment);
                }
                object.set_object_slot(index, extension, value);
                Ok(())
            }
            Location::Constant { value: bound } => {
                if value == bound {
                    Ok(())
                } else {
                    Err(LocationError::ConstantMismatch)
                }
            }
            Location::Declared { default } => {
                if value == default {
                    Ok(())
                } else {
                    Err(LocationError::TypeMismatch)
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
