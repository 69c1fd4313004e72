//! Transition descriptors.
//!
//! Each shape memoizes its outgoing edges in a map keyed by these
//! descriptors. Two requests with equal descriptors must reach the same
//! child shape, so a descriptor captures the *full* identity of the
//! operation: for property edges that includes the location and flags,
//! not just the key.

use tessera_core::InternedString;

use crate::layout::ObjectTypeId;
use crate::location::Location;
use crate::property::PropertyFlags;
use crate::shape::ShapeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Transition {
    AddProperty {
        key: InternedString,
        location: Location,
        flags: PropertyFlags,
    },
    RemoveProperty {
        key: InternedString,
    },
    ReplaceProperty {
        key: InternedString,
        location: Location,
        flags: PropertyFlags,
    },
    ObjectType {
        object_type: ObjectTypeId,
    },
    ReservePrimitiveExtension,
    Share,
    Merge {
        other: ShapeId,
    },
}

impl Transition {
    /// The property key this edge concerns, if it concerns one.
    pub(crate) fn property_key(&self) -> Option<&InternedString> {
        match self {
            Transition::AddProperty { key, .. }
            | Transition::RemoveProperty { key }
            | Transition::ReplaceProperty { key, .. } => Some(key),
            Transition::ObjectType { .. }
            | Transition::ReservePrimitiveExtension
            | Transition::Share
            | Transition::Merge { .. } => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
