//! Error types for shape and location operations.

use std::fmt;

use tessera_core::InternedString;

/// Structural errors raised by shape transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// The key is already defined on the shape.
    DuplicateProperty { key: InternedString },
    /// The key is not defined on the shape.
    MissingProperty { key: InternedString },
    /// The two shapes do not descend from the same root.
    UnrelatedShapes,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::DuplicateProperty { key } => {
                write!(f, "property '{}' already defined", key.as_str())
            }
            ShapeError::MissingProperty { key } => {
                write!(f, "property '{}' not defined", key.as_str())
            }
            ShapeError::UnrelatedShapes => {
                write!(f, "shapes do not share a root and cannot be merged")
            }
        }
    }
}

impl std::error::Error for ShapeError {}

/// Storage errors raised when writing a value through a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationError {
    /// The value's kind does not match the slot's storage class.
    TypeMismatch,
    /// The location is final and already initialized.
    FinalReassignment,
    /// The location rejects `none` values.
    NonNullViolation,
    /// A constant location only admits its bound value.
    ConstantMismatch,
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationError::TypeMismatch => write!(f, "value does not fit the location's storage class"),
            LocationError::FinalReassignment => write!(f, "final location cannot be reassigned"),
            LocationError::NonNullViolation => write!(f, "location does not admit none"),
            LocationError::ConstantMismatch => write!(f, "constant location only admits its bound value"),
        }
    }
}

impl std::error::Error for LocationError {}

// ============================================================================
// Tests
// ============================================================================
