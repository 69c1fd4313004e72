//! NaN-boxed value representation.
//!
//! Every value fits in a single 64-bit word. Doubles are stored verbatim;
//! all other kinds live in the quiet-NaN space, discriminated by the high
//! 16 bits and carrying a 48-bit payload.
//!
//! # Encoding
//!
//! ```text
//! 0x7FF8_0000_0000_0000   canonical NaN (every float NaN collapses here)
//! 0x7FF9_................  none
//! 0x7FFA_................  bool (payload 0 or 1)
//! 0x7FFB_................  small int (48-bit two's complement payload)
//! 0x7FFC_................  interned string (payload = canonical data pointer)
//! 0x7FFD_................  object reference (payload = pointer)
//! any other bit pattern    f64, stored as-is
//! ```
//!
//! # Performance
//!
//! - `Value` is `Copy`; moves and comparisons are single-word operations
//! - Kind checks are one mask-and-compare
//! - Equality and hashing are bitwise, so `Value` can key hash maps
//!   directly (interned strings make this content-correct for strings)

use std::fmt;

use crate::intern::{self, InternedString};

// ============================================================================
// Encoding Constants
// ============================================================================

/// Mask selecting the 16 tag bits.
pub const TYPE_TAG_MASK: u64 = 0xFFFF_0000_0000_0000;

/// Mask selecting the 48 payload bits.
pub const VALUE_PAYLOAD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Canonical quiet NaN. All float NaNs are normalized to this pattern so
/// they can never alias a tagged value.
pub const CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

const TAG_NONE: u64 = 0x7FF9_0000_0000_0000;
const TAG_BOOL: u64 = 0x7FFA_0000_0000_0000;
const TAG_INT: u64 = 0x7FFB_0000_0000_0000;
const TAG_STR: u64 = 0x7FFC_0000_0000_0000;
const TAG_OBJECT: u64 = 0x7FFD_0000_0000_0000;

/// Largest integer representable in the 48-bit small-int payload.
pub const SMALL_INT_MAX: i64 = (1 << 47) - 1;

/// Smallest integer representable in the 48-bit small-int payload.
pub const SMALL_INT_MIN: i64 = -(1 << 47);

// ============================================================================
// Value
// ============================================================================

/// A single NaN-boxed value word.
///
/// Equality and hashing operate on the raw bits. For ints, bools and none
/// that is value equality; for floats it is bit equality (`-0.0 != 0.0`,
/// canonical NaN equals itself); for strings and objects it is identity,
/// which for interned strings coincides with content equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(u64);

/// Discriminant for the six value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    None,
    Bool,
    Int,
    Float,
    Str,
    Object,
}

impl Value {
    // ------------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------------

    /// The unit/absent value.
    #[inline(always)]
    pub const fn none() -> Self {
        Self(TAG_NONE)
    }

    /// Boxes a boolean.
    #[inline(always)]
    pub const fn bool(b: bool) -> Self {
        Self(TAG_BOOL | b as u64)
    }

    /// Boxes a small integer, or `None` if it does not fit in 48 bits.
    #[inline(always)]
    pub const fn int(n: i64) -> Option<Self> {
        if n >= SMALL_INT_MIN && n <= SMALL_INT_MAX {
            Some(Self(TAG_INT | ((n as u64) & VALUE_PAYLOAD_MASK)))
        } else {
            None
        }
    }

    /// Boxes a float. NaNs are canonicalized so they cannot collide with
    /// tagged payloads.
    #[inline(always)]
    pub fn float(f: f64) -> Self {
        if f.is_nan() {
            Self(CANONICAL_NAN)
        } else {
            Self(f.to_bits())
        }
    }

    /// Boxes an interned string by its canonical pointer.
    #[inline]
    pub fn str(s: &InternedString) -> Self {
        Self(TAG_STR | (s.as_raw() as u64 & VALUE_PAYLOAD_MASK))
    }

    /// Boxes a raw object reference. The pointer must stay valid for as
    /// long as the value is reachable; the value does not own it.
    #[inline(always)]
    pub fn object(ptr: *const ()) -> Self {
        Self(TAG_OBJECT | (ptr as u64 & VALUE_PAYLOAD_MASK))
    }

    /// Reconstructs a value from raw bits previously obtained via
    /// [`Value::to_bits`].
    #[inline(always)]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw 64-bit encoding.
    #[inline(always)]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    // ------------------------------------------------------------------------
    // Kind queries
    // ------------------------------------------------------------------------

    /// Returns which of the six kinds this value holds.
    #[inline(always)]
    pub const fn kind(self) -> ValueKind {
        match self.0 & TYPE_TAG_MASK {
            TAG_NONE => ValueKind::None,
            TAG_BOOL => ValueKind::Bool,
            TAG_INT => ValueKind::Int,
            TAG_STR => ValueKind::Str,
            TAG_OBJECT => ValueKind::Object,
            _ => ValueKind::Float,
        }
    }

    #[inline(always)]
    pub const fn is_none(self) -> bool {
        self.0 == TAG_NONE
    }

    #[inline(always)]
    pub const fn is_bool(self) -> bool {
        self.0 & TYPE_TAG_MASK == TAG_BOOL
    }

    #[inline(always)]
    pub const fn is_int(self) -> bool {
        self.0 & TYPE_TAG_MASK == TAG_INT
    }

    #[inline(always)]
    pub const fn is_float(self) -> bool {
        matches!(self.kind(), ValueKind::Float)
    }

    #[inline(always)]
    pub const fn is_str(self) -> bool {
        self.0 & TYPE_TAG_MASK == TAG_STR
    }

    #[inline(always)]
    pub const fn is_object(self) -> bool {
        self.0 & TYPE_TAG_MASK == TAG_OBJECT
    }

    // ------------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------------

    /// Sign-extends the 48-bit payload back to an `i64`.
    #[inline(always)]
    pub const fn as_int(self) -> Option<i64> {
        if self.is_int() {
            Some(((self.0 & VALUE_PAYLOAD_MASK) as i64) << 16 >> 16)
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn as_float(self) -> Option<f64> {
        if self.is_float() {
            Some(f64::from_bits(self.0))
        } else {
            None
        }
    }

    #[inline(always)]
    pub const fn as_bool(self) -> Option<bool> {
        if self.is_bool() {
            Some(self.0 & VALUE_PAYLOAD_MASK != 0)
        } else {
            None
        }
    }

    /// Recovers the interned string behind a string value.
    #[inline]
    pub fn as_str(self) -> Option<InternedString> {
        if self.is_str() {
            intern::interned_by_ptr((self.0 & VALUE_PAYLOAD_MASK) as *const u8)
        } else {
            None
        }
    }

    /// Recovers the raw pointer behind an object value.
    #[inline(always)]
    pub fn as_object(self) -> Option<*const ()> {
        if self.is_object() {
            Some((self.0 & VALUE_PAYLOAD_MASK) as *const ())
        } else {
            None
        }
    }
}

impl Default for Value {
    #[inline]
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ValueKind::None => write!(f, "none"),
            ValueKind::Bool => write!(f, "{}", self.as_bool().unwrap_or(false)),
            ValueKind::Int => write!(f, "{}", self.as_int().unwrap_or(0)),
            ValueKind::Float => write!(f, "{:?}", f64::from_bits(self.0)),
            ValueKind::Str => match self.as_str() {
                Some(s) => write!(f, "{:?}", s.as_str()),
                None => write!(f, "<str {:#x}>", self.0 & VALUE_PAYLOAD_MASK),
            },
            ValueKind::Object => write!(f, "<object {:#x}>", self.0 & VALUE_PAYLOAD_MASK),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
