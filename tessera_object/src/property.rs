//! Property descriptors: key + location + flags.

use bitflags::bitflags;
use tessera_core::InternedString;

use crate::location::Location;

bitflags! {
    /// Per-property attribute bits.
    ///
    /// The low bits have fixed meaning; the remaining bits are free for
    /// embedders (use [`PropertyFlags::from_bits_retain`] to carry them).
    /// Flags participate in transition identity: the same key added with
    /// different flags yields a different shape.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u16 {
        /// Writes through the language-level protocol are rejected.
        const READ_ONLY = 0b0000_0001;
        /// Excluded from key/property enumeration.
        const HIDDEN = 0b0000_0010;
        /// Marker for properties bound to constant locations.
        const CONSTANT = 0b0000_0100;
    }
}

impl Default for PropertyFlags {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

/// An immutable property descriptor.
///
/// A property does not store its value; the [`Location`] says where (or
/// whether) the value lives in an object's storage. Descriptors are shared
/// freely between shapes and threads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    key: InternedString,
    location: Location,
    flags: PropertyFlags,
}

impl Property {
    pub fn new(key: InternedString, location: Location, flags: PropertyFlags) -> Self {
        Self { key, location, flags }
    }

    #[inline(always)]
    pub fn key(&self) -> &InternedString {
        &self.key
    }

    #[inline(always)]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[inline(always)]
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(PropertyFlags::HIDDEN)
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(PropertyFlags::READ_ONLY)
    }

    /// Copy of this descriptor bound to a different location.
    pub(crate) fn with_location(&self, location: Location) -> Self {
        Self {
            key: self.key.clone(),
            location,
            flags: self.flags,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
