//! Shape-backed object storage.
//!
//! A [`DynamicObject`] is a shape pointer plus flat storage arrays; it
//! holds values only, never keys. Property lookup goes through the
//! shape's property table to a [`Location`], which indexes one of four
//! regions:
//!
//! ```text
//!   DynamicObject
//!   ├── primitive_slots   fixed-size inline array of raw u64 words
//!   ├── object_slots      fixed-size inline array of boxed Values
//!   ├── primitive_ext     growable spillover for raw words
//!   └── object_ext        growable spillover for boxed Values
//! ```
//!
//! [`DynamicObject::put`] is the write protocol: if the current shape
//! already has an admissible location the store is in-place, otherwise
//! the object derives the next shape, initializes the new location and
//! swaps its shape pointer. Reads never lock and never allocate.

use std::sync::Arc;

use smallvec::SmallVec;
use tessera_core::{InternedString, Value};

use crate::property::PropertyFlags;
use crate::shape::Shape;

// ============================================================================
// DynamicObject
// ============================================================================

/// A dynamic-language object: one shape pointer and slot storage.
#[derive(Debug, Clone)]
pub struct DynamicObject {
    shape: Arc<Shape>,
    primitive_slots: Box<[u64]>,
    object_slots: Box<[Value]>,
    primitive_ext: Option<Box<[u64]>>,
    object_ext: Option<Box<[Value]>>,
}

impl DynamicObject {
    /// Fresh object of `shape`, extension arrays presized to the shape's
    /// reservation frontier.
    pub(crate) fn new(shape: Arc<Shape>) -> Self {
        let layout = shape.layout();
        let primitive_slots =
            vec![0u64; layout.primitive_inline_slots() as usize].into_boxed_slice();
        let object_slots =
            vec![Value::none(); layout.object_inline_slots() as usize].into_boxed_slice();
        let frontier = shape.frontier();
        let primitive_ext = (frontier.primitive_ext > 0)
            .then(|| vec![0u64; frontier.primitive_ext as usize].into_boxed_slice());
        let object_ext = (frontier.object_ext > 0)
            .then(|| vec![Value::none(); frontier.object_ext as usize].into_boxed_slice());
        Self {
            shape,
            primitive_slots,
            object_slots,
            primitive_ext,
            object_ext,
        }
    }

    /// The object's current shape.
    #[inline(always)]
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    /// Replaces the shape pointer without touching storage.
    ///
    /// The caller is responsible for storage coherence; this is meant for
    /// structurally identical shapes (e.g. the result of
    /// [`Shape::create_separate_shape`]). Use [`DynamicObject::migrate_to`]
    /// when locations differ.
    pub fn set_shape(&mut self, shape: Arc<Shape>) {
        self.shape = shape;
    }

    // ------------------------------------------------------------------------
    // Property protocol
    // ------------------------------------------------------------------------

    /// Reads `key`, or `None` if the shape does not define it.
    pub fn get(&self, key: &InternedString) -> Option<Value> {
        let property = self.shape.get_property(key)?;
        Some(property.location().get(self))
    }

    #[inline]
    pub fn contains_key(&self, key: &InternedString) -> bool {
        self.shape.has_property(key)
    }

    /// Non-hidden keys in insertion order.
    pub fn keys(&self) -> Vec<InternedString> {
        self.shape.key_list()
    }

    /// Writes `key = value`, deriving a new shape when needed.
    ///
    /// Returns the shape the object transitioned to, or `None` for an
    /// in-place store. New properties get empty flags; existing
    /// properties keep theirs.
    pub fn put(&mut self, key: InternedString, value: Value) -> Option<Arc<Shape>> {
        let current = self
            .shape
            .get_property(&key)
            .map(|p| (p.location().clone(), p.flags()));
        match current {
            Some((location, _)) if location.can_set(value) => {
                location
                    .set(self, value)
                    .expect("checked location write failed");
                None
            }
            Some((_, flags)) => self.transition_put(key, value, flags),
            None => self.transition_put(key, value, PropertyFlags::empty()),
        }
    }

    /// [`DynamicObject::put`] with explicit flags; differing flags force
    /// a replace transition even when the value would fit in place.
    pub fn put_with_flags(
        &mut self,
        key: InternedString,
        value: Value,
        flags: PropertyFlags,
    ) -> Option<Arc<Shape>> {
        let current = self
            .shape
            .get_property(&key)
            .map(|p| (p.location().clone(), p.flags()));
        match current {
            Some((location, current_flags))
                if current_flags == flags && location.can_set(value) =>
            {
                location
                    .set(self, value)
                    .expect("checked location write failed");
                None
            }
            _ => self.transition_put(key, value, flags),
        }
    }

    fn transition_put(
        &mut self,
        key: InternedString,
        value: Value,
        flags: PropertyFlags,
    ) -> Option<Arc<Shape>> {
        let next = self.shape.define_property(key.clone(), value, flags);
        self.ensure_capacity(&next);
        let location = next
            .get_property(&key)
            .expect("defined property must exist on the derived shape")
            .location()
            .clone();
        location
            .set_initializing(self, value)
            .expect("freshly derived location must admit its value");
        self.shape = Arc::clone(&next);
        Some(next)
    }

    /// Deletes `key`, migrating surviving values to the derived shape's
    /// layout. Returns whether the key existed.
    pub fn remove(&mut self, key: &InternedString) -> bool {
        let Some(next) = self.shape.remove_property(key) else {
            return false;
        };
        // Read every survivor under the old shape before writing anything;
        // compaction may overlap old and new slots
        let survivors: SmallVec<[(InternedString, Value); 8]> = self
            .shape
            .property_list_internal(true)
            .iter()
            .filter(|p| p.key() != key && p.location().has_slot())
            .map(|p| (p.key().clone(), p.location().get(self)))
            .collect();
        self.ensure_capacity(&next);
        for (survivor, value) in survivors {
            let location = next
                .get_property(&survivor)
                .expect("surviving property must exist on the derived shape")
                .location()
                .clone();
            location
                .set_initializing(self, value)
                .expect("surviving value must fit its migrated location");
        }
        self.shape = next;
        true
    }

    /// Rewrites storage for `target`'s locations and adopts it. The
    /// target must define every slot-backed property of the current
    /// shape (merge results do).
    ///
    /// # Panics
    ///
    /// Panics if `target` is missing one of this object's properties or
    /// one of its locations rejects the migrated value.
    pub fn migrate_to(&mut self, target: &Arc<Shape>) {
        if Arc::ptr_eq(target, &self.shape) {
            return;
        }
        let values: SmallVec<[(InternedString, Value); 8]> = self
            .shape
            .property_list_internal(true)
            .iter()
            .filter(|p| p.location().has_slot())
            .map(|p| (p.key().clone(), p.location().get(self)))
            .collect();
        self.ensure_capacity(target);
        for (key, value) in values {
            let location = target
                .get_property(&key)
                .expect("target shape must define every migrated property")
                .location()
                .clone();
            location
                .set_initializing(self, value)
                .expect("migrated value must fit the target location");
        }
        self.shape = Arc::clone(target);
    }

    // ------------------------------------------------------------------------
    // Raw storage
    // ------------------------------------------------------------------------

    pub(crate) fn primitive_raw(&self, index: u32, extension: bool) -> u64 {
        if extension {
            self.primitive_ext
                .as_ref()
                .expect("primitive extension array not allocated")[index as usize]
        } else {
            self.primitive_slots[index as usize]
        }
    }

    pub(crate) fn set_primitive_raw(&mut self, index: u32, extension: bool, raw: u64) {
        if extension {
            self.primitive_ext
                .as_mut()
                .expect("primitive extension array not allocated")[index as usize] = raw;
        } else {
            self.primitive_slots[index as usize] = raw;
        }
    }

    pub(crate) fn object_slot(&self, index: u32, extension: bool) -> Value {
        if extension {
            self.object_ext
                .as_ref()
                .expect("object extension array not allocated")[index as usize]
        } else {
            self.object_slots[index as usize]
        }
    }

    pub(crate) fn set_object_slot(&mut self, index: u32, extension: bool, value: Value) {
        if extension {
            self.object_ext
                .as_mut()
                .expect("object extension array not allocated")[index as usize] = value;
        } else {
            self.object_slots[index as usize] = value;
        }
    }

    /// Grows the extension arrays to cover `shape`'s frontier. Amortized:
    /// growth at least doubles.
    fn ensure_capacity(&mut self, shape: &Shape) {
        let frontier = shape.frontier();
        let needed = frontier.primitive_ext as usize;
        let current = self.primitive_ext.as_ref().map_or(0, |ext| ext.len());
        if needed > current {
            let mut grown = vec![0u64; needed.max(current * 2).max(4)];
            if let Some(old) = &self.primitive_ext {
                grown[..old.len()].copy_from_slice(old);
            }
            self.primitive_ext = Some(grown.into_boxed_slice());
        }
        let needed = frontier.object_ext as usize;
        let current = self.object_ext.as_ref().map_or(0, |ext| ext.len());
        if needed > current {
            let mut grown = vec![Value::none(); needed.max(current * 2).max(4)];
            if let Some(old) = &self.object_ext {
                grown[..old.len()].copy_from_slice(old);
            }
            self.object_ext = Some(grown.into_boxed_slice());
        }
    }
}

// ============================================================================
// ObjectFactory
// ============================================================================

/// Stamps out instances of one shape with presized storage, so that
/// initializing the properties in shape order never grows arrays or
/// changes the shape.
#[derive(Debug, Clone)]
pub struct ObjectFactory {
    shape: Arc<Shape>,
}

impl ObjectFactory {
    pub(crate) fn new(shape: Arc<Shape>) -> Self {
        Self { shape }
    }

    #[inline]
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn new_instance(&self) -> DynamicObject {
        DynamicObject::new(Arc::clone(&self.shape))
    }
}

// ============================================================================
// Tests
// ============================================================================
