//! End-to-end tests for the shape graph and object storage protocol.
//!
//! Coverage:
//! - Transition memoization under thread races
//! - Object workflows across add, retype, remove and merge transitions
//! - Shared-family slot discipline vs unshared compaction
//! - Assumption propagation and per-family statistics

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tessera_core::{Value, intern};
use tessera_object::{Layout, Location, PropertyFlags, ShapeError};

fn int(n: i64) -> Value {
    Value::int(n).unwrap()
}

// =============================================================================
// Concurrency
// =============================================================================

mod concurrency {
    use super::*;

    #[test]
    fn test_racing_identical_transitions_converge() {
        let layout = Layout::new();
        let root = Arc::clone(layout.root());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let root = Arc::clone(&root);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    root.define_property(intern("x"), int(1), PropertyFlags::empty())
                })
            })
            .collect();
        let shapes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for shape in &shapes[1..] {
            assert!(Arc::ptr_eq(&shapes[0], shape));
        }
        assert_eq!(root.transition_count(), 1);
        // Exactly one thread built the edge; every other call hit the cache
        let stats = layout.stats();
        assert_eq!(stats.transition_misses, 1);
        assert_eq!(stats.transition_hits, 7);
        assert_eq!(stats.shapes_created, 2);
    }

    #[test]
    fn test_racing_distinct_keys_all_materialize() {
        let layout = Layout::new();
        let root = Arc::clone(layout.root());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let root = Arc::clone(&root);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let key = intern(&format!("k{i}"));
                    (key.clone(), root.define_property(key, int(i), PropertyFlags::empty()))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(root.transition_count(), 8);
        for (key, shape) in &results {
            assert_eq!(shape.property_count(), 1);
            assert!(shape.has_property(key));
        }
        let stats = layout.stats();
        assert_eq!(stats.transition_misses, 8);
        assert_eq!(stats.transition_hits, 0);
    }

    #[test]
    fn test_concurrent_chain_extension_shares_tails() {
        let layout = Layout::new();
        let root = Arc::clone(layout.root());
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let root = Arc::clone(&root);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut shape = root;
                    for key in ["a", "b", "c"] {
                        shape = shape.define_property(intern(key), int(0), PropertyFlags::empty());
                    }
                    shape
                })
            })
            .collect();
        let tails: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for tail in &tails[1..] {
            assert!(Arc::ptr_eq(&tails[0], tail));
        }
        // One materialized chain of three edges, shared by all threads
        assert_eq!(layout.stats().transition_misses, 3);
        assert_eq!(tails[0].property_count(), 3);
    }

    #[test]
    fn test_invalidation_is_visible_after_join() {
        let layout = Layout::new();
        let with_int = layout
            .root()
            .define_property(intern("v"), int(1), PropertyFlags::empty());
        let with_float = layout
            .root()
            .define_property(intern("v"), Value::float(0.5), PropertyFlags::empty());

        let inputs = (Arc::clone(&with_int), Arc::clone(&with_float));
        let merged = thread::spawn(move || inputs.0.try_merge(&inputs.1).unwrap().unwrap())
            .join()
            .unwrap();

        assert!(!with_int.is_valid());
        assert!(!with_float.is_valid());
        assert!(merged.is_valid());
    }

    #[test]
    fn test_merge_invalidation_waits_for_family_mutex() {
        let layout = Layout::new();
        let boxed = layout
            .root()
            .define_property(intern("x"), Value::str(&intern("s")), PropertyFlags::empty());
        let unboxed = layout
            .root()
            .define_property(intern("x"), int(1), PropertyFlags::empty());

        // Hold the family mutex the way an in-flight transition build does
        let guard = boxed.mutex().lock();
        let inputs = (Arc::clone(&boxed), Arc::clone(&unboxed));
        let merger = thread::spawn(move || inputs.0.try_merge(&inputs.1).unwrap().unwrap());

        // The merge supersedes its loser, so it must queue behind the
        // mutex; nothing may be invalidated while we hold it
        thread::sleep(Duration::from_millis(100));
        assert!(!merger.is_finished());
        assert!(unboxed.is_valid());

        drop(guard);
        let winner = merger.join().unwrap();
        assert!(Arc::ptr_eq(&winner, &boxed));
        assert!(boxed.is_valid());
        assert!(!unboxed.is_valid());
    }
}

// =============================================================================
// Object Workflows
// =============================================================================

mod workflows {
    use super::*;

    #[test]
    fn test_uniform_construction_shares_one_chain() {
        let layout = Layout::new();
        let objects: Vec<_> = (0..16)
            .map(|i| {
                let mut object = layout.root().new_instance();
                object.put(intern("x"), int(i));
                object.put(intern("y"), int(-i));
                object
            })
            .collect();

        for object in &objects[1..] {
            assert!(Arc::ptr_eq(objects[0].shape(), object.shape()));
        }
        // Two edges built once, then cache hits for every later object
        let stats = layout.stats();
        assert_eq!(stats.transition_misses, 2);
        assert_eq!(stats.transition_hits, 30);
        assert_eq!(objects[7].get(&intern("x")), Some(int(7)));
        assert_eq!(objects[7].get(&intern("y")), Some(int(-7)));
    }

    #[test]
    fn test_divergence_merge_and_migration() {
        let layout = Layout::new();
        let mut as_int = layout.root().new_instance();
        let mut as_float = layout.root().new_instance();
        as_int.put(intern("tag"), int(1));
        as_int.put(intern("v"), int(100));
        as_float.put(intern("tag"), int(2));
        as_float.put(intern("v"), Value::float(2.5));
        assert!(!Arc::ptr_eq(as_int.shape(), as_float.shape()));

        let merged = as_int.shape().try_merge(as_float.shape()).unwrap().unwrap();
        as_int.migrate_to(&merged);
        as_float.migrate_to(&merged);

        assert!(merged.check(&as_int));
        assert!(merged.check(&as_float));
        assert_eq!(as_int.get(&intern("v")), Some(int(100)));
        assert_eq!(as_float.get(&intern("v")), Some(Value::float(2.5)));
        // The merged slot is general enough for both kinds in place
        assert!(as_int.put(intern("v"), Value::float(9.0)).is_none());
        assert!(as_float.put(intern("v"), int(3)).is_none());
        let stats = layout.stats();
        assert_eq!(stats.merges, 1);
        assert_eq!(stats.invalidations, 2);
    }

    #[test]
    fn test_merge_is_memoized_across_repeats() {
        let layout = Layout::new();
        let a = layout
            .root()
            .define_property(intern("v"), int(1), PropertyFlags::empty());
        let b = layout
            .root()
            .define_property(intern("v"), Value::float(1.0), PropertyFlags::empty());

        let first = a.try_merge(&b).unwrap().unwrap();
        let second = a.try_merge(&b).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(layout.stats().merges, 1);
    }

    #[test]
    fn test_remove_middle_property_with_spillover() {
        let layout = Layout::builder()
            .primitive_inline_slots(1)
            .object_inline_slots(1)
            .build();
        let mut object = layout.root().new_instance();
        for i in 0..5 {
            object.put(intern(&format!("k{i}")), int(i * 10));
        }
        assert!(object.remove(&intern("k2")));

        assert_eq!(object.shape().property_count(), 4);
        for i in [0, 1, 3, 4] {
            assert_eq!(object.get(&intern(&format!("k{i}"))), Some(int(i * 10)));
        }
        assert_eq!(object.get(&intern("k2")), None);
        assert_eq!(layout.stats().property_removals, 1);
    }

    #[test]
    fn test_object_type_survives_later_transitions() {
        let layout = Layout::new();
        let typed = layout
            .root()
            .change_object_type(tessera_object::ObjectTypeId(7));
        let derived = typed.define_property(intern("x"), int(1), PropertyFlags::empty());
        assert_eq!(derived.object_type(), tessera_object::ObjectTypeId(7));
        assert_eq!(derived.property_count(), 1);
    }
}

// =============================================================================
// Shared vs Unshared Slot Discipline
// =============================================================================

mod sharing {
    use super::*;

    fn location_of(object: &tessera_object::DynamicObject, key: &str) -> Location {
        object
            .shape()
            .get_property(&intern(key))
            .unwrap()
            .location()
            .clone()
    }

    #[test]
    fn test_unshared_remove_reuses_slots() {
        let layout = Layout::new();
        let mut object = layout.root().new_instance();
        object.put(intern("a"), int(1));
        object.put(intern("b"), int(2));
        let a_before = location_of(&object, "a");

        assert!(object.remove(&intern("a")));
        // Compaction moved the survivor into the vacated slot
        assert_eq!(location_of(&object, "b"), a_before);
        assert_eq!(object.get(&intern("b")), Some(int(2)));
    }

    #[test]
    fn test_shared_remove_never_reuses_slots() {
        let layout = Layout::new();
        let shared_root = layout.root().make_shared();
        assert!(shared_root.is_shared());

        let mut object = shared_root.new_instance();
        object.put(intern("a"), int(1));
        object.put(intern("b"), int(2));
        assert!(object.shape().is_shared());
        let a_before = location_of(&object, "a");
        let b_before = location_of(&object, "b");

        assert!(object.remove(&intern("a")));
        assert_eq!(location_of(&object, "b"), b_before);

        // A later property lands past the frontier, not in the vacated slot
        object.put(intern("c"), int(3));
        let c_after = location_of(&object, "c");
        assert_ne!(c_after, a_before);
        assert_ne!(c_after, b_before);
        assert_eq!(object.get(&intern("b")), Some(int(2)));
        assert_eq!(object.get(&intern("c")), Some(int(3)));
    }

    #[test]
    fn test_separate_families_never_merge() {
        let layout = Layout::new();
        let shape = layout
            .root()
            .define_property(intern("x"), int(1), PropertyFlags::empty());
        let separate = shape.create_separate_shape(Arc::new(()) as tessera_object::SharedData);

        assert!(!shape.is_related(&separate));
        assert!(matches!(
            shape.try_merge(&separate),
            Err(ShapeError::UnrelatedShapes)
        ));
        // Same keys, fully independent transition caches
        let a = shape.define_property(intern("y"), int(2), PropertyFlags::empty());
        let b = separate.define_property(intern("y"), int(2), PropertyFlags::empty());
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!a.is_related(&b));
    }

    #[test]
    fn test_primitive_extension_reservation_flows_to_children() {
        let layout = Layout::builder().primitive_inline_slots(1).build();
        let reserved = layout.root().reserve_primitive_extension();
        assert!(reserved.has_primitive_extension());

        let mut object = reserved.new_instance();
        object.put(intern("a"), int(1));
        object.put(intern("b"), int(2));
        assert!(object.shape().has_primitive_extension());
        assert!(matches!(
            object.shape().get_property(&intern("b")).unwrap().location(),
            Location::PrimitiveSlot { extension: true, .. }
        ));
        assert_eq!(object.get(&intern("b")), Some(int(2)));
    }
}

// =============================================================================
// Assumptions
// =============================================================================

mod assumptions {
    use super::*;

    #[test]
    fn test_leaf_assumption_tracks_first_derivation() {
        let layout = Layout::new();
        let root = Arc::clone(layout.root());
        assert!(root.is_leaf());

        let child = root.define_property(intern("x"), int(1), PropertyFlags::empty());
        assert!(!root.is_leaf());
        assert!(child.is_leaf());

        // A cache hit does not disturb the child's leaf state
        let again = root.define_property(intern("x"), int(2), PropertyFlags::empty());
        assert!(Arc::ptr_eq(&child, &again));
        assert!(child.is_leaf());
    }

    #[test]
    fn test_speculative_guard_pattern() {
        let layout = Layout::new();
        let shape = layout
            .root()
            .define_property(intern("v"), int(1), PropertyFlags::empty());
        let guard = Arc::clone(shape.valid_assumption());
        assert!(guard.is_valid());

        // Merging supersedes the input; the registered guard trips
        let other = layout
            .root()
            .define_property(intern("v"), Value::float(1.0), PropertyFlags::empty());
        let merged = shape.try_merge(&other).unwrap().unwrap();
        assert!(!guard.is_valid());
        assert!(merged.is_valid());
    }
}
