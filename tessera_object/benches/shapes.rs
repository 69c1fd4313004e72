//! Shape Graph Performance Benchmarks
//!
//! Benchmarks for the shape transition system measuring property lookup,
//! memoized transition derivation, and the object write protocol.
//!
//! # Benchmark Categories
//!
//! 1. **Property Lookup**: linear property-table scans at varying depths
//! 2. **Shape Transitions**: cached vs freshly built transition edges
//! 3. **Object Writes**: in-place stores vs transitioning stores
//! 4. **Shape Sharing**: many objects riding one memoized chain
//! 5. **Merging**: memoized shape merges
//!
//! # Performance Targets
//!
//! - In-place slot store: < 10ns
//! - Property lookup (small shapes): < 50ns
//! - Cached transition: < 100ns per edge
//! - Merge cache hit: comparable to a cached transition

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tessera_core::{InternedString, Value, intern};
use tessera_object::{DynamicObject, Layout, PropertyFlags};

// =============================================================================
// Benchmark Helpers
// =============================================================================

/// Pre-intern property keys for consistent measurements.
fn intern_keys(count: usize) -> Vec<InternedString> {
    (0..count).map(|i| intern(&format!("prop{i}"))).collect()
}

/// Create an object with N int properties named "prop0", "prop1", etc.
fn object_with_n_properties(layout: &Layout, n: usize) -> DynamicObject {
    let mut object = layout.root().new_instance();
    for (i, key) in intern_keys(n).into_iter().enumerate() {
        object.put(key, Value::int(i as i64).unwrap());
    }
    object
}

// =============================================================================
// Property Lookup Benchmarks
// =============================================================================

fn bench_property_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("property_lookup");

    group.bench_function("object_get_inline", |b| {
        let layout = Layout::new();
        let object = object_with_n_properties(&layout, 3);
        let key = intern("prop1");

        b.iter(|| black_box(object.get(&key)))
    });

    group.bench_function("object_get_extension", |b| {
        let layout = Layout::new();
        let object = object_with_n_properties(&layout, 12);
        let key = intern("prop11");

        b.iter(|| black_box(object.get(&key)))
    });

    // Scan depth across the property table
    for position in [0usize, 3, 7, 15] {
        group.bench_with_input(
            BenchmarkId::new("table_position", position),
            &position,
            |b, &position| {
                let layout = Layout::new();
                let object = object_with_n_properties(&layout, 16);
                let key = intern(&format!("prop{position}"));
                let shape = object.shape().clone();

                b.iter(|| black_box(shape.get_property(&key)))
            },
        );
    }

    group.finish();
}

// =============================================================================
// Shape Transition Benchmarks
// =============================================================================

fn bench_shape_transitions(c: &mut Criterion) {
    let mut group = c.benchmark_group("shape_transitions");

    // Walking a fully memoized chain
    group.bench_function("cached_chain", |b| {
        let layout = Layout::new();
        let keys = intern_keys(4);
        let _ = object_with_n_properties(&layout, 4);

        b.iter(|| {
            let mut shape = layout.root().clone();
            for (i, key) in keys.iter().enumerate() {
                shape = shape.define_property(
                    key.clone(),
                    Value::int(i as i64).unwrap(),
                    PropertyFlags::empty(),
                );
            }
            black_box(shape)
        })
    });

    // Fresh keys every iteration, so every edge is built
    group.bench_function("unique_transitions", |b| {
        let layout = Layout::new();
        let mut counter = 0usize;

        b.iter(|| {
            let mut shape = layout.root().clone();
            for i in 0..4 {
                let key = intern(&format!("unique_{counter}_{i}"));
                shape =
                    shape.define_property(key, Value::int(i as i64).unwrap(), PropertyFlags::empty());
            }
            counter += 1;
            black_box(shape)
        })
    });

    // Chain length scaling over primed caches
    for count in [1usize, 4, 8, 16] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("chain_length", count), &count, |b, &count| {
            let layout = Layout::new();
            let keys = intern_keys(count);
            let _ = object_with_n_properties(&layout, count);

            b.iter(|| {
                let mut shape = layout.root().clone();
                for (i, key) in keys.iter().enumerate() {
                    shape = shape.define_property(
                        key.clone(),
                        Value::int(i as i64).unwrap(),
                        PropertyFlags::empty(),
                    );
                }
                black_box(shape)
            })
        });
    }

    group.finish();
}

// =============================================================================
// Object Write Benchmarks
// =============================================================================

fn bench_object_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("object_writes");

    // In-place store through an existing location
    group.bench_function("update_existing", |b| {
        let layout = Layout::new();
        let mut object = object_with_n_properties(&layout, 4);
        let key = intern("prop2");
        let value = Value::int(999).unwrap();

        b.iter(|| {
            object.put(key.clone(), black_box(value));
        })
    });

    // Four transitioning stores on a primed chain
    group.bench_function("build_object", |b| {
        let layout = Layout::new();
        let keys = intern_keys(4);
        let _ = object_with_n_properties(&layout, 4);

        b.iter(|| {
            let mut object = layout.root().new_instance();
            for (i, key) in keys.iter().enumerate() {
                object.put(key.clone(), Value::int(i as i64).unwrap());
            }
            black_box(object)
        })
    });

    // Kind-changing store over a memoized retype edge
    group.bench_function("cached_retype", |b| {
        let layout = Layout::new();
        let keys = intern_keys(1);
        {
            let mut primer = layout.root().new_instance();
            primer.put(keys[0].clone(), Value::int(0).unwrap());
            primer.put(keys[0].clone(), Value::float(0.0));
        }

        b.iter(|| {
            let mut object = layout.root().new_instance();
            object.put(keys[0].clone(), Value::int(1).unwrap());
            object.put(keys[0].clone(), Value::float(1.0));
            black_box(object)
        })
    });

    group.finish();
}

// =============================================================================
// Shape Sharing Benchmarks
// =============================================================================

fn bench_shape_sharing(c: &mut Criterion) {
    let mut group = c.benchmark_group("shape_sharing");

    group.bench_function("create_hundred_uniform_objects", |b| {
        let layout = Layout::new();
        let keys = intern_keys(4);
        let _ = object_with_n_properties(&layout, 4);

        b.iter(|| {
            let mut objects = Vec::with_capacity(100);
            for object_index in 0..100 {
                let mut object = layout.root().new_instance();
                for (i, key) in keys.iter().enumerate() {
                    object.put(
                        key.clone(),
                        Value::int((object_index * 4 + i) as i64).unwrap(),
                    );
                }
                objects.push(object);
            }
            black_box(objects)
        })
    });

    group.bench_function("factory_instantiation", |b| {
        let layout = Layout::new();
        let prototype = object_with_n_properties(&layout, 8);
        let factory = prototype.shape().create_factory();

        b.iter(|| black_box(factory.new_instance()))
    });

    group.finish();
}

// =============================================================================
// Merge Benchmarks
// =============================================================================

fn bench_merging(c: &mut Criterion) {
    let mut group = c.benchmark_group("merging");

    group.bench_function("memoized_merge", |b| {
        let layout = Layout::new();
        let key = intern("v");
        let as_int =
            layout
                .root()
                .define_property(key.clone(), Value::int(1).unwrap(), PropertyFlags::empty());
        let as_float =
            layout
                .root()
                .define_property(key.clone(), Value::float(1.0), PropertyFlags::empty());
        let _ = as_int.try_merge(&as_float).unwrap();

        b.iter(|| black_box(as_int.try_merge(&as_float).unwrap()))
    });

    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(
    shape_benches,
    bench_property_lookup,
    bench_shape_transitions,
    bench_object_writes,
    bench_shape_sharing,
    bench_merging,
);

criterion_main!(shape_benches);
