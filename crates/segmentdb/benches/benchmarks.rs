//! Segment store benchmarks.
//!
//! Covers the write path (insert/replace), keyed reads, and the lookup
//! engine's scalar-equality and range-intersection scans.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segmentdb::{
    DataType, Database, FieldDefinition, FieldValue, IndexDefinition, IntRange, Predicate, Segment,
};

fn demographics_db(segments: u64) -> Database {
    let db = Database::open().expect("open failed");
    db.create_index(
        &IndexDefinition::new("people")
            .field(FieldDefinition::primary("name", DataType::String))
            .field(FieldDefinition::new("age", DataType::Range))
            .field(FieldDefinition::new("score", DataType::Int)),
    )
    .expect("create failed");

    for i in 0..segments {
        let min = (i % 80) as i64;
        db.insert_segment(
            "people",
            &Segment::new()
                .field("name", FieldValue::String(format!("person-{i}")))
                .field("age", FieldValue::RangeInt(IntRange { min, max: min + 5 }))
                .field("score", FieldValue::Int((i % 100) as i64)),
        )
        .expect("insert failed");
    }
    db
}

fn write_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");

    group.throughput(Throughput::Elements(1));
    group.bench_function("insert_segment", |b| {
        let db = demographics_db(0);
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            db.insert_segment(
                "people",
                &Segment::new()
                    .field("name", FieldValue::String(format!("person-{i}")))
                    .field("age", FieldValue::RangeInt(IntRange { min: 20, max: 39 }))
                    .field("score", FieldValue::Int(7)),
            )
            .expect("insert failed");
        });
    });

    group.bench_function("replace_segment", |b| {
        let db = demographics_db(1);
        let replacement = Segment::new()
            .field("name", FieldValue::String("person-0".into()))
            .field("age", FieldValue::RangeInt(IntRange { min: 30, max: 45 }))
            .field("score", FieldValue::Int(9));
        b.iter(|| {
            db.replace_segment("people", "person-0", black_box(&replacement))
                .expect("replace failed");
        });
    });

    group.finish();
}

fn read_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    for size in [100u64, 10_000] {
        let db = demographics_db(size);

        group.bench_with_input(BenchmarkId::new("get_segment_by_key", size), &db, |b, db| {
            b.iter(|| {
                db.get_segment_by_key("people", black_box("person-42")).expect("get failed");
            });
        });

        group.bench_with_input(BenchmarkId::new("lookup_scalar_equal", size), &db, |b, db| {
            let predicate = Predicate::new().field("score", FieldValue::Int(42));
            b.iter(|| {
                let mut it = db.lookup("people", &predicate).expect("lookup failed");
                while let Some(key) = it.next(None).expect("iteration failed") {
                    black_box(key);
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("lookup_range_overlap", size), &db, |b, db| {
            let predicate =
                Predicate::new().field("age", FieldValue::RangeInt(IntRange { min: 30, max: 31 }));
            b.iter(|| {
                let mut it = db.lookup("people", &predicate).expect("lookup failed");
                while let Some(key) = it.next(None).expect("iteration failed") {
                    black_box(key);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, write_benchmarks, read_benchmarks);
criterion_main!(benches);
