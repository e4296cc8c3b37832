//! Integration tests for the lookup engine.

use segmentdb::{
    DataType, Database, Error, FieldDefinition, FieldValue, IndexDefinition, IntRange, Lookup,
    Predicate, Segment,
};

/// The demographics fixture: index `hello` with a string primary `name` and
/// a range `age`, holding the Millennial and OAP segments.
fn demographics() -> Database {
    let db = Database::open().expect("failed to open database");

    db.create_index(
        &IndexDefinition::new("hello")
            .field(FieldDefinition::primary("name", DataType::String))
            .field(FieldDefinition::new("age", DataType::Range)),
    )
    .expect("failed to create index");

    db.insert_segment(
        "hello",
        &Segment::new()
            .field("name", FieldValue::String("Millennial".into()))
            .field("age", FieldValue::RangeInt(IntRange { min: 20, max: 39 })),
    )
    .expect("failed to insert Millennial");

    db.insert_segment(
        "hello",
        &Segment::new()
            .field("name", FieldValue::String("OAP".into()))
            .field("age", FieldValue::RangeInt(IntRange { min: 65, max: 99 })),
    )
    .expect("failed to insert OAP");

    db
}

fn collect_keys(db: &Database, index: &str, predicate: &Predicate) -> Vec<String> {
    let mut it = db.lookup(index, predicate).expect("lookup failed");
    let mut keys = Vec::new();
    while let Some(key) = it.next(None).expect("iteration failed") {
        keys.push(key);
    }
    keys
}

// ============================================================================
// Demographics scenarios
// ============================================================================

#[test]
fn point_probe_hits_enclosing_range() {
    let db = demographics();
    let predicate =
        Predicate::new().field("age", FieldValue::RangeInt(IntRange { min: 21, max: 21 }));
    assert_eq!(collect_keys(&db, "hello", &predicate), vec!["Millennial"]);

    let predicate =
        Predicate::new().field("age", FieldValue::RangeInt(IntRange { min: 66, max: 66 }));
    assert_eq!(collect_keys(&db, "hello", &predicate), vec!["OAP"]);
}

#[test]
fn overlapping_probe_returns_both_in_scan_order() {
    let db = demographics();
    let predicate =
        Predicate::new().field("age", FieldValue::RangeInt(IntRange { min: 20, max: 66 }));
    assert_eq!(collect_keys(&db, "hello", &predicate), vec!["Millennial", "OAP"]);
}

#[test]
fn conjunction_of_name_and_age() {
    let db = demographics();
    let predicate = Predicate::new()
        .field("name", FieldValue::String("Millennial".into()))
        .field("age", FieldValue::RangeInt(IntRange { min: 21, max: 21 }));
    assert_eq!(collect_keys(&db, "hello", &predicate), vec!["Millennial"]);
}

#[test]
fn conjunction_with_disjoint_fields_is_empty() {
    let db = demographics();
    let predicate = Predicate::new()
        .field("name", FieldValue::String("Millennial".into()))
        .field("age", FieldValue::RangeInt(IntRange { min: 66, max: 66 }));
    assert!(collect_keys(&db, "hello", &predicate).is_empty());
}

#[test]
fn intersection_keeps_first_field_order() {
    let db = demographics();
    // First field observes Millennial then OAP; the second keeps both.
    let predicate = Predicate::new()
        .field("age", FieldValue::RangeInt(IntRange { min: 20, max: 66 }))
        .field(
            "name",
            FieldValue::RepeatedString(vec!["OAP".into(), "Millennial".into()]),
        );
    assert_eq!(collect_keys(&db, "hello", &predicate), vec!["Millennial", "OAP"]);
}

// ============================================================================
// Iterator state machine
// ============================================================================

#[test]
fn iterator_arms_done_after_last_key() {
    let db = demographics();
    let predicate = Predicate::new().field("name", FieldValue::String("OAP".into()));
    let mut it = db.lookup("hello", &predicate).unwrap();

    assert_eq!(it.next(None).unwrap(), Some("OAP".to_owned()));
    assert_eq!(it.next(None).unwrap(), None);
    assert_eq!(it.next(None).unwrap(), None);
}

#[test]
fn empty_intersection_is_end_of_stream_not_an_error() {
    let db = demographics();
    let predicate = Predicate::new().field("name", FieldValue::String("GenX".into()));
    let mut it = db.lookup("hello", &predicate).unwrap();
    assert_eq!(it.next(None).unwrap(), None);
    assert_eq!(it.next(None).unwrap(), None);
}

#[test]
fn empty_predicate_is_end_of_stream() {
    let db = demographics();
    let mut it = db.lookup("hello", &Predicate::new()).unwrap();
    assert_eq!(it.next(None).unwrap(), None);
}

#[test]
fn unknown_index_error_is_sticky() {
    let db = demographics();
    let predicate = Predicate::new().field("name", FieldValue::String("OAP".into()));
    let mut it = db.lookup("nowhere", &predicate).unwrap();

    assert_eq!(it.next(None), Err(Error::Internal));
    assert_eq!(it.next(None), Err(Error::Internal));
}

#[test]
fn unknown_field_fails_the_scan() {
    let db = demographics();
    let predicate = Predicate::new().field("height", FieldValue::Int(180));
    let mut it = db.lookup("hello", &predicate).unwrap();

    assert_eq!(it.next(None), Err(Error::LookupFailure));
    assert_eq!(it.next(None), Err(Error::LookupFailure));
}

#[test]
fn unbound_lookup_fails_index_not_set() {
    let db = demographics();
    let predicate = Predicate::new().field("name", FieldValue::String("OAP".into()));
    let mut it = Lookup::new(&db, predicate, true).run();

    assert_eq!(it.next(None), Err(Error::IndexNotSet));
    assert_eq!(it.next(None), Err(Error::IndexNotSet));
}

#[test]
fn bound_lookup_runs_on_its_index() {
    let db = demographics();
    let index = db.get_index("hello").unwrap();
    let predicate = Predicate::new().field("name", FieldValue::String("OAP".into()));
    let mut it = Lookup::new(&db, predicate, true).bind(&index).run();

    assert_eq!(it.next(None).unwrap(), Some("OAP".to_owned()));
}

// ============================================================================
// Segments path
// ============================================================================

#[test]
fn lookup_segments_merges_into_destination() {
    let db = demographics();
    let predicate = Predicate::new().field("name", FieldValue::String("Millennial".into()));
    let mut it = db.lookup_segments("hello", &predicate).unwrap();

    let mut dst = Segment::new();
    let key = it.next(Some(&mut dst)).unwrap();
    assert_eq!(key, Some("Millennial".to_owned()));
    assert_eq!(dst.get("name"), Some(&FieldValue::String("Millennial".into())));
    assert_eq!(dst.get("age"), Some(&FieldValue::RangeInt(IntRange { min: 20, max: 39 })));
}

#[test]
fn keys_only_lookup_leaves_destination_untouched() {
    let db = demographics();
    let predicate = Predicate::new().field("name", FieldValue::String("Millennial".into()));
    let mut it = db.lookup("hello", &predicate).unwrap();

    let mut dst = Segment::new();
    it.next(Some(&mut dst)).unwrap();
    assert!(dst.fields.is_empty());
}

// ============================================================================
// Scalar variants and repeated disjunction
// ============================================================================

#[test]
fn repeated_segment_values_match_any_element() {
    let db = Database::open().unwrap();
    db.create_index(
        &IndexDefinition::new("posts")
            .field(FieldDefinition::primary("slug", DataType::String))
            .field(FieldDefinition::new("tags", DataType::String).repeated()),
    )
    .unwrap();

    db.insert_segment(
        "posts",
        &Segment::new()
            .field("slug", FieldValue::String("intro".into()))
            .field("tags", FieldValue::RepeatedString(vec!["rust".into(), "db".into()])),
    )
    .unwrap();

    let by_second_tag = Predicate::new().field("tags", FieldValue::String("db".into()));
    assert_eq!(collect_keys(&db, "posts", &by_second_tag), vec!["intro"]);
}

#[test]
fn repeated_predicate_values_are_disjunctive() {
    let db = Database::open().unwrap();
    db.create_index(
        &IndexDefinition::new("posts")
            .field(FieldDefinition::primary("slug", DataType::String))
            .field(FieldDefinition::new("tag", DataType::String)),
    )
    .unwrap();

    db.insert_segment(
        "posts",
        &Segment::new()
            .field("slug", FieldValue::String("intro".into()))
            .field("tag", FieldValue::String("rust".into())),
    )
    .unwrap();

    let predicate = Predicate::new()
        .field("tag", FieldValue::RepeatedString(vec!["go".into(), "rust".into()]));
    assert_eq!(collect_keys(&db, "posts", &predicate), vec!["intro"]);

    // A matched key is reported once even if several elements hit it.
    let predicate = Predicate::new()
        .field("tag", FieldValue::RepeatedString(vec!["rust".into(), "rust".into()]));
    assert_eq!(collect_keys(&db, "posts", &predicate), vec!["intro"]);
}

#[test]
fn numeric_equality_ignores_text_form() {
    let db = Database::open().unwrap();
    db.create_index(
        &IndexDefinition::new("sensors")
            .field(FieldDefinition::primary("id", DataType::String))
            .field(FieldDefinition::new("reading", DataType::Int)),
    )
    .unwrap();

    db.insert_segment(
        "sensors",
        &Segment::new()
            .field("id", FieldValue::String("s1".into()))
            .field("reading", FieldValue::Int(42)),
    )
    .unwrap();

    let predicate = Predicate::new().field("reading", FieldValue::Int(42));
    assert_eq!(collect_keys(&db, "sensors", &predicate), vec!["s1"]);

    let predicate = Predicate::new().field("reading", FieldValue::Int(43));
    assert!(collect_keys(&db, "sensors", &predicate).is_empty());
}

#[test]
fn bool_and_float_equality() {
    let db = Database::open().unwrap();
    db.create_index(
        &IndexDefinition::new("flags")
            .field(FieldDefinition::primary("id", DataType::String))
            .field(FieldDefinition::new("active", DataType::Bool))
            .field(FieldDefinition::new("score", DataType::Float)),
    )
    .unwrap();

    db.insert_segment(
        "flags",
        &Segment::new()
            .field("id", FieldValue::String("a".into()))
            .field("active", FieldValue::Bool(true))
            .field("score", FieldValue::Float(1.5)),
    )
    .unwrap();
    db.insert_segment(
        "flags",
        &Segment::new()
            .field("id", FieldValue::String("b".into()))
            .field("active", FieldValue::Bool(false))
            .field("score", FieldValue::Float(2.5)),
    )
    .unwrap();

    let predicate = Predicate::new().field("active", FieldValue::Bool(true));
    assert_eq!(collect_keys(&db, "flags", &predicate), vec!["a"]);

    let predicate = Predicate::new().field("score", FieldValue::Float(2.5));
    assert_eq!(collect_keys(&db, "flags", &predicate), vec!["b"]);
}

#[test]
fn geo_point_probe_finds_containing_rect() {
    use segmentdb::{GeoPoint, GeoRect};

    let db = Database::open().unwrap();
    db.create_index(
        &IndexDefinition::new("zones")
            .field(FieldDefinition::primary("name", DataType::String))
            .field(FieldDefinition::new("area", DataType::GeoRect)),
    )
    .unwrap();

    db.insert_segment(
        "zones",
        &Segment::new().field("name", FieldValue::String("downtown".into())).field(
            "area",
            FieldValue::GeoRect(GeoRect {
                top_left: GeoPoint { x: 0.0, y: 10.0 },
                bottom_right: GeoPoint { x: 10.0, y: 0.0 },
            }),
        ),
    )
    .unwrap();

    let inside = Predicate::new().field("area", FieldValue::GeoPoint(GeoPoint { x: 5.0, y: 5.0 }));
    assert_eq!(collect_keys(&db, "zones", &inside), vec!["downtown"]);

    let outside =
        Predicate::new().field("area", FieldValue::GeoPoint(GeoPoint { x: 50.0, y: 5.0 }));
    assert!(collect_keys(&db, "zones", &outside).is_empty());
}
