//! Schema and value types.
//!
//! An [`IndexDefinition`] names an ordered list of typed fields, exactly one
//! of which is the primary field. A [`Segment`] is a record conforming to
//! such a schema; a [`Predicate`] is a conjunction of per-field probes over
//! one. Values are tagged [`FieldValue`] variants — every scalar and
//! geometric data type, each in a scalar and a repeated shape.
//!
//! The serde-derived JSON form of [`IndexDefinition`] and [`Segment`] is the
//! durable text encoding used for the `%:<name>` and `$:<id>:<pk>` rows.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The closed set of field data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Undefined,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Float32,
    Float64,
    Bool,
    Blob,
    Range,
    RangeInt,
    RangeFloat,
    Geo,
    GeoRect,
    GeoPoint,
}

impl DataType {
    /// Whether values of this type are filed in an R-tree rather than a
    /// B-tree.
    #[must_use]
    pub const fn is_geometric(self) -> bool {
        matches!(
            self,
            DataType::Range
                | DataType::RangeInt
                | DataType::RangeFloat
                | DataType::Geo
                | DataType::GeoRect
                | DataType::GeoPoint
        )
    }
}

/// One field of an index schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name, unique within its parent.
    pub name: String,
    /// Declared data type.
    pub data_type: DataType,
    /// Whether segment values carry the repeated (list) shape.
    #[serde(default)]
    pub repeated: bool,
    /// Whether this is the index's primary field.
    #[serde(default)]
    pub is_primary: bool,
    /// Nested fields; they inherit this field's key prefix.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDefinition>,
}

impl FieldDefinition {
    /// A plain field.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type, repeated: false, is_primary: false, fields: Vec::new() }
    }

    /// A primary field.
    #[must_use]
    pub fn primary(name: impl Into<String>, data_type: DataType) -> Self {
        Self { is_primary: true, ..Self::new(name, data_type) }
    }

    /// Mark the field as carrying repeated values.
    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// Attach a nested field.
    #[must_use]
    pub fn nested(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }
}

/// A named index schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Unique index name.
    pub name: String,
    /// Ordered field list.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl IndexDefinition {
    /// A definition with no fields; add them with [`IndexDefinition::field`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new() }
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// The primary field, when one is declared. The last primary-flagged
    /// field wins, matching write-path behaviour.
    #[must_use]
    pub fn primary_field(&self) -> Option<&FieldDefinition> {
        self.fields.iter().rev().find(|f| f.is_primary)
    }

    pub(crate) fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|_| Error::Marshalling)
    }

    pub(crate) fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|_| Error::Marshalling)
    }
}

/// A closed 1-D integer interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntRange {
    pub min: i64,
    pub max: i64,
}

/// A closed 1-D float interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub min: f64,
    pub max: f64,
}

/// A 2-D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

/// A 2-D rectangle given by opposite corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    pub top_left: GeoPoint,
    pub bottom_right: GeoPoint,
}

/// A tagged field value. Every variant family exists in a scalar and a
/// repeated shape; repeated values match predicates disjunctively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    RepeatedString(Vec<String>),
    Int(i64),
    RepeatedInt(Vec<i64>),
    Uint(u64),
    RepeatedUint(Vec<u64>),
    Float(f64),
    RepeatedFloat(Vec<f64>),
    Bool(bool),
    RepeatedBool(Vec<bool>),
    Blob(String),
    RepeatedBlob(Vec<String>),
    RangeInt(IntRange),
    RepeatedRangeInt(Vec<IntRange>),
    RangeFloat(FloatRange),
    RepeatedRangeFloat(Vec<FloatRange>),
    GeoPoint(GeoPoint),
    RepeatedGeoPoint(Vec<GeoPoint>),
    GeoRect(GeoRect),
    RepeatedGeoRect(Vec<GeoRect>),
}

impl FieldValue {
    /// Whether this value belongs to a geometric variant family, i.e. its
    /// index entries live in an R-tree.
    #[must_use]
    pub const fn is_geometric(&self) -> bool {
        matches!(
            self,
            FieldValue::RangeInt(_)
                | FieldValue::RepeatedRangeInt(_)
                | FieldValue::RangeFloat(_)
                | FieldValue::RepeatedRangeFloat(_)
                | FieldValue::GeoPoint(_)
                | FieldValue::RepeatedGeoPoint(_)
                | FieldValue::GeoRect(_)
                | FieldValue::RepeatedGeoRect(_)
        )
    }

    /// Whether this value carries the repeated (list) shape.
    #[must_use]
    pub const fn is_repeated(&self) -> bool {
        matches!(
            self,
            FieldValue::RepeatedString(_)
                | FieldValue::RepeatedInt(_)
                | FieldValue::RepeatedUint(_)
                | FieldValue::RepeatedFloat(_)
                | FieldValue::RepeatedBool(_)
                | FieldValue::RepeatedBlob(_)
                | FieldValue::RepeatedRangeInt(_)
                | FieldValue::RepeatedRangeFloat(_)
                | FieldValue::RepeatedGeoPoint(_)
                | FieldValue::RepeatedGeoRect(_)
        )
    }

    /// Returns the value as a string slice if it is one.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a signed integer if it is one.
    #[inline]
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as an unsigned integer if it is one.
    #[inline]
    #[must_use]
    pub const fn as_uint(&self) -> Option<u64> {
        match self {
            FieldValue::Uint(u) => Some(*u),
            _ => None,
        }
    }

    /// Returns the value as a float if it is one.
    #[inline]
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as a boolean if it is one.
    #[inline]
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer range if it is one.
    #[inline]
    #[must_use]
    pub const fn as_range_int(&self) -> Option<IntRange> {
        match self {
            FieldValue::RangeInt(r) => Some(*r),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    #[inline]
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_owned())
    }
}

impl From<String> for FieldValue {
    #[inline]
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    #[inline]
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<u64> for FieldValue {
    #[inline]
    fn from(u: u64) -> Self {
        FieldValue::Uint(u)
    }
}

impl From<f64> for FieldValue {
    #[inline]
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    #[inline]
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<IntRange> for FieldValue {
    #[inline]
    fn from(r: IntRange) -> Self {
        FieldValue::RangeInt(r)
    }
}

impl From<FloatRange> for FieldValue {
    #[inline]
    fn from(r: FloatRange) -> Self {
        FieldValue::RangeFloat(r)
    }
}

impl From<GeoPoint> for FieldValue {
    #[inline]
    fn from(p: GeoPoint) -> Self {
        FieldValue::GeoPoint(p)
    }
}

impl From<GeoRect> for FieldValue {
    #[inline]
    fn from(r: GeoRect) -> Self {
        FieldValue::GeoRect(r)
    }
}

/// One field of a segment: a name and its tagged value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentField {
    pub name: String,
    pub value: FieldValue,
}

/// A record stored in an index, identified by its primary value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segment {
    /// Ordered field list.
    pub fields: Vec<SegmentField>,
}

impl Segment {
    /// An empty segment; add fields with [`Segment::field`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push(SegmentField { name: name.into(), value });
        self
    }

    /// The value of the named field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Merge `other` into `self`: same-named fields are replaced, new fields
    /// appended in order.
    pub fn merge_from(&mut self, other: &Segment) {
        for field in &other.fields {
            match self.fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => existing.value = field.value.clone(),
                None => self.fields.push(field.clone()),
            }
        }
    }

    pub(crate) fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|_| Error::Marshalling)
    }

    pub(crate) fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|_| Error::Marshalling)
    }
}

/// One field of a predicate: probes the named field with a value of the same
/// variant family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateField {
    pub name: String,
    pub value: FieldValue,
}

/// A conjunction of per-field probes against one index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Predicate {
    /// Fields are intersected left to right.
    pub fields: Vec<PredicateField>,
}

impl Predicate {
    /// An empty predicate; add fields with [`Predicate::field`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a probe.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push(PredicateField { name: name.into(), value });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_text_round_trip() {
        let def = IndexDefinition::new("hello")
            .field(FieldDefinition::primary("name", DataType::String))
            .field(FieldDefinition::new("age", DataType::Range));

        let text = def.encode().unwrap();
        let decoded = IndexDefinition::decode(&text).unwrap();
        assert_eq!(decoded, def);
    }

    #[test]
    fn segment_text_round_trip() {
        let segment = Segment::new()
            .field("name", FieldValue::String("Millennial".into()))
            .field("age", FieldValue::RangeInt(IntRange { min: 20, max: 39 }));

        let text = segment.encode().unwrap();
        let decoded = Segment::decode(&text).unwrap();
        assert_eq!(decoded, segment);
    }

    #[test]
    fn primary_field_last_wins() {
        let def = IndexDefinition::new("twice")
            .field(FieldDefinition::primary("a", DataType::String))
            .field(FieldDefinition::primary("b", DataType::Int));
        assert_eq!(def.primary_field().map(|f| f.name.as_str()), Some("b"));
    }

    #[test]
    fn merge_replaces_and_appends() {
        let mut dst = Segment::new().field("a", FieldValue::Int(1));
        let src = Segment::new().field("a", FieldValue::Int(2)).field("b", FieldValue::Bool(true));
        dst.merge_from(&src);
        assert_eq!(dst.get("a"), Some(&FieldValue::Int(2)));
        assert_eq!(dst.get("b"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn geometric_classification() {
        assert!(FieldValue::RangeInt(IntRange { min: 0, max: 1 }).is_geometric());
        assert!(!FieldValue::String("x".into()).is_geometric());
        assert!(DataType::Geo.is_geometric());
        assert!(!DataType::Blob.is_geometric());
    }

    #[test]
    fn value_conversions() {
        assert_eq!(FieldValue::from("hello").as_str(), Some("hello"));
        assert_eq!(FieldValue::from(42i64).as_int(), Some(42));
        assert_eq!(FieldValue::from(7u64).as_uint(), Some(7));
        assert_eq!(FieldValue::from(2.5f64).as_float(), Some(2.5));
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(
            FieldValue::from(IntRange { min: 1, max: 2 }).as_range_int(),
            Some(IntRange { min: 1, max: 2 })
        );
    }

    #[test]
    fn typed_accessors_reject_other_variants() {
        let value = FieldValue::Int(1);
        assert!(value.as_str().is_none());
        assert!(value.as_bool().is_none());
        assert!(value.as_float().is_none());
    }

    #[test]
    fn repeated_classification() {
        assert!(FieldValue::RepeatedInt(vec![1]).is_repeated());
        assert!(!FieldValue::Int(1).is_repeated());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(Segment::decode("not json"), Err(Error::Marshalling));
        assert_eq!(IndexDefinition::decode("{"), Err(Error::Marshalling));
    }
}
