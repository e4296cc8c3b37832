//! The value codec.
//!
//! The codec is the single place that enumerates every [`FieldValue`]
//! variant. It maps typed values onto the substrate's string world:
//!
//! - scalars encode to their text form under sub-key `"0"`;
//! - repeated values emit one pair per element, sub-keyed `"0".."n-1"`;
//! - 1-D ranges encode as `[-inf min], [+inf max]` — a pair of 2-D points
//!   with one axis suppressed by the infinities, so the R-tree's rectangle
//!   overlap test computes interval overlap along the real axis;
//! - points encode as `[x y]`, rectangles as `[x1 y1],[x2 y2]`.
//!
//! Predicate values encode identically to segment values, so one encoder
//! serves both paths. Floats use the capital-E shortest round-trip exponent
//! form throughout.

use crate::error::{Error, Result};
use crate::schema::{DataType, FieldDefinition, FieldValue, FloatRange, GeoPoint, GeoRect, IntRange, SegmentField};

/// Encode a field value into `(sub_key, text)` pairs. The sink returns
/// `false` to stop early.
pub(crate) fn encode_value(value: &FieldValue, emit: &mut dyn FnMut(String, String) -> bool) {
    match value {
        FieldValue::String(v) => {
            emit_at(0, v.clone(), emit);
        }
        FieldValue::RepeatedString(values) => {
            emit_all(values.iter().cloned(), emit);
        }
        FieldValue::Int(v) => {
            emit_at(0, v.to_string(), emit);
        }
        FieldValue::RepeatedInt(values) => {
            emit_all(values.iter().map(i64::to_string), emit);
        }
        FieldValue::Uint(v) => {
            emit_at(0, v.to_string(), emit);
        }
        FieldValue::RepeatedUint(values) => {
            emit_all(values.iter().map(u64::to_string), emit);
        }
        FieldValue::Float(v) => {
            emit_at(0, format_float(*v), emit);
        }
        FieldValue::RepeatedFloat(values) => {
            emit_all(values.iter().map(|v| format_float(*v)), emit);
        }
        FieldValue::Bool(v) => {
            emit_at(0, v.to_string(), emit);
        }
        FieldValue::RepeatedBool(values) => {
            emit_all(values.iter().map(bool::to_string), emit);
        }
        FieldValue::Blob(v) => {
            emit_at(0, v.clone(), emit);
        }
        FieldValue::RepeatedBlob(values) => {
            emit_all(values.iter().cloned(), emit);
        }
        FieldValue::RangeInt(range) => {
            emit_at(0, int_range_text(range), emit);
        }
        FieldValue::RepeatedRangeInt(values) => {
            emit_all(values.iter().map(int_range_text), emit);
        }
        FieldValue::RangeFloat(range) => {
            emit_at(0, float_range_text(range), emit);
        }
        FieldValue::RepeatedRangeFloat(values) => {
            emit_all(values.iter().map(float_range_text), emit);
        }
        FieldValue::GeoPoint(point) => {
            emit_at(0, point_text(point), emit);
        }
        FieldValue::RepeatedGeoPoint(values) => {
            emit_all(values.iter().map(point_text), emit);
        }
        FieldValue::GeoRect(rect) => {
            emit_at(0, rect_text(rect), emit);
        }
        FieldValue::RepeatedGeoRect(values) => {
            emit_all(values.iter().map(rect_text), emit);
        }
    }
}

fn emit_at(sub_key: usize, text: String, emit: &mut dyn FnMut(String, String) -> bool) -> bool {
    emit(sub_key.to_string(), text)
}

fn emit_all(
    values: impl Iterator<Item = String>,
    emit: &mut dyn FnMut(String, String) -> bool,
) {
    for (sub_key, text) in values.enumerate() {
        if !emit_at(sub_key, text, emit) {
            break;
        }
    }
}

/// Capital-E shortest round-trip exponent form, the analogue of Go's
/// `strconv.FormatFloat(v, 'E', -1, 64)`.
pub(crate) fn format_float(value: f64) -> String {
    format!("{value:E}")
}

fn int_range_text(range: &IntRange) -> String {
    // Infinity suppresses the first axis; the interval lives on the second.
    format!("[-inf {}], [+inf {}]", range.min, range.max)
}

fn float_range_text(range: &FloatRange) -> String {
    format!("[-inf {}], [+inf {}]", format_float(range.min), format_float(range.max))
}

fn point_text(point: &GeoPoint) -> String {
    format!("[{} {}]", format_float(point.x), format_float(point.y))
}

fn rect_text(rect: &GeoRect) -> String {
    format!(
        "[{} {}],[{} {}]",
        format_float(rect.top_left.x),
        format_float(rect.top_left.y),
        format_float(rect.bottom_right.x),
        format_float(rect.bottom_right.y)
    )
}

/// Decode the substrate text of a primary value back into a tagged field.
///
/// Only the scalar subset decodes; geometric primaries are not implemented.
pub(crate) fn decode_primary_scalar(
    definition: &FieldDefinition,
    text: &str,
) -> Result<SegmentField> {
    let value = match definition.data_type {
        DataType::String => FieldValue::String(text.to_owned()),
        DataType::Blob => FieldValue::Blob(text.to_owned()),
        DataType::Int | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            FieldValue::Int(text.parse().map_err(|_| Error::Marshalling)?)
        }
        DataType::Uint
        | DataType::Uint8
        | DataType::Uint16
        | DataType::Uint32
        | DataType::Uint64 => FieldValue::Uint(text.parse().map_err(|_| Error::Marshalling)?),
        DataType::Float | DataType::Float32 | DataType::Float64 => {
            FieldValue::Float(text.parse().map_err(|_| Error::Marshalling)?)
        }
        DataType::Bool => FieldValue::Bool(text.parse().map_err(|_| Error::Marshalling)?),
        DataType::Undefined => return Err(Error::FieldUnknown),
        DataType::Range
        | DataType::RangeInt
        | DataType::RangeFloat
        | DataType::Geo
        | DataType::GeoRect
        | DataType::GeoPoint => return Err(Error::NotImplemented),
    };

    Ok(SegmentField { name: definition.name.clone(), value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_pairs(value: &FieldValue) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        encode_value(value, &mut |k, v| {
            pairs.push((k, v));
            true
        });
        pairs
    }

    #[test]
    fn scalar_sub_key_is_zero() {
        let pairs = encode_pairs(&FieldValue::String("banana".into()));
        assert_eq!(pairs, vec![("0".into(), "banana".into())]);
    }

    #[test]
    fn repeated_sub_keys_count_up() {
        let pairs = encode_pairs(&FieldValue::RepeatedInt(vec![5, -3, 12]));
        assert_eq!(
            pairs,
            vec![("0".into(), "5".into()), ("1".into(), "-3".into()), ("2".into(), "12".into())]
        );
    }

    #[test]
    fn float_uses_capital_exponent_form() {
        let pairs = encode_pairs(&FieldValue::Float(1.2345));
        assert_eq!(pairs[0].1, "1.2345E0");

        let pairs = encode_pairs(&FieldValue::Float(-0.5));
        assert_eq!(pairs[0].1, "-5E-1");
    }

    #[test]
    fn bool_encodes_lowercase() {
        assert_eq!(encode_pairs(&FieldValue::Bool(true))[0].1, "true");
        assert_eq!(encode_pairs(&FieldValue::Bool(false))[0].1, "false");
    }

    #[test]
    fn int_range_suppresses_first_axis() {
        let pairs = encode_pairs(&FieldValue::RangeInt(IntRange { min: 20, max: 39 }));
        assert_eq!(pairs[0].1, "[-inf 20], [+inf 39]");
    }

    #[test]
    fn float_range_uses_float_format() {
        let pairs = encode_pairs(&FieldValue::RangeFloat(FloatRange { min: 0.5, max: 2.0 }));
        assert_eq!(pairs[0].1, "[-inf 5E-1], [+inf 2E0]");
    }

    #[test]
    fn geo_point_and_rect_forms() {
        let pairs = encode_pairs(&FieldValue::GeoPoint(GeoPoint { x: 1.0, y: 2.0 }));
        assert_eq!(pairs[0].1, "[1E0 2E0]");

        let rect = GeoRect {
            top_left: GeoPoint { x: 0.0, y: 10.0 },
            bottom_right: GeoPoint { x: 5.0, y: 0.0 },
        };
        let pairs = encode_pairs(&FieldValue::GeoRect(rect));
        assert_eq!(pairs[0].1, "[0E0 1E1],[5E0 0E0]");
    }

    #[test]
    fn early_stop_truncates_repeated() {
        let mut pairs = Vec::new();
        encode_value(&FieldValue::RepeatedString(vec!["a".into(), "b".into(), "c".into()]), &mut |k, v| {
            pairs.push((k, v));
            pairs.len() < 2
        });
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn decode_scalar_round_trips() {
        let cases = [
            (DataType::String, FieldValue::String("banana".into())),
            (DataType::Int, FieldValue::Int(123)),
            (DataType::Float, FieldValue::Float(1.2345)),
            (DataType::Bool, FieldValue::Bool(true)),
            (DataType::Uint, FieldValue::Uint(99)),
            (DataType::Blob, FieldValue::Blob("raw".into())),
        ];
        for (data_type, value) in cases {
            let definition = FieldDefinition::primary("pk", data_type);
            let mut encoded = Vec::new();
            encode_value(&value, &mut |_, v| {
                encoded.push(v);
                true
            });
            let field = decode_primary_scalar(&definition, &encoded[0]).unwrap();
            assert_eq!(field.name, "pk");
            assert_eq!(field.value, value);
        }
    }

    #[test]
    fn decode_geometric_is_not_implemented() {
        let definition = FieldDefinition::primary("area", DataType::GeoRect);
        assert_eq!(decode_primary_scalar(&definition, "[0 0],[1 1]"), Err(Error::NotImplemented));
    }

    #[test]
    fn decode_undefined_is_field_unknown() {
        let definition = FieldDefinition::primary("x", DataType::Undefined);
        assert_eq!(decode_primary_scalar(&definition, "x"), Err(Error::FieldUnknown));
    }

    #[test]
    fn decode_garbage_is_marshalling_failure() {
        let definition = FieldDefinition::primary("n", DataType::Int);
        assert_eq!(decode_primary_scalar(&definition, "banana"), Err(Error::Marshalling));
    }
}
