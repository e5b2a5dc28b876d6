//! Normalization and structural comparison of media info
//!
//! Normalization strips the environment-dependent top-level fields and turns
//! every stream's `extradata` into a plain byte array, so that an actual
//! result and a recorded fixture can be compared for deep equality.

use crate::error::NormalizeError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Top-level fields that depend on where and how the sample was loaded
pub const VOLATILE_FIELDS: &[&str] = &["filename", "url"];

/// Per-stream fields kept by the orientation projection
pub const ORIENTATION_FIELDS: &[&str] = &["id", "rotation", "flip"];

/// Comparison-only view of a media info value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedMediaInfo(Value);

impl NormalizedMediaInfo {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn to_pretty_json(&self) -> String {
        pretty(&self.0)
    }
}

/// Removes volatile fields and materializes every stream's `extradata`
///
/// Absent and empty `extradata` both become `[]`. Normalizing an already
/// normalized value returns it unchanged.
pub fn normalize(info: &Value) -> Result<NormalizedMediaInfo, NormalizeError> {
    let object = info.as_object().ok_or(NormalizeError::NotAnObject)?;
    let streams = object
        .get("streams")
        .and_then(Value::as_array)
        .ok_or(NormalizeError::StreamsNotArray)?;

    let mut out: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !VOLATILE_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let streams = streams
        .iter()
        .enumerate()
        .map(|(index, stream)| {
            let mut stream = stream
                .as_object()
                .cloned()
                .ok_or(NormalizeError::StreamNotObject(index))?;
            let extradata = materialize_bytes(stream.get("extradata"), index)?;
            stream.insert("extradata".to_string(), extradata);
            Ok(Value::Object(stream))
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;

    out.insert("streams".to_string(), Value::Array(streams));
    Ok(NormalizedMediaInfo(Value::Object(out)))
}

/// Coerces a binary-like value into an ordered array
///
/// Accepts nothing/`null`, an array, or the object form a typed array takes
/// when serialized (`{"0": 1, "1": 2}`), ordered by index.
fn materialize_bytes(value: Option<&Value>, stream: usize) -> Result<Value, NormalizeError> {
    match value {
        None | Some(Value::Null) => Ok(Value::Array(Vec::new())),
        Some(Value::Array(items)) => Ok(Value::Array(items.clone())),
        Some(Value::Object(map)) => {
            let mut indexed = Vec::with_capacity(map.len());
            for (key, item) in map {
                let index = key.parse::<usize>().map_err(|_| NormalizeError::UnsupportedExtradata {
                    stream,
                    found: "non-indexed object",
                })?;
                indexed.push((index, item.clone()));
            }
            indexed.sort_by_key(|(index, _)| *index);
            Ok(Value::Array(indexed.into_iter().map(|(_, item)| item).collect()))
        }
        Some(other) => Err(NormalizeError::UnsupportedExtradata {
            stream,
            found: type_name(other),
        }),
    }
}

/// Projects a media info value down to `{streams: [{id, rotation, flip}]}`
///
/// Fields a stream does not carry are left out of its projection.
pub fn orientation_projection(info: &Value) -> Result<Value, NormalizeError> {
    let streams = info
        .as_object()
        .ok_or(NormalizeError::NotAnObject)?
        .get("streams")
        .and_then(Value::as_array)
        .ok_or(NormalizeError::StreamsNotArray)?;

    let projected = streams
        .iter()
        .enumerate()
        .map(|(index, stream)| {
            let stream = stream
                .as_object()
                .ok_or(NormalizeError::StreamNotObject(index))?;
            let fields: Map<String, Value> = ORIENTATION_FIELDS
                .iter()
                .filter_map(|field| stream.get(*field).map(|v| (field.to_string(), v.clone())))
                .collect();
            Ok(Value::Object(fields))
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;

    Ok(serde_json::json!({ "streams": projected }))
}

// ============================================================================
// Structural diff
// ============================================================================

/// How two values differ at one path
#[derive(Debug, Clone, PartialEq)]
pub enum MismatchKind {
    ValueDiffers { actual: Value, expected: Value },
    TypeDiffers { actual: &'static str, expected: &'static str },
    LengthDiffers { actual: usize, expected: usize },
    MissingInActual { expected: Value },
    UnexpectedInActual { actual: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// Location such as `streams[0].rotation`; empty for the root
    pub path: String,
    pub kind: MismatchKind,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        match &self.kind {
            MismatchKind::ValueDiffers { actual, expected } => {
                write!(f, "{}: expected {}, got {}", path, expected, actual)
            }
            MismatchKind::TypeDiffers { actual, expected } => {
                write!(f, "{}: expected a {}, got a {}", path, expected, actual)
            }
            MismatchKind::LengthDiffers { actual, expected } => {
                write!(f, "{}: expected {} element(s), got {}", path, expected, actual)
            }
            MismatchKind::MissingInActual { expected } => {
                write!(f, "{}: missing, expected {}", path, expected)
            }
            MismatchKind::UnexpectedInActual { actual } => {
                write!(f, "{}: unexpected {}", path, actual)
            }
        }
    }
}

/// Deep equality where numbers compare by value, as `1` and `1.0` do in JSON
pub fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).map_or(false, |y| values_equal(x, y)))
        }
        _ => actual == expected,
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Lists every difference between two values, order-sensitive for arrays
pub fn diff(actual: &Value, expected: &Value) -> Vec<Mismatch> {
    let mut out = Vec::new();
    diff_into(actual, expected, String::new(), &mut out);
    out
}

fn diff_into(actual: &Value, expected: &Value, path: String, out: &mut Vec<Mismatch>) {
    match (actual, expected) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, expected_value) in b {
                let child = join_key(&path, key);
                match a.get(key) {
                    Some(actual_value) => diff_into(actual_value, expected_value, child, out),
                    None => out.push(Mismatch {
                        path: child,
                        kind: MismatchKind::MissingInActual {
                            expected: expected_value.clone(),
                        },
                    }),
                }
            }
            for (key, actual_value) in a.iter().filter(|(key, _)| !b.contains_key(*key)) {
                out.push(Mismatch {
                    path: join_key(&path, key),
                    kind: MismatchKind::UnexpectedInActual {
                        actual: actual_value.clone(),
                    },
                });
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                out.push(Mismatch {
                    path: path.clone(),
                    kind: MismatchKind::LengthDiffers {
                        actual: a.len(),
                        expected: b.len(),
                    },
                });
            }
            for (index, (x, y)) in a.iter().zip(b).enumerate() {
                diff_into(x, y, format!("{}[{}]", path, index), out);
            }
        }
        _ if type_name(actual) != type_name(expected) => out.push(Mismatch {
            path,
            kind: MismatchKind::TypeDiffers {
                actual: type_name(actual),
                expected: type_name(expected),
            },
        }),
        _ if !values_equal(actual, expected) => out.push(Mismatch {
            path,
            kind: MismatchKind::ValueDiffers {
                actual: actual.clone(),
                expected: expected.clone(),
            },
        }),
        _ => {}
    }
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Failed comparison with both sides kept for diagnosis
#[derive(Debug, Clone, PartialEq)]
pub struct MismatchReport {
    /// `MediaInfo` or `Orientation`
    pub label: &'static str,
    pub actual: Value,
    pub expected: Value,
    pub mismatches: Vec<Mismatch>,
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} mismatch ({} difference(s)):",
            self.label,
            self.mismatches.len()
        )?;
        for mismatch in &self.mismatches {
            writeln!(f, "  - {}", mismatch)?;
        }
        writeln!(f, "Actual {}: {}", self.label, pretty(&self.actual))?;
        write!(f, "Expected {}: {}", self.label, pretty(&self.expected))
    }
}

fn compare_values(
    label: &'static str,
    actual: Value,
    expected: Value,
) -> Result<(), MismatchReport> {
    if values_equal(&actual, &expected) {
        return Ok(());
    }
    let mismatches = diff(&actual, &expected);
    Err(MismatchReport {
        label,
        actual,
        expected,
        mismatches,
    })
}

/// Full comparison of two normalized media info values
pub fn compare(
    actual: &NormalizedMediaInfo,
    expected: &NormalizedMediaInfo,
) -> Result<(), MismatchReport> {
    compare_values("MediaInfo", actual.0.clone(), expected.0.clone())
}

/// Compares two orientation projections
pub fn compare_orientation(actual: &Value, expected: &Value) -> Result<(), MismatchReport> {
    compare_values("Orientation", actual.clone(), expected.clone())
}
