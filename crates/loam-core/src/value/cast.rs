use crate::value::Value;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use time::{OffsetDateTime, Time, format_description::well_known::Rfc3339};

///
/// CastKind
///
/// Declared bidirectional transform between the storage representation of
/// a field and its in-memory representation. Both directions are total over
/// the values they accept, idempotent, and null-preserving.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum CastKind {
    Integer,
    Float,
    Text,
    Boolean,
    Json,
    Date,
    DateTime,
    Timestamp,
}

///
/// CastError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum CastError {
    #[error("cannot cast {from} value to {kind}")]
    Unsupported { kind: CastKind, from: &'static str },

    #[error("invalid json text: {0}")]
    Json(String),

    #[error("invalid date value: {0}")]
    Date(String),

    #[error("numeric value out of range for {kind}")]
    OutOfRange { kind: CastKind },
}

impl CastKind {
    /// Convert a caller-supplied value into its storage representation.
    /// Json is stored as serialized text; every other kind shares one
    /// canonical representation with the in-memory side.
    pub fn to_storage(self, value: Value) -> Result<Value, CastError> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            Self::Json => match value {
                // already serialized
                Value::Text(s) => Ok(Value::Text(s)),
                Value::Json(v) => Ok(Value::Text(v.to_string())),
                Value::Bool(b) => Ok(Value::Text(serde_json::Value::Bool(b).to_string())),
                Value::Int(n) => Ok(Value::Text(serde_json::Value::from(n).to_string())),
                Value::Float(f) => serde_json::Number::from_f64(f)
                    .map(|n| Value::Text(serde_json::Value::Number(n).to_string()))
                    .ok_or(CastError::OutOfRange { kind: self }),
                other => Err(unsupported(self, &other)),
            },
            _ => self.coerce(value),
        }
    }

    /// Convert a stored value into its in-memory representation. Json text
    /// parses back into a structure; everything else shares the canonical
    /// form produced by `to_storage`.
    pub fn to_memory(self, value: Value) -> Result<Value, CastError> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            Self::Json => match value {
                Value::Json(v) => Ok(Value::Json(v)),
                Value::Text(s) => serde_json::from_str(&s)
                    .map(Value::Json)
                    .map_err(|err| CastError::Json(err.to_string())),
                Value::Bool(b) => Ok(Value::Json(serde_json::Value::Bool(b))),
                Value::Int(n) => Ok(Value::Json(serde_json::Value::from(n))),
                Value::Float(f) => serde_json::Number::from_f64(f)
                    .map(|n| Value::Json(serde_json::Value::Number(n)))
                    .ok_or(CastError::OutOfRange { kind: self }),
                other => Err(unsupported(self, &other)),
            },
            _ => self.coerce(value),
        }
    }

    // Shared direction-independent coercion for the scalar kinds.
    fn coerce(self, value: Value) -> Result<Value, CastError> {
        match self {
            Self::Integer => coerce_integer(value),
            Self::Float => coerce_float(value),
            Self::Text => coerce_text(value),
            Self::Boolean => Ok(Value::Bool(value.truthy())),
            Self::Date => coerce_datetime(value, self).map(|dt| {
                // normalize to midnight utc
                Value::DateTime(dt.replace_time(Time::MIDNIGHT))
            }),
            Self::DateTime => coerce_datetime(value, self).map(Value::DateTime),
            Self::Timestamp => coerce_timestamp(value),
            Self::Json => unreachable!("json handled per direction"),
        }
    }
}

const fn unsupported(kind: CastKind, value: &Value) -> CastError {
    CastError::Unsupported {
        kind,
        from: value.kind_name(),
    }
}

fn coerce_integer(value: Value) -> Result<Value, CastError> {
    match value {
        Value::Int(n) => Ok(Value::Int(n)),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Float(f) => float_to_i64(f, CastKind::Integer).map(Value::Int),
        Value::Text(s) => {
            if let Ok(n) = s.trim().parse::<i64>() {
                Ok(Value::Int(n))
            } else if let Ok(f) = s.trim().parse::<f64>() {
                float_to_i64(f, CastKind::Integer).map(Value::Int)
            } else {
                Err(unsupported(CastKind::Integer, &Value::Text(s)))
            }
        }
        other => Err(unsupported(CastKind::Integer, &other)),
    }
}

fn coerce_float(value: Value) -> Result<Value, CastError> {
    match value {
        Value::Float(f) => Ok(Value::Float(f)),
        #[allow(clippy::cast_precision_loss)]
        Value::Int(n) => Ok(Value::Float(n as f64)),
        Value::Bool(b) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        Value::Text(s) => match s.trim().parse::<f64>() {
            // non-finite text inputs are rejected rather than stored
            Ok(f) if f.is_finite() => Ok(Value::Float(f)),
            Ok(_) => Err(CastError::OutOfRange {
                kind: CastKind::Float,
            }),
            Err(_) => Err(unsupported(CastKind::Float, &Value::Text(s))),
        },
        other => Err(unsupported(CastKind::Float, &other)),
    }
}

fn coerce_text(value: Value) -> Result<Value, CastError> {
    match value {
        Value::Text(s) => Ok(Value::Text(s)),
        Value::Int(n) => Ok(Value::Text(n.to_string())),
        Value::Float(f) => Ok(Value::Text(f.to_string())),
        Value::Bool(b) => Ok(Value::Text(b.to_string())),
        Value::Json(v) => Ok(Value::Text(v.to_string())),
        Value::DateTime(dt) => dt
            .format(&Rfc3339)
            .map(Value::Text)
            .map_err(|err| CastError::Date(err.to_string())),
        Value::Null => Ok(Value::Null),
    }
}

// Parse a date-like value into an OffsetDateTime. Integers are epoch millis.
fn coerce_datetime(value: Value, kind: CastKind) -> Result<OffsetDateTime, CastError> {
    match value {
        Value::DateTime(dt) => Ok(dt),
        Value::Int(ms) => OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
            .map_err(|err| CastError::Date(err.to_string())),
        Value::Text(s) => OffsetDateTime::parse(&s, &Rfc3339)
            .map_err(|err| CastError::Date(format!("{s}: {err}"))),
        other => Err(unsupported(kind, &other)),
    }
}

// Collapse date-likes to integer epoch milliseconds.
fn coerce_timestamp(value: Value) -> Result<Value, CastError> {
    match value {
        Value::Int(ms) => Ok(Value::Int(ms)),
        Value::Float(f) => float_to_i64(f, CastKind::Timestamp).map(Value::Int),
        Value::DateTime(dt) => epoch_millis(dt).map(Value::Int),
        Value::Text(s) => {
            if let Ok(ms) = s.trim().parse::<i64>() {
                Ok(Value::Int(ms))
            } else {
                coerce_datetime(Value::Text(s), CastKind::Timestamp)
                    .and_then(|dt| epoch_millis(dt).map(Value::Int))
            }
        }
        other => Err(unsupported(CastKind::Timestamp, &other)),
    }
}

fn epoch_millis(dt: OffsetDateTime) -> Result<i64, CastError> {
    i64::try_from(dt.unix_timestamp_nanos() / 1_000_000)
        .map_err(|_| CastError::OutOfRange {
            kind: CastKind::Timestamp,
        })
}

fn float_to_i64(f: f64, kind: CastKind) -> Result<i64, CastError> {
    if f.is_finite() && (i64::MIN as f64..=i64::MAX as f64).contains(&f) {
        #[allow(clippy::cast_possible_truncation)]
        Ok(f.trunc() as i64)
    } else {
        Err(CastError::OutOfRange { kind })
    }
}
