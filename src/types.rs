use crate::error::TypeError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The neutral type set every cell passes through, regardless of which side
/// of the transfer it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeutralType {
    Int64,
    Float64,
    Utf8String,
    Bool,
    DateTimeUtc,
}

impl NeutralType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeutralType::Int64 => "int64",
            NeutralType::Float64 => "float64",
            NeutralType::Utf8String => "utf8_string",
            NeutralType::Bool => "bool",
            NeutralType::DateTimeUtc => "datetime_utc",
        }
    }

    /// Maps a ClickHouse column type to its neutral counterpart. Total:
    /// anything unrecognized degrades to `Utf8String` rather than failing
    /// the transfer.
    pub fn from_clickhouse(raw: &str) -> NeutralType {
        let base = strip_type_modifiers(raw);
        if base == "Bool" || base == "Boolean" {
            return NeutralType::Bool;
        }
        if base.starts_with("Int") || base.starts_with("UInt") {
            return NeutralType::Int64;
        }
        if base.starts_with("Float") || base.starts_with("Decimal") {
            return NeutralType::Float64;
        }
        if base.starts_with("DateTime") || base == "Date" || base == "Date32" {
            return NeutralType::DateTimeUtc;
        }
        NeutralType::Utf8String
    }
}

impl fmt::Display for NeutralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ClickHouse reports nullable columns as `Nullable(inner)`.
pub fn is_nullable_clickhouse(raw: &str) -> bool {
    raw.trim().starts_with("Nullable(")
}

fn strip_type_modifiers(raw: &str) -> &str {
    let mut base = raw.trim();
    loop {
        let mut stripped = base;
        for wrapper in ["Nullable(", "LowCardinality("] {
            if let Some(inner) = stripped.strip_prefix(wrapper) {
                stripped = inner.strip_suffix(')').unwrap_or(inner);
            }
        }
        if stripped == base {
            return base;
        }
        base = stripped;
    }
}

/// One typed scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

impl Value {
    /// Parses a file cell into a typed value.
    ///
    /// Empty text becomes `Null` for nullable columns. For non-nullable
    /// columns it is malformed, except strings, where the empty string is a
    /// legitimate value.
    pub fn from_text(
        cell: &str,
        ty: NeutralType,
        nullable: bool,
        column: &str,
    ) -> Result<Value, TypeError> {
        if cell.is_empty() {
            if nullable {
                return Ok(Value::Null);
            }
            if ty == NeutralType::Utf8String {
                return Ok(Value::Str(String::new()));
            }
            return Err(malformed(column, cell, ty));
        }

        match ty {
            NeutralType::Int64 => cell
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| malformed(column, cell, ty)),
            NeutralType::Float64 => cell
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| malformed(column, cell, ty)),
            NeutralType::Utf8String => Ok(Value::Str(cell.to_string())),
            NeutralType::Bool => match cell.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(malformed(column, cell, ty)),
            },
            NeutralType::DateTimeUtc => parse_datetime(cell)
                .map(Value::DateTime)
                .ok_or_else(|| malformed(column, cell, ty)),
        }
    }

    /// Renders the value as file-cell text. `Null` renders as the empty cell.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Converts a ClickHouse JSON cell into a typed value. The JSON output
    /// formats quote 64-bit integers by default, so numeric columns may
    /// arrive as either numbers or strings.
    pub fn from_json(
        raw: &serde_json::Value,
        ty: NeutralType,
        nullable: bool,
        column: &str,
    ) -> Result<Value, TypeError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }

        match ty {
            NeutralType::Int64 => {
                if let Some(n) = raw.as_i64() {
                    return Ok(Value::Int(n));
                }
                if let Some(n) = raw.as_u64() {
                    if let Ok(n) = i64::try_from(n) {
                        return Ok(Value::Int(n));
                    }
                }
                if let Some(s) = raw.as_str() {
                    return Value::from_text(s, ty, nullable, column);
                }
                Err(malformed(column, &raw.to_string(), ty))
            }
            NeutralType::Float64 => {
                if let Some(f) = raw.as_f64() {
                    return Ok(Value::Float(f));
                }
                if let Some(s) = raw.as_str() {
                    return Value::from_text(s, ty, nullable, column);
                }
                Err(malformed(column, &raw.to_string(), ty))
            }
            NeutralType::Bool => {
                if let Some(b) = raw.as_bool() {
                    return Ok(Value::Bool(b));
                }
                if let Some(n) = raw.as_u64() {
                    return Ok(Value::Bool(n != 0));
                }
                if let Some(s) = raw.as_str() {
                    return Value::from_text(s, ty, nullable, column);
                }
                Err(malformed(column, &raw.to_string(), ty))
            }
            NeutralType::DateTimeUtc => {
                let Some(s) = raw.as_str() else {
                    return Err(malformed(column, &raw.to_string(), ty));
                };
                Value::from_text(s, ty, nullable, column)
            }
            NeutralType::Utf8String => match raw.as_str() {
                Some(s) => Ok(Value::Str(s.to_string())),
                None => Ok(Value::Str(raw.to_string())),
            },
        }
    }

    /// Re-types a value to the target column's expectations. Matching kinds
    /// pass through untouched; everything else goes through the text rules,
    /// so the same malformed-cell policy applies on every route.
    pub fn coerce(
        self,
        ty: NeutralType,
        nullable: bool,
        column: &str,
    ) -> Result<Value, TypeError> {
        match (&self, ty) {
            (Value::Null, _) if nullable => Ok(self),
            (Value::Null, _) => Value::from_text("", ty, nullable, column),
            (Value::Int(_), NeutralType::Int64)
            | (Value::Float(_), NeutralType::Float64)
            | (Value::Str(_), NeutralType::Utf8String)
            | (Value::Bool(_), NeutralType::Bool)
            | (Value::DateTime(_), NeutralType::DateTimeUtc) => Ok(self),
            _ => Value::from_text(&self.to_text(), ty, nullable, column),
        }
    }
}

fn malformed(column: &str, cell: &str, expected: NeutralType) -> TypeError {
    TypeError::Malformed {
        column: column.to_string(),
        cell: cell.to_string(),
        expected,
    }
}

fn parse_datetime(cell: &str) -> Option<DateTime<Utc>> {
    let cell = cell.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Describes one source or target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    pub neutral_type: NeutralType,
    pub nullable: bool,
}

/// One materialized row. Values are positionally aligned with the column
/// order that was requested; rows live only as long as the batch that
/// produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

#[cfg(test)]
mod tests;
