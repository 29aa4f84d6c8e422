//! Generic row serialization
//!
//! The engine is schema-agnostic: result rows are normalized to JSON
//! objects by inspecting column types at runtime instead of decoding into
//! fixed structs.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgColumn, PgRow};
use sqlx::{Column, Row, TypeInfo};

/// Convert a row into a JSON object keyed by column name
pub fn row_to_json(row: &PgRow) -> JsonValue {
    let mut object = serde_json::Map::with_capacity(row.columns().len());
    for column in row.columns() {
        object.insert(column.name().to_string(), column_value(row, column));
    }
    JsonValue::Object(object)
}

fn column_value(row: &PgRow, column: &PgColumn) -> JsonValue {
    let idx = column.ordinal();
    match column.type_info().name() {
        "BOOL" => decode(row.try_get::<Option<bool>, _>(idx), JsonValue::Bool),
        "INT2" => decode(row.try_get::<Option<i16>, _>(idx), |v| v.into()),
        "INT4" => decode(row.try_get::<Option<i32>, _>(idx), |v| v.into()),
        "INT8" => decode(row.try_get::<Option<i64>, _>(idx), |v| v.into()),
        "FLOAT4" => decode(row.try_get::<Option<f32>, _>(idx), |v| float(v as f64)),
        "FLOAT8" => decode(row.try_get::<Option<f64>, _>(idx), float),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            decode(row.try_get::<Option<String>, _>(idx), JsonValue::String)
        }
        "TIMESTAMPTZ" => decode(row.try_get::<Option<DateTime<Utc>>, _>(idx), |v| {
            JsonValue::String(v.to_rfc3339_opts(SecondsFormat::Micros, true))
        }),
        "TIMESTAMP" => decode(row.try_get::<Option<NaiveDateTime>, _>(idx), |v| {
            JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
        }),
        "DATE" => decode(row.try_get::<Option<NaiveDate>, _>(idx), |v| {
            JsonValue::String(v.to_string())
        }),
        "UUID" => decode(row.try_get::<Option<uuid::Uuid>, _>(idx), |v| {
            JsonValue::String(v.to_string())
        }),
        "JSON" | "JSONB" => decode(row.try_get::<Option<JsonValue>, _>(idx), |v| v),
        other => {
            tracing::debug!(column = column.name(), r#type = other, "Unsupported column type");
            JsonValue::Null
        }
    }
}

fn decode<T, F>(value: Result<Option<T>, sqlx::Error>, convert: F) -> JsonValue
where
    F: FnOnce(T) -> JsonValue,
{
    match value {
        Ok(Some(v)) => convert(v),
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to decode column");
            JsonValue::Null
        }
    }
}

fn float(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
