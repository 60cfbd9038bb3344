//! Conversion from PostgreSQL wire values to `Value`

use std::error::Error;

use dbpool_core::Value;
use tokio_postgres::Row as PgRow;
use tokio_postgres::types::{FromSql, Type};

type DecodeError = Box<dyn Error + Sync + Send>;

/// NUMERIC rendered as exact decimal text
#[derive(Debug)]
struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        decode_numeric(raw).map(Self)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Raw UTF-8 payload for types without a dedicated mapping (enums, domains)
#[derive(Debug)]
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        Ok(Self(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Decode the binary NUMERIC format: a header of four big-endian 16-bit
/// words (digit count, weight, sign, display scale) followed by base-10000
/// digit groups.
pub(crate) fn decode_numeric(raw: &[u8]) -> std::result::Result<String, DecodeError> {
    let word = |i: usize| u16::from_be_bytes([raw[i * 2], raw[i * 2 + 1]]);

    if raw.len() < 8 {
        return Err("invalid NUMERIC payload: too short".into());
    }
    let ndigits = word(0) as usize;
    let weight = word(1) as i16 as isize;
    let sign = word(2);
    let dscale = word(3) as usize;

    if sign == 0xC000 {
        return Ok("NaN".to_string());
    }
    if raw.len() < 8 + ndigits * 2 {
        return Err("invalid NUMERIC payload: truncated digits".into());
    }

    let groups: Vec<u16> = (0..ndigits).map(|i| word(4 + i)).collect();
    if groups.iter().any(|&g| g > 9999) {
        return Err("invalid NUMERIC payload: digit group out of range".into());
    }
    let group_at = |index: isize| -> u16 {
        usize::try_from(index)
            .ok()
            .and_then(|i| groups.get(i).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&group_at(0).to_string());
        for index in 1..=weight {
            text.push_str(&format!("{:04}", group_at(index)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut index = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", group_at(index)));
            index += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }

    let is_zero = groups.iter().all(|&g| g == 0);
    if sign == 0x4000 && !is_zero {
        text.insert(0, '-');
    }
    Ok(text)
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

/// Convert one column of a row, dispatching on the PostgreSQL type name
///
/// Values that fail to decode become `Value::Null`.
pub(crate) fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_().name();

    let value = match type_name {
        "bool" => get(row, idx).map(Value::Bool),
        "int2" => get(row, idx).map(Value::Int16),
        "int4" => get(row, idx).map(Value::Int32),
        "int8" => get(row, idx).map(Value::Int64),
        "float4" => get(row, idx).map(Value::Float32),
        "float8" => get(row, idx).map(Value::Float64),
        "numeric" => get::<NumericText>(row, idx).map(|n| Value::Decimal(n.0)),
        "text" | "varchar" | "bpchar" | "name" => get(row, idx).map(Value::String),
        "bytea" => get(row, idx).map(Value::Bytes),
        "uuid" => get(row, idx).map(Value::Uuid),
        "json" | "jsonb" => get(row, idx).map(Value::Json),
        "date" => get(row, idx).map(Value::Date),
        "time" => get(row, idx).map(Value::Time),
        "timestamp" => get(row, idx).map(Value::DateTime),
        "timestamptz" => get(row, idx).map(Value::DateTimeUtc),
        _ => get::<RawText>(row, idx).map(|t| Value::String(t.0)),
    };

    value.unwrap_or(Value::Null)
}
