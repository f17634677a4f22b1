//! SQL text generation for the PostgreSQL warehouse.

use gridiron_core::ids::quote_ident;
use gridiron_core::{Error, Result, Table, TableRef, Value};
use std::collections::HashMap;

/// PostgreSQL bind parameter limit per statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Storage type chosen for an incoming column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Double,
    Boolean,
    Text,
}

impl ColumnType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Text => "TEXT",
        }
    }

    /// Map an `information_schema.columns.data_type` onto a storage type.
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type {
            "bigint" | "integer" | "smallint" => ColumnType::BigInt,
            "double precision" | "real" | "numeric" => ColumnType::Double,
            "boolean" => ColumnType::Boolean,
            _ => ColumnType::Text,
        }
    }

    /// Narrowest type holding every non-null value.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let (mut ints, mut floats, mut bools, mut texts) = (false, false, false, false);
        for v in values {
            match v {
                Value::Null => {}
                Value::Int(_) => ints = true,
                Value::Float(_) => floats = true,
                Value::Bool(_) => bools = true,
                Value::Text(_) => texts = true,
            }
        }
        match (ints, floats, bools, texts) {
            (_, _, _, true) => ColumnType::Text,
            (false, false, true, false) => ColumnType::Boolean,
            (_, _, true, _) => ColumnType::Text,
            (_, true, false, false) => ColumnType::Double,
            (true, false, false, false) => ColumnType::BigInt,
            _ => ColumnType::Text,
        }
    }
}

pub fn infer_column_types(table: &Table) -> Vec<ColumnType> {
    (0..table.width())
        .map(|i| ColumnType::infer(table.rows().iter().map(|row| &row[i])))
        .collect()
}

/// Types for writing `table` into an existing relation.
///
/// Columns the relation already has keep its type; the rest are inferred
/// from the batch.
pub fn resolve_column_types(table: &Table, existing: &HashMap<String, ColumnType>) -> Vec<ColumnType> {
    table
        .columns()
        .iter()
        .zip(infer_column_types(table))
        .map(|(c, inferred)| existing.get(c).copied().unwrap_or(inferred))
        .collect()
}

/// Convert a cell to the variant bound for a column of type `ty`.
///
/// Integers widen to doubles and anything renders as text. A value that
/// would lose information, such as `12.4` into `BIGINT`, is a data error.
pub fn coerce(value: &Value, ty: ColumnType, column: &str) -> Result<Value> {
    let mismatch = || {
        Error::MalformedTable(format!(
            "column \"{}\" is {} but the fetched value is '{}'",
            column,
            ty.sql_name(),
            value
        ))
    };
    let coerced = match (value, ty) {
        (Value::Null, _) => Value::Null,
        (v, ColumnType::Text) => Value::Text(v.to_string()),
        (Value::Int(i), ColumnType::BigInt) => Value::Int(*i),
        (Value::Float(f), ColumnType::BigInt)
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            Value::Int(*f as i64)
        }
        (Value::Text(s), ColumnType::BigInt) => s.trim().parse().map(Value::Int).map_err(|_| mismatch())?,
        (Value::Int(i), ColumnType::Double) => Value::Float(*i as f64),
        (Value::Float(f), ColumnType::Double) => Value::Float(*f),
        (Value::Text(s), ColumnType::Double) => s.trim().parse().map(Value::Float).map_err(|_| mismatch())?,
        (Value::Bool(b), ColumnType::Boolean) => Value::Bool(*b),
        (Value::Text(s), ColumnType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(mismatch()),
        },
        _ => return Err(mismatch()),
    };
    Ok(coerced)
}

/// Coerce every row of `table` to `types`, column by column.
pub fn coerce_rows(table: &Table, types: &[ColumnType]) -> Result<Vec<Vec<Value>>> {
    table
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .zip(types)
                .zip(table.columns())
                .map(|((value, ty), column)| coerce(value, *ty, column))
                .collect()
        })
        .collect()
}

pub fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_table_sql(table: &TableRef, columns: &[String], types: &[ColumnType]) -> String {
    let defs = columns
        .iter()
        .zip(types)
        .map(|(c, t)| format!("{} {}", quote_ident(c), t.sql_name()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", table.quoted(), defs)
}

/// `INSERT ... SELECT ... ON CONFLICT` merging `staging` into `target`.
pub fn upsert_sql(target: &TableRef, staging: &TableRef, columns: &[String], key: &[String]) -> String {
    let cols = column_list(columns);
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !key.contains(c))
        .map(|c| format!("{0} = EXCLUDED.{0}", quote_ident(c)))
        .collect();
    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} ON CONFLICT ({}) {}",
        target.quoted(),
        cols,
        cols,
        staging.quoted(),
        column_list(key),
        action
    )
}

/// Rows per INSERT so the statement stays under the bind limit.
pub fn rows_per_statement(width: usize) -> usize {
    (MAX_BIND_PARAMS / width.max(1)).max(1)
}
