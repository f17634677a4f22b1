//! Tabular results shared by the source, the cache, and the warehouse.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// `007`, `-01` or `00.5`: a leading zero followed by another digit.
fn is_zero_padded(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    let mut chars = digits.chars();
    chars.next() == Some('0') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Hashable identity of a [`Value`], used for key matching and de-duplication.
///
/// Floats compare by bit pattern, so `Int(1)` and `Float(1.0)` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
}

impl Value {
    /// Infer a typed value from a raw text cell.
    ///
    /// Empty cells and the `NA`/`NaN` markers used by nflverse exports become
    /// `Null`. Zero-padded numbers such as jersey or zip codes stay text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "" | "NA" | "NaN" | "nan" | "NULL" => return Value::Null,
            "TRUE" | "true" | "True" => return Value::Bool(true),
            "FALSE" | "false" | "False" => return Value::Bool(false),
            _ => {}
        }
        if is_zero_padded(trimmed) {
            return Value::Text(raw.to_string());
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            Ok(_) => Value::Null,
            Err(_) => Value::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::Text(s) => ValueKey::Text(s.clone()),
        }
    }

    /// JSON representation; non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Rows of uniform width under a list of column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table, validating row widths and column uniqueness.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        check_unique(&columns)?;
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::MalformedTable(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::MalformedTable(format!(
                "row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `row` in column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Iterate one column's cells.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Distinct non-null values of a column, in first-seen order.
    pub fn distinct_values(&self, name: &str) -> Option<Vec<Value>> {
        let mut seen = HashSet::new();
        let values = self
            .column(name)?
            .filter(|v| !v.is_null())
            .filter(|v| seen.insert(v.key()))
            .cloned()
            .collect();
        Some(values)
    }

    /// Trim, lowercase, and replace spaces with underscores in column names.
    pub fn normalize_columns(&mut self) -> Result<()> {
        let normalized: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.trim().to_lowercase().replace(' ', "_"))
            .collect();
        check_unique(&normalized)?;
        self.columns = normalized;
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if self.has_column(to) {
            return Err(Error::MalformedTable(format!(
                "cannot rename '{}': column '{}' already exists",
                from, to
            )));
        }
        let idx = self.column_index(from).ok_or_else(|| Error::MissingColumn {
            dataset: "table".to_string(),
            column: from.to_string(),
        })?;
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// Keep only the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n).ok_or_else(|| Error::MissingColumn {
                    dataset: "table".to_string(),
                    column: n.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Table::from_rows(names.iter().map(|n| n.to_string()).collect(), rows)
    }

    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    pub fn slice(&self, offset: usize, limit: Option<usize>) -> Table {
        let rows = self.rows.iter().skip(offset);
        let rows = match limit {
            Some(n) => rows.take(n).cloned().collect(),
            None => rows.cloned().collect(),
        };
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// One row per distinct combination of `key` values.
    ///
    /// A repeated key keeps the position of its first row and the values of
    /// its last.
    pub fn dedup_by_key<S: AsRef<str>>(&self, key: &[S]) -> Result<Table> {
        let positions = key
            .iter()
            .map(|k| {
                self.column_index(k.as_ref()).ok_or_else(|| Error::MissingColumn {
                    dataset: "table".to_string(),
                    column: k.as_ref().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut slots: HashMap<Vec<ValueKey>, usize> = HashMap::with_capacity(self.rows.len());
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let k: Vec<ValueKey> = positions.iter().map(|&i| row[i].key()).collect();
            match slots.get(&k) {
                Some(&slot) => rows[slot] = row.clone(),
                None => {
                    slots.insert(k, rows.len());
                    rows.push(row.clone());
                }
            }
        }
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Stack tables vertically.
    ///
    /// Columns are the union in first-seen order; cells for columns a part
    /// lacks are `Null`.
    pub fn concat(parts: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for part in &parts {
            for c in &part.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(parts.iter().map(Table::len).sum());
        for part in parts {
            if part.columns == columns {
                rows.extend(part.rows);
                continue;
            }
            let positions: Vec<Option<usize>> =
                columns.iter().map(|c| part.column_index(c)).collect();
            for row in part.rows {
                rows.push(
                    positions
                        .iter()
                        .map(|p| p.map(|i| row[i].clone()).unwrap_or(Value::Null))
                        .collect(),
                );
            }
        }
        Table { columns, rows }
    }

    /// Append a column; `values` must have one entry per row.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(Error::MalformedTable(format!("duplicate column '{}'", name)));
        }
        if values.len() != self.rows.len() {
            return Err(Error::MalformedTable(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.clone(), v.to_json()))
                    .collect()
            })
            .collect()
    }
}

fn check_unique(columns: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for c in columns {
        if !seen.insert(c.as_str()) {
            return Err(Error::MalformedTable(format!("duplicate column '{}'", c)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Table {
        Table::from_rows(
            vec!["player_id".into(), "season".into(), "yards".into()],
            vec![
                vec!["00-001".into(), 2023.into(), 1200.into()],
                vec!["00-002".into(), 2024.into(), Value::Null],
                vec!["00-003".into(), 2023.into(), 87.5.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_rows_rejects_ragged_rows() {
        let err = Table::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![1.into(), 2.into()], vec![1.into()]],
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedTable(_)));
    }

    #[test]
    fn test_distinct_values_in_first_seen_order() {
        let table = sample();
        assert_eq!(
            table.distinct_values("season").unwrap(),
            vec![Value::Int(2023), Value::Int(2024)]
        );
        assert_eq!(table.distinct_values("yards").unwrap().len(), 2);
        assert!(table.distinct_values("week").is_none());
    }

    #[test]
    fn test_normalize_columns() {
        let mut table = Table::new(vec![" Player ID ".into(), "Season".into()]);
        table.normalize_columns().unwrap();
        assert_eq!(table.columns(), &["player_id".to_string(), "season".to_string()]);

        let mut clash = Table::new(vec!["Season".into(), "season".into()]);
        assert!(clash.normalize_columns().is_err());
    }

    #[test]
    fn test_infer_values() {
        assert_eq!(Value::infer("2024"), Value::Int(2024));
        assert_eq!(Value::infer("0.25"), Value::Float(0.25));
        assert_eq!(Value::infer("NA"), Value::Null);
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("TRUE"), Value::Bool(true));
        assert_eq!(Value::infer("00-0033873"), Value::Text("00-0033873".into()));
        assert_eq!(Value::infer("inf"), Value::Null);
    }

    #[test]
    fn test_infer_keeps_leading_zeros() {
        assert_eq!(Value::infer("007"), Value::Text("007".into()));
        assert_eq!(Value::infer("-01"), Value::Text("-01".into()));
        assert_eq!(Value::infer("00.5"), Value::Text("00.5".into()));
        assert_eq!(Value::infer("0"), Value::Int(0));
        assert_eq!(Value::infer("-0.5"), Value::Float(-0.5));
        assert_eq!(Value::infer("0.75"), Value::Float(0.75));
    }

    #[test]
    fn test_dedup_by_key_keeps_last_values() {
        let table = Table::from_rows(
            vec!["player_id".into(), "season".into(), "yards".into()],
            vec![
                vec!["a".into(), 2024.into(), 1.into()],
                vec!["b".into(), 2024.into(), 2.into()],
                vec!["a".into(), 2024.into(), 3.into()],
                vec!["a".into(), 2023.into(), 4.into()],
            ],
        )
        .unwrap();

        let deduped = table.dedup_by_key(&["player_id", "season"]).unwrap();

        assert_eq!(deduped.len(), 3);
        assert_eq!(deduped.get(0, "yards"), Some(&Value::Int(3)));
        assert_eq!(deduped.get(1, "player_id"), Some(&Value::from("b")));
        assert_eq!(deduped.get(2, "season"), Some(&Value::Int(2023)));
        assert!(table.dedup_by_key(&["week"]).is_err());
    }

    #[test]
    fn test_slice_and_select() {
        let table = sample();
        let page = table.slice(1, Some(1));
        assert_eq!(page.len(), 1);
        assert_eq!(page.get(0, "player_id"), Some(&Value::from("00-002")));

        let narrow = table.select(&["season", "player_id"]).unwrap();
        assert_eq!(narrow.columns(), &["season".to_string(), "player_id".to_string()]);
        assert!(table.select(&["missing"]).is_err());
    }

    #[test]
    fn test_concat_unions_columns() {
        let a = Table::from_rows(vec!["id".into(), "season".into()], vec![vec![1.into(), 2023.into()]]).unwrap();
        let b = Table::from_rows(
            vec!["season".into(), "id".into(), "routes".into()],
            vec![vec![2024.into(), 2.into(), 31.into()]],
        )
        .unwrap();

        let merged = Table::concat(vec![a, b]);
        assert_eq!(
            merged.columns(),
            &["id".to_string(), "season".to_string(), "routes".to_string()]
        );
        assert_eq!(merged.rows()[0], vec![Value::Int(1), Value::Int(2023), Value::Null]);
        assert_eq!(merged.rows()[1], vec![Value::Int(2), Value::Int(2024), Value::Int(31)]);
    }

    #[test]
    fn test_push_column_checks_length() {
        let mut table = sample();
        assert!(table.push_column("week", vec![1.into()]).is_err());
        table.push_column("week", vec![1.into(), 2.into(), 3.into()]).unwrap();
        assert_eq!(table.get(2, "week"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_to_records_drops_non_finite_floats() {
        let table = Table::from_rows(vec!["x".into()], vec![vec![Value::Float(f64::NAN)]]).unwrap();
        let records = table.to_records();
        assert_eq!(records[0]["x"], serde_json::Value::Null);
    }
}
