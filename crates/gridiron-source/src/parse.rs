//! CSV decoding into typed tables.

use gridiron_core::{Error, Result, Table, Value};

/// Parse a CSV document with a header row.
///
/// Cells are typed individually with [`Value::infer`]; a column that ends up
/// mixing text with other types is converted to text throughout so every
/// column has one storage type.
pub fn parse_csv(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| Error::MalformedTable(format!("unreadable CSV header: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::MalformedTable(format!("bad CSV record: {}", e)))?;
        rows.push(record.iter().map(Value::infer).collect::<Vec<_>>());
    }

    unify_text_columns(&mut rows, columns.len());
    Table::from_rows(columns, rows)
}

fn unify_text_columns(rows: &mut [Vec<Value>], width: usize) {
    for col in 0..width {
        let mut has_text = false;
        let mut has_other = false;
        for row in rows.iter() {
            match &row[col] {
                Value::Null => {}
                Value::Text(_) => has_text = true,
                _ => has_other = true,
            }
        }
        if has_text && has_other {
            for row in rows.iter_mut() {
                if !matches!(row[col], Value::Null | Value::Text(_)) {
                    row[col] = Value::Text(row[col].to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_typed_cells() {
        let csv = b"player_id,season,week,target_share,player_name\n00-0033873,2024,1,0.25,P.Mahomes\n00-0036355,2024,2,NA,J.Herbert\n";
        let table = parse_csv(csv).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "season"), Some(&Value::Int(2024)));
        assert_eq!(table.get(0, "target_share"), Some(&Value::Float(0.25)));
        assert_eq!(table.get(1, "target_share"), Some(&Value::Null));
        assert_eq!(table.get(1, "player_name"), Some(&Value::from("J.Herbert")));
    }

    #[test]
    fn test_mixed_column_becomes_text() {
        let csv = b"jersey\n12\nXX\n\n";
        let table = parse_csv(csv).unwrap();
        assert_eq!(table.get(0, "jersey"), Some(&Value::from("12")));
        assert_eq!(table.get(1, "jersey"), Some(&Value::from("XX")));
    }

    #[test]
    fn test_ragged_csv_is_malformed() {
        let csv = b"a,b\n1,2\n3\n";
        assert!(matches!(parse_csv(csv), Err(Error::MalformedTable(_))));
    }

    #[test]
    fn test_header_only_is_empty() {
        let table = parse_csv(b"a,b\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.width(), 2);
    }
}
