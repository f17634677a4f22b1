//! In-process warehouse with snapshot transactions.
//!
//! Each transaction works on a copy of the committed state and publishes it
//! on commit, so a failed load leaves no partial writes behind.

use async_trait::async_trait;
use gridiron_core::ids::validate_identifier;
use gridiron_core::ports::{RowPredicate, Warehouse, WarehouseTransaction};
use gridiron_core::table::ValueKey;
use gridiron_core::{Error, Result, Table, TableRef, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct StoredTable {
    data: Table,
    primary_key: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct State {
    schemas: HashSet<String>,
    tables: HashMap<TableRef, StoredTable>,
}

#[derive(Debug, Default)]
struct Shared {
    state: State,
    failing_commits: usize,
    commits: usize,
}

/// Warehouse held in memory. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing table, optionally with a primary key.
    pub fn with_table(self, table: TableRef, data: Table, primary_key: &[&str]) -> Self {
        {
            let mut shared = self.lock();
            shared.state.schemas.insert(table.schema().to_string());
            shared.state.tables.insert(
                table,
                StoredTable {
                    data,
                    primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
                },
            );
        }
        self
    }

    /// Make the next `n` commits fail with a connection error.
    pub fn fail_next_commits(&self, n: usize) {
        self.lock().failing_commits = n;
    }

    /// Committed contents of a table.
    pub fn table(&self, table: &TableRef) -> Option<Table> {
        self.lock().state.tables.get(table).map(|t| t.data.clone())
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.lock().state.schemas.contains(schema)
    }

    /// Number of successful commits so far.
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn ensure_schema(&self, schema: &str) -> Result<()> {
        validate_identifier(schema)?;
        self.lock().state.schemas.insert(schema.to_string());
        Ok(())
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        Ok(self.lock().state.tables.contains_key(table))
    }

    async fn primary_key(&self, table: &TableRef) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .state
            .tables
            .get(table)
            .map(|t| t.primary_key.clone())
            .unwrap_or_default())
    }

    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        self.lock()
            .state
            .tables
            .get(table)
            .map(|t| t.data.len() as u64)
            .ok_or_else(|| undefined_table(table))
    }

    async fn columns(&self, table: &TableRef) -> Result<Vec<String>> {
        self.lock()
            .state
            .tables
            .get(table)
            .map(|t| t.data.columns().to_vec())
            .ok_or_else(|| undefined_table(table))
    }

    async fn count_matching(&self, table: &TableRef, predicate: &RowPredicate) -> Result<u64> {
        let shared = self.lock();
        let stored = shared.state.tables.get(table).ok_or_else(|| undefined_table(table))?;
        let cells = stored.data.column(predicate.column()).ok_or_else(|| {
            Error::Database(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                predicate.column(),
                table
            ))
        })?;
        Ok(cells.filter(|v| predicate.matches(v)).count() as u64)
    }

    async fn begin(&self) -> Result<Box<dyn WarehouseTransaction>> {
        let working = self.lock().state.clone();
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            working,
        }))
    }
}

struct MemoryTransaction {
    shared: Arc<Mutex<Shared>>,
    working: State,
}

impl MemoryTransaction {
    fn stored(&self, table: &TableRef) -> Result<&StoredTable> {
        self.working.tables.get(table).ok_or_else(|| undefined_table(table))
    }

    fn stored_mut(&mut self, table: &TableRef) -> Result<&mut StoredTable> {
        self.working
            .tables
            .get_mut(table)
            .ok_or_else(|| undefined_table(table))
    }

    fn create(&mut self, table: &TableRef, rows: &Table) -> Result<()> {
        if !self.working.schemas.contains(table.schema()) {
            return Err(Error::Database(format!("schema \"{}\" does not exist", table.schema())));
        }
        if self.working.tables.contains_key(table) {
            return Err(Error::Database(format!("relation \"{}\" already exists", table)));
        }
        if rows.width() == 0 {
            return Err(Error::MalformedTable(format!("cannot create {} with no columns", table)));
        }
        self.working.tables.insert(
            table.clone(),
            StoredTable {
                data: rows.clone(),
                primary_key: Vec::new(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl WarehouseTransaction for MemoryTransaction {
    async fn create_table(&mut self, table: &TableRef, rows: &Table) -> Result<u64> {
        self.create(table, rows)?;
        Ok(rows.len() as u64)
    }

    async fn stage_rows(&mut self, target: &TableRef, rows: &Table) -> Result<TableRef> {
        let staging = target.with_suffix("_staging")?;
        self.working.tables.remove(&staging);
        self.create(&staging, rows)?;
        Ok(staging)
    }

    async fn upsert_from(
        &mut self,
        target: &TableRef,
        staging: &TableRef,
        columns: &[String],
        key: &[String],
    ) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidRequest(format!("upsert into {} needs a key", target)));
        }
        let staged = self.stored(staging)?.data.clone();
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        let staged = staged.select(&names)?;

        let stored = self.stored_mut(target)?;
        let positions = column_positions(&stored.data, columns, target)?;
        let key_in_target = column_positions(&stored.data, key, target)?;
        let key_in_staged = column_positions(&staged, key, staging)?;

        let mut seen = HashSet::with_capacity(staged.len());
        if let Some(row) = staged.rows().iter().find(|row| !seen.insert(row_key(row, &key_in_staged))) {
            let values: Vec<String> = key_in_staged.iter().map(|&i| row[i].to_string()).collect();
            return Err(Error::Database(format!(
                "ON CONFLICT DO UPDATE command cannot affect row a second time: key ({}) repeats in {}",
                values.join(", "),
                staging
            )));
        }

        let mut index: HashMap<Vec<ValueKey>, usize> = stored
            .data
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| (row_key(row, &key_in_target), i))
            .collect();

        let (target_columns, mut target_rows) = std::mem::take(&mut stored.data).into_parts();
        for row in staged.rows() {
            let k = row_key(row, &key_in_staged);
            match index.get(&k) {
                Some(&i) => {
                    for (value, &pos) in row.iter().zip(&positions) {
                        if !key_in_target.contains(&pos) {
                            target_rows[i][pos] = value.clone();
                        }
                    }
                }
                None => {
                    let mut new_row = vec![Value::Null; target_columns.len()];
                    for (value, &pos) in row.iter().zip(&positions) {
                        new_row[pos] = value.clone();
                    }
                    index.insert(k, target_rows.len());
                    target_rows.push(new_row);
                }
            }
        }
        stored.data = Table::from_rows(target_columns, target_rows)?;
        Ok(())
    }

    async fn delete_where_in(&mut self, table: &TableRef, column: &str, values: &[Value]) -> Result<u64> {
        let stored = self.stored_mut(table)?;
        let idx = stored.data.column_index(column).ok_or_else(|| {
            Error::Database(format!("column \"{}\" of relation \"{}\" does not exist", column, table))
        })?;
        let doomed: HashSet<ValueKey> = values.iter().map(Value::key).collect();
        let before = stored.data.len();
        stored.data = stored.data.filter_rows(|row| !doomed.contains(&row[idx].key()));
        Ok((before - stored.data.len()) as u64)
    }

    async fn append_rows(&mut self, table: &TableRef, rows: &Table) -> Result<u64> {
        let stored = self.stored_mut(table)?;
        let positions = column_positions(&stored.data, rows.columns(), table)?;
        let width = stored.data.width();
        for row in rows.rows() {
            let mut new_row = vec![Value::Null; width];
            for (value, &pos) in row.iter().zip(&positions) {
                new_row[pos] = value.clone();
            }
            stored.data.push_row(new_row)?;
        }
        Ok(rows.len() as u64)
    }

    async fn drop_table(&mut self, table: &TableRef) -> Result<()> {
        self.working.tables.remove(table);
        Ok(())
    }

    async fn count_rows(&mut self, table: &TableRef) -> Result<u64> {
        Ok(self.stored(table)?.data.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut shared = self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if shared.failing_commits > 0 {
            shared.failing_commits -= 1;
            return Err(Error::Connection("connection reset during commit".to_string()));
        }
        shared.state = self.working;
        shared.commits += 1;
        Ok(())
    }
}

fn undefined_table(table: &TableRef) -> Error {
    Error::Database(format!("relation \"{}\" does not exist", table))
}

/// Position in `data` of each named column.
fn column_positions<S: AsRef<str>>(data: &Table, columns: &[S], table: &TableRef) -> Result<Vec<usize>> {
    columns
        .iter()
        .map(|c| {
            data.column_index(c.as_ref()).ok_or_else(|| {
                Error::Database(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    c.as_ref(),
                    table
                ))
            })
        })
        .collect()
}

fn row_key(row: &[Value], positions: &[usize]) -> Vec<ValueKey> {
    positions.iter().map(|&i| row[i].key()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table_ref() -> TableRef {
        TableRef::new("raw_nfl", "rosters").unwrap()
    }

    fn rows(data: &[(&str, i64, i64)]) -> Table {
        Table::from_rows(
            vec!["player_id".into(), "season".into(), "jersey".into()],
            data.iter()
                .map(|(id, season, jersey)| vec![(*id).into(), (*season).into(), (*jersey).into()])
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_is_discarded() {
        let warehouse = MemoryWarehouse::new();
        warehouse.ensure_schema("raw_nfl").await.unwrap();

        let mut tx = warehouse.begin().await.unwrap();
        tx.create_table(&table_ref(), &rows(&[("a", 2024, 1)])).await.unwrap();
        drop(tx);

        assert!(!warehouse.table_exists(&table_ref()).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_requires_schema() {
        let warehouse = MemoryWarehouse::new();
        let mut tx = warehouse.begin().await.unwrap();
        let err = tx.create_table(&table_ref(), &rows(&[("a", 2024, 1)])).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn test_upsert_updates_and_inserts() {
        let warehouse = MemoryWarehouse::new().with_table(
            table_ref(),
            rows(&[("a", 2024, 1), ("b", 2024, 2)]),
            &["player_id", "season"],
        );

        let incoming = rows(&[("b", 2024, 20), ("c", 2024, 3)]);
        let mut tx = warehouse.begin().await.unwrap();
        let staging = tx.stage_rows(&table_ref(), &incoming).await.unwrap();
        tx.upsert_from(
            &table_ref(),
            &staging,
            incoming.columns(),
            &["player_id".to_string(), "season".to_string()],
        )
        .await
        .unwrap();
        tx.drop_table(&staging).await.unwrap();
        tx.commit().await.unwrap();

        let stored = warehouse.table(&table_ref()).unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored.get(1, "jersey"), Some(&Value::Int(20)));
        assert_eq!(stored.get(2, "player_id"), Some(&Value::from("c")));
        assert!(warehouse.table(&table_ref().with_suffix("_staging").unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_upsert_rejects_repeated_staged_keys() {
        let warehouse = MemoryWarehouse::new().with_table(table_ref(), rows(&[("a", 2024, 1)]), &["player_id", "season"]);

        let incoming = rows(&[("b", 2024, 2), ("b", 2024, 3)]);
        let mut tx = warehouse.begin().await.unwrap();
        let staging = tx.stage_rows(&table_ref(), &incoming).await.unwrap();
        let err = tx
            .upsert_from(
                &table_ref(),
                &staging,
                incoming.columns(),
                &["player_id".to_string(), "season".to_string()],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Database(_)));
        drop(tx);
        assert_eq!(warehouse.row_count(&table_ref()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_where_in_and_append() {
        let warehouse = MemoryWarehouse::new().with_table(
            table_ref(),
            rows(&[("a", 2023, 1), ("a", 2024, 1), ("b", 2024, 2)]),
            &[],
        );

        let mut tx = warehouse.begin().await.unwrap();
        let deleted = tx
            .delete_where_in(&table_ref(), "season", &[Value::Int(2024)])
            .await
            .unwrap();
        let appended = tx.append_rows(&table_ref(), &rows(&[("c", 2024, 9)])).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!((deleted, appended), (2, 1));
        assert_eq!(warehouse.row_count(&table_ref()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failing_commit_keeps_previous_state() {
        let warehouse = MemoryWarehouse::new().with_table(table_ref(), rows(&[("a", 2024, 1)]), &[]);
        warehouse.fail_next_commits(1);

        let mut tx = warehouse.begin().await.unwrap();
        tx.append_rows(&table_ref(), &rows(&[("b", 2024, 2)])).await.unwrap();
        let err = tx.commit().await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(warehouse.row_count(&table_ref()).await.unwrap(), 1);
        assert_eq!(warehouse.commits(), 0);
    }

    #[tokio::test]
    async fn test_append_rejects_unknown_column() {
        let warehouse = MemoryWarehouse::new().with_table(table_ref(), rows(&[("a", 2024, 1)]), &[]);
        let extra = Table::from_rows(vec!["nickname".into()], vec![vec!["x".into()]]).unwrap();

        let mut tx = warehouse.begin().await.unwrap();
        assert!(tx.append_rows(&table_ref(), &extra).await.is_err());
    }
}
