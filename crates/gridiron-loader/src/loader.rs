//! Incremental loading of source tables into the warehouse.

use crate::retry::RetryPolicy;
use gridiron_core::ports::{SourceReader, Warehouse};
use gridiron_core::{Error, LoadOutcome, LoadRequest, LoadStrategy, Result, Table, TableRef};
use std::sync::Arc;
use tracing::{info, warn};

/// Reason recorded when the source returns no rows.
pub const EMPTY_DATAFRAME: &str = "empty_dataframe";

/// Loads one dataset at a time into `<schema>.<dataset>`.
///
/// The first load creates the table. Later loads upsert on the table's
/// primary key when every key column is present in the fetched rows, and
/// otherwise replace the rows sharing the fetched incremental-key values.
/// Each write path runs in a single warehouse transaction.
pub struct IncrementalLoader {
    source: Arc<dyn SourceReader>,
    warehouse: Arc<dyn Warehouse>,
    schema: String,
    retry: RetryPolicy,
}

impl IncrementalLoader {
    pub fn new(source: Arc<dyn SourceReader>, warehouse: Arc<dyn Warehouse>, schema: impl Into<String>) -> Self {
        Self {
            source,
            warehouse,
            schema: schema.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    /// Warehouse table a dataset loads into.
    pub fn target(&self, request: &LoadRequest) -> Result<TableRef> {
        TableRef::new(self.schema.clone(), request.dataset.as_str())
    }

    /// Run one load, retrying transient failures.
    pub async fn run(&self, request: &LoadRequest) -> Result<LoadOutcome> {
        let label = format!("load:{}", request.dataset);
        let (mut outcome, attempts) = self.retry.run(&label, |_| self.load_once(request)).await?;
        outcome.attempts = attempts;

        info!(
            dataset = %outcome.dataset,
            status = ?outcome.status,
            strategy = ?outcome.strategy,
            rows_loaded = outcome.rows_loaded,
            rows_updated = outcome.rows_updated,
            attempts,
            "Load finished"
        );
        Ok(outcome)
    }

    async fn load_once(&self, request: &LoadRequest) -> Result<LoadOutcome> {
        let target = self.target(request)?;
        let mut rows = self.source.load(request.dataset, &request.seasons).await?;

        if rows.is_empty() {
            warn!(dataset = %request.dataset, seasons = %request.seasons, "Source returned no rows, skipping");
            return Ok(LoadOutcome::skipped(request.dataset, EMPTY_DATAFRAME));
        }

        rows.normalize_columns()?;
        self.warehouse.ensure_schema(&self.schema).await?;

        if !self.warehouse.table_exists(&target).await? {
            let loaded = self.create_and_load(&target, &rows).await?;
            return Ok(LoadOutcome::success(request.dataset, LoadStrategy::Created, loaded, 0));
        }

        let key = self.warehouse.primary_key(&target).await?;
        if !key.is_empty() && key.iter().all(|k| rows.has_column(k)) {
            let unique = rows.dedup_by_key(&key)?;
            if unique.len() < rows.len() {
                warn!(
                    table = %target,
                    dropped = rows.len() - unique.len(),
                    "Fetched rows repeat primary key values, keeping the last of each"
                );
            }
            let rows = unique;
            let added = self.upsert(&target, &rows, &key).await?;
            return Ok(LoadOutcome::success(
                request.dataset,
                LoadStrategy::Upserted,
                rows.len() as u64,
                added,
            ));
        }
        if !key.is_empty() {
            warn!(
                table = %target,
                key = ?key,
                "Primary key columns missing from fetched rows, falling back to delete-then-append"
            );
        }

        let loaded = self
            .delete_then_append(&target, &rows, request.dataset.as_str(), &request.incremental_key)
            .await?;
        Ok(LoadOutcome::success(
            request.dataset,
            LoadStrategy::Replaced,
            loaded,
            loaded as i64,
        ))
    }

    async fn create_and_load(&self, target: &TableRef, rows: &Table) -> Result<u64> {
        let mut tx = self.warehouse.begin().await?;
        let loaded = tx.create_table(target, rows).await?;
        tx.commit().await?;
        info!(table = %target, rows = loaded, "Created table");
        Ok(loaded)
    }

    /// Returns the net change in row count. `rows` must be unique on `key`.
    async fn upsert(&self, target: &TableRef, rows: &Table, key: &[String]) -> Result<i64> {
        let mut tx = self.warehouse.begin().await?;
        let before = tx.count_rows(target).await?;
        let staging = tx.stage_rows(target, rows).await?;
        tx.upsert_from(target, &staging, rows.columns(), key).await?;
        let after = tx.count_rows(target).await?;
        tx.drop_table(&staging).await?;
        tx.commit().await?;

        let added = after as i64 - before as i64;
        info!(
            table = %target,
            rows = rows.len(),
            inserted = added,
            updated = rows.len() as i64 - added,
            "Upserted rows"
        );
        Ok(added)
    }

    async fn delete_then_append(
        &self,
        target: &TableRef,
        rows: &Table,
        dataset: &str,
        incremental_key: &str,
    ) -> Result<u64> {
        let values = rows
            .distinct_values(incremental_key)
            .ok_or_else(|| Error::MissingColumn {
                dataset: dataset.to_string(),
                column: incremental_key.to_string(),
            })?;

        let mut tx = self.warehouse.begin().await?;
        let deleted = tx.delete_where_in(target, incremental_key, &values).await?;
        let appended = tx.append_rows(target, rows).await?;
        tx.commit().await?;

        info!(
            table = %target,
            key = %incremental_key,
            key_values = values.len(),
            deleted,
            appended,
            "Replaced rows"
        );
        Ok(appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSource;
    use gridiron_core::{Dataset, LoadStatus, Seasons, Value};
    use gridiron_db::MemoryWarehouse;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn stats(rows: &[(&str, i64, i64)]) -> Table {
        Table::from_rows(
            vec!["Player ID".into(), "season".into(), "passing_yards".into()],
            rows.iter()
                .map(|(id, season, yards)| vec![(*id).into(), (*season).into(), (*yards).into()])
                .collect(),
        )
        .unwrap()
    }

    fn stored(rows: &[(&str, i64, i64)]) -> Table {
        let mut t = stats(rows);
        t.normalize_columns().unwrap();
        t
    }

    fn target() -> TableRef {
        TableRef::new("raw_nfl", "player_stats").unwrap()
    }

    fn request() -> LoadRequest {
        LoadRequest::new(Dataset::PlayerStats, Seasons::new([2024]))
    }

    fn loader(source: Arc<ScriptedSource>, warehouse: &MemoryWarehouse) -> IncrementalLoader {
        IncrementalLoader::new(source, Arc::new(warehouse.clone()), "raw_nfl")
            .with_retry(RetryPolicy::new(3, Duration::from_millis(1), 2.0))
    }

    #[tokio::test]
    async fn test_first_load_creates_table() {
        let warehouse = MemoryWarehouse::new();
        let source = ScriptedSource::returning(stats(&[("a", 2024, 300), ("b", 2024, 250)]));

        let outcome = loader(source, &warehouse).run(&request()).await.unwrap();

        assert_eq!(outcome.status, LoadStatus::Success);
        assert_eq!(outcome.strategy, Some(LoadStrategy::Created));
        assert_eq!(outcome.rows_loaded, 2);
        assert_eq!(outcome.rows_updated, 0);
        assert!(warehouse.has_schema("raw_nfl"));

        let table = warehouse.table(&target()).unwrap();
        assert_eq!(table.columns()[0], "player_id");
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_on_primary_key() {
        // M = 3 existing, K = 3 incoming, J = 2 shared keys
        let warehouse = MemoryWarehouse::new().with_table(
            target(),
            stored(&[("a", 2024, 100), ("b", 2024, 200), ("c", 2024, 300)]),
            &["player_id", "season"],
        );
        let source = ScriptedSource::returning(stats(&[("b", 2024, 222), ("c", 2024, 333), ("d", 2024, 444)]));

        let outcome = loader(source, &warehouse).run(&request()).await.unwrap();

        assert_eq!(outcome.strategy, Some(LoadStrategy::Upserted));
        assert_eq!(outcome.rows_loaded, 3);
        assert_eq!(outcome.rows_updated, 1);

        let table = warehouse.table(&target()).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(0, "passing_yards"), Some(&Value::Int(100)));
        assert_eq!(table.get(1, "passing_yards"), Some(&Value::Int(222)));
        assert_eq!(table.get(2, "passing_yards"), Some(&Value::Int(333)));
        assert_eq!(table.get(3, "player_id"), Some(&Value::from("d")));
        assert!(warehouse.table(&target().with_suffix("_staging").unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_upsert_collapses_repeated_keys() {
        let warehouse = MemoryWarehouse::new().with_table(
            target(),
            stored(&[("a", 2024, 100)]),
            &["player_id", "season"],
        );
        let source = ScriptedSource::returning(stats(&[("a", 2024, 110), ("b", 2024, 200), ("a", 2024, 120)]));

        let outcome = loader(source, &warehouse).run(&request()).await.unwrap();

        assert_eq!(outcome.strategy, Some(LoadStrategy::Upserted));
        assert_eq!(outcome.rows_loaded, 2);
        assert_eq!(outcome.rows_updated, 1);
        let table = warehouse.table(&target()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "passing_yards"), Some(&Value::Int(120)));
    }

    #[tokio::test]
    async fn test_delete_then_append_leaves_other_seasons() {
        let warehouse = MemoryWarehouse::new().with_table(
            target(),
            stored(&[("a", 2023, 1), ("b", 2023, 2), ("a", 2024, 3), ("b", 2024, 4)]),
            &[],
        );
        let source = ScriptedSource::returning(stats(&[("a", 2024, 30), ("b", 2024, 40), ("c", 2024, 50)]));

        let outcome = loader(source, &warehouse).run(&request()).await.unwrap();

        assert_eq!(outcome.strategy, Some(LoadStrategy::Replaced));
        assert_eq!(outcome.rows_loaded, 3);
        assert_eq!(outcome.rows_updated, 3);

        let table = warehouse.table(&target()).unwrap();
        assert_eq!(table.len(), 5);
        let seasons_2023: Vec<_> = table
            .rows()
            .iter()
            .filter(|r| r[1] == Value::Int(2023))
            .map(|r| r[2].clone())
            .collect();
        assert_eq!(seasons_2023, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            table.column("passing_yards").unwrap().filter(|v| v.as_i64() == Some(3)).count(),
            0
        );
    }

    #[tokio::test]
    async fn test_missing_key_columns_fall_back_to_replace() {
        let warehouse = MemoryWarehouse::new().with_table(
            target(),
            stored(&[("a", 2024, 1)]),
            &["player_id", "week"],
        );
        let source = ScriptedSource::returning(stats(&[("a", 2024, 10)]));

        let outcome = loader(source, &warehouse).run(&request()).await.unwrap();
        assert_eq!(outcome.strategy, Some(LoadStrategy::Replaced));
        assert_eq!(warehouse.row_count(&target()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_incremental_key_is_data_error() {
        let warehouse = MemoryWarehouse::new().with_table(target(), stored(&[("a", 2024, 1)]), &[]);
        let source = ScriptedSource::returning(stats(&[("a", 2024, 10)]));

        let err = loader(source.clone(), &warehouse)
            .run(&request().with_incremental_key("week"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "week"));
        assert_eq!(source.calls(), 1);
        assert_eq!(warehouse.row_count(&target()).await.unwrap(), 1);
        assert_eq!(warehouse.commits(), 0);
    }

    #[tokio::test]
    async fn test_empty_source_is_skipped() {
        let warehouse = MemoryWarehouse::new();
        let source = ScriptedSource::returning(Table::new(vec!["player_id".into()]));

        let outcome = loader(source, &warehouse).run(&request()).await.unwrap();

        assert!(outcome.is_skipped());
        assert_eq!(outcome.rows_loaded, 0);
        assert_eq!(outcome.reason.as_deref(), Some(EMPTY_DATAFRAME));
        assert!(!warehouse.has_schema("raw_nfl"));
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let warehouse = MemoryWarehouse::new();
        let source = ScriptedSource::new(vec![
            Err(Error::SourceUnavailable("502".into())),
            Err(Error::Timeout("read".into())),
            Ok(stats(&[("a", 2024, 1)])),
        ]);

        let outcome = loader(source.clone(), &warehouse).run(&request()).await.unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.strategy, Some(LoadStrategy::Created));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let warehouse = MemoryWarehouse::new();
        let source = ScriptedSource::new(vec![Err(Error::Connection("refused".into()))]);

        let err = loader(source.clone(), &warehouse).run(&request()).await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_data_error_is_not_retried() {
        let warehouse = MemoryWarehouse::new();
        let source = ScriptedSource::new(vec![Err(Error::MalformedTable("ragged".into()))]);

        let err = loader(source.clone(), &warehouse).run(&request()).await.unwrap_err();

        assert!(!err.is_transient());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_is_retried_without_partial_writes() {
        let warehouse = MemoryWarehouse::new().with_table(target(), stored(&[("a", 2024, 1)]), &[]);
        warehouse.fail_next_commits(1);
        let source = ScriptedSource::returning(stats(&[("a", 2024, 5), ("b", 2024, 6)]));

        let outcome = loader(source.clone(), &warehouse).run(&request()).await.unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(source.calls(), 2);
        assert_eq!(warehouse.row_count(&target()).await.unwrap(), 2);
        assert_eq!(warehouse.commits(), 1);
    }
}
