//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the core domain and external adapters.

use crate::Result;
use crate::dataset::{Dataset, NgsStatType, Seasons};
use crate::ids::TableRef;
use crate::table::{Table, Value};
use async_trait::async_trait;

/// Reader for the published statistics releases, one method per dataset.
///
/// Implementations must be idempotent and free of side effects: the response
/// cache and the loader's retry policy both assume repeated calls are safe.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn player_stats(&self, seasons: &Seasons) -> Result<Table>;

    async fn schedules(&self, seasons: &Seasons) -> Result<Table>;

    async fn rosters(&self, seasons: &Seasons) -> Result<Table>;

    async fn team_stats(&self, seasons: &Seasons) -> Result<Table>;

    async fn nextgen_stats(&self, stat_type: NgsStatType, seasons: &Seasons) -> Result<Table>;

    async fn snap_counts(&self, seasons: &Seasons) -> Result<Table>;

    async fn injuries(&self, seasons: &Seasons) -> Result<Table>;

    /// Load any dataset by name. NextGen Stats use the default subtype.
    async fn load(&self, dataset: Dataset, seasons: &Seasons) -> Result<Table> {
        match dataset {
            Dataset::PlayerStats => self.player_stats(seasons).await,
            Dataset::Schedules => self.schedules(seasons).await,
            Dataset::Rosters => self.rosters(seasons).await,
            Dataset::TeamStats => self.team_stats(seasons).await,
            Dataset::NextgenStats => self.nextgen_stats(NgsStatType::default(), seasons).await,
            Dataset::SnapCounts => self.snap_counts(seasons).await,
            Dataset::Injuries => self.injuries(seasons).await,
        }
    }
}

/// Relational store receiving incremental loads.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create the schema if it does not exist.
    async fn ensure_schema(&self, schema: &str) -> Result<()>;

    async fn table_exists(&self, table: &TableRef) -> Result<bool>;

    /// Primary key columns in key order; empty when the table has none.
    async fn primary_key(&self, table: &TableRef) -> Result<Vec<String>>;

    async fn row_count(&self, table: &TableRef) -> Result<u64>;

    /// Column names in table order.
    async fn columns(&self, table: &TableRef) -> Result<Vec<String>>;

    /// Count rows matching `predicate`.
    async fn count_matching(&self, table: &TableRef, predicate: &RowPredicate) -> Result<u64>;

    /// Open a transaction. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn WarehouseTransaction>>;
}

/// Row filter evaluated inside the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub enum RowPredicate {
    IsNull(String),
    /// Non-null values below `min` or above `max`.
    OutsideRange { column: String, min: f64, max: f64 },
}

impl RowPredicate {
    pub fn column(&self) -> &str {
        match self {
            RowPredicate::IsNull(c) => c,
            RowPredicate::OutsideRange { column, .. } => column,
        }
    }

    /// Evaluate against a single cell.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            RowPredicate::IsNull(_) => value.is_null(),
            RowPredicate::OutsideRange { min, max, .. } => {
                value.as_f64().is_some_and(|v| v < *min || v > *max)
            }
        }
    }
}

/// Statements executed inside one warehouse transaction.
#[async_trait]
pub trait WarehouseTransaction: Send {
    /// Create `table` with columns inferred from `rows`, then insert them.
    async fn create_table(&mut self, table: &TableRef, rows: &Table) -> Result<u64>;

    /// Load `rows` into a fresh staging table next to `target`.
    async fn stage_rows(&mut self, target: &TableRef, rows: &Table) -> Result<TableRef>;

    /// Insert every staged row into `target`, updating non-key columns on key conflict.
    async fn upsert_from(
        &mut self,
        target: &TableRef,
        staging: &TableRef,
        columns: &[String],
        key: &[String],
    ) -> Result<()>;

    /// Delete rows whose `column` value is in `values`. Returns rows deleted.
    async fn delete_where_in(&mut self, table: &TableRef, column: &str, values: &[Value]) -> Result<u64>;

    /// Append `rows` to an existing table. Returns rows inserted.
    async fn append_rows(&mut self, table: &TableRef, rows: &Table) -> Result<u64>;

    async fn drop_table(&mut self, table: &TableRef) -> Result<()>;

    async fn count_rows(&mut self, table: &TableRef) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Transformation job run after raw tables are loaded (e.g. a dbt selection).
#[async_trait]
pub trait DownstreamJob: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}
