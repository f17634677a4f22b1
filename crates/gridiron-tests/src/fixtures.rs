//! Test fixtures for creating sample data.

use async_trait::async_trait;
use gridiron_core::ports::SourceReader;
use gridiron_core::{Dataset, Error, NgsStatType, Result, Seasons, Table, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Factory for weekly player stat tables.
pub struct PlayerStatsFixture;

impl PlayerStatsFixture {
    pub const COLUMNS: [&'static str; 6] = [
        "player_id",
        "player_name",
        "position",
        "season",
        "week",
        "passing_yards",
    ];

    /// One row per `(player_id, week)` with passing yards `base + week`.
    pub fn weekly(season: i32, weeks: std::ops::RangeInclusive<i64>, players: &[&str], base: i64) -> Table {
        let rows = players
            .iter()
            .flat_map(|id| {
                weeks.clone().map(move |week| {
                    vec![
                        Value::from(*id),
                        Value::from(format!("Player {}", id)),
                        Value::from("QB"),
                        Value::from(season),
                        Value::from(week),
                        Value::from(base + week),
                    ]
                })
            })
            .collect();
        Self::table(rows)
    }

    /// A single row.
    pub fn row(player_id: &str, season: i32, week: i64, passing_yards: i64) -> Table {
        Self::table(vec![vec![
            Value::from(player_id),
            Value::from(format!("Player {}", player_id)),
            Value::from("QB"),
            Value::from(season),
            Value::from(week),
            Value::from(passing_yards),
        ]])
    }

    fn table(rows: Vec<Vec<Value>>) -> Table {
        Table::from_rows(Self::COLUMNS.iter().map(|c| c.to_string()).collect(), rows)
            .unwrap_or_default()
    }
}

/// Render a table as the CSV a release asset would contain.
pub fn to_csv(table: &Table) -> String {
    let mut out = table.columns().join(",");
    out.push('\n');
    for row in table.rows() {
        let cells: Vec<String> = row.iter().map(Value::to_string).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

/// In-process source serving fixed tables, filtered by season.
#[derive(Default)]
pub struct StaticSource {
    tables: Mutex<HashMap<Dataset, Table>>,
    failing: AtomicBool,
    calls: AtomicU32,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, dataset: Dataset, table: Table) -> Self {
        self.set_table(dataset, table);
        self
    }

    /// Replace the table served for `dataset`.
    pub fn set_table(&self, dataset: Dataset, table: Table) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(dataset, table);
        }
    }

    /// Make every subsequent read fail with a transient error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of reads served, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn read(&self, dataset: Dataset, seasons: &Seasons) -> Result<Table> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::SourceUnavailable(format!("{} unavailable", dataset)));
        }
        let table = self
            .tables
            .lock()
            .map_err(|_| Error::Internal("fixture lock poisoned".into()))?
            .get(&dataset)
            .cloned()
            .unwrap_or_default();
        if seasons.is_all() {
            return Ok(table);
        }
        let Some(idx) = table.column_index("season") else {
            return Ok(table);
        };
        Ok(table.filter_rows(|row| {
            row[idx]
                .as_i64()
                .and_then(|s| i32::try_from(s).ok())
                .is_some_and(|s| seasons.contains(s))
        }))
    }
}

#[async_trait]
impl SourceReader for StaticSource {
    async fn player_stats(&self, seasons: &Seasons) -> Result<Table> {
        self.read(Dataset::PlayerStats, seasons)
    }

    async fn schedules(&self, seasons: &Seasons) -> Result<Table> {
        self.read(Dataset::Schedules, seasons)
    }

    async fn rosters(&self, seasons: &Seasons) -> Result<Table> {
        self.read(Dataset::Rosters, seasons)
    }

    async fn team_stats(&self, seasons: &Seasons) -> Result<Table> {
        self.read(Dataset::TeamStats, seasons)
    }

    async fn nextgen_stats(&self, _stat_type: NgsStatType, seasons: &Seasons) -> Result<Table> {
        self.read(Dataset::NextgenStats, seasons)
    }

    async fn snap_counts(&self, seasons: &Seasons) -> Result<Table> {
        self.read(Dataset::SnapCounts, seasons)
    }

    async fn injuries(&self, seasons: &Seasons) -> Result<Table> {
        self.read(Dataset::Injuries, seasons)
    }
}
