//! Post-load data quality checks.

use gridiron_core::ports::{RowPredicate, Warehouse};
use gridiron_core::{Dataset, Error, Result, TableRef};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Columns that must never be null in player-level tables.
const NULL_CHECKED: [&str; 3] = ["player_id", "season", "position"];

/// Plausible value ranges, inclusive.
const RANGE_CHECKED: [(&str, f64, f64); 3] = [
    ("passing_yards", 0.0, 10_000.0),
    ("rushing_yards", 0.0, 5_000.0),
    ("season", 1999.0, 2030.0),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub dataset: Dataset,
    pub record_count: u64,
    /// Null count per checked column.
    pub null_checks: BTreeMap<String, u64>,
    /// Out-of-range count per checked column.
    pub range_checks: BTreeMap<String, u64>,
}

impl QualityReport {
    /// Null `player_id` values fail the load; everything else is reported only.
    pub fn failure(&self) -> Option<String> {
        match self.null_checks.get("player_id") {
            Some(&n) if n > 0 => Some(format!("{} rows with null player_id", n)),
            _ => None,
        }
    }

    pub fn passed(&self) -> bool {
        self.failure().is_none()
    }

    pub fn into_result(self) -> Result<Self> {
        match self.failure() {
            Some(reason) => Err(Error::QualityCheckFailed {
                dataset: self.dataset.to_string(),
                reason,
            }),
            None => Ok(self),
        }
    }
}

/// Run the quality checks against a loaded table.
///
/// Null and range checks apply to player stats; other datasets only report
/// their record count. Checked columns absent from the table are skipped.
pub async fn run_quality_checks(
    warehouse: &dyn Warehouse,
    dataset: Dataset,
    table: &TableRef,
) -> Result<QualityReport> {
    let record_count = warehouse.row_count(table).await?;
    let mut report = QualityReport {
        dataset,
        record_count,
        null_checks: BTreeMap::new(),
        range_checks: BTreeMap::new(),
    };

    if dataset == Dataset::PlayerStats {
        let columns = warehouse.columns(table).await?;
        let present = |c: &str| columns.iter().any(|col| col == c);

        for column in NULL_CHECKED.into_iter().filter(|c| present(c)) {
            let nulls = warehouse
                .count_matching(table, &RowPredicate::IsNull(column.to_string()))
                .await?;
            report.null_checks.insert(column.to_string(), nulls);
        }
        for (column, min, max) in RANGE_CHECKED.into_iter().filter(|(c, _, _)| present(c)) {
            let predicate = RowPredicate::OutsideRange {
                column: column.to_string(),
                min,
                max,
            };
            let invalid = warehouse.count_matching(table, &predicate).await?;
            report.range_checks.insert(column.to_string(), invalid);
        }
    }

    info!(
        dataset = %dataset,
        record_count,
        null_checks = ?report.null_checks,
        range_checks = ?report.range_checks,
        "Data quality metrics"
    );
    if let Some(reason) = report.failure() {
        warn!(dataset = %dataset, reason = %reason, "Data quality check failed");
    }
    Ok(report)
}
