//! NextGen Stats enrichment of player-level tables.

use gridiron_core::table::ValueKey;
use gridiron_core::{Table, Value};
use std::collections::HashMap;
use tracing::debug;

/// Player id columns seen across NextGen Stats releases, in lookup order.
const PLAYER_ID_COLUMNS: [&str; 4] = ["player_id", "gsis_id", "gsis_player_id", "player_gsis_id"];

/// NextGen columns already present in the base stats.
const SHARED_COLUMNS: [&str; 11] = [
    "receptions",
    "targets",
    "yards",
    "touchdowns",
    "tds",
    "player_name",
    "player_display_name",
    "team",
    "team_abbr",
    "position",
    "player_position",
];

pub const NGS_PREFIX: &str = "ngs_";

/// Result of an optional enrichment stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    Applied(Table),
    Skipped(String),
}

impl Enrichment {
    /// The enriched table, or `base` unchanged when the stage was skipped.
    pub fn into_table(self, base: Table) -> Table {
        match self {
            Enrichment::Applied(t) => t,
            Enrichment::Skipped(_) => base,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Enrichment::Applied(_))
    }
}

/// Left-join NextGen columns onto `base`, prefixed with `ngs_`.
///
/// Season-total rows (week 0) are preferred when the release has them, in
/// which case the join ignores week. `match_season` is false when the
/// NextGen rows come from a different season than `base` (the
/// previous-season fallback). Each base row takes the first matching
/// NextGen row, so the row count never changes.
pub fn merge_nextgen(base: &Table, ngs: &Table, match_season: bool) -> Enrichment {
    if ngs.is_empty() {
        return Enrichment::Skipped("no nextgen rows".to_string());
    }
    if !base.has_column("player_id") {
        return Enrichment::Skipped("base table has no player_id column".to_string());
    }
    let Some(ngs_player) = PLAYER_ID_COLUMNS.into_iter().find(|c| ngs.has_column(c)) else {
        return Enrichment::Skipped("nextgen table has no player id column".to_string());
    };

    let season_totals = ngs
        .column("week")
        .is_some_and(|mut weeks| weeks.any(|w| w.as_i64() == Some(0)));
    let ngs = if season_totals {
        match ngs.column_index("week") {
            Some(idx) => ngs.filter_rows(|row| row[idx].as_i64() == Some(0)),
            None => ngs.clone(),
        }
    } else {
        ngs.clone()
    };

    let mut keys: Vec<(&str, &str)> = vec![("player_id", ngs_player)];
    if match_season && base.has_column("season") && ngs.has_column("season") {
        keys.push(("season", "season"));
    }
    if !season_totals && base.has_column("week") && ngs.has_column("week") {
        keys.push(("week", "week"));
    }

    let extra: Vec<(usize, String)> = ngs
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            !c.starts_with('_')
                && !SHARED_COLUMNS.contains(&c.as_str())
                && !PLAYER_ID_COLUMNS.contains(&c.as_str())
                && c.as_str() != "season"
                && c.as_str() != "week"
        })
        .map(|(i, c)| (i, format!("{}{}", NGS_PREFIX, c)))
        .filter(|(_, name)| !base.has_column(name))
        .collect();
    if extra.is_empty() {
        return Enrichment::Skipped("nextgen table has no additional columns".to_string());
    }

    let ngs_key_idx: Vec<usize> = keys
        .iter()
        .filter_map(|(_, k)| ngs.column_index(k))
        .collect();
    let base_key_idx: Vec<usize> = keys
        .iter()
        .filter_map(|(b, _)| base.column_index(b))
        .collect();

    let mut lookup: HashMap<Vec<ValueKey>, usize> = HashMap::new();
    for (i, row) in ngs.rows().iter().enumerate() {
        let key = join_key(row, &ngs_key_idx);
        lookup.entry(key).or_insert(i);
    }

    let mut merged = base.clone();
    let mut matched = 0usize;
    let matches: Vec<Option<usize>> = base
        .rows()
        .iter()
        .map(|row| {
            let hit = lookup.get(&join_key(row, &base_key_idx)).copied();
            matched += usize::from(hit.is_some());
            hit
        })
        .collect();

    for (src_idx, name) in extra {
        let values: Vec<Value> = matches
            .iter()
            .map(|m| m.map(|r| ngs.rows()[r][src_idx].clone()).unwrap_or(Value::Null))
            .collect();
        if let Err(e) = merged.push_column(name, values) {
            return Enrichment::Skipped(e.to_string());
        }
    }

    debug!(
        matched,
        rows = base.len(),
        season_totals,
        "Merged nextgen stats"
    );
    Enrichment::Applied(merged)
}

fn join_key(row: &[Value], indices: &[usize]) -> Vec<ValueKey> {
    indices
        .iter()
        .map(|&i| match &row[i] {
            // ids can arrive as numbers in one release and text in another
            Value::Int(n) => ValueKey::Text(n.to_string()),
            other => other.key(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> Table {
        Table::from_rows(
            vec!["player_id".into(), "season".into(), "week".into(), "receptions".into()],
            vec![
                vec!["00-1".into(), 2024.into(), 1.into(), 5.into()],
                vec!["00-1".into(), 2024.into(), 2.into(), 7.into()],
                vec!["00-2".into(), 2024.into(), 1.into(), 3.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_merge_uses_season_totals() {
        let ngs = Table::from_rows(
            vec![
                "player_gsis_id".into(),
                "season".into(),
                "week".into(),
                "avg_separation".into(),
                "receptions".into(),
            ],
            vec![
                vec!["00-1".into(), 2024.into(), 0.into(), 3.1.into(), 80.into()],
                vec!["00-1".into(), 2024.into(), 1.into(), 2.5.into(), 5.into()],
            ],
        )
        .unwrap();

        let Enrichment::Applied(merged) = merge_nextgen(&base(), &ngs, true) else {
            panic!("expected merge");
        };
        assert_eq!(merged.len(), 3);
        assert!(!merged.has_column("ngs_receptions"));
        assert_eq!(merged.get(0, "ngs_avg_separation"), Some(&Value::Float(3.1)));
        assert_eq!(merged.get(1, "ngs_avg_separation"), Some(&Value::Float(3.1)));
        assert_eq!(merged.get(2, "ngs_avg_separation"), Some(&Value::Null));
    }

    #[test]
    fn test_merge_by_week_without_totals() {
        let ngs = Table::from_rows(
            vec!["gsis_id".into(), "season".into(), "week".into(), "avg_cushion".into()],
            vec![
                vec!["00-1".into(), 2024.into(), 2.into(), 6.0.into()],
                vec!["00-2".into(), 2024.into(), 1.into(), 4.5.into()],
            ],
        )
        .unwrap();

        let merged = merge_nextgen(&base(), &ngs, true).into_table(base());
        assert_eq!(merged.get(0, "ngs_avg_cushion"), Some(&Value::Null));
        assert_eq!(merged.get(1, "ngs_avg_cushion"), Some(&Value::Float(6.0)));
        assert_eq!(merged.get(2, "ngs_avg_cushion"), Some(&Value::Float(4.5)));
    }

    #[test]
    fn test_previous_season_fallback_ignores_season() {
        let ngs = Table::from_rows(
            vec!["player_gsis_id".into(), "season".into(), "week".into(), "avg_separation".into()],
            vec![vec!["00-2".into(), 2023.into(), 0.into(), 2.9.into()]],
        )
        .unwrap();

        let merged = merge_nextgen(&base(), &ngs, false).into_table(base());
        assert_eq!(merged.get(2, "ngs_avg_separation"), Some(&Value::Float(2.9)));
    }

    #[test]
    fn test_skipped_without_player_column() {
        let ngs = Table::from_rows(
            vec!["team".into(), "avg_separation".into()],
            vec![vec!["KC".into(), 3.0.into()]],
        )
        .unwrap();
        assert!(matches!(merge_nextgen(&base(), &ngs, true), Enrichment::Skipped(_)));
        assert!(matches!(
            merge_nextgen(&base(), &Table::new(vec!["player_id".into()]), true),
            Enrichment::Skipped(_)
        ));
    }
}
