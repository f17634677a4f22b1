//! Dataset names, season sets, and NextGen stat subtypes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named data series published by nflverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    PlayerStats,
    Schedules,
    Rosters,
    TeamStats,
    NextgenStats,
    SnapCounts,
    Injuries,
}

impl Dataset {
    pub const ALL: [Dataset; 7] = [
        Dataset::PlayerStats,
        Dataset::Schedules,
        Dataset::Rosters,
        Dataset::TeamStats,
        Dataset::NextgenStats,
        Dataset::SnapCounts,
        Dataset::Injuries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::PlayerStats => "player_stats",
            Dataset::Schedules => "schedules",
            Dataset::Rosters => "rosters",
            Dataset::TeamStats => "team_stats",
            Dataset::NextgenStats => "nextgen_stats",
            Dataset::SnapCounts => "snap_counts",
            Dataset::Injuries => "injuries",
        }
    }

    /// Whether the published release is split into one file per season.
    pub fn is_partitioned_by_season(&self) -> bool {
        !matches!(self, Dataset::Schedules | Dataset::NextgenStats)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| Error::UnknownDataset(s.to_string()))
    }
}

/// Sorted, de-duplicated season years. Empty means "every available season".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Vec<i32>", into = "Vec<i32>")]
pub struct Seasons(Vec<i32>);

/// First season covered by the nflverse player-level releases.
pub const FIRST_SEASON: i32 = 1999;

impl Seasons {
    pub fn new(seasons: impl IntoIterator<Item = i32>) -> Self {
        let mut years: Vec<i32> = seasons.into_iter().collect();
        years.sort_unstable();
        years.dedup();
        Self(years)
    }

    pub fn all() -> Self {
        Self(Vec::new())
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub fn contains(&self, season: i32) -> bool {
        self.is_all() || self.0.binary_search(&season).is_ok()
    }

    /// Parse a comma-separated list such as `"2023,2024"`.
    pub fn parse_list(raw: &str) -> Result<Self> {
        let years = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let year: i32 = s
                    .parse()
                    .map_err(|_| Error::InvalidRequest(format!("invalid season '{}'", s)))?;
                if year < FIRST_SEASON {
                    return Err(Error::InvalidRequest(format!(
                        "season {} is before {}",
                        year, FIRST_SEASON
                    )));
                }
                Ok(year)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(years))
    }
}

impl From<Vec<i32>> for Seasons {
    fn from(v: Vec<i32>) -> Self {
        Self::new(v)
    }
}

impl From<Seasons> for Vec<i32> {
    fn from(s: Seasons) -> Self {
        s.0
    }
}

impl fmt::Display for Seasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("all");
        }
        let parts: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

/// NextGen Stats subtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NgsStatType {
    #[default]
    Receiving,
    Rushing,
    Passing,
}

impl NgsStatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NgsStatType::Receiving => "receiving",
            NgsStatType::Rushing => "rushing",
            NgsStatType::Passing => "passing",
        }
    }
}

impl fmt::Display for NgsStatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NgsStatType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "receiving" => Ok(NgsStatType::Receiving),
            "rushing" => Ok(NgsStatType::Rushing),
            "passing" => Ok(NgsStatType::Passing),
            other => Err(Error::InvalidRequest(format!(
                "ngs_stat_type must be receiving, rushing or passing, got '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_round_trip_names() {
        for dataset in Dataset::ALL {
            assert_eq!(dataset.as_str().parse::<Dataset>().unwrap(), dataset);
        }
        assert!(matches!(
            "weekly_fantasy".parse::<Dataset>(),
            Err(Error::UnknownDataset(_))
        ));
    }

    #[test]
    fn test_seasons_sorted_and_distinct() {
        let seasons = Seasons::new([2024, 2023, 2024]);
        assert_eq!(seasons.as_slice(), &[2023, 2024]);
        assert!(seasons.contains(2023));
        assert!(!seasons.contains(2022));
        assert!(Seasons::all().contains(2022));
    }

    #[test]
    fn test_parse_season_list() {
        assert_eq!(Seasons::parse_list("2024, 2023").unwrap().as_slice(), &[2023, 2024]);
        assert!(Seasons::parse_list("").unwrap().is_all());
        assert!(Seasons::parse_list("1990").is_err());
        assert!(Seasons::parse_list("twenty").is_err());
    }

    #[test]
    fn test_ngs_stat_type_parse() {
        assert_eq!("rushing".parse::<NgsStatType>().unwrap(), NgsStatType::Rushing);
        assert!("kicking".parse::<NgsStatType>().is_err());
        assert_eq!(NgsStatType::default(), NgsStatType::Receiving);
    }
}
