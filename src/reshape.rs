//! Wide to long reshaping.
//!
//! Wide tables encode a date and a metric in every column name as
//! `{YYYY}_{MM}_{DD}_{Metric}`. [`ColumnKey`] models that pair explicitly;
//! [`reshape`] turns each (entity, column) cell into a [`LongRecord`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::ReshapeConfig;
use crate::error::Result;
use crate::table::WideTable;

pub const DATE_FORMAT: &str = "%Y_%m_%d";
const DATE_TOKEN_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    Confirmed,
    Cured,
    Dead,
    /// Mortality rate as reported by the source, not derived.
    Deadrate,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Confirmed,
        Metric::Cured,
        Metric::Dead,
        Metric::Deadrate,
    ];

    /// Metrics every date is expected to carry.
    pub const REQUIRED: [Metric; 3] = [Metric::Confirmed, Metric::Cured, Metric::Dead];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Confirmed => "Confirmed",
            Metric::Cured => "Cured",
            Metric::Dead => "Dead",
            Metric::Deadrate => "Deadrate",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ColumnKeyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .find(|m| m.as_str() == s)
            .copied()
            .ok_or_else(|| ColumnKeyError::UnknownMetric {
                column: s.to_string(),
                token: s.to_string(),
            })
    }
}

/// Why a column name is not a `{date}_{metric}` key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnKeyError {
    #[error("column \"{column}\" has no metric suffix")]
    MissingMetric { column: String },
    #[error("column \"{column}\" has unknown metric \"{token}\"")]
    UnknownMetric { column: String, token: String },
    #[error("column \"{column}\" has malformed date \"{token}\"")]
    MalformedDate { column: String, token: String },
}

/// Composite (date, metric) key of a wide-table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnKey {
    pub date: NaiveDate,
    pub metric: Metric,
}

impl ColumnKey {
    pub fn new(date: NaiveDate, metric: Metric) -> Self {
        ColumnKey { date, metric }
    }

    /// Parses a column name, canonicalizing the metric token through
    /// `aliases` before matching it.
    pub fn parse(
        column: &str,
        aliases: &BTreeMap<String, String>,
    ) -> std::result::Result<Self, ColumnKeyError> {
        let (date_token, metric_token) =
            column
                .rsplit_once('_')
                .ok_or_else(|| ColumnKeyError::MissingMetric {
                    column: column.to_string(),
                })?;
        let metric_token = aliases
            .get(metric_token)
            .map(String::as_str)
            .unwrap_or(metric_token);
        let metric = metric_token
            .parse::<Metric>()
            .map_err(|_| ColumnKeyError::UnknownMetric {
                column: column.to_string(),
                token: metric_token.to_string(),
            })?;
        let malformed = || ColumnKeyError::MalformedDate {
            column: column.to_string(),
            token: date_token.to_string(),
        };
        if date_token.len() != DATE_TOKEN_LEN {
            return Err(malformed());
        }
        let date = NaiveDate::parse_from_str(date_token, DATE_FORMAT).map_err(|_| malformed())?;
        Ok(ColumnKey { date, metric })
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.date.format(DATE_FORMAT), self.metric)
    }
}

/// One (entity, date, metric) observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub entity: String,
    pub date: NaiveDate,
    pub metric: Metric,
    pub value: Option<f64>,
}

/// Long-form table ordered by entity, then date, then metric.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LongTable {
    records: Vec<LongRecord>,
}

impl LongTable {
    /// Sorts `records` into canonical order.
    pub fn new(mut records: Vec<LongRecord>) -> Self {
        records.sort_by(|a, b| {
            (&a.entity, a.date, a.metric).cmp(&(&b.entity, b.date, b.metric))
        });
        LongTable { records }
    }

    pub fn records(&self) -> &[LongRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct time points, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).sorted().dedup().collect()
    }

    /// Distinct entities, ascending.
    pub fn entities(&self) -> Vec<&str> {
        self.records
            .iter()
            .map(|r| r.entity.as_str())
            .dedup()
            .collect()
    }

    /// Records with `first <= date <= last`.
    pub fn between(&self, first: NaiveDate, last: NaiveDate) -> LongTable {
        LongTable {
            records: self
                .records
                .iter()
                .filter(|r| r.date >= first && r.date <= last)
                .cloned()
                .collect(),
        }
    }

    /// Records of a single metric, still in canonical order.
    pub fn metric(&self, metric: Metric) -> impl Iterator<Item = &LongRecord> {
        self.records.iter().filter(move |r| r.metric == metric)
    }

    pub fn value(&self, entity: &str, date: NaiveDate, metric: Metric) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.entity == entity && r.date == date && r.metric == metric)
            .and_then(|r| r.value)
    }
}

/// Columns that were left out of a reshape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReshapeReport {
    pub skipped_columns: Vec<ColumnKeyError>,
    /// Required metric columns absent for a date present in the table.
    pub missing: Vec<ColumnKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reshaped {
    pub table: LongTable,
    pub report: ReshapeReport,
}

/// Converts a wide table into long records.
///
/// Fails only when the entity column itself is missing; any other column
/// that is not a valid key is skipped with a warning.
pub fn reshape(table: &WideTable, config: &ReshapeConfig) -> Result<Reshaped> {
    let entity_idx = table.require_column(&config.entity_column)?;
    let mut report = ReshapeReport::default();

    let mut keyed: Vec<(usize, ColumnKey)> = Vec::new();
    let mut seen: BTreeSet<ColumnKey> = BTreeSet::new();
    for (idx, name) in table.headers().iter().enumerate() {
        if idx == entity_idx {
            continue;
        }
        match ColumnKey::parse(name, &config.metric_aliases) {
            Ok(key) if !seen.insert(key) => {
                warn!("duplicate column {key}, keeping the first");
            }
            Ok(key) => keyed.push((idx, key)),
            Err(e) => {
                warn!("skipping column: {e}");
                report.skipped_columns.push(e);
            }
        }
    }

    let dates: BTreeSet<NaiveDate> = seen.iter().map(|k| k.date).collect();
    for date in dates {
        for metric in Metric::REQUIRED {
            let key = ColumnKey::new(date, metric);
            if !seen.contains(&key) {
                warn!("column {key} does not exist, skipping");
                report.missing.push(key);
            }
        }
    }

    let mut records = Vec::with_capacity(table.len() * keyed.len());
    for row in table.rows() {
        let entity = row[entity_idx].trim();
        if entity.is_empty() {
            debug!("skipping row without entity");
            continue;
        }
        records.extend(keyed.iter().map(|&(idx, key)| LongRecord {
            entity: entity.to_string(),
            date: key.date,
            metric: key.metric,
            value: parse_value(&row[idx]),
        }));
    }
    debug!("reshaped {} rows into {} records", table.len(), records.len());

    Ok(Reshaped {
        table: LongTable::new(records),
        report,
    })
}

fn parse_value(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Entity x date matrix of one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub entities: Vec<String>,
    pub dates: Vec<NaiveDate>,
    /// `cells[entity][date]`.
    pub cells: Vec<Vec<Option<f64>>>,
}

/// Pivots `metric` into a matrix, applying `scale` to every present value.
pub fn pivot<F>(table: &LongTable, metric: Metric, scale: F) -> Pivot
where
    F: Fn(f64) -> f64,
{
    let dates = table.dates();
    let date_pos: BTreeMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let mut entities = Vec::new();
    let mut cells = Vec::new();
    for (entity, group) in &table.metric(metric).chunk_by(|r| r.entity.clone()) {
        let mut row = vec![None; dates.len()];
        for rec in group {
            row[date_pos[&rec.date]] = rec.value.map(&scale);
        }
        entities.push(entity);
        cells.push(row);
    }
    Pivot {
        entities,
        dates,
        cells,
    }
}

/// `ln(1 + x)`, for heatmaps whose counts span orders of magnitude.
pub fn log_scale(value: f64) -> f64 {
    value.ln_1p()
}
