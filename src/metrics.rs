//! Derived metrics over long tables.
//!
//! Every ratio treats a zero denominator as a zero result. Negative inputs
//! are not corrected; the arithmetic is applied as-is.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::reshape::{LongRecord, LongTable, Metric};

/// Deaths per hundred confirmed cases.
pub fn mortality_rate(dead: f64, confirmed: f64) -> f64 {
    if confirmed == 0.0 {
        0.0
    } else {
        dead / confirmed * 100.0
    }
}

/// Percent change from `prev` to `curr`.
pub fn growth_rate(prev: f64, curr: f64) -> f64 {
    percentage_change(prev, curr)
}

/// Percent change from `first` to `last`.
pub fn percentage_change(first: f64, last: f64) -> f64 {
    if first == 0.0 {
        0.0
    } else {
        (last - first) / first * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DerivedKind {
    MortalityRate,
    /// Taken from the source's own `Deadrate` columns.
    ReportedMortalityRate,
    GrowthRate,
}

impl DerivedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedKind::MortalityRate => "MortalityRate",
            DerivedKind::ReportedMortalityRate => "ReportedMortalityRate",
            DerivedKind::GrowthRate => "GrowthRate",
        }
    }
}

impl fmt::Display for DerivedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetric {
    pub entity: String,
    pub date: NaiveDate,
    pub kind: DerivedKind,
    pub value: f64,
}

/// Derived values ordered by entity, kind, then date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedTable {
    metrics: Vec<DerivedMetric>,
}

impl DerivedTable {
    pub fn new(mut metrics: Vec<DerivedMetric>) -> Self {
        metrics.sort_by(|a, b| (&a.entity, a.kind, a.date).cmp(&(&b.entity, b.kind, b.date)));
        DerivedTable { metrics }
    }

    pub fn metrics(&self) -> &[DerivedMetric] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn kind(&self, kind: DerivedKind) -> impl Iterator<Item = &DerivedMetric> {
        self.metrics.iter().filter(move |m| m.kind == kind)
    }

    pub fn get(&self, entity: &str, date: NaiveDate, kind: DerivedKind) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.entity == entity && m.date == date && m.kind == kind)
            .map(|m| m.value)
    }

    /// Concatenates two tables, restoring canonical order.
    pub fn merge(self, other: DerivedTable) -> DerivedTable {
        DerivedTable::new(self.metrics.into_iter().chain(other.metrics).collect())
    }
}

/// Per-entity (date, value) pairs of `metric` where a value is present.
fn series(table: &LongTable, metric: Metric) -> Vec<(String, Vec<(NaiveDate, f64)>)> {
    table
        .metric(metric)
        .chunk_by(|r| r.entity.clone())
        .into_iter()
        .map(|(entity, recs)| {
            let points = recs
                .filter_map(|r: &LongRecord| r.value.map(|v| (r.date, v)))
                .collect();
            (entity, points)
        })
        .collect()
}

/// Mortality rate for every (entity, date) carrying both Dead and Confirmed.
pub fn mortality(table: &LongTable) -> DerivedTable {
    let mut out = Vec::new();
    for (entity, recs) in &table.records().iter().chunk_by(|r| (r.entity.clone(), r.date)) {
        let (mut dead, mut confirmed) = (None, None);
        for r in recs {
            match r.metric {
                Metric::Dead => dead = r.value,
                Metric::Confirmed => confirmed = r.value,
                _ => {}
            }
        }
        match (dead, confirmed) {
            (Some(d), Some(c)) => out.push(DerivedMetric {
                entity: entity.0.clone(),
                date: entity.1,
                kind: DerivedKind::MortalityRate,
                value: mortality_rate(d, c),
            }),
            _ => debug!("no mortality for {} on {}", entity.0, entity.1),
        }
    }
    DerivedTable::new(out)
}

/// The source's own mortality figures.
pub fn reported_mortality(table: &LongTable) -> DerivedTable {
    DerivedTable::new(
        table
            .metric(Metric::Deadrate)
            .filter_map(|r| {
                r.value.map(|value| DerivedMetric {
                    entity: r.entity.clone(),
                    date: r.date,
                    kind: DerivedKind::ReportedMortalityRate,
                    value,
                })
            })
            .collect(),
    )
}

/// Period-over-period growth of confirmed cases.
///
/// The series of an entity is the dates with a confirmed value; its first
/// point has no predecessor and yields nothing.
pub fn growth(table: &LongTable) -> DerivedTable {
    let mut out = Vec::new();
    for (entity, points) in series(table, Metric::Confirmed) {
        out.extend(
            points
                .iter()
                .tuple_windows()
                .map(|(&(_, prev), &(date, curr))| DerivedMetric {
                    entity: entity.clone(),
                    date,
                    kind: DerivedKind::GrowthRate,
                    value: growth_rate(prev, curr),
                }),
        );
    }
    DerivedTable::new(out)
}

/// Confirmed-case change of one entity between two time points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowChange {
    pub entity: String,
    pub first: f64,
    pub last: f64,
    pub change: f64,
}

/// Percentage change from `first` to `last` for every entity with both
/// values, largest change first (ties by entity).
pub fn window_change(table: &LongTable, first: NaiveDate, last: NaiveDate) -> Vec<WindowChange> {
    let mut changes: Vec<WindowChange> = table
        .entities()
        .into_iter()
        .filter_map(|entity| {
            let a = table.value(entity, first, Metric::Confirmed)?;
            let b = table.value(entity, last, Metric::Confirmed)?;
            Some(WindowChange {
                entity: entity.to_string(),
                first: a,
                last: b,
                change: percentage_change(a, b),
            })
        })
        .collect();
    changes.sort_by(|a, b| {
        b.change
            .partial_cmp(&a.change)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.entity.cmp(&b.entity))
    });
    changes
}

/// Entities with the largest peak value of `kind`, highest first.
pub fn top_entities(table: &DerivedTable, kind: DerivedKind, n: usize) -> Vec<String> {
    table
        .kind(kind)
        .chunk_by(|m| m.entity.clone())
        .into_iter()
        .map(|(entity, ms)| (entity, ms.map(|m| m.value).fold(f64::MIN, f64::max)))
        .sorted_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        })
        .take(n)
        .map(|(entity, _)| entity)
        .collect()
}

/// Confirmed cases on `date` for the `n` largest entities, with the rest
/// summed under `others_label`.
pub fn share_of_total(
    table: &LongTable,
    date: NaiveDate,
    n: usize,
    others_label: &str,
) -> Vec<(String, f64)> {
    let ranked: Vec<(String, f64)> = table
        .metric(Metric::Confirmed)
        .filter(|r| r.date == date)
        .filter_map(|r| r.value.map(|v| (r.entity.clone(), v)))
        .sorted_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        })
        .collect();
    if ranked.len() <= n {
        return ranked;
    }
    let others: f64 = ranked[n..].iter().map(|(_, v)| v).sum();
    let mut shares = ranked[..n].to_vec();
    shares.push((others_label.to_string(), others));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReshapeConfig;
    use crate::reshape::reshape;
    use crate::table::WideTable;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn long(csv: &str) -> LongTable {
        let wide = WideTable::from_csv_reader(csv.as_bytes()).unwrap();
        reshape(&wide, &ReshapeConfig::default()).unwrap().table
    }

    fn beijing() -> LongTable {
        long(
            "Province,2022_12_28_Confirmed,2022_12_28_Dead,2022_12_29_Confirmed,2022_12_29_Dead\n\
             北京,100,2,150,3\n",
        )
    }

    #[test]
    fn ratios_guard_zero_denominators() {
        assert_eq!(mortality_rate(0.0, 0.0), 0.0);
        assert_eq!(mortality_rate(5.0, 0.0), 0.0);
        assert_eq!(growth_rate(0.0, 10.0), 0.0);
        assert_eq!(percentage_change(0.0, 10.0), 0.0);
        assert_eq!(growth_rate(42.0, 42.0), 0.0);
        assert_eq!(mortality_rate(3.0, 150.0), 2.0);
    }

    #[test]
    fn negative_inputs_pass_through() {
        assert_eq!(mortality_rate(-2.0, 100.0), -2.0);
        assert_eq!(growth_rate(100.0, 50.0), -50.0);
    }

    #[test]
    fn mortality_per_date() {
        let m = mortality(&beijing());
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("北京", date(2022, 12, 28), DerivedKind::MortalityRate), Some(2.0));
        assert_eq!(m.get("北京", date(2022, 12, 29), DerivedKind::MortalityRate), Some(2.0));
    }

    #[test]
    fn growth_omits_first_point() {
        let g = growth(&beijing());
        assert_eq!(g.len(), 1);
        assert_eq!(g.metrics()[0].date, date(2022, 12, 29));
        assert_eq!(g.metrics()[0].value, 50.0);
    }

    #[test]
    fn growth_from_zero_is_zero() {
        let t = long("Province,2022_12_28_Confirmed,2022_12_29_Confirmed\n西藏,0,5\n");
        assert_eq!(
            growth(&t).get("西藏", date(2022, 12, 29), DerivedKind::GrowthRate),
            Some(0.0)
        );
        let m = mortality(&long(
            "Province,2022_12_28_Confirmed,2022_12_28_Dead\n西藏,0,0\n",
        ));
        assert_eq!(m.metrics()[0].value, 0.0);
    }

    #[test]
    fn growth_skips_absent_values() {
        let t = long(
            "Province,2022_12_27_Confirmed,2022_12_28_Confirmed,2022_12_29_Confirmed\n北京,100,,120\n",
        );
        let g = growth(&t);
        assert_eq!(g.len(), 1);
        assert_eq!(g.get("北京", date(2022, 12, 29), DerivedKind::GrowthRate), Some(20.0));
    }

    #[test]
    fn reported_mortality_reads_deadrate() {
        let t = long("Province,2020_10_19_Confirmed,2020_10_19_Deadarte\n湖北,68139,6.6\n");
        let r = reported_mortality(&t);
        assert_eq!(
            r.get("湖北", date(2020, 10, 19), DerivedKind::ReportedMortalityRate),
            Some(6.6)
        );
    }

    #[test]
    fn window_change_sorted_descending() {
        let t = long(
            "Province,2022_12_28_Confirmed,2022_12_29_Confirmed\n北京,100,150\n上海,100,300\n西藏,0,9\n",
        );
        let changes = window_change(&t, date(2022, 12, 28), date(2022, 12, 29));
        let order: Vec<&str> = changes.iter().map(|c| c.entity.as_str()).collect();
        assert_eq!(order, vec!["上海", "北京", "西藏"]);
        assert_eq!(changes[0].change, 200.0);
        assert_eq!(changes[2].change, 0.0);
    }

    #[test]
    fn top_entities_by_peak() {
        let t = long(
            "Province,2022_12_28_Confirmed,2022_12_28_Dead,2022_12_29_Confirmed,2022_12_29_Dead\n\
             北京,100,2,100,9\n上海,100,5,100,5\n天津,100,1,100,1\n",
        );
        let m = mortality(&t);
        assert_eq!(top_entities(&m, DerivedKind::MortalityRate, 2), vec!["北京", "上海"]);
    }

    #[test]
    fn share_groups_remainder() {
        let t = long("Province,2022_12_28_Confirmed\n北京,50\n上海,30\n天津,15\n西藏,5\n");
        let shares = share_of_total(&t, date(2022, 12, 28), 2, "其他省份");
        assert_eq!(
            shares,
            vec![
                ("北京".to_string(), 50.0),
                ("上海".to_string(), 30.0),
                ("其他省份".to_string(), 20.0)
            ]
        );
        assert_eq!(share_of_total(&t, date(2022, 12, 28), 10, "其他省份").len(), 4);
    }

    #[test]
    fn merge_keeps_order() {
        let t = beijing();
        let merged = mortality(&t).merge(growth(&t));
        let kinds: Vec<DerivedKind> = merged.metrics().iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DerivedKind::MortalityRate,
                DerivedKind::MortalityRate,
                DerivedKind::GrowthRate
            ]
        );
    }
}
