//! Filtering, reshaping and metric derivation for province-level COVID-19
//! tables.
//!
//! The library never touches paths on its own; [`transform`] works on an
//! in-memory [`WideTable`] and the binary supplies the files.

pub mod chart;
pub mod cluster;
pub mod config;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod province;
pub mod reshape;
pub mod sink;
pub mod table;

pub use config::Config;
pub use error::{Error, Result};
pub use table::WideTable;

use log::info;

use metrics::DerivedTable;
use normalize::NormalizeReport;
use province::ProvinceNames;
use reshape::{LongTable, ReshapeReport};

/// Everything produced by one pass of [`transform`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    /// The normalized wide table.
    pub table: WideTable,
    pub long: LongTable,
    /// Mortality and growth rates, plus reported mortality when present.
    pub derived: DerivedTable,
    pub normalize_report: NormalizeReport,
    pub reshape_report: ReshapeReport,
}

/// Normalizes, reshapes and derives metrics from a wide table.
pub fn transform(raw: &WideTable, config: &Config) -> Result<Transformed> {
    let normalized = normalize::normalize(raw, &config.normalize, &ProvinceNames::new())?;
    let reshaped = reshape::reshape(&normalized.table, &config.reshape)?;
    let derived = metrics::mortality(&reshaped.table)
        .merge(metrics::reported_mortality(&reshaped.table))
        .merge(metrics::growth(&reshaped.table));
    info!(
        "{} entities, {} long records, {} derived values",
        normalized.table.len(),
        reshaped.table.len(),
        derived.len()
    );
    Ok(Transformed {
        table: normalized.table,
        long: reshaped.table,
        derived,
        normalize_report: normalized.report,
        reshape_report: reshaped.report,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use metrics::DerivedKind;

    #[test]
    fn transform_end_to_end() {
        let raw = WideTable::from_csv_reader(
            "Province,2022_12_28_Confirmed,2022_12_28_Dead,2022_12_29_Confirmed,2022_12_29_Dead\n\
             北京,100,2,150,3\n北京,1,1,1,1\n"
                .as_bytes(),
        )
        .unwrap();
        let out = transform(&raw, &Config::default()).unwrap();
        let d28 = NaiveDate::from_ymd_opt(2022, 12, 28).unwrap();
        let d29 = NaiveDate::from_ymd_opt(2022, 12, 29).unwrap();

        assert_eq!(out.table.len(), 1);
        assert_eq!(out.normalize_report.duplicates, 1);
        assert_eq!(out.reshape_report.missing.len(), 2);
        assert_eq!(out.derived.get("北京市", d28, DerivedKind::MortalityRate), Some(2.0));
        assert_eq!(out.derived.get("北京市", d29, DerivedKind::MortalityRate), Some(2.0));
        assert_eq!(out.derived.get("北京市", d29, DerivedKind::GrowthRate), Some(50.0));
        assert_eq!(out.derived.get("北京市", d28, DerivedKind::GrowthRate), None);
    }

    #[test]
    fn mixed_name_forms_do_not_invent_growth() {
        let raw = WideTable::from_csv_reader(
            "Province,2022_12_28_Confirmed,2022_12_28_Cured,2022_12_28_Dead\n\
             北京,100,1,2\n北京市,200,1,4\n"
                .as_bytes(),
        )
        .unwrap();
        let out = transform(&raw, &Config::default()).unwrap();
        let d28 = NaiveDate::from_ymd_opt(2022, 12, 28).unwrap();

        assert_eq!(out.long.entities(), vec!["北京市"]);
        assert_eq!(out.normalize_report.duplicates, 1);
        assert_eq!(out.derived.kind(DerivedKind::GrowthRate).count(), 0);
        assert_eq!(out.derived.get("北京市", d28, DerivedKind::MortalityRate), Some(2.0));
    }
}
