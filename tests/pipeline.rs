//! End-to-end tests: raw CSV or spreadsheet -> normalize/reshape/derive -> CSV sink -> reload.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use covidprovinces::cluster::{
    label_snapshots, read_clusters, read_snapshots, ClusterPalette, HoverIndex,
};
use covidprovinces::config::FilterConfig;
use covidprovinces::metrics::{window_change, DerivedKind};
use covidprovinces::normalize::normalize;
use covidprovinces::province::ProvinceNames;
use covidprovinces::reshape::{ColumnKey, Metric};
use covidprovinces::sink::{CsvSink, LongFrame, Sink};
use covidprovinces::{transform, Config, WideTable};
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 12, d).unwrap()
}

fn close(a: Option<f64>, b: f64) -> bool {
    a.map_or(false, |a| (a - b).abs() < 1e-9)
}

#[test]
fn extract_china_provinces() {
    let raw = WideTable::load(&fixture_path("dxy_area.csv")).unwrap();
    let out = normalize(&raw, &FilterConfig::dxy_area(), &ProvinceNames::new()).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("china.csv");
    out.table.write_csv(&path).unwrap();
    let back = WideTable::load(&path).unwrap();

    assert_eq!(back, out.table);
    let provinces: Vec<&str> = back.column("provinceName").unwrap().collect();
    assert_eq!(provinces, vec!["湖北", "北京", "广东", "待明确地区"]);
    assert_eq!(out.report.filtered_out, 1);
    assert_eq!(out.report.duplicates, 1);
}

#[test]
fn transform_wide_fixture() {
    let raw = WideTable::load(&fixture_path("provinces_wide.csv")).unwrap();
    let out = transform(&raw, &Config::default()).unwrap();

    assert_eq!(out.normalize_report.unmapped, vec!["待明确地区".to_string()]);
    assert_eq!(
        out.long.entities(),
        vec!["北京市", "待明确地区", "湖北省", "西藏自治区"]
    );
    assert_eq!(
        out.reshape_report.missing,
        vec![ColumnKey::new(date(29), Metric::Cured)]
    );
    assert_eq!(out.reshape_report.skipped_columns.len(), 1);

    let d = &out.derived;
    assert!(close(d.get("北京市", date(27), DerivedKind::MortalityRate), 2.5));
    assert!(close(d.get("北京市", date(29), DerivedKind::MortalityRate), 2.0));
    assert!(close(d.get("北京市", date(28), DerivedKind::GrowthRate), 25.0));
    assert!(close(d.get("北京市", date(29), DerivedKind::GrowthRate), 50.0));
    assert_eq!(d.get("北京市", date(27), DerivedKind::GrowthRate), None);
    assert_eq!(d.get("西藏自治区", date(29), DerivedKind::GrowthRate), Some(0.0));
    assert_eq!(d.get("西藏自治区", date(27), DerivedKind::MortalityRate), Some(0.0));
    assert!(close(
        d.get("湖北省", date(28), DerivedKind::ReportedMortalityRate),
        6.62
    ));

    let order: Vec<String> = window_change(&out.long, date(27), date(29))
        .into_iter()
        .map(|c| c.entity)
        .collect();
    assert_eq!(order, vec!["北京市", "待明确地区", "湖北省", "西藏自治区"]);
}

#[test]
fn transform_spreadsheet_fixture() {
    let raw = WideTable::load(&fixture_path("provinces_wide.xlsx")).unwrap();
    assert_eq!(raw.headers()[4], "2022_12_28_Deadarte");
    assert_eq!(raw.rows()[0][0], "北京");
    assert_eq!(raw.rows()[0][1], "100");
    assert_eq!(raw.rows()[0][4], "");
    assert_eq!(raw.rows()[1][4], "6.62");

    let out = transform(&raw, &Config::default()).unwrap();
    assert!(out.normalize_report.unmapped.is_empty());
    assert!(out.reshape_report.skipped_columns.is_empty());
    assert!(out.reshape_report.missing.is_empty());
    assert_eq!(out.long.entities(), vec!["北京市", "湖北省"]);
    assert_eq!(out.long.value("北京市", date(28), Metric::Deadrate), None);
    assert!(close(out.long.value("湖北省", date(28), Metric::Deadrate), 6.62));

    let d = &out.derived;
    assert!(close(d.get("湖北省", date(28), DerivedKind::ReportedMortalityRate), 6.62));
    assert_eq!(d.get("北京市", date(28), DerivedKind::ReportedMortalityRate), None);
    assert_eq!(d.get("北京市", date(28), DerivedKind::MortalityRate), Some(2.0));
    assert_eq!(d.get("北京市", date(29), DerivedKind::GrowthRate), Some(50.0));
}

#[test]
fn snapshots_from_extracted_provinces() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("china.csv");
    let raw = WideTable::load(&fixture_path("provinces_wide.csv")).unwrap();
    let out = transform(&raw, &Config::default()).unwrap();
    WideTable::new(
        vec!["Province".into(), "Confirmed".into(), "Cured".into(), "Dead".into()],
        out.long
            .entities()
            .into_iter()
            .map(|e| {
                let cell = |m| {
                    out.long
                        .value(e, date(28), m)
                        .map_or(String::new(), |v| v.to_string())
                };
                vec![
                    e.to_string(),
                    cell(Metric::Confirmed),
                    cell(Metric::Cured),
                    cell(Metric::Dead),
                ]
            })
            .collect(),
    )
    .write_csv(&path)
    .unwrap();

    let snaps = read_snapshots(&path).unwrap();
    assert_eq!(snaps.len(), 4);
    assert_eq!(snaps[0].province, "北京市");
    let raw_ids: Vec<u32> = (1..=snaps.len() as u32).collect();
    let records = label_snapshots(&snaps, &raw_ids);
    let palette = ClusterPalette::new(records.iter().map(|r| r.cluster));
    assert_eq!(palette.entries().len(), 4);
}

#[test]
fn derived_csv_round_trip() {
    let raw = WideTable::load(&fixture_path("provinces_wide.csv")).unwrap();
    let out = transform(&raw, &Config::default()).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("derived.csv");
    CsvSink::new(&path)
        .consume(&LongFrame::from(&out.derived))
        .unwrap();

    let back = WideTable::load(&path).unwrap();
    assert_eq!(back.headers(), &["Province", "Date", "Metric", "Value"]);
    assert_eq!(back.len(), out.derived.len());
    assert_eq!(back.rows()[0][0], "北京市");
    assert_eq!(back.rows()[0][1], "2022-12-27");
}

#[test]
fn clusters_join_map_features() {
    let records = read_clusters(&fixture_path("clustered.csv")).unwrap();
    let palette = ClusterPalette::new(records.iter().map(|r| r.cluster));
    let labels: Vec<u32> = palette.entries().iter().map(|(l, _)| *l).collect();
    assert_eq!(labels, vec![1, 2, 3, 5]);

    let features: Vec<String> = ["西藏自治区", "湖北省", "上海市"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let index = HoverIndex::join(&features, &records, &ProvinceNames::new());
    assert_eq!(index.lookup(0).unwrap().confirmed, Some(4));
    assert_eq!(index.lookup(1).unwrap().cluster, 5);
    assert!(index.lookup(2).is_none());
}
