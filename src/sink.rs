//! Hand-off of finished tables to exporters and renderers.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::info;

use crate::error::Result;
use crate::metrics::DerivedTable;
use crate::reshape::LongTable;
use crate::table::WideTable;

/// Which column plays which role, with the label to show for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    /// Categorical column, one line/bar group per value.
    pub entity: String,
    pub date: String,
    /// Name of the measured quantity.
    pub series: String,
    pub value: String,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        ColumnRoles {
            entity: "Province".into(),
            date: "Date".into(),
            series: "Metric".into(),
            value: "Value".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub entity: String,
    pub date: NaiveDate,
    pub series: String,
    pub value: f64,
}

/// Long-form rows plus their column roles. Absent values are not carried.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LongFrame {
    pub roles: ColumnRoles,
    pub rows: Vec<FrameRow>,
}

impl LongFrame {
    /// Keeps only rows whose entity is in `entities`.
    pub fn retain_entities(mut self, entities: &[String]) -> Self {
        self.rows.retain(|r| entities.contains(&r.entity));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<&LongTable> for LongFrame {
    fn from(table: &LongTable) -> Self {
        LongFrame {
            roles: ColumnRoles::default(),
            rows: table
                .records()
                .iter()
                .filter_map(|r| {
                    r.value.map(|value| FrameRow {
                        entity: r.entity.clone(),
                        date: r.date,
                        series: r.metric.to_string(),
                        value,
                    })
                })
                .collect(),
        }
    }
}

impl From<&DerivedTable> for LongFrame {
    fn from(table: &DerivedTable) -> Self {
        LongFrame {
            roles: ColumnRoles::default(),
            rows: table
                .metrics()
                .iter()
                .map(|m| FrameRow {
                    entity: m.entity.clone(),
                    date: m.date,
                    series: m.kind.to_string(),
                    value: m.value,
                })
                .collect(),
        }
    }
}

/// Terminal consumer of a frame. Nothing flows back to the caller.
pub trait Sink {
    fn consume(&mut self, frame: &LongFrame) -> Result<()>;
}

/// Writes a frame as BOM-prefixed UTF-8 CSV.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: &Path) -> Self {
        CsvSink {
            path: path.to_path_buf(),
        }
    }
}

impl Sink for CsvSink {
    fn consume(&mut self, frame: &LongFrame) -> Result<()> {
        let table = frame_to_wide(frame);
        table.write_csv(&self.path)?;
        info!("exported {} rows to {}", frame.rows.len(), self.path.display());
        Ok(())
    }
}

fn frame_to_wide(frame: &LongFrame) -> WideTable {
    let roles = &frame.roles;
    WideTable::new(
        vec![
            roles.entity.clone(),
            roles.date.clone(),
            roles.series.clone(),
            roles.value.clone(),
        ],
        frame
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.entity.clone(),
                    r.date.format("%Y-%m-%d").to_string(),
                    r.series.clone(),
                    r.value.to_string(),
                ]
            })
            .collect(),
    )
}
