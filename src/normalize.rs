//! Row filtering, deduplication and entity name normalization.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::config::{FilterConfig, UnmappedPolicy};
use crate::error::{Error, Result};
use crate::province::{Canonical, ProvinceNames};
use crate::table::WideTable;

/// What normalization removed or could not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizeReport {
    /// Rows rejected by the region predicate.
    pub filtered_out: usize,
    /// Rows dropped because their key was already seen.
    pub duplicates: usize,
    /// Key values with no canonical name, in first-seen order.
    pub unmapped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: WideTable,
    pub report: NormalizeReport,
}

/// Applies `config` to `table`.
///
/// Output rows never outnumber input rows and key values are unique.
/// Unmapped names are always listed in the report; `config.unmapped` decides
/// whether their rows are kept, dropped, or fail the call.
pub fn normalize(
    table: &WideTable,
    config: &FilterConfig,
    names: &ProvinceNames,
) -> Result<Normalized> {
    let mut report = NormalizeReport::default();

    let region = match &config.region {
        Some(pred) => Some((table.require_column(&pred.column)?, pred.equals.as_str())),
        None => None,
    };
    let key_idx = table.require_column(&config.key_column)?;
    let projection: Vec<usize> = if config.keep_columns.is_empty() {
        (0..table.headers().len()).collect()
    } else {
        config
            .keep_columns
            .iter()
            .map(|c| table.require_column(c))
            .collect::<Result<_>>()?
    };
    let key_out = projection
        .iter()
        .position(|&i| i == key_idx)
        .ok_or_else(|| Error::MissingColumn {
            column: config.key_column.clone(),
        })?;

    let mut seen: HashSet<&str> = HashSet::new();
    let mut rows = Vec::new();
    for row in table.rows() {
        if let Some((idx, value)) = region {
            if row[idx].trim() != value {
                report.filtered_out += 1;
                continue;
            }
        }
        let key = row[key_idx].trim();
        // Dedup on the resolved name so "北京" and "北京市" collapse.
        let resolved = if config.map_names {
            names.canonical(key)
        } else {
            Canonical::Mapped(key)
        };
        let dedup_key = match resolved {
            Canonical::Mapped(full) => full,
            Canonical::Unmapped => key,
        };
        if !seen.insert(dedup_key) {
            report.duplicates += 1;
            continue;
        }

        let mut out: Vec<String> = projection.iter().map(|&i| row[i].clone()).collect();
        match resolved {
            Canonical::Mapped(full) if config.map_names => out[key_out] = full.to_string(),
            Canonical::Mapped(_) => {}
            Canonical::Unmapped => {
                warn!("no canonical name for {key:?}");
                report.unmapped.push(key.to_string());
                if config.unmapped == UnmappedPolicy::Drop {
                    continue;
                }
            }
        }
        rows.push(out);
    }

    if config.unmapped == UnmappedPolicy::Error && !report.unmapped.is_empty() {
        return Err(Error::UnmappedEntities {
            names: report.unmapped,
        });
    }

    debug!(
        "filtered out {}, {} duplicates",
        report.filtered_out, report.duplicates
    );
    info!("normalized {} rows into {}", table.len(), rows.len());
    let headers = projection
        .iter()
        .map(|&i| table.headers()[i].clone())
        .collect();
    Ok(Normalized {
        table: WideTable::new(headers, rows),
        report,
    })
}
