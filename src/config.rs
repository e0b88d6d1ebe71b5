use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What to do with an entity name that has no canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedPolicy {
    /// Keep the row with its original name and report it.
    #[default]
    Keep,
    /// Remove the row and report it.
    Drop,
    /// Fail the whole normalization.
    Error,
}

/// Row selection `column == equals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionPredicate {
    pub column: String,
    pub equals: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub region: Option<RegionPredicate>,
    /// Deduplication key; also the column rewritten by the name mapping.
    pub key_column: String,
    /// Columns to keep, in output order. Empty keeps every column.
    pub keep_columns: Vec<String>,
    pub map_names: bool,
    pub unmapped: UnmappedPolicy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            region: None,
            key_column: "Province".into(),
            keep_columns: Vec::new(),
            map_names: true,
            unmapped: UnmappedPolicy::Keep,
        }
    }
}

impl FilterConfig {
    /// Extraction of province totals from the DXY area dump.
    pub fn dxy_area() -> Self {
        FilterConfig {
            region: Some(RegionPredicate {
                column: "countryName".into(),
                equals: "中国".into(),
            }),
            key_column: "provinceName".into(),
            keep_columns: [
                "provinceName",
                "province_confirmedCount",
                "province_curedCount",
                "province_deadCount",
                "updateTime",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            map_names: false,
            unmapped: UnmappedPolicy::Keep,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReshapeConfig {
    pub entity_column: String,
    /// Misspelled metric tokens and their canonical spelling.
    pub metric_aliases: BTreeMap<String, String>,
}

impl Default for ReshapeConfig {
    fn default() -> Self {
        ReshapeConfig {
            entity_column: "Province".into(),
            metric_aliases: [("Deadarte".to_string(), "Deadrate".to_string())]
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Used by the `extract` command on raw dumps.
    pub extract: FilterConfig,
    /// Applied to wide tables before reshaping.
    pub normalize: FilterConfig,
    pub reshape: ReshapeConfig,
    /// Label for the remainder bucket in share breakdowns.
    pub others_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            extract: FilterConfig::dxy_area(),
            normalize: FilterConfig::default(),
            reshape: ReshapeConfig::default(),
            others_label: "其他省份".into(),
        }
    }
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                Ok(Config::default())
            }
            Err(e) => Err(Error::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}
