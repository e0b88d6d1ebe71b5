//! Consumption of per-province risk cluster labels.
//!
//! Labels come from an upstream k-means run. This module only ranks them,
//! assigns colors and answers "which record is under this map feature".

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use itertools::Itertools;
use log::warn;
use palette::{LinSrgb, Mix, Srgb};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::province::{Canonical, ProvinceNames};
use crate::table::WideTable;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClusterRecord {
    #[serde(rename = "Province")]
    pub province: String,
    #[serde(rename = "Cluster")]
    pub cluster: u32,
    #[serde(rename = "Confirmed")]
    pub confirmed: Option<u32>,
    #[serde(rename = "Cured")]
    pub cured: Option<u32>,
    #[serde(rename = "Dead")]
    pub dead: Option<u32>,
}

pub fn read_clusters(path: &Path) -> Result<Vec<ClusterRecord>> {
    Ok(WideTable::load(path)?.records())
}

/// One row of the filtered province file, before clustering.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProvinceSnapshot {
    #[serde(rename = "Province")]
    pub province: String,
    #[serde(rename = "Confirmed")]
    pub confirmed: Option<u32>,
    #[serde(rename = "Cured")]
    pub cured: Option<u32>,
    #[serde(rename = "Dead")]
    pub dead: Option<u32>,
}

impl ProvinceSnapshot {
    /// Confirmed, cured and dead as clustering features; absent counts are 0.
    pub fn features(&self) -> [f64; 3] {
        [self.confirmed, self.cured, self.dead].map(|v| f64::from(v.unwrap_or(0)))
    }

    pub fn with_cluster(&self, cluster: u32) -> ClusterRecord {
        ClusterRecord {
            province: self.province.clone(),
            cluster,
            confirmed: self.confirmed,
            cured: self.cured,
            dead: self.dead,
        }
    }
}

pub fn read_snapshots(path: &Path) -> Result<Vec<ProvinceSnapshot>> {
    Ok(WideTable::load(path)?.records())
}

/// Attaches raw cluster ids to snapshots and relabels them with
/// [`rank_clusters`], using each cluster's mean confirmed count as centroid.
pub fn label_snapshots(snapshots: &[ProvinceSnapshot], raw: &[u32]) -> Vec<ClusterRecord> {
    if snapshots.len() != raw.len() {
        warn!(
            "{} snapshots but {} cluster ids; extra entries ignored",
            snapshots.len(),
            raw.len()
        );
    }
    let groups = snapshots
        .iter()
        .zip(raw)
        .into_group_map_by(|&(_, &label)| label);
    let labels: Vec<u32> = groups.keys().copied().sorted().collect();
    let centroids: Vec<f64> = labels
        .iter()
        .map(|label| {
            let members = &groups[label];
            members.iter().map(|(s, _)| s.features()[0]).sum::<f64>() / members.len() as f64
        })
        .collect();
    let ranked: HashMap<u32, u32> = labels.into_iter().zip(rank_clusters(&centroids)).collect();
    snapshots
        .iter()
        .zip(raw)
        .map(|(s, label)| s.with_cluster(ranked[label]))
        .collect()
}

/// Relabels raw cluster ids `1..=k` by ascending centroid confirmed count,
/// so a larger label always means a higher risk.
///
/// `centroids[i]` is the confirmed count of the centroid of raw cluster `i`.
pub fn rank_clusters(centroids: &[f64]) -> Vec<u32> {
    let mut ranks = vec![0; centroids.len()];
    let order = (0..centroids.len()).sorted_by(|&a, &b| {
        centroids[a]
            .partial_cmp(&centroids[b])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    for (rank, raw) in order.enumerate() {
        ranks[raw] = rank as u32 + 1;
    }
    ranks
}

// Light and dark end of the red gradient.
const GRADIENT_LOW: (f32, f32, f32) = (1.0, 0.96, 0.94);
const GRADIENT_HIGH: (f32, f32, f32) = (0.40, 0.0, 0.05);
const GRADIENT_START: f32 = 0.3;

/// Color per distinct cluster label, sampled evenly from the red gradient
/// over `[0.3, 1.0]` in ascending label order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPalette {
    colors: Vec<(u32, Srgb<u8>)>,
}

impl ClusterPalette {
    pub fn new<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        let distinct: BTreeSet<u32> = labels.into_iter().collect();
        let low: LinSrgb = Srgb::from(GRADIENT_LOW).into_linear();
        let high: LinSrgb = Srgb::from(GRADIENT_HIGH).into_linear();
        let steps = distinct.len().saturating_sub(1).max(1) as f32;
        let colors = distinct
            .into_iter()
            .enumerate()
            .map(|(i, label)| {
                let t = GRADIENT_START + (1.0 - GRADIENT_START) * (i as f32 / steps);
                let color: Srgb<u8> = Srgb::<f32>::from_linear(low.mix(high, t)).into_format();
                (label, color)
            })
            .collect();
        ClusterPalette { colors }
    }

    pub fn color(&self, label: u32) -> Option<Srgb<u8>> {
        self.colors
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, c)| *c)
    }

    /// `(label, color)` in ascending label order.
    pub fn entries(&self) -> &[(u32, Srgb<u8>)] {
        &self.colors
    }
}

/// Map feature index to the cluster record of the province it draws.
#[derive(Debug, Clone, Default)]
pub struct HoverIndex {
    by_feature: Vec<Option<ClusterRecord>>,
}

impl HoverIndex {
    /// Joins map features (by official province name) with cluster records
    /// (by any name the mapping resolves). Features without a record stay
    /// empty; records that match no feature are logged.
    pub fn join(feature_names: &[String], records: &[ClusterRecord], names: &ProvinceNames) -> Self {
        let mut by_name: HashMap<String, &ClusterRecord> = HashMap::new();
        for rec in records {
            let key = match names.canonical(&rec.province) {
                Canonical::Mapped(full) => full.to_string(),
                Canonical::Unmapped => {
                    warn!("cluster record {:?} has no canonical name", rec.province);
                    rec.province.clone()
                }
            };
            by_name.entry(key).or_insert(rec);
        }
        let by_feature = feature_names
            .iter()
            .map(|name| by_name.remove(name.trim()).cloned())
            .collect();
        for name in by_name.keys().sorted() {
            warn!("no map feature for {name:?}");
        }
        HoverIndex { by_feature }
    }

    pub fn lookup(&self, feature: usize) -> Option<&ClusterRecord> {
        self.by_feature.get(feature).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.by_feature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_feature.is_empty()
    }
}
