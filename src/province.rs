//! Canonical names for Chinese provinces, municipalities, autonomous regions
//! and special administrative regions.
//!
//! Source datasets use the short form ("北京", "广西") while map layers use the
//! official name ("北京市", "广西壮族自治区").

use std::collections::HashMap;

const PROVINCES: [(&str, &str); 34] = [
    ("北京", "北京市"),
    ("上海", "上海市"),
    ("天津", "天津市"),
    ("重庆", "重庆市"),
    ("广东", "广东省"),
    ("江苏", "江苏省"),
    ("浙江", "浙江省"),
    ("四川", "四川省"),
    ("海南", "海南省"),
    ("贵州", "贵州省"),
    ("甘肃", "甘肃省"),
    ("青海", "青海省"),
    ("湖北", "湖北省"),
    ("福建", "福建省"),
    ("山东", "山东省"),
    ("河南", "河南省"),
    ("湖南", "湖南省"),
    ("安徽", "安徽省"),
    ("河北", "河北省"),
    ("辽宁", "辽宁省"),
    ("江西", "江西省"),
    ("云南", "云南省"),
    ("山西", "山西省"),
    ("黑龙江", "黑龙江省"),
    ("吉林", "吉林省"),
    ("陕西", "陕西省"),
    ("台湾", "台湾省"),
    ("内蒙古", "内蒙古自治区"),
    ("广西", "广西壮族自治区"),
    ("宁夏", "宁夏回族自治区"),
    ("新疆", "新疆维吾尔自治区"),
    ("西藏", "西藏自治区"),
    ("香港", "香港特别行政区"),
    ("澳门", "澳门特别行政区"),
];

/// Outcome of looking a name up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Canonical<'a> {
    /// The name has a canonical form (possibly itself).
    Mapped(&'a str),
    /// No entry; callers decide whether to keep, drop or reject it.
    Unmapped,
}

/// Short-name to official-name lookup.
#[derive(Debug, Clone)]
pub struct ProvinceNames {
    short_to_full: HashMap<String, String>,
}

impl Default for ProvinceNames {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvinceNames {
    pub fn new() -> Self {
        Self {
            short_to_full: PROVINCES
                .iter()
                .map(|(short, full)| (short.to_string(), full.to_string()))
                .collect(),
        }
    }

    /// Adds or overrides an entry.
    pub fn with_entry(mut self, short: &str, full: &str) -> Self {
        self.short_to_full.insert(short.to_string(), full.to_string());
        self
    }

    /// Resolves `name`. A name that is already an official name maps to itself.
    pub fn canonical<'a>(&'a self, name: &'a str) -> Canonical<'a> {
        let name = name.trim();
        if let Some(full) = self.short_to_full.get(name) {
            return Canonical::Mapped(full);
        }
        if self.short_to_full.values().any(|full| full == name) {
            return Canonical::Mapped(name);
        }
        Canonical::Unmapped
    }

    pub fn len(&self) -> usize {
        self.short_to_full.len()
    }

    pub fn is_empty(&self) -> bool {
        self.short_to_full.is_empty()
    }
}
