//! Core data model shared by every pipeline stage.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One parsed proxy log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub username: String,
    pub department: String,
    pub src_ip: String,
    pub dst_ip: String,
    pub protocol: String,
    pub http_method: String,
    pub url: String,
    pub status_code: u16,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub action: String,
    pub url_category: String,
    pub threat_category: String,
    pub risk_score: u8,
    pub user_agent: String,
}

impl LogRecord {
    /// Domain is the URL substring up to (not including) the first `/`.
    pub fn domain(&self) -> &str {
        match self.url.find('/') {
            Some(i) => &self.url[..i],
            None => &self.url,
        }
    }

    /// Path is the URL substring after the first `/`, empty if there is none.
    pub fn path(&self) -> &str {
        match self.url.find('/') {
            Some(i) => &self.url[i + 1..],
            None => "",
        }
    }

    pub fn is_night(&self) -> bool {
        let h = self.timestamp.hour();
        h < 8 || h >= 20
    }
}

/// `(src_ip, domain)` — the grouping key used by every tier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub src_ip: String,
    pub domain: String,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.src_ip, self.domain)
    }
}

/// Fixed column order for every feature matrix. Training, scaling, and
/// scoring must never reorder these.
pub const FEATURE_NAMES: [&str; 6] = [
    "avg_interval_s",
    "cv",
    "bytes_sent_cv",
    "unique_paths_ratio",
    "night_ratio",
    "request_count",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub key: GroupKey,
    pub username: String,
    pub avg_interval_s: f64,
    pub cv: f64,
    pub bytes_sent_cv: f64,
    pub unique_paths_ratio: f64,
    pub night_ratio: f64,
    pub request_count: f64,
}

impl FeatureVector {
    pub fn to_row(&self) -> [f64; FEATURE_NAMES.len()] {
        [
            self.avg_interval_s,
            self.cv,
            self.bytes_sent_cv,
            self.unique_paths_ratio,
            self.night_ratio,
            self.request_count,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    High,
    Critical,
}

impl Severity {
    pub fn from_method_count(n: usize) -> Self {
        match n {
            0 | 1 => Severity::Low,
            2 => Severity::High,
            _ => Severity::Critical,
        }
    }

    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Severity::Critical
        } else if confidence >= 0.7 {
            Severity::High
        } else {
            Severity::Low // bucketed as "medium" in narrative text; see tier3
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier1Method {
    Zscore,
    IntervalThreshold,
    Iqr,
}

impl std::fmt::Display for Tier1Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier1Method::Zscore => write!(f, "zscore"),
            Tier1Method::IntervalThreshold => write!(f, "interval_threshold"),
            Tier1Method::Iqr => write!(f, "iqr"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier1Finding {
    pub key: GroupKey,
    pub username: String,
    pub methods_fired: Vec<Tier1Method>,
    pub descriptions: Vec<String>,
    pub severity: Severity,
    pub request_count: usize,
    pub evidence: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier2Finding {
    pub key: GroupKey,
    pub username: String,
    pub confidence: f64,
    pub anomaly_score: f64,
    pub features: FeatureVector,
    pub top_features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier3Finding {
    pub key: GroupKey,
    pub username: String,
    pub threat_summary: String,
    pub what_happened: String,
    pub why_suspicious: String,
    pub recommended_action: String,
    pub confidence: f64,
    pub severity: Severity,
    pub tier1_fired: bool,
    pub tier2_fired: bool,
}
