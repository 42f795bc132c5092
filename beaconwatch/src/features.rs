//! Per-group feature extraction, keyed on GROUP_MIN.

use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::model::{FeatureVector, GroupKey, LogRecord};
use crate::stats::{intervals, mean, population_std};

/// Build feature vectors for every group with `request_count >= group_min`.
/// Groups whose average inter-arrival interval is zero (degenerate, all
/// requests at the same timestamp) are dropped.
pub fn extract_features(
    groups: &BTreeMap<GroupKey, Vec<&LogRecord>>,
    group_min: usize,
) -> Vec<FeatureVector> {
    let mut out = Vec::new();
    for (key, records) in groups {
        if records.len() < group_min {
            continue;
        }
        let timestamps: Vec<i64> = records.iter().map(|r| r.timestamp.and_utc().timestamp()).collect();
        let gaps = intervals(&timestamps);
        let avg_interval_s = mean(&gaps);
        if avg_interval_s == 0.0 {
            continue;
        }
        let cv = population_std(&gaps) / avg_interval_s;

        let bytes_sent: Vec<f64> = records.iter().map(|r| r.bytes_sent as f64).collect();
        let bytes_mean = mean(&bytes_sent);
        let bytes_sent_cv = if bytes_mean == 0.0 {
            0.0
        } else {
            population_std(&bytes_sent) / bytes_mean
        };

        let distinct_paths: HashSet<&str> = records.iter().map(|r| r.path()).collect();
        let unique_paths_ratio = distinct_paths.len() as f64 / records.len() as f64;

        let night_count = records.iter().filter(|r| r.is_night()).count();
        let night_ratio = night_count as f64 / records.len() as f64;

        out.push(FeatureVector {
            key: key.clone(),
            username: records[0].username.clone(),
            avg_interval_s: round4(avg_interval_s),
            cv: round4(cv),
            bytes_sent_cv: round4(bytes_sent_cv),
            unique_paths_ratio: round4(unique_paths_ratio),
            night_ratio: round4(night_ratio),
            request_count: records.len() as f64,
        });
    }
    out
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
