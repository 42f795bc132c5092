//! Model-based scoring: scale features, score with the isolation forest,
//! normalise to a per-batch confidence, and attribute the top deviating
//! features.

use std::collections::HashSet;

use crate::config::Tier2Config;
use crate::forest::IsolationForestModel;
use crate::grouper::group_records;
use crate::model::{FeatureVector, GroupKey, LogRecord, Tier2Finding, FEATURE_NAMES};
use crate::scaler::Scaler;

pub fn run_tier2(
    records: &[LogRecord],
    group_min: usize,
    scaler: &Scaler,
    model: &IsolationForestModel,
    cfg: &Tier2Config,
    skip_keys: &HashSet<GroupKey>,
) -> Vec<Tier2Finding> {
    let groups = group_records(records);
    let features = crate::features::extract_features(&groups, group_min);
    let features: Vec<FeatureVector> = features.into_iter().filter(|f| !skip_keys.contains(&f.key)).collect();
    if features.is_empty() {
        return Vec::new();
    }

    let raw_rows: Vec<[f64; FEATURE_NAMES.len()]> = features.iter().map(|f| f.to_row()).collect();
    let scaled_rows = scaler.transform(&raw_rows);
    let raw_scores = model.score_samples(&scaled_rows);

    let confidences = normalize_scores(&raw_scores);

    let mut findings: Vec<Tier2Finding> = features
        .into_iter()
        .zip(raw_scores)
        .zip(confidences)
        .zip(scaled_rows)
        .filter_map(|(((fv, raw), confidence), scaled)| {
            if confidence < cfg.confidence_threshold {
                return None;
            }
            let top_features = top_features(&scaled, cfg.top_features_n);
            Some(Tier2Finding {
                key: fv.key.clone(),
                username: fv.username.clone(),
                confidence,
                anomaly_score: raw,
                features: fv,
                top_features,
            })
        })
        .collect();

    findings.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap()
            .then_with(|| a.key.cmp(&b.key))
    });
    findings
}

/// Flip the sign (more anomalous should be closer to 1) and min-max
/// normalise within this batch.
fn normalize_scores(raw_scores: &[f64]) -> Vec<f64> {
    let flipped: Vec<f64> = raw_scores.iter().map(|s| -s).collect();
    let min = flipped.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = flipped.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        return vec![0.0; flipped.len()];
    }
    flipped.iter().map(|v| (v - min) / (max - min)).collect()
}

fn top_features(scaled_row: &[f64; FEATURE_NAMES.len()], n: usize) -> Vec<String> {
    let mut idx: Vec<usize> = (0..FEATURE_NAMES.len()).collect();
    idx.sort_by(|&a, &b| {
        scaled_row[b]
            .abs()
            .partial_cmp(&scaled_row[a].abs())
            .unwrap()
            .then_with(|| a.cmp(&b))
    });
    idx.into_iter().take(n).map(|i| FEATURE_NAMES[i].to_string()).collect()
}

/// Feature-name templated descriptions, used by the rule-template explainer.
pub fn feature_explanation(name: &str) -> &'static str {
    match name {
        "avg_interval_s" => "the average time between requests",
        "cv" => "the regularity (low variance) of request timing",
        "bytes_sent_cv" => "the uniformity of outbound payload size",
        "unique_paths_ratio" => "how repetitive the requested paths are",
        "night_ratio" => "the fraction of traffic outside business hours",
        "request_count" => "the overall request volume",
        _ => "an unrecognised feature",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_maps_most_anomalous_to_one() {
        let raw = vec![-0.1, -0.5, -0.9];
        let conf = normalize_scores(&raw);
        assert!((conf[2] - 1.0).abs() < 1e-9);
        assert!((conf[0] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_constant_scores_yields_zero_confidence() {
        let raw = vec![-0.3, -0.3, -0.3];
        let conf = normalize_scores(&raw);
        assert!(conf.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn top_features_breaks_ties_by_feature_name_order() {
        let row = [1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let top = top_features(&row, 2);
        assert_eq!(top, vec!["avg_interval_s".to_string(), "cv".to_string()]);
    }
}
