//! Joins pipeline output against a ground-truth CSV and scores Tier 1,
//! Tier 2, and the combined detector at IP granularity.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::forest::IsolationForestModel;
use crate::pipeline::PipelineResult;
use crate::scaler::Scaler;

#[derive(Debug, Deserialize)]
struct GroundTruthRow {
    #[allow(dead_code)]
    timestamp: String,
    #[allow(dead_code)]
    username: String,
    src_ip: String,
    #[allow(dead_code)]
    url: String,
    #[allow(dead_code)]
    is_anomaly: bool,
    anomaly_type: String,
    #[allow(dead_code)]
    anomaly_severity: String,
    #[allow(dead_code)]
    tier_detection: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl Metrics {
    pub fn precision(&self) -> f64 {
        if self.tp + self.fp == 0 {
            0.0
        } else {
            self.tp as f64 / (self.tp + self.fp) as f64
        }
    }

    pub fn recall(&self) -> f64 {
        if self.tp + self.fn_ == 0 {
            0.0
        } else {
            self.tp as f64 / (self.tp + self.fn_) as f64
        }
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

pub struct EvalReport {
    pub tier1: Metrics,
    pub tier2: Metrics,
    pub combined: Metrics,
}

/// `src_ip`s that ground truth marks as beaconing.
pub fn load_ground_truth_ips(path: &Path) -> Result<HashSet<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut ips = HashSet::new();
    for row in reader.deserialize::<GroundTruthRow>() {
        let row = row?;
        if row.anomaly_type.starts_with("beaconing") {
            ips.insert(row.src_ip);
        }
    }
    Ok(ips)
}

fn score(predicted: &HashSet<String>, truth: &HashSet<String>) -> Metrics {
    let tp = predicted.intersection(truth).count();
    let fp = predicted.difference(truth).count();
    let fn_ = truth.difference(predicted).count();
    Metrics { tp, fp, fn_ }
}

pub fn evaluate(result: &PipelineResult, ground_truth_ips: &HashSet<String>) -> EvalReport {
    let tier1_ips: HashSet<String> = result
        .findings
        .iter()
        .filter(|f| f.tier1_fired)
        .map(|f| f.key.src_ip.clone())
        .collect();
    let tier2_ips: HashSet<String> = result
        .findings
        .iter()
        .filter(|f| f.tier2_fired)
        .map(|f| f.key.src_ip.clone())
        .collect();
    let combined_ips: HashSet<String> = tier1_ips.union(&tier2_ips).cloned().collect();

    EvalReport {
        tier1: score(&tier1_ips, ground_truth_ips),
        tier2: score(&tier2_ips, ground_truth_ips),
        combined: score(&combined_ips, ground_truth_ips),
    }
}

pub fn run_evaluation(
    logs_path: &Path,
    ground_truth_path: &Path,
    scaler: &Scaler,
    model: &IsolationForestModel,
    cfg: &Config,
) -> Result<EvalReport> {
    let ground_truth_ips = load_ground_truth_ips(ground_truth_path)?;
    let result = crate::pipeline::run_pipeline(logs_path, scaler, model, cfg)?;
    let report = evaluate(&result, &ground_truth_ips);
    info!(
        tier1_f1 = report.tier1.f1(),
        tier2_f1 = report.tier2.f1(),
        combined_f1 = report.combined.f1(),
        "evaluation complete"
    );
    Ok(report)
}

pub fn print_report(report: &EvalReport) {
    println!("| detector | precision | recall | f1 |");
    println!("|---|---|---|---|");
    for (name, m) in [("tier1", &report.tier1), ("tier2", &report.tier2), ("combined", &report.combined)] {
        println!("| {name} | {:.3} | {:.3} | {:.3} |", m.precision(), m.recall(), m.f1());
    }
}
