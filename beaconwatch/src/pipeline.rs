//! Orchestrates parse -> Tier 1 -> Tier 2 (skipping Tier 1 "critical" keys)
//! -> Tier 3. Single-threaded, synchronous; each stage fully consumes the
//! previous stage's output.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::explain::{Explainer, RuleTemplateExplainer};
use crate::forest::IsolationForestModel;
use crate::grouper::group_records;
use crate::model::{Tier1Finding, Tier2Finding, Tier3Finding};
use crate::scaler::Scaler;
use crate::{parser, tier1, tier2, tier3};

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub total_logs: usize,
    pub parse_time_ms: f64,
    pub tier1_flagged: usize,
    pub tier2_flagged: usize,
    pub tier3_explained: usize,
    pub total_time_ms: f64,
    pub findings: Vec<Tier3Finding>,
}

/// A key is "critical" when all three Tier 1 methods fired for it; such
/// keys are already certain and are skipped by Tier 2.
fn critical_keys(tier1: &[Tier1Finding]) -> HashSet<crate::model::GroupKey> {
    tier1
        .iter()
        .filter(|f| f.methods_fired.len() == 3)
        .map(|f| f.key.clone())
        .collect()
}

pub fn run_pipeline(
    log_path: &Path,
    scaler: &Scaler,
    model: &IsolationForestModel,
    cfg: &Config,
) -> Result<PipelineResult> {
    run_pipeline_with_explainer(log_path, scaler, model, cfg, &RuleTemplateExplainer)
}

pub fn run_pipeline_with_explainer(
    log_path: &Path,
    scaler: &Scaler,
    model: &IsolationForestModel,
    cfg: &Config,
    explainer: &dyn Explainer,
) -> Result<PipelineResult> {
    let total_start = Instant::now();

    let parse_start = Instant::now();
    let records = parser::parse_log_file(log_path)?;
    let parse_time_ms = parse_start.elapsed().as_secs_f64() * 1000.0;
    info!(stage = "parse", records = records.len(), ms = parse_time_ms, "stage complete");

    let groups = group_records(&records);

    let tier1_start = Instant::now();
    let tier1_findings = tier1::run_tier1(&groups, &cfg.tier1);
    info!(
        stage = "tier1",
        flagged = tier1_findings.len(),
        ms = tier1_start.elapsed().as_secs_f64() * 1000.0,
        "stage complete"
    );

    let skip_keys = critical_keys(&tier1_findings);

    let tier2_start = Instant::now();
    let tier2_findings: Vec<Tier2Finding> =
        tier2::run_tier2(&records, cfg.group_min, scaler, model, &cfg.tier2, &skip_keys);
    info!(
        stage = "tier2",
        flagged = tier2_findings.len(),
        ms = tier2_start.elapsed().as_secs_f64() * 1000.0,
        "stage complete"
    );

    let tier3_start = Instant::now();
    let tier3_findings = tier3::run_tier3(&tier1_findings, &tier2_findings, explainer);
    info!(
        stage = "tier3",
        explained = tier3_findings.len(),
        ms = tier3_start.elapsed().as_secs_f64() * 1000.0,
        "stage complete"
    );

    Ok(PipelineResult {
        total_logs: records.len(),
        parse_time_ms,
        tier1_flagged: tier1_findings.len(),
        tier2_flagged: tier2_findings.len(),
        tier3_explained: tier3_findings.len(),
        total_time_ms: total_start.elapsed().as_secs_f64() * 1000.0,
        findings: tier3_findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogRecord;
    use chrono::NaiveDate;

    fn beacon_records(src_ip: &str, domain: &str, n: usize) -> Vec<LogRecord> {
        (0..n)
            .map(|i| LogRecord {
                timestamp: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
                    + chrono::Duration::seconds(i as i64 * 300),
                username: "alice".into(),
                department: "Engineering".into(),
                src_ip: src_ip.into(),
                dst_ip: "1.2.3.4".into(),
                protocol: "HTTPS".into(),
                http_method: "GET".into(),
                url: format!("{domain}/beacon"),
                status_code: 200,
                bytes_sent: 100,
                bytes_received: 200,
                action: "ALLOWED".into(),
                url_category: "Technology".into(),
                threat_category: "None".into(),
                risk_score: 5,
                user_agent: "ua".into(),
            })
            .collect()
    }

    fn write_records(records: &[LogRecord]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("beaconwatch_pipeline_test_{}.csv", std::process::id()));
        let mut w = csv::Writer::from_path(&path).unwrap();
        w.write_record([
            "timestamp",
            "username",
            "department",
            "src_ip",
            "dst_ip",
            "protocol",
            "http_method",
            "url",
            "status_code",
            "bytes_sent",
            "bytes_received",
            "action",
            "url_category",
            "threat_category",
            "risk_score",
            "user_agent",
        ])
        .unwrap();
        for r in records {
            w.write_record([
                r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                r.username.clone(),
                r.department.clone(),
                r.src_ip.clone(),
                r.dst_ip.clone(),
                r.protocol.clone(),
                r.http_method.clone(),
                r.url.clone(),
                r.status_code.to_string(),
                r.bytes_sent.to_string(),
                r.bytes_received.to_string(),
                r.action.clone(),
                r.url_category.clone(),
                r.threat_category.clone(),
                r.risk_score.to_string(),
                r.user_agent.clone(),
            ])
            .unwrap();
        }
        w.flush().unwrap();
        path
    }

    #[test]
    fn obvious_beacon_is_tier1_critical_and_bypasses_tier2() {
        let records = beacon_records("10.0.0.9", "malware-c2.ru", 60);
        let path = write_records(&records);
        let cfg = Config::default();
        let scaler = Scaler::fit(&[]);
        let model = IsolationForestModel::fit(&[], &cfg.forest);

        let result = run_pipeline(&path, &scaler, &model, &cfg).unwrap();
        assert_eq!(result.tier1_flagged, 1);
        assert_eq!(result.tier2_flagged, 0);
        assert_eq!(result.tier3_explained, 1);
        assert_eq!(result.findings[0].confidence, 1.0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn idempotent_runs_are_byte_identical() {
        let records = beacon_records("10.0.0.9", "malware-c2.ru", 60);
        let path = write_records(&records);
        let cfg = Config::default();
        let scaler = Scaler::fit(&[]);
        let model = IsolationForestModel::fit(&[], &cfg.forest);

        let a = run_pipeline(&path, &scaler, &model, &cfg).unwrap();
        let b = run_pipeline(&path, &scaler, &model, &cfg).unwrap();
        assert_eq!(serde_json::to_string(&a.findings).unwrap(), serde_json::to_string(&b.findings).unwrap());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_log_yields_no_findings_and_no_error() {
        let path = write_records(&[]);
        let cfg = Config::default();
        let scaler = Scaler::fit(&[]);
        let model = IsolationForestModel::fit(&[], &cfg.forest);
        let result = run_pipeline(&path, &scaler, &model, &cfg).unwrap();
        assert_eq!(result.total_logs, 0);
        assert!(result.findings.is_empty());
        let _ = std::fs::remove_file(&path);
    }
}
